//! Escrow output validation shared by both session kinds.

use crate::chain::{Amount, EscrowedCoin, ScriptHash, Transaction, TxOut};
use crate::crypto::{EscrowKeypair, EscrowPublicKey};
use crate::ProtocolError;

/// An escrowed coin that has been checked against the key that will spend
/// it: the redeem script hashes to the output's lock, and our key is one of
/// the two cooperative keys.
#[derive(Debug)]
pub struct BoundEscrow {
    /// The validated coin.
    pub coin: EscrowedCoin,
    /// The other cooperative key in the script.
    pub counterparty_key: EscrowPublicKey,
}

/// Validate that `coin` is spendable with `own_key` and bind the two.
///
/// Rejects coins whose redeem script does not hash to the output's
/// `script_pubkey` (the script is not what actually locks the funds) and
/// coins whose script does not contain our key (we could never sign for
/// it).
pub fn validate_and_bind_escrow(
    coin: EscrowedCoin,
    own_key: &EscrowKeypair,
) -> Result<BoundEscrow, ProtocolError> {
    if coin.redeem.script_hash() != coin.txout.script_pubkey {
        return Err(ProtocolError::InvalidEscrow(
            "redeem script does not match the output lock",
        ));
    }
    let counterparty_key = coin
        .redeem
        .counterparty_key(&own_key.public_key())
        .ok_or(ProtocolError::InvalidEscrow(
            "own key is not part of the escrow script",
        ))?;
    Ok(BoundEscrow {
        coin,
        counterparty_key,
    })
}

/// Find the output of `tx` locked to `script_hash` and paying exactly
/// `value`. Returns the output index and the output, or `None` if no
/// output matches both.
pub fn find_escrow_output(
    tx: &Transaction,
    script_hash: ScriptHash,
    value: Amount,
) -> Option<(u32, &TxOut)> {
    tx.indexed_outputs()
        .find(|(_, txout)| txout.script_pubkey == script_hash && txout.value == value)
}
