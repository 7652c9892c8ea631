//! Transactions, outputs, and coins.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::script::{EscrowScript, ScriptHash};

/// An amount in satoshis.
///
/// Thin newtype so values and heights can never be confused, with checked
/// addition for the one place amounts are summed (denomination + fee).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    /// Zero satoshis.
    pub const ZERO: Amount = Amount(0);

    /// The raw satoshi count.
    pub fn sats(&self) -> u64 {
        self.0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sats", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction identifier: the BLAKE3 digest of the canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    /// Hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", &self.to_hex()[..16])
    }
}

/// A reference to a specific output of a specific transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct OutPoint {
    /// The transaction carrying the output.
    pub txid: TxId,
    /// The output's index within that transaction.
    pub vout: u32,
}

/// A transaction output: a value locked behind a script hash.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxOut {
    /// The output value.
    pub value: Amount,
    /// Hash of the script that must be satisfied to spend this output.
    pub script_pubkey: ScriptHash,
}

/// A transaction, reduced to what escrow confirmation needs: an ordered
/// list of outputs and a lock time.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// The outputs, addressable by script hash and value.
    pub outputs: Vec<TxOut>,
    /// Absolute lock height; zero means unrestricted.
    pub lock_time: u64,
}

impl Transaction {
    /// The transaction id: BLAKE3 over the canonical bincode encoding.
    ///
    /// Deterministic for a given transaction — two structurally equal
    /// transactions always share an id.
    pub fn txid(&self) -> TxId {
        let encoded = bincode::serialize(self).expect("transaction encoding is infallible");
        TxId(*blake3::hash(&encoded).as_bytes())
    }

    /// Iterate outputs together with their indices.
    pub fn indexed_outputs(&self) -> impl Iterator<Item = (u32, &TxOut)> {
        self.outputs.iter().enumerate().map(|(i, o)| (i as u32, o))
    }
}

/// An on-chain output wrapped with the redeem script that makes it
/// spendable. This is the unit the value-transfer session operates on.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EscrowedCoin {
    /// Where the output lives on chain.
    pub outpoint: OutPoint,
    /// The output itself.
    pub txout: TxOut,
    /// The full escrow script whose hash the output is locked to.
    pub redeem: EscrowScript,
}

impl EscrowedCoin {
    /// Stable identifier for this coin: hex of its locking script hash.
    /// Used as the persistence key for the downstream session.
    pub fn id(&self) -> String {
        hex::encode(self.txout.script_pubkey.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EscrowKeypair;

    fn dummy_script() -> EscrowScript {
        EscrowScript::new(
            [
                EscrowKeypair::generate().public_key(),
                EscrowKeypair::generate().public_key(),
            ],
            EscrowKeypair::generate().public_key(),
            500,
        )
    }

    #[test]
    fn txid_is_deterministic() {
        let tx = Transaction {
            outputs: vec![TxOut {
                value: Amount(1_000),
                script_pubkey: dummy_script().script_hash(),
            }],
            lock_time: 0,
        };
        assert_eq!(tx.txid(), tx.clone().txid());
    }

    #[test]
    fn txid_changes_with_outputs() {
        let script = dummy_script();
        let tx1 = Transaction {
            outputs: vec![TxOut {
                value: Amount(1_000),
                script_pubkey: script.script_hash(),
            }],
            lock_time: 0,
        };
        let tx2 = Transaction {
            outputs: vec![TxOut {
                value: Amount(2_000),
                script_pubkey: script.script_hash(),
            }],
            lock_time: 0,
        };
        assert_ne!(tx1.txid(), tx2.txid());
    }

    #[test]
    fn checked_add_guards_overflow() {
        assert_eq!(Amount(1).checked_add(Amount(2)), Some(Amount(3)));
        assert_eq!(Amount(u64::MAX).checked_add(Amount(1)), None);
    }

    #[test]
    fn coin_id_matches_script_hash() {
        let script = dummy_script();
        let coin = EscrowedCoin {
            outpoint: OutPoint {
                txid: TxId([0u8; 32]),
                vout: 0,
            },
            txout: TxOut {
                value: Amount(5),
                script_pubkey: script.script_hash(),
            },
            redeem: script.clone(),
        };
        assert_eq!(coin.id(), hex::encode(script.script_hash().as_bytes()));
    }
}
