//! Session message types and voucher issuance.

use serde::{Deserialize, Serialize};

use crate::crypto::{
    mask_signature, sign_voucher, BlindPuzzleEngine, EscrowKeypair, EscrowPublicKey,
    EscrowSignature, MaskedSignature, Puzzle, VoucherNonce,
};

/// What a depositor sends to open a session: the cycle it registers for,
/// its two public keys, and the blinded voucher it wants signed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientEscrowInfo {
    /// Start height of the cycle the client registered for.
    pub cycle_start: u64,
    /// The client's half of the cooperative escrow.
    pub escrow_key: EscrowPublicKey,
    /// The client's timeout key for reclaiming the deposit.
    pub redeem_key: EscrowPublicKey,
    /// The client's blinded voucher, opaque to the tumbler.
    pub unsigned_voucher: Puzzle,
}

/// What a withdrawer sends to open a session: an unblinded voucher
/// (nonce plus signature) and its half of the cooperative escrow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenChannelRequest {
    /// Start height of the cycle the voucher was issued for.
    pub cycle_start: u64,
    /// The nonce the voucher signature is bound to.
    pub nonce: VoucherNonce,
    /// The unblinded voucher signature.
    pub signature: EscrowSignature,
    /// The client's half of the cooperative escrow.
    pub escrow_key: EscrowPublicKey,
}

/// A freshly issued, still-masked voucher. The signature only becomes
/// usable once the holder learns the puzzle solution through the payment
/// exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnsignedVoucherInfo {
    /// The cycle the voucher redeems into.
    pub cycle_start: u64,
    /// The nonce bound into the signature.
    pub nonce: VoucherNonce,
    /// The puzzle whose solution unmasks the signature.
    pub puzzle: Puzzle,
    /// The signature, XOR-masked by the puzzle solution.
    pub masked_signature: MaskedSignature,
}

/// Issue a masked voucher for `cycle_start`.
///
/// The engine mints a puzzle and its solution; the voucher key signs the
/// cycle under a fresh nonce; the solution masks the signature. The
/// solution itself never leaves this function — only solving the puzzle
/// (through the payment exchange) recovers it.
pub fn issue_unsigned_voucher(
    engine: &dyn BlindPuzzleEngine,
    voucher_key: &EscrowKeypair,
    cycle_start: u64,
) -> UnsignedVoucherInfo {
    let (puzzle, solution) = engine.generate_puzzle();
    let (signature, nonce) = sign_voucher(voucher_key, cycle_start);
    let masked_signature = mask_signature(&solution, &signature);
    UnsignedVoucherInfo {
        cycle_start,
        nonce,
        puzzle,
        masked_signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{unmask_signature, verify_voucher, KeyedPuzzleEngine};

    #[test]
    fn issued_voucher_unmasks_with_solved_puzzle() {
        let engine = KeyedPuzzleEngine::generate();
        let voucher_key = EscrowKeypair::generate();

        let issued = issue_unsigned_voucher(&engine, &voucher_key, 340);
        let solution = engine.solve(&issued.puzzle).unwrap();
        let signature = unmask_signature(&solution, &issued.masked_signature);

        assert!(verify_voucher(
            &voucher_key.public_key(),
            340,
            &issued.nonce,
            &signature,
        ));
    }

    #[test]
    fn masked_signature_does_not_verify() {
        let engine = KeyedPuzzleEngine::generate();
        let voucher_key = EscrowKeypair::generate();

        let issued = issue_unsigned_voucher(&engine, &voucher_key, 340);
        let raw = EscrowSignature::from_bytes(
            issued.masked_signature.as_bytes().try_into().unwrap(),
        );
        assert!(!verify_voucher(
            &voucher_key.public_key(),
            340,
            &issued.nonce,
            &raw,
        ));
    }
}
