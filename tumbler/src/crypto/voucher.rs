//! # Voucher Authentication & Masking
//!
//! A voucher proves that *someone* completed a deposit escrow in some cycle,
//! without saying who. Two primitives make that work:
//!
//! 1. **Nonce-bound signatures.** The tumbler signs the big-endian cycle
//!    start height concatenated with a fresh random nonce. The nonce makes
//!    every voucher for the same cycle a distinct message, so vouchers
//!    cannot be copied between withdrawers, and the cycle start pins the
//!    voucher to the cohort it may redeem into.
//!
//! 2. **Solution masking.** At issuance the signature is XORed against a
//!    keystream derived from a blind-puzzle solution. Whoever later learns
//!    the solution — the depositor, via the atomic value-transfer exchange —
//!    can unmask the signature; the ciphertext is useless to everyone else.
//!    Masking is an involution: applying the same solution twice returns
//!    the original bytes.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::keys::{EscrowKeypair, EscrowPublicKey, EscrowSignature};
use super::puzzle::PuzzleSolution;
use crate::config;

/// The random nonce bound into a voucher signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherNonce {
    bytes: [u8; config::VOUCHER_NONCE_LENGTH],
}

impl VoucherNonce {
    /// Draw a fresh nonce from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; config::VOUCHER_NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wrap raw nonce bytes.
    pub fn from_bytes(bytes: [u8; config::VOUCHER_NONCE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// The raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for VoucherNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoucherNonce({})", hex::encode(self.bytes))
    }
}

/// A voucher signature XOR-masked by a puzzle solution.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedSignature {
    bytes: Vec<u8>,
}

impl MaskedSignature {
    /// The masked bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MaskedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskedSignature({}..)", hex::encode(&self.bytes[..8.min(self.bytes.len())]))
    }
}

/// The exact message a voucher signature covers.
fn voucher_message(cycle_start: u64, nonce: &VoucherNonce) -> Vec<u8> {
    let mut message = Vec::with_capacity(8 + config::VOUCHER_NONCE_LENGTH);
    message.extend_from_slice(&cycle_start.to_be_bytes());
    message.extend_from_slice(nonce.as_bytes());
    message
}

/// Sign a cycle start under the voucher key, binding a fresh nonce.
///
/// Returns the signature together with the nonce it is bound to; both
/// travel inside the voucher.
pub fn sign_voucher(voucher_key: &EscrowKeypair, cycle_start: u64) -> (EscrowSignature, VoucherNonce) {
    let nonce = VoucherNonce::random();
    let signature = voucher_key.sign(&voucher_message(cycle_start, &nonce));
    (signature, nonce)
}

/// Verify a voucher redemption signature over `(cycle_start, nonce)`.
pub fn verify_voucher(
    voucher_key: &EscrowPublicKey,
    cycle_start: u64,
    nonce: &VoucherNonce,
    signature: &EscrowSignature,
) -> bool {
    voucher_key.verify(&voucher_message(cycle_start, nonce), signature)
}

/// XOR `bytes` against a keystream derived from the puzzle solution.
///
/// The keystream is the BLAKE3 XOF of the solution, so a 32-byte solution
/// masks a signature of any length. One solution, one signature — the
/// one-time-pad property holds because issuance never reuses a puzzle.
fn xor_with_solution(solution: &PuzzleSolution, bytes: &[u8]) -> Vec<u8> {
    let mut keystream = vec![0u8; bytes.len()];
    blake3::Hasher::new()
        .update(solution.as_bytes())
        .finalize_xof()
        .fill(&mut keystream);
    bytes
        .iter()
        .zip(keystream.iter())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Mask a voucher signature behind a puzzle solution.
pub fn mask_signature(solution: &PuzzleSolution, signature: &EscrowSignature) -> MaskedSignature {
    MaskedSignature {
        bytes: xor_with_solution(solution, signature.as_bytes()),
    }
}

/// Recover a signature from its mask given the puzzle solution.
pub fn unmask_signature(solution: &PuzzleSolution, masked: &MaskedSignature) -> EscrowSignature {
    let bytes = xor_with_solution(solution, masked.as_bytes());
    let mut arr = [0u8; 64];
    let len = bytes.len().min(64);
    arr[..len].copy_from_slice(&bytes[..len]);
    EscrowSignature::from_bytes(arr)
}
