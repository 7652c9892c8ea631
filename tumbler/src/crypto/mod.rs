//! Cryptographic building blocks of the tumbler core.
//!
//! - [`keys`] — Ed25519 escrow/voucher keypairs and signatures.
//! - [`puzzle`] — the blind-puzzle engine boundary. The production RSA
//!   blinding engine lives outside this crate; here we define the contract
//!   it must satisfy plus a keyed-PRF reference engine.
//! - [`voucher`] — voucher authentication (signature over cycle start and
//!   nonce) and the one-time-pad masking that hides a signature behind a
//!   puzzle solution.
//!
//! Nothing here knows about cycles or sessions; those layers compose these
//! primitives.

pub mod keys;
pub mod puzzle;
pub mod voucher;

pub use keys::{EscrowKeypair, EscrowPublicKey, EscrowSignature, KeyError, SessionSecret};
pub use puzzle::{BlindPuzzleEngine, KeyedPuzzleEngine, Puzzle, PuzzleSolution};
pub use voucher::{
    mask_signature, sign_voucher, unmask_signature, verify_voucher, MaskedSignature, VoucherNonce,
};
