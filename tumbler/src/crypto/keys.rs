//! # Escrow Key Management
//!
//! Ed25519 keypairs for escrow scripts and voucher authentication.
//!
//! Every escrow output is locked to two of these keys (participant and
//! tumbler) plus a redeem key for the timeout path, and the voucher that
//! carries value between cycles is authenticated by one of them. Key bytes
//! are never logged; `Debug` prints the public half only.
//!
//! ## Serialization
//!
//! `EscrowKeypair` intentionally does NOT implement `Serialize`. Persisting
//! a private key must be a deliberate act: session snapshots that need to
//! survive a restart hold a [`SessionSecret`], a 32-byte holder that
//! serializes, scrubs itself on drop, and converts back to a keypair on
//! restore.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors during key operations. Deliberately vague about *why* — error
/// messages are not an oracle for probing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ed25519 keypair used for escrow scripts and voucher signing.
///
/// The signing key is the secret that stands between an attacker and the
/// escrowed funds. It is zeroized on drop by ed25519-dalek; copies made for
/// session handoff are the caller's to guard.
pub struct EscrowKeypair {
    signing_key: SigningKey,
}

/// The shareable half of an [`EscrowKeypair`]. Appears inside escrow
/// scripts and tumbler parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSignature {
    bytes: Vec<u8>,
}

impl EscrowKeypair {
    /// Generate a fresh keypair from the OS RNG.
    ///
    /// Sessions must never share keys: escrow scripts built from reused keys
    /// are correlatable across cycles, which is exactly the linkage the
    /// protocol exists to prevent.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from its 32-byte secret. In Ed25519 the secret
    /// key *is* the seed; the public half is re-derived.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> EscrowPublicKey {
        EscrowPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Export the raw 32-byte secret. Handle with care; see [`SessionSecret`]
    /// for the persistence path.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message. Ed25519 is deterministic: same key and message,
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> EscrowSignature {
        EscrowSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &EscrowSignature) -> bool {
        self.public_key().verify(message, signature)
    }
}

impl Clone for EscrowKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl PartialEq for EscrowKeypair {
    /// Identity comparison: public keys only. Comparing secret material in
    /// non-constant time is a habit we refuse to form.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for EscrowKeypair {}

impl fmt::Debug for EscrowKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secret material never reaches Debug output, not even truncated.
        write!(f, "EscrowKeypair(pub={})", self.public_key().to_hex())
    }
}

impl EscrowPublicKey {
    /// Wrap raw public key bytes without point validation. Use
    /// [`try_from_slice`](Self::try_from_slice) for untrusted input.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse and validate an Ed25519 public key from untrusted bytes.
    /// Rejects wrong lengths and bytes that are not a valid curve point.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a signature. Returns a plain boolean: callers want yes/no,
    /// and distinguishing "bad signature" from "bad key" helps nobody but
    /// an attacker.
    pub fn verify(&self, message: &[u8], signature: &EscrowSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    /// Hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for EscrowPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EscrowPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EscrowPublicKey({})", &self.to_hex()[..16])
    }
}

impl EscrowSignature {
    /// Wrap a 64-byte signature.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for EscrowSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EscrowSignature({})", hex::encode(&self.bytes[..8.min(self.bytes.len())]))
    }
}

// ---------------------------------------------------------------------------
// SessionSecret
// ---------------------------------------------------------------------------

/// Secret key material held inside a persistable session snapshot.
///
/// Negotiation state must survive a server restart, so the escrow and
/// redeem secrets have to be serializable while a session is live. This
/// type is the single sanctioned container for that: it serializes, it
/// compares by derived public key, and it overwrites its bytes when
/// dropped or [`scrub`](Self::scrub)bed.
///
/// The clear is best-effort — the runtime and allocator may retain copies —
/// but it bounds the obvious lifetime of the secret to the session phase
/// that needs it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionSecret {
    bytes: [u8; 32],
}

impl SessionSecret {
    /// Capture a keypair's secret for inclusion in a snapshot.
    pub fn from_keypair(keypair: &EscrowKeypair) -> Self {
        Self {
            bytes: keypair.secret_bytes(),
        }
    }

    /// Rebuild the keypair this secret belongs to.
    pub fn keypair(&self) -> EscrowKeypair {
        EscrowKeypair::from_secret_bytes(&self.bytes)
    }

    /// The public key derived from this secret.
    pub fn public_key(&self) -> EscrowPublicKey {
        self.keypair().public_key()
    }

    /// Overwrite the secret bytes in place.
    pub fn scrub(&mut self) {
        // A plain write suffices here; this is lifetime hygiene, not a
        // side-channel defense.
        self.bytes = [0u8; 32];
    }
}

impl Drop for SessionSecret {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl PartialEq for SessionSecret {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for SessionSecret {}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionSecret(pub={:?})", self.public_key())
    }
}
