//! The 2-of-2 escrow script and its hash-locked address form.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::EscrowPublicKey;

/// Version tag prefixed to the canonical script encoding. Bumped if the
/// script layout ever changes, so old hashes cannot collide with new ones.
const SCRIPT_VERSION: u8 = 1;

/// The hash an escrow output is locked to. Outputs carry this value as
/// their `script_pubkey`; spending requires revealing the matching
/// [`EscrowScript`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptHash {
    bytes: [u8; 32],
}

impl ScriptHash {
    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.bytes))
    }
}

impl fmt::Debug for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptHash({})", &hex::encode(self.bytes)[..16])
    }
}

/// A cooperative escrow script: spendable by both escrow keys together,
/// or by the redeem key alone once `lock_time` has passed.
///
/// The key order inside `escrow_keys` is part of the script identity —
/// swapping the two keys yields a different script and a different hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowScript {
    /// The two cooperating keys, in the order the script's author fixed
    /// them.
    pub escrow_keys: [EscrowPublicKey; 2],
    /// The timeout key; its holder can reclaim the funds unilaterally
    /// after `lock_time`.
    pub redeem_key: EscrowPublicKey,
    /// Absolute block height at which the redeem path activates.
    pub lock_time: u64,
}

impl EscrowScript {
    /// Assemble a script from its components.
    pub fn new(
        escrow_keys: [EscrowPublicKey; 2],
        redeem_key: EscrowPublicKey,
        lock_time: u64,
    ) -> Self {
        Self {
            escrow_keys,
            redeem_key,
            lock_time,
        }
    }

    /// Canonical encoding: version byte followed by the bincode body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = bincode::serialize(self).expect("script encoding is infallible");
        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(SCRIPT_VERSION);
        bytes.extend_from_slice(&body);
        bytes
    }

    /// Recover a script from its canonical encoding. `None` on an unknown
    /// version tag or a malformed body — callers treat both as "not one of
    /// our scripts".
    pub fn extract(bytes: &[u8]) -> Option<Self> {
        match bytes.split_first() {
            Some((&SCRIPT_VERSION, body)) => bincode::deserialize(body).ok(),
            _ => None,
        }
    }

    /// The hash outputs are locked to: BLAKE3 of the canonical encoding.
    pub fn script_hash(&self) -> ScriptHash {
        ScriptHash {
            bytes: *blake3::hash(&self.to_bytes()).as_bytes(),
        }
    }

    /// Whether `key` is one of the two cooperative escrow keys.
    pub fn contains_escrow_key(&self, key: &EscrowPublicKey) -> bool {
        self.escrow_keys.contains(key)
    }

    /// The escrow key that is *not* `own`, i.e. the counterparty's.
    /// `None` if `own` does not appear in the script at all.
    pub fn counterparty_key(&self, own: &EscrowPublicKey) -> Option<EscrowPublicKey> {
        match (&self.escrow_keys[0] == own, &self.escrow_keys[1] == own) {
            (true, _) => Some(self.escrow_keys[1]),
            (_, true) => Some(self.escrow_keys[0]),
            _ => None,
        }
    }
}

impl fmt::Debug for EscrowScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscrowScript")
            .field("escrow_keys", &self.escrow_keys)
            .field("redeem_key", &self.redeem_key)
            .field("lock_time", &self.lock_time)
            .field("hash", &self.script_hash())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EscrowKeypair;

    fn sample_script() -> EscrowScript {
        EscrowScript::new(
            [
                EscrowKeypair::generate().public_key(),
                EscrowKeypair::generate().public_key(),
            ],
            EscrowKeypair::generate().public_key(),
            1_200,
        )
    }

    #[test]
    fn extract_roundtrip() {
        let script = sample_script();
        let recovered = EscrowScript::extract(&script.to_bytes()).unwrap();
        assert_eq!(script, recovered);
        assert_eq!(script.script_hash(), recovered.script_hash());
    }

    #[test]
    fn extract_rejects_unknown_version() {
        let mut bytes = sample_script().to_bytes();
        bytes[0] = 99;
        assert!(EscrowScript::extract(&bytes).is_none());
        assert!(EscrowScript::extract(&[]).is_none());
    }

    #[test]
    fn key_order_changes_hash() {
        let script = sample_script();
        let swapped = EscrowScript::new(
            [script.escrow_keys[1], script.escrow_keys[0]],
            script.redeem_key,
            script.lock_time,
        );
        assert_ne!(script.script_hash(), swapped.script_hash());
    }

    #[test]
    fn lock_time_changes_hash() {
        let script = sample_script();
        let later = EscrowScript::new(script.escrow_keys, script.redeem_key, script.lock_time + 1);
        assert_ne!(script.script_hash(), later.script_hash());
    }

    #[test]
    fn counterparty_lookup() {
        let script = sample_script();
        assert_eq!(
            script.counterparty_key(&script.escrow_keys[0]),
            Some(script.escrow_keys[1])
        );
        assert_eq!(
            script.counterparty_key(&script.escrow_keys[1]),
            Some(script.escrow_keys[0])
        );
        let stranger = EscrowKeypair::generate().public_key();
        assert_eq!(script.counterparty_key(&stranger), None);
    }
}
