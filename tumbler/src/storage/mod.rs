//! # Persistent Storage
//!
//! Persistence for a stateless-by-design server: session snapshots and the
//! wallet transaction cache, on sled's embedded key-value store.
//!
//! ## Tree layout
//!
//! | Tree                  | Key                      | Value                        |
//! |-----------------------|--------------------------|------------------------------|
//! | `alice_sessions`      | session id (UTF-8)       | `bincode(AliceSessionState)` |
//! | `bob_sessions`        | session id (UTF-8)       | `bincode(BobSessionState)`   |
//! | `cached_transactions` | txid (32B)               | `bincode(Transaction)`       |
//! | `metadata`            | key (UTF-8)              | value (bytes)                |
//!
//! sled is thread-safe throughout, so a `TumblerDb` clone can be handed to
//! every worker without external locking.

use sled::{Db, Tree};
use std::path::Path;

use crate::chain::{Transaction, TxId};
use crate::config;
use crate::session::{AliceSessionState, BobSessionState};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Merge applied by [`Repository::upsert`] when the key already holds a
/// value: `merge(existing, incoming) -> stored`.
pub type MergeFn<'a> = &'a dyn Fn(&[u8], &[u8]) -> Vec<u8>;

/// The raw key/value persistence contract the transport layer programs
/// against. [`TumblerDb`] implements it over sled trees; the typed session
/// and transaction accessors below are conveniences layered on the same
/// database.
pub trait Repository: Send + Sync {
    /// Read the value stored under `key` in `table`.
    fn get(&self, table: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Insert `value` under `key`, or combine it with the existing value
    /// through `merge`. The merge is applied atomically with respect to
    /// concurrent upserts on the same key.
    fn upsert(&self, table: &str, key: &[u8], value: &[u8], merge: MergeFn) -> StorageResult<()>;
}

fn encode<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Persistent storage for the tumbler server.
///
/// Wraps a sled `Db` and exposes typed accessors for session snapshots and
/// cached wallet transactions. All serialization uses bincode.
#[derive(Debug, Clone)]
pub struct TumblerDb {
    /// The underlying sled database handle.
    db: Db,
    /// Depositor session snapshots, keyed by session id.
    alice_sessions: Tree,
    /// Withdrawer session snapshots, keyed by session id.
    bob_sessions: Tree,
    /// Wallet transactions mirrored off the node, keyed by txid.
    cached_transactions: Tree,
    /// Arbitrary key-value metadata.
    metadata: Tree,
}

impl TumblerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary in-memory database, cleaned up on drop.
    /// Ideal for tests.
    pub fn open_temporary() -> StorageResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let alice_sessions = db.open_tree("alice_sessions")?;
        let bob_sessions = db.open_tree("bob_sessions")?;
        let cached_transactions = db.open_tree(config::CACHED_TRANSACTIONS_TABLE)?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            alice_sessions,
            bob_sessions,
            cached_transactions,
            metadata,
        })
    }

    // -- Session snapshots ----------------------------------------------------

    /// Persist a depositor session snapshot under `id`.
    pub fn put_alice_session(&self, id: &str, state: &AliceSessionState) -> StorageResult<()> {
        self.alice_sessions.insert(id.as_bytes(), encode(state)?)?;
        Ok(())
    }

    /// Load a depositor session snapshot.
    pub fn get_alice_session(&self, id: &str) -> StorageResult<Option<AliceSessionState>> {
        match self.alice_sessions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a withdrawer session snapshot under `id`.
    pub fn put_bob_session(&self, id: &str, state: &BobSessionState) -> StorageResult<()> {
        self.bob_sessions.insert(id.as_bytes(), encode(state)?)?;
        Ok(())
    }

    /// Load a withdrawer session snapshot.
    pub fn get_bob_session(&self, id: &str) -> StorageResult<Option<BobSessionState>> {
        match self.bob_sessions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Drop a session snapshot once the session has been handed off.
    pub fn remove_alice_session(&self, id: &str) -> StorageResult<()> {
        self.alice_sessions.remove(id.as_bytes())?;
        Ok(())
    }

    /// Drop a withdrawer session snapshot.
    pub fn remove_bob_session(&self, id: &str) -> StorageResult<()> {
        self.bob_sessions.remove(id.as_bytes())?;
        Ok(())
    }

    // -- Cached wallet transactions -------------------------------------------

    /// Persist a wallet transaction in the cache tree.
    pub fn put_cached_transaction(&self, tx: &Transaction) -> StorageResult<()> {
        self.cached_transactions
            .insert(tx.txid().0, encode(tx)?)?;
        Ok(())
    }

    /// Load a cached wallet transaction by txid.
    pub fn get_cached_transaction(&self, txid: &TxId) -> StorageResult<Option<Transaction>> {
        match self.cached_transactions.get(txid.0)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of cached wallet transactions.
    pub fn cached_transaction_count(&self) -> usize {
        self.cached_transactions.len()
    }

    // -- Utility --------------------------------------------------------------

    fn tree(&self, table: &str) -> StorageResult<Tree> {
        Ok(match table {
            "alice_sessions" => self.alice_sessions.clone(),
            "bob_sessions" => self.bob_sessions.clone(),
            config::CACHED_TRANSACTIONS_TABLE => self.cached_transactions.clone(),
            "metadata" => self.metadata.clone(),
            other => self.db.open_tree(other)?,
        })
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Repository for TumblerDb {
    fn get(&self, table: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.tree(table)?.get(key)?.map(|v| v.to_vec()))
    }

    fn upsert(&self, table: &str, key: &[u8], value: &[u8], merge: MergeFn) -> StorageResult<()> {
        self.tree(table)?.update_and_fetch(key, |existing| {
            Some(match existing {
                Some(existing) => merge(existing, value),
                None => value.to_vec(),
            })
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Amount, EscrowScript, TxOut};
    use crate::crypto::EscrowKeypair;

    fn make_test_tx(value: u64) -> Transaction {
        let script = EscrowScript::new(
            [
                EscrowKeypair::generate().public_key(),
                EscrowKeypair::generate().public_key(),
            ],
            EscrowKeypair::generate().public_key(),
            700,
        );
        Transaction {
            outputs: vec![TxOut {
                value: Amount(value),
                script_pubkey: script.script_hash(),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn open_temporary_database() {
        let db = TumblerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.cached_transaction_count(), 0);
    }

    #[test]
    fn open_persistent_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = TumblerDb::open(dir.path()).expect("should open db");
        let tx = make_test_tx(100);
        db.put_cached_transaction(&tx).unwrap();
        db.flush().unwrap();
        drop(db);

        let db2 = TumblerDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db2.get_cached_transaction(&tx.txid()).unwrap(), Some(tx));
    }

    #[test]
    fn cached_transaction_roundtrip() {
        let db = TumblerDb::open_temporary().unwrap();
        let tx = make_test_tx(42);

        assert!(db.get_cached_transaction(&tx.txid()).unwrap().is_none());
        db.put_cached_transaction(&tx).unwrap();
        assert_eq!(db.get_cached_transaction(&tx.txid()).unwrap(), Some(tx));
        assert_eq!(db.cached_transaction_count(), 1);
    }

    #[test]
    fn upsert_inserts_then_merges() {
        let db = TumblerDb::open_temporary().unwrap();
        let concat: MergeFn = &|old, new| {
            let mut merged = old.to_vec();
            merged.extend_from_slice(new);
            merged
        };

        db.upsert("metadata", b"nonces", b"aa", concat).unwrap();
        assert_eq!(db.get("metadata", b"nonces").unwrap(), Some(b"aa".to_vec()));

        db.upsert("metadata", b"nonces", b"bb", concat).unwrap();
        assert_eq!(
            db.get("metadata", b"nonces").unwrap(),
            Some(b"aabb".to_vec())
        );
        assert_eq!(db.get("metadata", b"other").unwrap(), None);
    }

    #[test]
    fn upsert_reaches_ad_hoc_tables() {
        let db = TumblerDb::open_temporary().unwrap();
        let replace: MergeFn = &|_, new| new.to_vec();
        db.upsert("voucher_nonces", b"k", b"v1", replace).unwrap();
        db.upsert("voucher_nonces", b"k", b"v2", replace).unwrap();
        assert_eq!(
            db.get("voucher_nonces", b"k").unwrap(),
            Some(b"v2".to_vec())
        );
    }

    #[test]
    fn session_snapshot_roundtrip() {
        use crate::cycle::{CycleParameters, OverlappedCycleGenerator};
        use crate::session::{AliceNegotiation, TumblerParameters};

        let first_cycle = CycleParameters {
            start: 100,
            registration_duration: 50,
            client_channel_duration: 10,
            tumbler_channel_duration: 10,
            payment_duration: 20,
            tumbler_cashout_duration: 15,
            client_cashout_duration: 15,
            safety_duration: 5,
        };
        let tumbler_key = EscrowKeypair::generate();
        let voucher_key = EscrowKeypair::generate();
        let parameters = TumblerParameters {
            denomination: Amount(1_000_000),
            fee: Amount(10_000),
            cycle_generator: OverlappedCycleGenerator::new(first_cycle, 10).unwrap(),
            tumbler_key: tumbler_key.public_key(),
            voucher_key: voucher_key.public_key(),
        };
        let alice = AliceNegotiation::new(parameters.clone(), &tumbler_key, &voucher_key).unwrap();

        let db = TumblerDb::open_temporary().unwrap();
        db.put_alice_session("session-1", &alice.snapshot()).unwrap();

        let restored_state = db.get_alice_session("session-1").unwrap().unwrap();
        let restored =
            AliceNegotiation::from_snapshot(parameters, &tumbler_key, &voucher_key, restored_state)
                .unwrap();
        assert_eq!(restored.status(), alice.status());

        db.remove_alice_session("session-1").unwrap();
        assert!(db.get_alice_session("session-1").unwrap().is_none());
    }
}
