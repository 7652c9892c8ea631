//! The refresh-gated wallet transaction cache.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::node_client::{ChainNodeClient, NodeError, WalletEntry};
use crate::chain::{Transaction, TxId};
use crate::config;
use crate::storage::TumblerDb;

/// Sentinel for "never refreshed" / "never fetched".
const UNSET: u64 = u64::MAX;

/// In-memory mirror of the node wallet's recent transactions.
///
/// `refresh` is called with the current tip on every request cycle, but the
/// expensive listing walk only runs when the tip actually moved — two
/// atomic gates (last refreshed tip, last observed block count) make the
/// common call a pair of loads. Transaction content is cached lazily on
/// lookup and backed by the database, so a restarted server does not
/// re-fetch everything from the node.
pub struct WalletCache {
    node: Arc<dyn ChainNodeClient>,
    db: TumblerDb,
    /// Tip height the listing last ran for; `UNSET` before the first run.
    refreshed_at: AtomicU64,
    /// Block count observed at the last refresh; `UNSET` before the first.
    block_count: AtomicU64,
    /// Listing rows by txid, bounded by the confirmation cutoff.
    entries: DashMap<TxId, WalletEntry>,
    /// Lazily fetched transaction content.
    transactions: DashMap<TxId, Transaction>,
}

impl WalletCache {
    /// Build a cache over `node`, persisting fetched transactions in `db`.
    pub fn new(node: Arc<dyn ChainNodeClient>, db: TumblerDb) -> Self {
        Self {
            node,
            db,
            refreshed_at: AtomicU64::new(UNSET),
            block_count: AtomicU64::new(UNSET),
            entries: DashMap::new(),
            transactions: DashMap::new(),
        }
    }

    /// Bring the cache up to date with the chain tip at `tip`.
    ///
    /// No-op when the tip has not moved since the last refresh, or when the
    /// node reports the same block count as before (a tip notification that
    /// raced a reorg back to the same height). A listing failure leaves the
    /// previous cache contents intact.
    pub fn refresh(&self, tip: u64) -> Result<(), NodeError> {
        if self.refreshed_at.load(Ordering::SeqCst) == tip {
            return Ok(());
        }
        let new_block_count = self.node.get_block_count()?;
        if self.block_count.swap(new_block_count, Ordering::SeqCst) == new_block_count {
            return Ok(());
        }
        self.refreshed_at.store(tip, Ordering::SeqCst);
        self.walk_listing()
    }

    /// Walk the node's wallet listing page by page, newest first.
    ///
    /// Stops at the first short page or at the first row buried deeper
    /// than the tracking cutoff. Rows that disappeared from the listing
    /// since the last walk are evicted, but only after a complete pass —
    /// an error mid-walk must not evict anything.
    fn walk_listing(&self) -> Result<(), NodeError> {
        let mut listed: HashSet<TxId> = HashSet::new();
        let mut skip = 0;
        loop {
            let page = self
                .node
                .list_transactions(config::LIST_TRANSACTIONS_PAGE_SIZE, skip)?;
            let page_len = page.len();
            skip += page_len;

            let mut reached_cutoff = false;
            for entry in page {
                if entry.confirmations >= config::MAX_TRACKED_CONFIRMATIONS {
                    reached_cutoff = true;
                    continue;
                }
                listed.insert(entry.txid);
                self.entries.insert(entry.txid, entry);
            }
            if reached_cutoff || page_len < config::LIST_TRANSACTIONS_PAGE_SIZE {
                break;
            }
        }

        self.entries.retain(|txid, _| listed.contains(txid));
        tracing::debug!(tracked = self.entries.len(), "wallet listing refreshed");
        Ok(())
    }

    /// Current chain height, fetched from the node once and then served
    /// from the last refresh.
    pub fn block_count(&self) -> Result<u64, NodeError> {
        let cached = self.block_count.load(Ordering::SeqCst);
        if cached != UNSET {
            return Ok(cached);
        }
        let fetched = self.node.get_block_count()?;
        self.block_count.store(fetched, Ordering::SeqCst);
        Ok(fetched)
    }

    /// The tracked listing rows, in no particular order.
    pub fn entries(&self) -> Vec<WalletEntry> {
        self.entries.iter().map(|e| *e.value()).collect()
    }

    /// Confirmation depth of a tracked transaction, if the listing has it.
    pub fn confirmations(&self, txid: &TxId) -> Option<u64> {
        self.entries.get(txid).map(|e| e.confirmations)
    }

    /// Resolve a transaction's content: memory, then database, then the
    /// node's wallet, then the node's raw index.
    ///
    /// Node and storage failures are absorbed into `None` — a lookup that
    /// cannot be satisfied right now is indistinguishable from an unknown
    /// transaction, and callers retry on the next tip anyway.
    pub fn get_transaction(&self, txid: &TxId) -> Option<Transaction> {
        if let Some(tx) = self.transactions.get(txid) {
            return Some(tx.clone());
        }
        match self.db.get_cached_transaction(txid) {
            Ok(Some(tx)) => {
                self.transactions.insert(*txid, tx.clone());
                return Some(tx);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(%txid, %error, "transaction cache read failed");
            }
        }
        match self.node.get_wallet_transaction(txid) {
            Ok(Some(tx)) => {
                self.remember(&tx);
                return Some(tx);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(%txid, %error, "wallet transaction lookup failed");
            }
        }
        match self.node.get_raw_transaction(txid) {
            Ok(Some(tx)) => {
                self.remember(&tx);
                Some(tx)
            }
            Ok(None) => None,
            Err(error) => {
                tracing::debug!(%txid, %error, "raw transaction lookup failed");
                None
            }
        }
    }

    /// Hand a transaction to the node's wallet and start tracking it
    /// immediately, without waiting for the next listing walk. Callers
    /// pass the confirmation depth they already know (zero for a
    /// just-broadcast transaction).
    pub fn import_transaction(&self, tx: &Transaction, confirmations: u64) -> Result<(), NodeError> {
        self.node.import_transaction(tx)?;
        self.remember(tx);
        self.entries.insert(
            tx.txid(),
            WalletEntry {
                txid: tx.txid(),
                confirmations,
            },
        );
        Ok(())
    }

    fn remember(&self, tx: &Transaction) {
        if let Err(error) = self.db.put_cached_transaction(tx) {
            tracing::warn!(txid = %tx.txid(), %error, "failed to persist cached transaction");
        }
        self.transactions.insert(tx.txid(), tx.clone());
    }
}
