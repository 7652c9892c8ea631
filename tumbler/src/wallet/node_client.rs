//! The boundary to the chain node's wallet RPC.

use serde::{Deserialize, Serialize};

use crate::chain::{Transaction, TxId};

/// Errors surfaced by the node boundary.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node rpc failed: {0}")]
    Rpc(String),

    #[error("node returned a malformed response: {0}")]
    Malformed(String),
}

/// One row of the node's wallet listing: which transaction, and how deep
/// it is buried.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct WalletEntry {
    /// The wallet transaction.
    pub txid: TxId,
    /// Confirmation depth; zero for unconfirmed.
    pub confirmations: u64,
}

/// What the wallet cache needs from a chain node.
///
/// Mirrors the shape of a Bitcoin-style wallet RPC: a paged transaction
/// listing ordered newest first, plus point lookups for wallet and raw
/// transactions.
pub trait ChainNodeClient: Send + Sync {
    /// Current chain height.
    fn get_block_count(&self) -> Result<u64, NodeError>;

    /// A page of the wallet listing, newest first: up to `count` rows
    /// starting `skip` rows in.
    fn list_transactions(&self, count: usize, skip: usize) -> Result<Vec<WalletEntry>, NodeError>;

    /// Look up a transaction the wallet knows about. `Ok(None)` when the
    /// wallet has never seen it.
    fn get_wallet_transaction(&self, txid: &TxId) -> Result<Option<Transaction>, NodeError>;

    /// Look up any transaction the node can resolve, wallet or not.
    /// Requires the node to index transactions; `Ok(None)` when it cannot.
    fn get_raw_transaction(&self, txid: &TxId) -> Result<Option<Transaction>, NodeError>;

    /// Hand a transaction to the node's wallet so the listing tracks it.
    fn import_transaction(&self, tx: &Transaction) -> Result<(), NodeError>;
}
