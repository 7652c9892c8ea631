//! # Wallet Tracking
//!
//! The server watches the node's wallet for escrow funding transactions.
//! Polling the node on every lookup would hammer the RPC interface, so
//! [`WalletCache`] mirrors the recent wallet listing in memory, refreshing
//! at most once per chain tip, and falls back through storage and the node
//! only on cache misses.
//!
//! [`ChainNodeClient`] is the seam to the actual node; tests plug in a
//! mock, production plugs in an RPC client.

pub mod cache;
pub mod node_client;

pub use cache::WalletCache;
pub use node_client::{ChainNodeClient, NodeError, WalletEntry};
