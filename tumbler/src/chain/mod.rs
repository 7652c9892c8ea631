//! On-chain value types consumed by the negotiation layer.
//!
//! Deliberately minimal: the tumbler core addresses outputs by script hash
//! and value, wraps a matched output with its redeem script to make it
//! spendable, and never needs full consensus encoding. The real
//! transaction/script wire format belongs to the node and the client
//! wallet; these types are the stable boundary the sessions reason about.

pub mod script;
pub mod types;

pub use script::{EscrowScript, ScriptHash};
pub use types::{Amount, EscrowedCoin, OutPoint, Transaction, TxId, TxOut};
