//! # Protocol Configuration & Constants
//!
//! Every magic number in the tumbler lives here. The cycle durations and
//! amounts below are *defaults* — operators override them through
//! [`TumblerParameters`](crate::session::TumblerParameters) — but the wallet
//! cache tunables and wire sizes are fixed for a given deployment and
//! changing them mid-flight will desynchronize clients.

/// Protocol version string advertised to clients during channel setup.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Default mixed denomination, in satoshis. Every participant moves exactly
/// this amount through a cycle; uniformity is what makes the anonymity set.
pub const DEFAULT_DENOMINATION_SATS: u64 = 1_000_000;

/// Default escrow fee, in satoshis, charged on top of the denomination for
/// the depositor-funded escrow.
pub const DEFAULT_ESCROW_FEE_SATS: u64 = 10_000;

/// Length in bytes of the random nonce bound into every voucher signature.
/// 20 bytes matches the width of a RIPEMD160 commitment and is more than
/// enough to make nonce collisions a non-event.
pub const VOUCHER_NONCE_LENGTH: usize = 20;

/// Page size for the wallet-listing walk against the node.
///
/// The node returns wallet transactions newest-first in pages of this many
/// rows; a page shorter than this terminates the walk.
pub const LIST_TRANSACTIONS_PAGE_SIZE: usize = 100;

/// Confirmation depth at which the wallet-listing walk stops paging.
///
/// Once a listed transaction is buried this deep, everything older is
/// assumed immutable and already cached; re-reading it every block is pure
/// waste. The value is an assumed upper bound on reorg depth, kept as a
/// named constant rather than folded into any stricter semantics.
pub const MAX_TRACKED_CONFIRMATIONS: u64 = 1400;

/// Repository table holding raw transactions fetched from the node.
pub const CACHED_TRANSACTIONS_TABLE: &str = "cached_transactions";
