//! Error taxonomy for the tumbler core.
//!
//! Five kinds, by *who* must react rather than by module of origin:
//!
//! - [`InvalidArgument`](ProtocolError::InvalidArgument) and
//!   [`InvalidSchedule`](ProtocolError::InvalidSchedule) are caller or
//!   configuration bugs. Never retried.
//! - [`InvalidEscrow`](ProtocolError::InvalidEscrow) is an expected-reachable
//!   outcome: the counterparty funded the wrong script or amount.
//! - [`InvalidVoucher`](ProtocolError::InvalidVoucher) is a security-relevant
//!   rejection and is logged distinctly at the call site.
//! - [`ProtocolState`](ProtocolError::ProtocolState) means an operation was
//!   invoked out of sequence; the state machine guarantees nothing mutated.
//!
//! Nothing in this crate retries on its own. The one place an error is
//! absorbed instead of surfaced is the wallet cache, whose contract is
//! "authoritative if present, otherwise unknown" — node failures there
//! degrade to cache misses.

use thiserror::Error;

/// Errors surfaced by the cycle scheduler and the negotiation state machines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required input was absent or structurally malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Height/cycle arithmetic inconsistency: the height precedes the first
    /// cycle, or a claimed cycle start is not on the schedule.
    #[error("invalid schedule: {reason} (height {height})")]
    InvalidSchedule {
        /// What about the height was inconsistent.
        reason: &'static str,
        /// The offending height or start.
        height: u64,
    },

    /// On-chain data does not match the expected script, value, or key set.
    /// May legitimately occur when the counterparty funded incorrectly.
    #[error("invalid escrow: {0}")]
    InvalidEscrow(&'static str),

    /// Voucher redemption signature failed verification.
    #[error("invalid voucher: redemption signature verification failed")]
    InvalidVoucher,

    /// Operation invoked while the session was not in the required state.
    /// No mutation has occurred.
    #[error("protocol state error: expected {expected}, actual {actual}")]
    ProtocolState {
        /// The state the operation requires.
        expected: &'static str,
        /// The state the session was actually in.
        actual: &'static str,
    },
}
