// Copyright (c) 2026 Vortex Labs. MIT License.
// See LICENSE for details.

//! # VORTEX Tumbler — Server Core
//!
//! This crate is the server side of the VORTEX Bitcoin-anonymizing tumbler:
//! depositors ("Alice") and withdrawers ("Bob") fund escrow outputs during
//! time-boxed *cycles*, and value crosses cycle boundaries as a blind-signed
//! *voucher* that neither the operator nor an observer can link back to the
//! deposit that paid for it.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! tumbler server:
//!
//! - **cycle** — Height-indexed scheduling: which cycle(s) accept work now.
//! - **session** — The Alice and Bob negotiation state machines, escrow
//!   validation, and the voucher issuance/redemption protocol.
//! - **crypto** — Escrow keypairs, voucher signatures, the blind-puzzle
//!   engine boundary, and signature masking.
//! - **chain** — Transaction, output, and escrow-script value types.
//! - **wallet** — A per-block-refreshed cache over node-reported wallet
//!   transactions.
//! - **storage** — sled-backed persistence for session snapshots and the
//!   wallet transaction cache.
//! - **config** — Protocol constants and tunables.
//!
//! ## Design stance
//!
//! 1. State machines own their state and mutate it only through named
//!    transitions. An out-of-sequence call fails without side effects.
//! 2. Every session is snapshottable: the server is stateless between
//!    requests and rehydrates negotiations from the repository.
//! 3. A signed voucher never exists — not even transiently — before the
//!    on-chain escrow that pays for it has been verified.
//! 4. Secrets leave session state the moment they are no longer needed.

pub mod chain;
pub mod config;
pub mod crypto;
pub mod cycle;
pub mod session;
pub mod storage;
pub mod wallet;

mod error;

pub use error::ProtocolError;
