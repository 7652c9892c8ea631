//! # Cycle Scheduling
//!
//! The tumbler runs an endless train of fixed-shape cycles measured in
//! block heights. Each cycle walks through registration, escrow
//! establishment on both sides, payment, and two cash-out phases, padded
//! by a safety margin. Consecutive cycles overlap so there is never a
//! height at which registration is closed.
//!
//! [`CycleParameters`] describes the shape of one cycle;
//! [`OverlappedCycleGenerator`] stamps that shape out along the chain and
//! answers "which cycle does height *h* belong to".

pub mod generator;
pub mod params;

pub use generator::OverlappedCycleGenerator;
pub use params::CycleParameters;
