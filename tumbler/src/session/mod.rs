//! # Negotiation Sessions
//!
//! The tumbler runs one short-lived session per client per cycle. Each
//! session is a small state machine: it receives one message, mutates once,
//! and either advances or rejects without changing anything.
//!
//! Two session kinds exist, named for the role of the client on the other
//! end:
//!
//! - [`AliceNegotiation`] faces a *depositor*. The client funds an escrow
//!   toward the tumbler and walks away with a blinded voucher it can spend
//!   in a later cycle.
//! - [`BobNegotiation`] faces a *withdrawer*. The client redeems a voucher
//!   and the tumbler funds an escrow toward the client.
//!
//! Completed sessions hand a [`ValueTransferConfig`] to the payment layer
//! and scrub their secrets. Every session snapshots to a serializable
//! state type so the server can restart mid-negotiation.

pub mod alice;
pub mod bob;
pub mod escrow;
pub mod voucher;

pub use alice::{AliceNegotiation, AliceSessionState, AliceStatus};
pub use bob::{BobNegotiation, BobSessionState, BobStatus};
pub use escrow::{find_escrow_output, validate_and_bind_escrow, BoundEscrow};
pub use voucher::{issue_unsigned_voucher, ClientEscrowInfo, OpenChannelRequest, UnsignedVoucherInfo};

use serde::{Deserialize, Serialize};

use crate::chain::{Amount, EscrowedCoin};
use crate::crypto::{EscrowKeypair, EscrowPublicKey};
use crate::cycle::OverlappedCycleGenerator;
use crate::ProtocolError;

/// The public parameters a tumbler instance advertises. Every client of an
/// instance negotiates against the same copy; a parameter mismatch means
/// the two sides compute different scripts and the session dies at escrow
/// confirmation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TumblerParameters {
    /// The fixed amount every escrow carries.
    pub denomination: Amount,
    /// The tumbler's service fee, paid on top of the denomination by
    /// depositors.
    pub fee: Amount,
    /// The cycle schedule.
    pub cycle_generator: OverlappedCycleGenerator,
    /// Long-lived identity key; clients check escrow keys against it.
    pub tumbler_key: EscrowPublicKey,
    /// The key vouchers are signed under.
    pub voucher_key: EscrowPublicKey,
}

impl TumblerParameters {
    /// Sanity-check the parameters: the denomination must be positive and
    /// the depositor total must not overflow.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.denomination == Amount::ZERO {
            return Err(ProtocolError::InvalidArgument(
                "denomination must be positive",
            ));
        }
        self.deposit_total()?;
        Ok(())
    }

    /// What a depositor pays into escrow: denomination plus fee.
    pub fn deposit_total(&self) -> Result<Amount, ProtocolError> {
        self.denomination
            .checked_add(self.fee)
            .ok_or(ProtocolError::InvalidArgument(
                "denomination plus fee overflows",
            ))
    }
}

/// Everything the downstream payment session needs to operate on one
/// escrowed coin. Produced exactly once, by a completed negotiation.
///
/// Not serializable as a whole: it carries live keypairs, and persisting
/// those is the session snapshot's job, not the handoff's.
#[derive(Debug)]
pub struct ValueTransferConfig {
    /// The confirmed escrow output, wrapped with its redeem script.
    pub escrowed_coin: EscrowedCoin,
    /// The tumbler's half of the cooperative escrow.
    pub escrow_key: EscrowKeypair,
    /// The timeout key, present only when the tumbler funded the escrow
    /// (withdrawer sessions). Depositor-funded escrows time out to the
    /// client, so there is nothing for the tumbler to hold.
    pub redeem_key: Option<EscrowKeypair>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleParameters;

    fn parameters() -> TumblerParameters {
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
        TumblerParameters {
            denomination: Amount(1_000_000),
            fee: Amount(10_000),
            cycle_generator: OverlappedCycleGenerator::new(first_cycle, 10).unwrap(),
            tumbler_key: EscrowKeypair::generate().public_key(),
            voucher_key: EscrowKeypair::generate().public_key(),
        }
    }

    #[test]
    fn parameters_advertise_as_json() {
        // Parameters travel to clients as JSON; the round trip must be exact
        // or the two sides compute different scripts.
        let params = parameters();
        let json = serde_json::to_string(&params).unwrap();
        let back: TumblerParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn zero_denomination_rejected() {
        let mut params = parameters();
        params.denomination = Amount::ZERO;
        assert!(params.validate().is_err());
    }

    #[test]
    fn overflowing_deposit_total_rejected() {
        let mut params = parameters();
        params.denomination = Amount(u64::MAX);
        params.fee = Amount(1);
        assert!(params.deposit_total().is_err());
    }

    #[test]
    fn deposit_total_includes_fee() {
        assert_eq!(parameters().deposit_total().unwrap(), Amount(1_010_000));
    }
}
