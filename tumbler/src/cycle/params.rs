//! The shape of a single tumbler cycle.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Phase durations of one cycle, all in blocks, anchored at `start`.
///
/// The phases run back to back:
///
/// ```text
/// start
///   | registration | client channel | tumbler channel | payment
///   | tumbler cash-out | client cash-out | safety |
/// ```
///
/// The two lock times fall out of this layout. The tumbler's escrow must
/// stay locked until the tumbler has had its cash-out window; the client's
/// escrow stays locked one phase longer, so the tumbler can always claim
/// its side before the client can reclaim theirs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CycleParameters {
    /// Block height at which the cycle begins.
    pub start: u64,
    /// Blocks during which clients may register for this cycle.
    pub registration_duration: u64,
    /// Blocks for establishing the client-side escrow.
    pub client_channel_duration: u64,
    /// Blocks for establishing the tumbler-side escrow.
    pub tumbler_channel_duration: u64,
    /// Blocks for the puzzle-solving payment exchange.
    pub payment_duration: u64,
    /// Blocks in which the tumbler claims the client escrow.
    pub tumbler_cashout_duration: u64,
    /// Blocks in which the client claims the tumbler escrow.
    pub client_cashout_duration: u64,
    /// Trailing margin before the cycle is considered over.
    pub safety_duration: u64,
}

impl CycleParameters {
    /// Check the shape is usable: every phase must be non-zero, and the
    /// total span must not overflow past the end of the chain's height
    /// space.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let durations = [
            ("registration_duration", self.registration_duration),
            ("client_channel_duration", self.client_channel_duration),
            ("tumbler_channel_duration", self.tumbler_channel_duration),
            ("payment_duration", self.payment_duration),
            ("tumbler_cashout_duration", self.tumbler_cashout_duration),
            ("client_cashout_duration", self.client_cashout_duration),
            ("safety_duration", self.safety_duration),
        ];
        for (name, duration) in durations {
            if duration == 0 {
                return Err(ProtocolError::InvalidArgument(name));
            }
        }
        self.checked_end()
            .ok_or(ProtocolError::InvalidArgument("cycle span overflows"))?;
        Ok(())
    }

    fn checked_end(&self) -> Option<u64> {
        [
            self.registration_duration,
            self.client_channel_duration,
            self.tumbler_channel_duration,
            self.payment_duration,
            self.tumbler_cashout_duration,
            self.client_cashout_duration,
            self.safety_duration,
        ]
        .iter()
        .try_fold(self.start, |acc, d| acc.checked_add(*d))
    }

    /// Sum of all phase durations.
    pub fn total_duration(&self) -> u64 {
        self.registration_duration
            + self.client_channel_duration
            + self.tumbler_channel_duration
            + self.payment_duration
            + self.tumbler_cashout_duration
            + self.client_cashout_duration
            + self.safety_duration
    }

    /// Whether `height` falls inside this cycle's span,
    /// `start <= height < start + total_duration`.
    pub fn is_inside(&self, height: u64) -> bool {
        height >= self.start && height < self.start + self.total_duration()
    }

    /// Height at which the tumbler-side escrow's redeem path activates.
    ///
    /// Everything through the tumbler's cash-out phase must have elapsed;
    /// before that the client could race the tumbler for the funds.
    pub fn tumbler_lock_time(&self) -> u64 {
        self.start
            + self.registration_duration
            + self.client_channel_duration
            + self.tumbler_channel_duration
            + self.payment_duration
            + self.tumbler_cashout_duration
            + self.safety_duration
    }

    /// Height at which the client-side escrow's redeem path activates.
    ///
    /// One cash-out phase later than [`tumbler_lock_time`](Self::tumbler_lock_time),
    /// so the tumbler can always collect before the client can reclaim.
    pub fn client_lock_time(&self) -> u64 {
        self.tumbler_lock_time() + self.client_cashout_duration
    }

    /// The same shape re-anchored at a different start height.
    pub fn with_start(&self, start: u64) -> Self {
        Self { start, ..*self }
    }
}
