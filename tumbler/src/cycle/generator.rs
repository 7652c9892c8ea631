//! Stamping the cycle shape out along the chain.

use serde::{Deserialize, Serialize};

use super::params::CycleParameters;
use crate::ProtocolError;

/// Generates the overlapping train of cycles from a first cycle and an
/// overlap.
///
/// Consecutive cycle starts are `registration_duration - registration_overlap`
/// blocks apart. With a positive overlap, the next cycle's registration
/// opens before the current one's closes, so every height from the first
/// cycle onward has exactly one cycle accepting registrations — the most
/// recently started one.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OverlappedCycleGenerator {
    first_cycle: CycleParameters,
    registration_overlap: u64,
}

impl OverlappedCycleGenerator {
    /// Build a generator.
    ///
    /// The first cycle must validate, and the overlap must be strictly
    /// smaller than the registration phase — an overlap that swallows the
    /// whole phase would give cycles a non-positive spacing.
    pub fn new(
        first_cycle: CycleParameters,
        registration_overlap: u64,
    ) -> Result<Self, ProtocolError> {
        first_cycle.validate()?;
        if registration_overlap >= first_cycle.registration_duration {
            return Err(ProtocolError::InvalidArgument(
                "registration_overlap must be smaller than registration_duration",
            ));
        }
        Ok(Self {
            first_cycle,
            registration_overlap,
        })
    }

    /// The anchor cycle everything else is offset from.
    pub fn first_cycle(&self) -> &CycleParameters {
        &self.first_cycle
    }

    /// Blocks between consecutive cycle starts.
    pub fn cycle_spacing(&self) -> u64 {
        self.first_cycle.registration_duration - self.registration_overlap
    }

    /// The cycle currently accepting registrations at `height`: the most
    /// recently started one. Fails for heights before the first cycle.
    pub fn get_registering_cycle(&self, height: u64) -> Result<CycleParameters, ProtocolError> {
        if height < self.first_cycle.start {
            return Err(ProtocolError::InvalidSchedule {
                reason: "height precedes the first cycle",
                height,
            });
        }
        let index = (height - self.first_cycle.start) / self.cycle_spacing();
        Ok(self
            .first_cycle
            .with_start(self.first_cycle.start + index * self.cycle_spacing()))
    }

    /// Look up the cycle that starts at exactly `start`. Fails if `start`
    /// is not on the generator's grid.
    pub fn get_cycle(&self, start: u64) -> Result<CycleParameters, ProtocolError> {
        if start < self.first_cycle.start
            || (start - self.first_cycle.start) % self.cycle_spacing() != 0
        {
            return Err(ProtocolError::InvalidSchedule {
                reason: "start height is not a cycle boundary",
                height: start,
            });
        }
        Ok(self.first_cycle.with_start(start))
    }

    /// The cycle one spacing before `cycle`, or `None` if `cycle` is the
    /// first one.
    pub fn get_previous_cycle(&self, cycle: &CycleParameters) -> Option<CycleParameters> {
        let previous_start = cycle.start.checked_sub(self.cycle_spacing())?;
        if previous_start < self.first_cycle.start {
            return None;
        }
        Some(self.first_cycle.with_start(previous_start))
    }

    /// The cycle one spacing after `cycle`.
    pub fn get_next_cycle(&self, cycle: &CycleParameters) -> CycleParameters {
        self.first_cycle.with_start(cycle.start + self.cycle_spacing())
    }

    /// Every cycle whose span contains `height`, in start order. Empty for
    /// heights before the first cycle.
    ///
    /// Walks back from the registering cycle to the oldest cycle still
    /// covering the height, then collects forward until coverage ends.
    pub fn get_cycles(&self, height: u64) -> Vec<CycleParameters> {
        let Ok(mut cursor) = self.get_registering_cycle(height) else {
            return Vec::new();
        };
        while let Some(previous) = self.get_previous_cycle(&cursor) {
            if !previous.is_inside(height) {
                break;
            }
            cursor = previous;
        }
        let mut cycles = Vec::new();
        while cursor.is_inside(height) {
            cycles.push(cursor);
            cursor = self.get_next_cycle(&cursor);
        }
        cycles
    }
}
