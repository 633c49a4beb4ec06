//! Drift detection between the two players.
//!
//! Realignment is budgeted per playback episode: players advancing at their
//! nominal rate should not drift, so repeated divergence is a systemic
//! mismatch that is reported instead of corrected on every frame.

use crate::core::time::Time;

/// Outcome of comparing both players' common positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftDecision {
    /// Players are within one frame of each other.
    InSync,
    /// Seek both players to `target`, the later of the two positions.
    Realign { target: Time, divergence: Time },
    /// Budget exhausted. `first` is true only for the first occurrence in the
    /// episode.
    Uncorrected { divergence: Time, first: bool },
}

/// Remaining forced realignments for the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncBudget {
    initial: u32,
    remaining: u32,
    reported: bool,
}

impl ResyncBudget {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: initial,
            reported: false,
        }
    }

    /// Start a new episode
    pub fn reset(&mut self) {
        self.remaining = self.initial;
        self.reported = false;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Compare `this` against `other` (both in common time) and consume budget
    /// when a realignment is needed.
    pub fn evaluate(&mut self, this: Time, other: Time, threshold: Time) -> DriftDecision {
        let divergence = divergence(this, other);
        if divergence <= threshold {
            return DriftDecision::InSync;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            return DriftDecision::Realign {
                target: catch_up_target(this, other),
                divergence,
            };
        }

        let first = !self.reported;
        self.reported = true;
        DriftDecision::Uncorrected { divergence, first }
    }
}

/// Absolute distance between two common positions
#[inline]
pub fn divergence(a: Time, b: Time) -> Time {
    (a - b).abs()
}

/// Realignment never rewinds: the player behind catches up.
#[inline]
pub fn catch_up_target(a: Time, b: Time) -> Time {
    a.max(b)
}
