//! Auto-start for paired recordings.
//!
//! Two recordings created within a few seconds of each other are treated as
//! two angles of the same capture and started together.

use chrono::{DateTime, Utc};

use crate::core::time::Time;

/// Result of the creation-time proximity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStart {
    Start,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    AlreadyPlaying,
    MissingCreationTime,
    TooFarApart { distance: Time },
}

/// Check whether two recordings should be started automatically.
pub fn check(
    left: Option<DateTime<Utc>>,
    right: Option<DateTime<Utc>>,
    window: Time,
) -> AutoStart {
    let (Some(left), Some(right)) = (left, right) else {
        return AutoStart::Skip(SkipReason::MissingCreationTime);
    };

    let distance = (left - right)
        .num_nanoseconds()
        .map_or(Time::MAX, |d| d.saturating_abs());

    if distance < window {
        AutoStart::Start
    } else {
        AutoStart::Skip(SkipReason::TooFarApart { distance })
    }
}
