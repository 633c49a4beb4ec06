//! Common timeline shared by the two synchronized players.
//!
//! The timeline is a derived snapshot: it is rebuilt wholesale from both
//! players' timing whenever one of them changes, never patched in place.

use std::collections::HashMap;

use tracing::debug;

use crate::core::time::{self, Time};
use crate::player::PlayerId;
use crate::timeline::mapping::{PlayerTiming, TimeMapping};

/// Bidirectional mapping between each player's local time and common time.
///
/// Lower bound of the common range is always 0, upper bound is `last_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonTimeline {
    mappings: HashMap<PlayerId, TimeMapping>,
    reference: PlayerId,
    last_time: Time,  // Common end in nanoseconds
    frame_time: Time, // Common frame step in nanoseconds
}

impl CommonTimeline {
    /// Build the timeline from two players' timing.
    ///
    /// `a` is the reference player: with `sync_by_motion`, the span of `b` is
    /// scaled to the span of `a`. The player whose scaled sync point comes
    /// first is shifted so both sync points land on the same common instant.
    pub fn build(a: &PlayerTiming, b: &PlayerTiming, sync_by_motion: bool) -> Self {
        let scale_b = if sync_by_motion {
            motion_scale(a, b)
        } else {
            1.0
        };

        let mut mapping_a = TimeMapping::new(a, 1.0);
        let mut mapping_b = TimeMapping::new(b, scale_b);

        let origin_a = mapping_a.scaled_origin();
        let origin_b = mapping_b.scaled_origin();
        if origin_a < origin_b {
            mapping_a.offset = origin_b - origin_a;
        } else {
            mapping_b.offset = origin_a - origin_b;
        }

        let frame_time = mapping_a.frame_time().min(mapping_b.frame_time()).max(1);
        let last_time = mapping_a.common_end().max(mapping_b.common_end()).max(0);

        debug!(
            offset_a = mapping_a.offset,
            offset_b = mapping_b.offset,
            scale_b,
            last_time,
            frame_time,
            "Built common timeline"
        );

        let mut mappings = HashMap::with_capacity(2);
        mappings.insert(a.id, mapping_a);
        mappings.insert(b.id, mapping_b);

        Self {
            mappings,
            reference: a.id,
            last_time,
            frame_time,
        }
    }

    /// Upper bound of the common range.
    pub fn last_time(&self) -> Time {
        self.last_time
    }

    /// Common step that never skips a frame in either player.
    pub fn frame_time(&self) -> Time {
        self.frame_time
    }

    pub fn mapping(&self, player: PlayerId) -> Option<&TimeMapping> {
        self.mappings.get(&player)
    }

    /// Convert a player's local time to common time.
    /// Returns None if the player is not part of this timeline.
    pub fn to_common(&self, player: PlayerId, local: Time) -> Option<Time> {
        self.mapping(player).map(|m| m.to_common(local))
    }

    /// Convert a common time to a player's local time (unclamped).
    /// Returns None if the player is not part of this timeline.
    pub fn to_local(&self, player: PlayerId, common: Time) -> Option<Time> {
        self.mapping(player).map(|m| m.to_local(common))
    }

    /// Local time a player should seek to for a common time, clamped to its
    /// stream so a player is never asked to seek before zero.
    pub fn seek_target(&self, player: PlayerId, common: Time) -> Option<Time> {
        self.mapping(player).map(|m| m.seek_target(common))
    }

    /// Unknown players are always out of bounds.
    pub fn is_out_of_bounds(&self, player: PlayerId, common: Time) -> bool {
        self.mapping(player)
            .map_or(true, |m| m.is_out_of_bounds(common))
    }

    /// Largest per-player frame time. A divergence above this means the
    /// players are more than one frame apart.
    pub fn max_player_frame_time(&self) -> Time {
        self.mappings
            .values()
            .map(TimeMapping::frame_time)
            .max()
            .unwrap_or(0)
    }

    /// Common time where both sync points coincide.
    pub fn sync_common_time(&self) -> Time {
        self.mapping(self.reference)
            .map_or(0, |m| m.to_common(m.sync_time))
    }

    /// Clamp a common time into `[0, last_time]`.
    pub fn clamp(&self, common: Time) -> Time {
        time::clamp(common, 0, self.last_time)
    }
}

/// Ratio of the two motion spans, falling back to 1.0 when either span is empty.
fn motion_scale(reference: &PlayerTiming, other: &PlayerTiming) -> f64 {
    let reference_span = reference.motion_span();
    let other_span = other.motion_span();
    if reference_span <= 0 || other_span <= 0 {
        return 1.0;
    }
    other_span as f64 / reference_span as f64
}
