//! Per-player mapping between local time and common time.

use crate::core::time::{self, Time};
use crate::player::{PlayerId, PlayerSource};

/// Timing parameters read from one player, used as input to a timeline build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTiming {
    pub id: PlayerId,
    pub sync_time: Time,      // Local alignment point (nanoseconds)
    pub last_time: Time,      // Local end of stream (nanoseconds)
    pub frame_interval: Time, // Local frame interval (nanoseconds)
}

impl PlayerTiming {
    pub fn new(id: PlayerId, sync_time: Time, last_time: Time, frame_interval: Time) -> Self {
        Self {
            id,
            sync_time,
            last_time,
            frame_interval,
        }
    }

    /// Timing of a player aligned on its own time origin.
    pub fn from_origin<P: PlayerSource + ?Sized>(player: &P) -> Self {
        Self::with_sync_time(player, player.time_origin())
    }

    /// Timing of a player aligned on its current position.
    pub fn from_position<P: PlayerSource + ?Sized>(player: &P) -> Self {
        Self::with_sync_time(player, player.current_time())
    }

    pub fn with_sync_time<P: PlayerSource + ?Sized>(player: &P, sync_time: Time) -> Self {
        Self::new(
            player.id(),
            sync_time,
            player.last_time(),
            player.frame_interval(),
        )
    }

    /// Duration of the motion, from the sync point to the end of the stream.
    pub fn motion_span(&self) -> Time {
        self.last_time - self.sync_time
    }
}

/// Conversion parameters for one player.
///
/// `to_common(local) = offset + local / scale` and `to_local` is its exact
/// inverse. Local times may map outside `[0, last_time]`, see
/// [`TimeMapping::is_out_of_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeMapping {
    pub sync_time: Time,
    pub last_time: Time,
    pub frame_interval: Time,
    pub scale: f64,
    pub offset: Time,
}

impl TimeMapping {
    pub(crate) fn new(timing: &PlayerTiming, scale: f64) -> Self {
        Self {
            sync_time: timing.sync_time,
            last_time: timing.last_time,
            frame_interval: timing.frame_interval,
            scale,
            offset: 0,
        }
    }

    /// Convert a local time of this player to common time.
    pub fn to_common(&self, local: Time) -> Time {
        self.offset + time::unscale(local, self.scale)
    }

    /// Convert a common time to the local time of this player. The result may
    /// be negative or past the end of the stream.
    pub fn to_local(&self, common: Time) -> Time {
        time::rescale(common - self.offset, self.scale)
    }

    /// Whether the common time falls outside this player's stream.
    pub fn is_out_of_bounds(&self, common: Time) -> bool {
        let local = self.to_local(common);
        local < 0 || local > self.last_time
    }

    /// Local time to seek to for a common time, clamped to the stream.
    pub fn seek_target(&self, common: Time) -> Time {
        time::clamp(self.to_local(common), 0, self.last_time)
    }

    /// Sync point mapped through the scale, before any offset.
    pub(crate) fn scaled_origin(&self) -> Time {
        time::unscale(self.sync_time, self.scale)
    }

    /// Frame interval expressed in common time.
    pub fn frame_time(&self) -> Time {
        time::unscale(self.frame_interval, self.scale)
    }

    /// End of stream expressed in common time.
    pub fn common_end(&self) -> Time {
        self.to_common(self.last_time)
    }
}
