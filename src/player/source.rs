//! Contract a playing video must satisfy to be synchronized.
//!
//! Decoding and rendering happen behind this trait. Commands are
//! fire-and-forget: a player performs its own decode work and reports back
//! through notifications.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::time::Time;
use crate::player::frame::VideoFrame;
use crate::player::notify::{NotificationSender, Subscription};

/// Stable identifier of a player, independent of its left/right position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// A video player that can be driven by the synchronization controller.
pub trait PlayerSource {
    fn id(&self) -> PlayerId;

    /// Current local position in nanoseconds.
    fn current_time(&self) -> Time;

    /// Local end of stream in nanoseconds.
    fn last_time(&self) -> Time;

    /// Nominal local frame interval in nanoseconds.
    fn frame_interval(&self) -> Time;

    /// Local instant chosen as this player's sync point.
    fn time_origin(&self) -> Time;

    fn is_playing(&self) -> bool;

    /// Whether content is fully loaded.
    fn is_loaded(&self) -> bool;

    /// Playback speed factor (1.0 is real time).
    fn speed(&self) -> f64;

    /// Creation time of the recording, when known.
    fn creation_time(&self) -> Option<DateTime<Utc>>;

    /// Currently rendered image, used by snapshot and export.
    fn current_image(&mut self) -> Option<VideoFrame>;

    fn seek_to(&mut self, local_time: Time, allow_ui_refresh: bool);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_speed(&mut self, speed: f64);

    /// Render the other player's image merged over this one.
    fn set_merge(&mut self, merge: bool);

    /// Image of the other player to merge, while merging is on.
    fn set_merge_image(&mut self, image: Arc<VideoFrame>, allow_ui_refresh: bool);

    /// Advisory marker that this player is under external coordination.
    fn set_synched(&mut self, synched: bool);

    fn subscribe(&mut self, sender: NotificationSender) -> Subscription;

    fn unsubscribe(&mut self, subscription: Subscription);
}
