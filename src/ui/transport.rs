//! Transport-control protocol: commands coming from the dual position bar and
//! the updates it displays.

use crate::core::time::Time;

/// User intent sent by the transport widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    TogglePlay,
    GotoFirst,
    GotoLast,
    StepForward,
    StepBackward,
    GotoSyncPoint,
    /// Use both players' current positions as the new sync point.
    SetSyncPoint,
    Swap,
    ToggleMerge,
    /// Cursor dragged to a common time (nanoseconds).
    SeekTo(Time),
}

/// Display update published by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportUpdate {
    /// Scrub range is `0..=last_time`.
    Bounds { last_time: Time },
    FrameStep(Time),
    Cursor(Time),
    /// Each player's own position on the common timeline.
    Markers { left: Time, right: Time },
    SyncMarker(Time),
    Playing(bool),
    Merging(bool),
}

/// What the widget shows, folded from the stream of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportState {
    pub last_time: Time,
    pub frame_step: Time,
    pub cursor: Time,
    pub left_marker: Time,
    pub right_marker: Time,
    pub sync_marker: Time,
    pub playing: bool,
    pub merging: bool,
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update
    pub fn apply(&mut self, update: TransportUpdate) {
        match update {
            TransportUpdate::Bounds { last_time } => self.last_time = last_time,
            TransportUpdate::FrameStep(step) => self.frame_step = step,
            TransportUpdate::Cursor(cursor) => self.cursor = cursor,
            TransportUpdate::Markers { left, right } => {
                self.left_marker = left;
                self.right_marker = right;
            }
            TransportUpdate::SyncMarker(sync) => self.sync_marker = sync,
            TransportUpdate::Playing(playing) => self.playing = playing,
            TransportUpdate::Merging(merging) => self.merging = merging,
        }
    }

    /// Apply every update in order
    pub fn apply_all<I: IntoIterator<Item = TransportUpdate>>(&mut self, updates: I) {
        for update in updates {
            self.apply(update);
        }
    }
}
