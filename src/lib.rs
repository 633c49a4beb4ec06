//! Time synchronization of two video players.
//!
//! Two players showing related recordings are mapped onto one common
//! timeline so they can be played, stepped, scrubbed and exported together.
//! All time values are in nanoseconds (i64).

pub mod core;
pub mod export;
pub mod playback;
pub mod player;
pub mod timeline;
pub mod ui;

pub use crate::core::{SettingsError, SyncSettings, Time};
pub use crate::export::{CancelFlag, DualExporter, ExportError, ExportOutcome, FrameSink};
pub use crate::playback::{Side, SyncController, SyncState};
pub use crate::player::{PlayerEvent, PlayerId, PlayerSource, VideoFrame};
pub use crate::timeline::CommonTimeline;
pub use crate::ui::{TransportCommand, TransportUpdate};
