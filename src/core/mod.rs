//! Core types shared by the timeline and the controller.
//!
//! All time values are in nanoseconds (i64).

pub mod settings;
pub mod time;

pub use settings::{SettingsError, SyncSettings};
pub use time::{Time, ZERO};
