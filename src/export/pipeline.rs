//! Plumbing shared by dual export runs: errors, outcome, progress and
//! cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::time::Time;
use crate::player::{PlayerId, PlayerSource};

/// Output parameters of a dual export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSettings {
    /// Frame interval written to the output file (nanoseconds).
    pub frame_interval: Time,
    /// Only the left image is written, it already holds both players.
    pub merging: bool,
}

impl ExportSettings {
    pub fn for_players<P: PlayerSource + ?Sized>(left: &P, right: &P, merging: bool) -> Self {
        Self {
            frame_interval: Self::file_frame_interval(
                left.frame_interval(),
                right.frame_interval(),
            ),
            merging,
        }
    }

    /// The slower of the two players paces the output file.
    pub fn file_frame_interval(left: Time, right: Time) -> Time {
        left.max(right)
    }
}

/// Error type for export operations
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Players are not synchronized")]
    NotSynched,
    #[error("No image available from {0}")]
    MissingImage(PlayerId),
    #[error("Frame sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// How an export run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed { frames: usize },
    Cancelled { frames: usize },
}

impl ExportOutcome {
    pub fn frames(&self) -> usize {
        match self {
            ExportOutcome::Completed { frames } | ExportOutcome::Cancelled { frames } => *frames,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportOutcome::Cancelled { .. })
    }
}

/// Progress report sent after each written frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub frames: usize,
    pub percent: u8,
}

/// Cancellation flag shared between the export thread and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
