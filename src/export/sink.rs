//! Destination of exported frame pairs. Compositing, encoding and file output
//! all happen behind this trait.

use crate::core::time::Time;
use crate::player::VideoFrame;

pub trait FrameSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called once before the first frame with the output frame interval.
    fn begin(&mut self, frame_interval: Time) -> Result<(), Self::Error>;

    /// Write one step of the common timeline. `right` is None while merging,
    /// since the left image already contains both.
    fn write(&mut self, left: &VideoFrame, right: Option<&VideoFrame>) -> Result<(), Self::Error>;

    /// Called after the last frame of a completed export.
    fn finish(&mut self) -> Result<(), Self::Error>;

    /// Called when the export is cancelled or fails; partial output should be
    /// discarded.
    fn abort(&mut self);
}

#[cfg(test)]
pub(crate) use recording::RecordingSink;
