//! Offline export of two synchronized players.
//! Steps through the common timeline, not through either player's own frames.

use crossbeam::channel;
use tracing::{debug, info};

use crate::core::time::Time;
use crate::export::pipeline::{
    CancelFlag, ExportError, ExportOutcome, ExportProgress, ExportSettings,
};
use crate::export::sink::FrameSink;
use crate::player::{PlayerSource, VideoFrame};
use crate::timeline::CommonTimeline;

/// Exporter for a pair of synchronized players
///
/// Each step of the export:
/// 1. Moves the common time forward by the timeline's frame time
/// 2. Seeks both players to their local time for it, without UI refresh
/// 3. Pulls the current image of each player
/// 4. Writes the pair to the sink (left image only when merging)
///
/// Frame pacing: the common frame time is the smallest per-player frame
/// time, so no frame of either player is skipped. The last step is clamped
/// to the end of the timeline.
///
/// Cancellation is polled before every step. A cancelled or failed export
/// aborts the sink; only a completed one finishes it.
pub struct DualExporter<'a> {
    timeline: &'a CommonTimeline,
    merging: bool,
}

impl<'a> DualExporter<'a> {
    pub fn new(timeline: &'a CommonTimeline, merging: bool) -> Self {
        Self { timeline, merging }
    }

    /// Export the whole common timeline
    pub fn run<P: PlayerSource, S: FrameSink>(
        &self,
        left: &mut P,
        right: &mut P,
        sink: &mut S,
        cancel: &CancelFlag,
        progress: Option<&channel::Sender<ExportProgress>>,
    ) -> Result<ExportOutcome, ExportError> {
        let settings = ExportSettings::for_players(left, right, self.merging);
        let last_time = self.timeline.last_time();
        let step = self.timeline.frame_time();

        info!(
            frame_interval = settings.frame_interval,
            last_time,
            step,
            merging = settings.merging,
            "Starting dual export"
        );
        sink.begin(settings.frame_interval).map_err(sink_error)?;

        let mut frames = 0;
        let mut current: Time = 0;
        loop {
            if cancel.is_cancelled() {
                sink.abort();
                info!(frames, "Dual export cancelled");
                return Ok(ExportOutcome::Cancelled { frames });
            }

            if let Err(e) = self.write_step(left, right, sink, current) {
                sink.abort();
                return Err(e);
            }
            frames += 1;

            if let Some(tx) = progress {
                tx.send(ExportProgress {
                    frames,
                    percent: percent(current, last_time),
                })
                .ok();
            }

            if current >= last_time {
                break;
            }
            current = (current + step).min(last_time);
        }

        sink.finish().map_err(sink_error)?;
        info!(frames, "Dual export complete");
        Ok(ExportOutcome::Completed { frames })
    }

    fn write_step<P: PlayerSource, S: FrameSink>(
        &self,
        left: &mut P,
        right: &mut P,
        sink: &mut S,
        common: Time,
    ) -> Result<(), ExportError> {
        self.seek(left, common);
        self.seek(right, common);

        let left_image = current_image(left)?;
        if self.merging {
            sink.write(&left_image, None).map_err(sink_error)
        } else {
            let right_image = current_image(right)?;
            sink.write(&left_image, Some(&right_image)).map_err(sink_error)
        }
    }

    fn seek<P: PlayerSource>(&self, player: &mut P, common: Time) {
        let Some(target) = self.timeline.seek_target(player.id(), common) else {
            return;
        };
        if player.current_time() != target {
            player.seek_to(target, false);
        }
    }
}

/// Current image of both players, left first.
pub fn snapshot<P: PlayerSource>(
    left: &mut P,
    right: &mut P,
) -> Result<(VideoFrame, VideoFrame), ExportError> {
    let left_image = current_image(left)?;
    let right_image = current_image(right)?;
    debug!(
        left = %left.id(),
        right = %right.id(),
        "Captured image pair"
    );
    Ok((left_image, right_image))
}

fn current_image<P: PlayerSource>(player: &mut P) -> Result<VideoFrame, ExportError> {
    let id = player.id();
    player.current_image().ok_or(ExportError::MissingImage(id))
}

fn sink_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> ExportError {
    ExportError::Sink(Box::new(error))
}

fn percent(current: Time, last_time: Time) -> u8 {
    if last_time <= 0 {
        return 100;
    }
    (i128::from(current) * 100 / i128::from(last_time)).clamp(0, 100) as u8
}
