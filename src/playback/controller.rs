//! Dual player synchronization controller.
//!
//! Owns the two attached players, the common timeline built from them and the
//! playback state. Players report what happens to them through notifications
//! which are drained on the controller's thread; the transport widget talks to
//! it through [`TransportCommand`] and receives [`TransportUpdate`]s.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::channel;
use tracing::{debug, info, warn};

use crate::core::settings::SyncSettings;
use crate::core::time::Time;
use crate::export::{
    self, CancelFlag, DualExporter, ExportError, ExportOutcome, ExportProgress, FrameSink,
};
use crate::player::{
    NotificationSender, PlayerEvent, PlayerId, PlayerNotification, PlayerSource, Subscription,
    VideoFrame,
};
use crate::playback::autostart::{self, AutoStart, SkipReason};
use crate::playback::state::SyncState;
use crate::playback::sync::{DriftDecision, ResyncBudget};
use crate::timeline::{CommonTimeline, PlayerTiming};
use crate::ui::transport::{TransportCommand, TransportState, TransportUpdate};

/// Position of a player in the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    fn from_index(index: usize) -> Side {
        if index == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// A player together with the controller's bookkeeping for it.
struct Attached<P> {
    player: P,
    subscription: Subscription,
    /// Local time of the last frame seen while playing, cleared on seeks.
    last_frame: Option<Time>,
    /// Looped back to its start and held until the other player completes.
    waiting: bool,
}

/// Snapshot taken when a frame is delivered during dynamic synching.
struct FrameContext {
    this_playing: bool,
    looped: bool,
    this_common: Time,
    other_playing: bool,
    other_waiting: bool,
    other_common: Time,
}

/// Keeps two players aligned on a common timeline.
pub struct SyncController<P: PlayerSource> {
    settings: SyncSettings,
    state: SyncState,
    pair: Option<[Attached<P>; 2]>,
    timeline: Option<CommonTimeline>,
    current_time: Time,
    budget: ResyncBudget,
    merging: bool,
    next_subscription: u64,
    notifications_tx: channel::Sender<PlayerNotification>,
    notifications_rx: channel::Receiver<PlayerNotification>,
    transport: TransportState,
    transport_tx: Option<channel::Sender<TransportUpdate>>,
}

impl<P: PlayerSource> SyncController<P> {
    pub fn new(settings: SyncSettings) -> Self {
        let (notifications_tx, notifications_rx) = channel::unbounded();
        Self {
            budget: ResyncBudget::new(settings.resync_budget),
            settings,
            state: SyncState::Inactive,
            pair: None,
            timeline: None,
            current_time: 0,
            merging: false,
            next_subscription: 1,
            notifications_tx,
            notifications_rx,
            transport: TransportState::new(),
            transport_tx: None,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Cursor position on the common timeline.
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    pub fn timeline(&self) -> Option<&CommonTimeline> {
        self.timeline.as_ref()
    }

    pub fn resync_budget(&self) -> &ResyncBudget {
        &self.budget
    }

    pub fn is_merging(&self) -> bool {
        self.merging
    }

    /// What the transport widget currently shows.
    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn player(&self, side: Side) -> Option<&P> {
        self.pair.as_ref().map(|pair| &pair[side.index()].player)
    }

    pub fn player_mut(&mut self, side: Side) -> Option<&mut P> {
        self.pair.as_mut().map(|pair| &mut pair[side.index()].player)
    }

    /// True when the player looped and is held for the other one.
    pub fn is_waiting(&self, side: Side) -> bool {
        self.pair
            .as_ref()
            .is_some_and(|pair| pair[side.index()].waiting)
    }

    /// Open a channel of transport updates. The current display state is
    /// replayed first. Replaces any previously opened channel.
    pub fn transport_updates(&mut self) -> channel::Receiver<TransportUpdate> {
        let (tx, rx) = channel::unbounded();
        let state = &self.transport;
        let replay = [
            TransportUpdate::Bounds { last_time: state.last_time },
            TransportUpdate::FrameStep(state.frame_step),
            TransportUpdate::SyncMarker(state.sync_marker),
            TransportUpdate::Cursor(state.cursor),
            TransportUpdate::Markers {
                left: state.left_marker,
                right: state.right_marker,
            },
            TransportUpdate::Playing(state.playing),
            TransportUpdate::Merging(state.merging),
        ];
        for update in replay {
            tx.send(update).ok();
        }
        self.transport_tx = Some(tx);
        rx
    }

    /// Take ownership of a pair of players.
    ///
    /// Anything other than two distinct players is handed back untouched.
    /// Synchronization starts right away when both are already loaded.
    pub fn attach(&mut self, players: Vec<P>) -> Result<(), Vec<P>> {
        if self.state.is_active() {
            debug!("Already attached to a pair, detach it first");
            return Err(players);
        }

        let [left, right] = match <[P; 2]>::try_from(players) {
            Ok(pair) => pair,
            Err(players) => {
                debug!(count = players.len(), "Synchronization needs exactly two players");
                return Err(players);
            }
        };
        if left.id() == right.id() {
            debug!(player = %left.id(), "Cannot synchronize a player with itself");
            return Err(vec![left, right]);
        }

        let left = self.subscribe(left);
        let right = self.subscribe(right);
        debug!(left = %left.player.id(), right = %right.player.id(), "Attached player pair");

        self.pair = Some([left, right]);
        self.state = SyncState::Active;
        self.prepare_sync();
        Ok(())
    }

    /// Release both players and return them, left first.
    pub fn detach(&mut self) -> Vec<P> {
        self.desynchronize();
        self.state = SyncState::Inactive;

        let Some(pair) = self.pair.take() else {
            return Vec::new();
        };
        debug!("Detached player pair");
        pair.into_iter()
            .map(|Attached { mut player, subscription, .. }| {
                player.unsubscribe(subscription);
                player
            })
            .collect()
    }

    /// Enter synchronization if both players have content.
    pub fn prepare_sync(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let loaded = self
            .pair
            .as_ref()
            .is_some_and(|pair| pair.iter().all(|a| a.player.is_loaded()));
        if !loaded {
            debug!("Waiting for both players to load");
            return;
        }

        self.pause();
        let was_merging = std::mem::take(&mut self.merging);
        self.for_each_player(|player| {
            // Players started on their own before sync must not keep running.
            if player.is_playing() {
                player.pause();
            }
            player.set_synched(true);
            if was_merging {
                player.set_merge(false);
            }
        });

        self.state = SyncState::Synched;
        self.rebuild(|player| PlayerTiming::from_origin(player));
        self.publish(TransportUpdate::Merging(false));
        self.seek_all(0);
        debug!("Entered synchronization");

        self.try_auto_start();
    }

    /// Rebuild the timeline from previously saved local sync times.
    ///
    /// Returns false when the pair is not ready or a player has no entry.
    pub fn restore_sync_points(&mut self, points: &HashMap<PlayerId, Time>) -> bool {
        if !self.state.is_active() {
            return false;
        }
        let applicable = self.pair.as_ref().is_some_and(|pair| {
            pair.iter()
                .all(|a| a.player.is_loaded() && points.contains_key(&a.player.id()))
        });
        if !applicable {
            debug!("Saved sync points do not match the current pair");
            return false;
        }

        self.pause();
        self.for_each_player(|player| player.set_synched(true));
        self.state = SyncState::Synched;
        self.rebuild(|player| {
            PlayerTiming::with_sync_time(player, points.get(&player.id()).copied().unwrap_or(0))
        });
        self.seek_all(0);
        debug!("Restored sync points");
        true
    }

    /// Leave synchronization and discard the common timeline.
    pub fn desynchronize(&mut self) {
        if !self.state.is_synching() {
            return;
        }

        self.pause();
        let was_merging = std::mem::take(&mut self.merging);
        self.for_each_player(|player| {
            if was_merging {
                player.set_merge(false);
            }
            player.set_synched(false);
        });
        if was_merging {
            self.publish(TransportUpdate::Merging(false));
        }

        self.timeline = None;
        self.current_time = 0;
        self.state = SyncState::Active;
        debug!("Left synchronization");
    }

    /// Pause both players and end the playback episode.
    pub fn pause(&mut self) {
        if !self.state.is_synching() {
            return;
        }

        if let Some(pair) = self.pair.as_mut() {
            for attached in pair.iter_mut() {
                attached.waiting = false;
                if attached.player.is_playing() {
                    attached.player.pause();
                }
            }
        }
        if self.state.is_dynamic() {
            debug!(cursor = self.current_time, "Paused synchronized playback");
        }
        self.state = SyncState::Synched;
        if self.transport.playing {
            self.publish(TransportUpdate::Playing(false));
        }
    }

    /// Execute a command from the transport widget.
    pub fn execute(&mut self, command: TransportCommand) {
        if !self.state.is_active() {
            debug!(?command, "No player pair, ignoring transport command");
            return;
        }

        let synching = self.state.is_synching();
        match command {
            TransportCommand::TogglePlay if synching => {
                if self.state.is_dynamic() {
                    self.pause();
                } else {
                    self.start_episode();
                }
            }
            TransportCommand::TogglePlay => self.for_each_player(|player| {
                if player.is_playing() {
                    player.pause();
                } else {
                    player.play();
                }
            }),
            TransportCommand::GotoFirst if synching => {
                self.pause();
                self.seek_all(0);
            }
            TransportCommand::GotoFirst => self.for_each_player(|player| seek_local(player, 0)),
            TransportCommand::GotoLast if synching => {
                self.pause();
                let last = self.timeline.as_ref().map_or(0, CommonTimeline::last_time);
                self.seek_all(last);
            }
            TransportCommand::GotoLast => self.for_each_player(|player| {
                let end = player.last_time();
                seek_local(player, end);
            }),
            TransportCommand::StepForward if synching => self.step(1),
            TransportCommand::StepBackward if synching => self.step(-1),
            TransportCommand::StepForward => self.for_each_player(|player| step_local(player, 1)),
            TransportCommand::StepBackward => self.for_each_player(|player| step_local(player, -1)),
            TransportCommand::GotoSyncPoint if synching => {
                self.pause();
                let sync = self
                    .timeline
                    .as_ref()
                    .map_or(0, CommonTimeline::sync_common_time);
                self.seek_all(sync);
            }
            TransportCommand::SetSyncPoint if synching => self.set_sync_point(),
            TransportCommand::Swap => self.swap(),
            TransportCommand::ToggleMerge if synching => self.toggle_merge(),
            TransportCommand::SeekTo(common) if synching => {
                self.pause();
                let target = self.timeline.as_ref().map_or(0, |t| t.clamp(common));
                self.seek_all(target);
            }
            TransportCommand::GotoSyncPoint
            | TransportCommand::SetSyncPoint
            | TransportCommand::ToggleMerge
            | TransportCommand::SeekTo(_) => {
                debug!(?command, "Ignored until both players are synchronized");
            }
        }
    }

    /// Handle every pending player notification. Returns how many were handled.
    pub fn process_notifications(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.notifications_rx.try_recv() {
            self.handle_notification(notification);
            handled += 1;
        }
        handled
    }

    pub fn handle_notification(&mut self, notification: PlayerNotification) {
        let Some(side) = self.side_of(notification.subscription) else {
            debug!(player = %notification.player, "Ignoring notification from a detached player");
            return;
        };

        match notification.event {
            PlayerEvent::ContentLoaded => {
                if !self.state.is_synching() {
                    self.prepare_sync();
                }
            }
            PlayerEvent::PlayStarted => self.on_play_started(),
            PlayerEvent::PauseRequested => {
                if self.state.is_dynamic() {
                    self.pause();
                }
            }
            PlayerEvent::SpeedChanged => self.on_speed_changed(side),
            PlayerEvent::TimeOriginChanged => {
                if self.state.is_synching() {
                    self.rebuild_in_place();
                }
            }
            PlayerEvent::NewFrame { local_time, image } => {
                self.on_new_frame(side, local_time, image)
            }
        }
    }

    /// Walk the common timeline and write every frame pair to `sink`.
    ///
    /// Playback is paused for the duration and the cursor restored afterwards.
    pub fn export<S: FrameSink>(
        &mut self,
        sink: &mut S,
        cancel: &CancelFlag,
        progress: Option<&channel::Sender<ExportProgress>>,
    ) -> Result<ExportOutcome, ExportError> {
        if !self.state.is_synching() {
            return Err(ExportError::NotSynched);
        }

        self.pause();
        let resume_at = self.current_time;
        let result = match (self.timeline.as_ref(), self.pair.as_mut()) {
            (Some(timeline), Some([left, right])) => DualExporter::new(timeline, self.merging)
                .run(&mut left.player, &mut right.player, sink, cancel, progress),
            _ => Err(ExportError::NotSynched),
        };
        self.seek_all(resume_at);
        result
    }

    /// Current image of both players, left first.
    pub fn snapshot(&mut self) -> Result<(VideoFrame, VideoFrame), ExportError> {
        if !self.state.is_synching() {
            return Err(ExportError::NotSynched);
        }

        self.pause();
        let Some([left, right]) = self.pair.as_mut() else {
            return Err(ExportError::NotSynched);
        };
        export::snapshot(&mut left.player, &mut right.player)
    }

    fn subscribe(&mut self, mut player: P) -> Attached<P> {
        let id = self.next_subscription;
        self.next_subscription += 1;

        let sender = NotificationSender::new(id, player.id(), self.notifications_tx.clone());
        let subscription = player.subscribe(sender);
        Attached {
            player,
            subscription,
            last_frame: None,
            waiting: false,
        }
    }

    fn side_of(&self, subscription: u64) -> Option<Side> {
        self.pair
            .as_ref()?
            .iter()
            .position(|a| a.subscription.id() == subscription)
            .map(Side::from_index)
    }

    fn for_each_player(&mut self, mut f: impl FnMut(&mut P)) {
        if let Some(pair) = self.pair.as_mut() {
            for attached in pair.iter_mut() {
                f(&mut attached.player);
            }
        }
    }

    fn publish(&mut self, update: TransportUpdate) {
        self.transport.apply(update);
        let disconnected = self
            .transport_tx
            .as_ref()
            .is_some_and(|tx| tx.send(update).is_err());
        if disconnected {
            debug!("Transport widget disconnected");
            self.transport_tx = None;
        }
    }

    fn publish_timeline(&mut self) {
        let Some(timeline) = self.timeline.as_ref() else {
            return;
        };
        let updates = [
            TransportUpdate::Bounds {
                last_time: timeline.last_time(),
            },
            TransportUpdate::FrameStep(timeline.frame_time()),
            TransportUpdate::SyncMarker(timeline.sync_common_time()),
        ];
        for update in updates {
            self.publish(update);
        }
    }

    fn publish_markers(&mut self) {
        let markers = match (self.timeline.as_ref(), self.pair.as_ref()) {
            (Some(timeline), Some([left, right])) => {
                let left = timeline.to_common(left.player.id(), left.player.current_time());
                let right = timeline.to_common(right.player.id(), right.player.current_time());
                left.zip(right)
                    .map(|(left, right)| TransportUpdate::Markers { left, right })
            }
            _ => None,
        };
        if let Some(markers) = markers {
            self.publish(markers);
        }
    }

    fn rebuild(&mut self, timing: impl Fn(&P) -> PlayerTiming) {
        let Some([left, right]) = self.pair.as_ref() else {
            return;
        };
        let a = timing(&left.player);
        let b = timing(&right.player);
        self.timeline = Some(CommonTimeline::build(&a, &b, self.settings.sync_by_motion));
        self.publish_timeline();
    }

    /// Rebuild from the players' origins without moving them.
    fn rebuild_in_place(&mut self) {
        self.rebuild(|player| PlayerTiming::from_origin(player));
        self.current_time = self.left_common_time();
        self.publish(TransportUpdate::Cursor(self.current_time));
        self.publish_markers();
    }

    /// Left player's position on the common timeline, clamped.
    fn left_common_time(&self) -> Time {
        match (self.timeline.as_ref(), self.pair.as_ref()) {
            (Some(timeline), Some([left, _])) => timeline
                .to_common(left.player.id(), left.player.current_time())
                .map_or(0, |common| timeline.clamp(common)),
            _ => 0,
        }
    }

    /// Move the cursor and both players to a common time.
    fn seek_all(&mut self, common: Time) {
        self.current_time = common;
        if let (Some(timeline), Some(pair)) = (self.timeline.as_ref(), self.pair.as_mut()) {
            for attached in pair.iter_mut() {
                attached.last_frame = None;
                let id = attached.player.id();
                let Some(target) = timeline.seek_target(id, common) else {
                    continue;
                };
                if attached.player.current_time() != target {
                    debug!(player = %id, target, "Seeking");
                    attached.player.seek_to(target, true);
                }
            }
        }
        self.publish(TransportUpdate::Cursor(common));
        self.publish_markers();
    }

    fn step(&mut self, direction: i64) {
        self.pause();
        let Some(timeline) = self.timeline.as_ref() else {
            return;
        };
        let target = timeline.clamp(self.current_time + direction * timeline.frame_time());
        if target == self.current_time {
            debug!(cursor = target, "Already at the bound");
            return;
        }
        self.seek_all(target);
    }

    /// Start an episode from the most advanced player's position.
    fn start_episode(&mut self) {
        let target = match (self.timeline.as_ref(), self.pair.as_ref()) {
            (Some(timeline), Some(pair)) => {
                let latest = pair
                    .iter()
                    .filter_map(|a| timeline.to_common(a.player.id(), a.player.current_time()))
                    .max()
                    .unwrap_or(0);
                timeline.clamp(latest)
            }
            _ => return,
        };

        self.budget.reset();
        self.clear_waiting();
        self.seek_all(target);
        self.state = SyncState::DynamicSynching;
        debug!(cursor = target, "Started synchronized playback");

        self.ensure_playing();
        self.publish(TransportUpdate::Playing(true));
    }

    fn set_sync_point(&mut self) {
        self.pause();
        self.rebuild(|player| PlayerTiming::from_position(player));
        let cursor = self.left_common_time();
        debug!(cursor, "Sync point set from current positions");
        self.seek_all(cursor);
    }

    fn swap(&mut self) {
        if let Some(pair) = self.pair.as_mut() {
            pair.swap(0, 1);
        }
        debug!("Swapped players");
        if self.state.is_synching() {
            self.publish_markers();
        }
    }

    fn toggle_merge(&mut self) {
        self.merging = !self.merging;
        let merging = self.merging;
        self.for_each_player(|player| player.set_merge(merging));
        self.publish(TransportUpdate::Merging(merging));
    }

    fn try_auto_start(&mut self) {
        let Some([left, right]) = self.pair.as_ref() else {
            return;
        };
        let decision = if !self.settings.auto_play {
            AutoStart::Skip(SkipReason::Disabled)
        } else if left.player.is_playing() || right.player.is_playing() {
            AutoStart::Skip(SkipReason::AlreadyPlaying)
        } else {
            autostart::check(
                left.player.creation_time(),
                right.player.creation_time(),
                self.settings.auto_play_window(),
            )
        };

        match decision {
            AutoStart::Start => {
                info!("Recordings were created together, starting synchronized playback");
                self.start_episode();
            }
            AutoStart::Skip(SkipReason::Disabled) => debug!("Auto-play disabled"),
            AutoStart::Skip(reason) => {
                info!(?reason, "Auto-play skipped, playback must be started manually")
            }
        }
    }

    fn on_play_started(&mut self) {
        if self.state != SyncState::Synched {
            return;
        }
        let both_playing = self
            .pair
            .as_ref()
            .is_some_and(|pair| pair.iter().all(|a| a.player.is_playing()));
        if both_playing {
            self.budget.reset();
            self.clear_waiting();
            self.state = SyncState::DynamicSynching;
            debug!("Both players started, entering dynamic synchronization");
            self.publish(TransportUpdate::Playing(true));
        }
    }

    fn on_speed_changed(&mut self, side: Side) {
        if !self.state.is_synching() {
            return;
        }
        if self.settings.sync_lock_speed {
            if let Some(pair) = self.pair.as_mut() {
                let speed = pair[side.index()].player.speed();
                let other = &mut pair[side.other().index()].player;
                if (other.speed() - speed).abs() > f64::EPSILON {
                    debug!(player = %other.id(), speed, "Copying speed to the other player");
                    other.set_speed(speed);
                }
            }
        }
        self.rebuild_in_place();
    }

    fn on_new_frame(&mut self, side: Side, local_time: Time, image: Option<Arc<VideoFrame>>) {
        if !self.state.is_synching() {
            return;
        }

        if self.state.is_dynamic() {
            self.track_drift(side, local_time);
        } else if let Some(pair) = self.pair.as_mut() {
            pair[side.index()].last_frame = Some(local_time);
        }
        self.publish_markers();

        if self.merging {
            if let (Some(image), Some(pair)) = (image, self.pair.as_mut()) {
                pair[side.other().index()].player.set_merge_image(image, true);
            }
        }
    }

    fn frame_context(&mut self, side: Side, local_time: Time) -> Option<FrameContext> {
        let timeline = self.timeline.as_ref()?;
        let pair = self.pair.as_mut()?;

        let this = &mut pair[side.index()];
        let looped = this.last_frame.is_some_and(|previous| local_time < previous);
        this.last_frame = Some(local_time);
        let this_playing = this.player.is_playing();
        let this_common = timeline.to_common(this.player.id(), local_time)?;

        let other = &pair[side.other().index()];
        Some(FrameContext {
            this_playing,
            looped,
            this_common,
            other_playing: other.player.is_playing(),
            other_waiting: other.waiting,
            other_common: timeline.to_common(other.player.id(), other.player.current_time())?,
        })
    }

    fn track_drift(&mut self, side: Side, local_time: Time) {
        let Some(frame) = self.frame_context(side, local_time) else {
            return;
        };

        if frame.this_playing && frame.looped {
            if frame.other_playing {
                debug!(?side, "Player looped first, holding it for the other one");
                self.hold(side);
            } else {
                debug!("Both players completed, restarting together");
                self.restart();
            }
            return;
        }

        if frame.this_playing {
            self.current_time = frame.this_common;
            if frame.other_playing && !frame.other_waiting {
                let threshold = self
                    .timeline
                    .as_ref()
                    .map_or(0, CommonTimeline::max_player_frame_time);
                match self.budget.evaluate(frame.this_common, frame.other_common, threshold) {
                    DriftDecision::InSync => {}
                    DriftDecision::Realign { target, divergence } => {
                        warn!(
                            divergence,
                            target,
                            remaining = self.budget.remaining(),
                            "Players drifted apart, forcing realignment"
                        );
                        self.seek_all(target);
                    }
                    DriftDecision::Uncorrected { divergence, first } => {
                        if first {
                            warn!(
                                divergence,
                                "Players drifted apart with no realignment left, resync manually"
                            );
                        }
                    }
                }
            }
        } else if !frame.other_playing {
            debug!("Both players stopped, restarting together");
            self.restart();
            return;
        }

        self.ensure_playing();
        self.publish(TransportUpdate::Cursor(self.current_time));
    }

    fn hold(&mut self, side: Side) {
        if let Some(pair) = self.pair.as_mut() {
            let attached = &mut pair[side.index()];
            attached.player.pause();
            attached.waiting = true;
        }
    }

    fn restart(&mut self) {
        self.clear_waiting();
        self.seek_all(0);
        self.ensure_playing();
    }

    fn clear_waiting(&mut self) {
        if let Some(pair) = self.pair.as_mut() {
            for attached in pair.iter_mut() {
                attached.waiting = false;
            }
        }
    }

    /// Start every player that should be playing at the cursor.
    fn ensure_playing(&mut self) {
        let current = self.current_time;
        let (Some(timeline), Some(pair)) = (self.timeline.as_ref(), self.pair.as_mut()) else {
            return;
        };
        for attached in pair.iter_mut() {
            let player = &mut attached.player;
            if !player.is_playing()
                && !attached.waiting
                && !timeline.is_out_of_bounds(player.id(), current)
            {
                player.play();
            }
        }
    }
}

/// Seek a single player, clamped to its own range.
fn seek_local<P: PlayerSource>(player: &mut P, local: Time) {
    let target = crate::core::time::clamp(local, 0, player.last_time());
    if player.current_time() != target {
        player.seek_to(target, true);
    }
}

fn step_local<P: PlayerSource>(player: &mut P, direction: i64) {
    let target = player.current_time() + direction * player.frame_interval();
    seek_local(player, target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::from_millis;
    use crate::export::sink::RecordingSink;
    use crate::player::mock::{Command, MockPlayer};
    use chrono::{Duration, TimeZone, Utc};

    fn manual() -> SyncSettings {
        SyncSettings {
            auto_play: false,
            ..SyncSettings::default()
        }
    }

    fn paired(left: MockPlayer, right: MockPlayer) -> SyncController<MockPlayer> {
        let mut controller = SyncController::new(manual());
        assert!(controller.attach(vec![left, right]).is_ok());
        controller
    }

    fn player(c: &SyncController<MockPlayer>, side: Side) -> &MockPlayer {
        c.player(side).unwrap()
    }

    fn player_mut(c: &mut SyncController<MockPlayer>, side: Side) -> &mut MockPlayer {
        c.player_mut(side).unwrap()
    }

    fn clear(c: &mut SyncController<MockPlayer>) {
        player_mut(c, Side::Left).clear_commands();
        player_mut(c, Side::Right).clear_commands();
    }

    fn emit(c: &mut SyncController<MockPlayer>, side: Side, event: PlayerEvent) {
        player(c, side).emit(event);
        c.process_notifications();
    }

    /// Move a player to `ms` without telling the controller.
    fn place(c: &mut SyncController<MockPlayer>, side: Side, ms: i64) {
        player_mut(c, side).current_time = from_millis(ms);
    }

    /// Move a player to `ms` and deliver the frame.
    fn deliver(c: &mut SyncController<MockPlayer>, side: Side, ms: i64) {
        place(c, side, ms);
        emit(
            c,
            side,
            PlayerEvent::NewFrame {
                local_time: from_millis(ms),
                image: None,
            },
        );
    }

    #[test]
    fn test_attach_enters_sync() {
        let c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 8_000, 40));

        assert_eq!(c.state(), SyncState::Synched);
        assert_eq!(c.current_time(), 0);
        assert_eq!(c.transport().last_time, from_millis(10_000));
        assert_eq!(c.transport().frame_step, from_millis(40));
        assert!(player(&c, Side::Left).synched);
        assert!(player(&c, Side::Right).synched);
        assert_eq!(player(&c, Side::Left).listeners.len(), 1);
    }

    #[test]
    fn test_invalid_pairing_returns_players() {
        let mut c = SyncController::new(manual());

        let single = c.attach(vec![MockPlayer::new(1, 1_000, 40)]).unwrap_err();
        assert_eq!(single.len(), 1);
        assert_eq!(c.state(), SyncState::Inactive);

        let three = vec![
            MockPlayer::new(1, 1_000, 40),
            MockPlayer::new(2, 1_000, 40),
            MockPlayer::new(3, 1_000, 40),
        ];
        assert_eq!(c.attach(three).unwrap_err().len(), 3);

        let same = vec![MockPlayer::new(1, 1_000, 40), MockPlayer::new(1, 1_000, 40)];
        let returned = c.attach(same).unwrap_err();
        assert_eq!(returned.len(), 2);
        assert!(returned.iter().all(|p| p.listeners.is_empty()));
        assert_eq!(c.state(), SyncState::Inactive);
    }

    #[test]
    fn test_sync_waits_for_content() {
        let mut c = paired(
            MockPlayer::new(1, 1_000, 40),
            MockPlayer::new(2, 1_000, 40).unloaded(),
        );
        assert_eq!(c.state(), SyncState::Active);
        assert!(c.timeline().is_none());

        player_mut(&mut c, Side::Right).loaded = true;
        emit(&mut c, Side::Right, PlayerEvent::ContentLoaded);
        assert_eq!(c.state(), SyncState::Synched);
    }

    #[test]
    fn test_independent_playback_stops_when_sync_starts() {
        let mut c = paired(
            MockPlayer::new(1, 10_000, 40),
            MockPlayer::new(2, 10_000, 40).unloaded(),
        );
        c.execute(TransportCommand::TogglePlay);
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);

        player_mut(&mut c, Side::Right).loaded = true;
        emit(&mut c, Side::Right, PlayerEvent::ContentLoaded);

        assert_eq!(c.state(), SyncState::Synched);
        assert!(!player(&c, Side::Left).playing);
        assert!(!player(&c, Side::Right).playing);
        assert!(!c.transport().playing);

        c.execute(TransportCommand::TogglePlay);
        assert_eq!(c.state(), SyncState::DynamicSynching);
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);
    }

    #[test]
    fn test_equal_length_start() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));

        c.execute(TransportCommand::TogglePlay);

        assert_eq!(c.state(), SyncState::DynamicSynching);
        assert_eq!(c.current_time(), 0);
        assert!(c.transport().playing);
        for side in [Side::Left, Side::Right] {
            assert!(player(&c, side).playing);
            assert_eq!(player(&c, side).count(&Command::Play), 1);
            assert!(player(&c, side).seeks().is_empty());
        }
    }

    #[test]
    fn test_offset_players_start_aligned() {
        // Right sync point comes 1.5 s earlier in its stream: it is shifted.
        let mut c = paired(
            MockPlayer::new(1, 10_000, 40).with_origin(2_000),
            MockPlayer::new(2, 10_000, 40).with_origin(500),
        );
        let timeline = c.timeline().unwrap();
        assert_eq!(timeline.to_common(PlayerId(1), from_millis(2_000)), Some(from_millis(2_000)));
        assert_eq!(timeline.to_common(PlayerId(2), from_millis(500)), Some(from_millis(2_000)));

        c.execute(TransportCommand::TogglePlay);

        // Both at local zero: the right player is further along in common time.
        assert_eq!(c.current_time(), from_millis(1_500));
        assert_eq!(player(&c, Side::Left).seeks(), vec![from_millis(1_500)]);
        assert!(player(&c, Side::Right).seeks().is_empty());
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);
    }

    #[test]
    fn test_finished_player_is_not_restarted() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 2_000, 40));
        c.execute(TransportCommand::TogglePlay);

        place(&mut c, Side::Right, 2_000);
        player_mut(&mut c, Side::Right).playing = false;
        deliver(&mut c, Side::Left, 3_000);

        assert!(!player(&c, Side::Right).playing);
        assert!(player(&c, Side::Left).playing);
        assert_eq!(c.current_time(), from_millis(3_000));
    }

    #[test]
    fn test_step_clamps_at_bounds() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));

        c.execute(TransportCommand::StepBackward);
        assert_eq!(c.current_time(), 0);
        assert!(player(&c, Side::Left).seeks().is_empty());
        assert!(player(&c, Side::Right).seeks().is_empty());

        c.execute(TransportCommand::StepForward);
        assert_eq!(c.current_time(), from_millis(40));
        assert_eq!(player(&c, Side::Left).seeks(), vec![from_millis(40)]);
        assert_eq!(player(&c, Side::Right).seeks(), vec![from_millis(40)]);
        assert_eq!(c.transport().cursor, from_millis(40));

        c.execute(TransportCommand::GotoLast);
        clear(&mut c);
        c.execute(TransportCommand::StepForward);
        assert_eq!(c.current_time(), from_millis(10_000));
        assert!(player(&c, Side::Left).seeks().is_empty());
        assert!(player(&c, Side::Right).seeks().is_empty());
    }

    #[test]
    fn test_drift_is_corrected_once_per_episode() {
        let mut c = paired(MockPlayer::new(1, 10_000, 33), MockPlayer::new(2, 10_000, 33));
        c.execute(TransportCommand::TogglePlay);
        clear(&mut c);

        place(&mut c, Side::Right, 5_050);
        deliver(&mut c, Side::Left, 5_000);

        // The player behind catches up, nobody rewinds.
        assert_eq!(player(&c, Side::Left).seeks(), vec![from_millis(5_050)]);
        assert!(player(&c, Side::Right).seeks().is_empty());
        assert_eq!(c.current_time(), from_millis(5_050));
        assert!(c.resync_budget().is_exhausted());

        clear(&mut c);
        deliver(&mut c, Side::Left, 5_300);
        deliver(&mut c, Side::Left, 5_400);
        assert!(player(&c, Side::Left).seeks().is_empty());
        assert!(player(&c, Side::Right).seeks().is_empty());
        assert_eq!(c.current_time(), from_millis(5_400));
    }

    #[test]
    fn test_leading_player_is_not_rewound() {
        let mut c = paired(MockPlayer::new(1, 10_000, 33), MockPlayer::new(2, 10_000, 33));
        c.execute(TransportCommand::TogglePlay);
        clear(&mut c);

        place(&mut c, Side::Right, 4_000);
        deliver(&mut c, Side::Left, 4_500);

        assert!(player(&c, Side::Left).seeks().is_empty());
        assert_eq!(player(&c, Side::Right).seeks(), vec![from_millis(4_500)]);
    }

    #[test]
    fn test_budget_resets_on_new_episode() {
        let mut c = paired(MockPlayer::new(1, 10_000, 33), MockPlayer::new(2, 10_000, 33));
        c.execute(TransportCommand::TogglePlay);
        place(&mut c, Side::Right, 1_000);
        deliver(&mut c, Side::Left, 500);
        assert!(c.resync_budget().is_exhausted());

        c.execute(TransportCommand::TogglePlay);
        assert_eq!(c.state(), SyncState::Synched);
        c.execute(TransportCommand::TogglePlay);
        assert_eq!(c.resync_budget().remaining(), 1);
    }

    #[test]
    fn test_shorter_player_waits_after_looping() {
        let mut c = paired(MockPlayer::new(1, 2_000, 40), MockPlayer::new(2, 4_000, 40));
        c.execute(TransportCommand::TogglePlay);

        place(&mut c, Side::Right, 1_960);
        deliver(&mut c, Side::Left, 1_960);
        deliver(&mut c, Side::Left, 0);

        assert!(!player(&c, Side::Left).playing);
        assert!(c.is_waiting(Side::Left));

        deliver(&mut c, Side::Right, 2_000);
        assert!(!player(&c, Side::Left).playing);
        assert_eq!(c.current_time(), from_millis(2_000));

        deliver(&mut c, Side::Right, 0);
        assert!(!c.is_waiting(Side::Left));
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);
        assert_eq!(c.current_time(), 0);
    }

    #[test]
    fn test_pause_request_pauses_both() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        c.execute(TransportCommand::TogglePlay);

        emit(&mut c, Side::Right, PlayerEvent::PauseRequested);

        assert_eq!(c.state(), SyncState::Synched);
        assert!(!player(&c, Side::Left).playing);
        assert!(!player(&c, Side::Right).playing);
        assert!(!c.transport().playing);
    }

    #[test]
    fn test_players_started_externally_enter_dynamic() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        player_mut(&mut c, Side::Left).playing = true;
        emit(&mut c, Side::Left, PlayerEvent::PlayStarted);
        assert_eq!(c.state(), SyncState::Synched);

        player_mut(&mut c, Side::Right).playing = true;
        emit(&mut c, Side::Right, PlayerEvent::PlayStarted);
        assert_eq!(c.state(), SyncState::DynamicSynching);
    }

    #[test]
    fn test_auto_start_for_close_recordings() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut c = SyncController::new(SyncSettings::default());
        c.attach(vec![
            MockPlayer::new(1, 10_000, 40).with_creation_time(created),
            MockPlayer::new(2, 10_000, 40).with_creation_time(created + Duration::seconds(2)),
        ])
        .unwrap();

        assert_eq!(c.state(), SyncState::DynamicSynching);
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);
    }

    #[test]
    fn test_auto_start_rejected() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut far = SyncController::new(SyncSettings::default());
        far.attach(vec![
            MockPlayer::new(1, 10_000, 40).with_creation_time(created),
            MockPlayer::new(2, 10_000, 40).with_creation_time(created + Duration::seconds(10)),
        ])
        .unwrap();
        assert_eq!(far.state(), SyncState::Synched);
        assert!(!player(&far, Side::Left).playing);

        let mut unknown = SyncController::new(SyncSettings::default());
        unknown
            .attach(vec![
                MockPlayer::new(1, 10_000, 40).with_creation_time(created),
                MockPlayer::new(2, 10_000, 40),
            ])
            .unwrap();
        assert_eq!(unknown.state(), SyncState::Synched);
    }

    #[test]
    fn test_speed_lock() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        player_mut(&mut c, Side::Left).speed = 0.5;
        emit(&mut c, Side::Left, PlayerEvent::SpeedChanged);

        assert_eq!(player(&c, Side::Right).speed, 0.5);
        assert_eq!(player(&c, Side::Right).count(&Command::Speed(0.5)), 1);

        let mut unlocked = SyncController::new(SyncSettings {
            sync_lock_speed: false,
            ..manual()
        });
        unlocked
            .attach(vec![MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40)])
            .unwrap();
        player_mut(&mut unlocked, Side::Left).speed = 0.5;
        emit(&mut unlocked, Side::Left, PlayerEvent::SpeedChanged);
        assert_eq!(player(&unlocked, Side::Right).speed, 1.0);
    }

    #[test]
    fn test_time_origin_change_rebuilds() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        player_mut(&mut c, Side::Right).time_origin = from_millis(1_000);
        emit(&mut c, Side::Right, PlayerEvent::TimeOriginChanged);

        let left_id = player(&c, Side::Left).id;
        assert_eq!(
            c.timeline().unwrap().mapping(left_id).unwrap().offset,
            from_millis(1_000)
        );
        assert_eq!(c.transport().last_time, from_millis(11_000));
    }

    #[test]
    fn test_merge_forwards_images() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        c.execute(TransportCommand::ToggleMerge);

        assert!(c.is_merging());
        assert!(c.transport().merging);
        assert!(player(&c, Side::Left).merge);
        assert!(player(&c, Side::Right).merge);

        emit(
            &mut c,
            Side::Left,
            PlayerEvent::NewFrame {
                local_time: 0,
                image: Some(Arc::new(VideoFrame::blank(2, 2, 0))),
            },
        );
        assert_eq!(player(&c, Side::Right).count(&Command::MergeImage), 1);
        assert_eq!(player(&c, Side::Left).count(&Command::MergeImage), 0);
    }

    #[test]
    fn test_swap_keeps_mappings() {
        let mut c = paired(
            MockPlayer::new(1, 10_000, 40).with_origin(2_000),
            MockPlayer::new(2, 10_000, 40),
        );
        let before = c.timeline().cloned();

        c.execute(TransportCommand::Swap);

        assert_eq!(c.timeline().cloned(), before);
        assert_eq!(player(&c, Side::Left).id, PlayerId(2));
        // Right player (id 2) is shifted by 2 s.
        assert_eq!(c.transport().left_marker, from_millis(2_000));
        assert_eq!(c.transport().right_marker, 0);
    }

    #[test]
    fn test_goto_sync_point() {
        let mut c = paired(
            MockPlayer::new(1, 10_000, 40).with_origin(3_000),
            MockPlayer::new(2, 10_000, 40).with_origin(1_000),
        );
        clear(&mut c);

        c.execute(TransportCommand::GotoSyncPoint);

        assert_eq!(c.current_time(), from_millis(3_000));
        assert_eq!(player(&c, Side::Left).current_time, from_millis(3_000));
        assert_eq!(player(&c, Side::Right).current_time, from_millis(1_000));
    }

    #[test]
    fn test_set_sync_point_from_positions() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        place(&mut c, Side::Left, 4_000);
        place(&mut c, Side::Right, 1_000);
        clear(&mut c);

        c.execute(TransportCommand::SetSyncPoint);

        let timeline = c.timeline().unwrap();
        assert_eq!(timeline.mapping(PlayerId(2)).unwrap().offset, from_millis(3_000));
        assert_eq!(c.current_time(), from_millis(4_000));
        assert_eq!(c.transport().sync_marker, from_millis(4_000));
        assert!(player(&c, Side::Left).seeks().is_empty());
        assert!(player(&c, Side::Right).seeks().is_empty());
    }

    #[test]
    fn test_seek_to_is_clamped() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 6_000, 40));

        c.execute(TransportCommand::SeekTo(from_millis(20_000)));
        assert_eq!(c.current_time(), from_millis(10_000));
        assert_eq!(player(&c, Side::Right).current_time, from_millis(6_000));

        c.execute(TransportCommand::SeekTo(-5));
        assert_eq!(c.current_time(), 0);
    }

    #[test]
    fn test_goto_last_and_first() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 6_000, 40));

        c.execute(TransportCommand::GotoLast);
        assert_eq!(c.current_time(), from_millis(10_000));
        assert_eq!(c.transport().left_marker, from_millis(10_000));
        assert_eq!(c.transport().right_marker, from_millis(6_000));

        c.execute(TransportCommand::GotoFirst);
        assert_eq!(c.current_time(), 0);
        assert_eq!(player(&c, Side::Left).current_time, 0);
    }

    #[test]
    fn test_commands_forwarded_before_sync() {
        let mut c = paired(
            MockPlayer::new(1, 1_000, 40),
            MockPlayer::new(2, 2_000, 50).unloaded(),
        );

        c.execute(TransportCommand::TogglePlay);
        assert!(player(&c, Side::Left).playing);
        assert!(player(&c, Side::Right).playing);

        c.execute(TransportCommand::GotoLast);
        assert_eq!(player(&c, Side::Left).current_time, from_millis(1_000));
        assert_eq!(player(&c, Side::Right).current_time, from_millis(2_000));

        c.execute(TransportCommand::StepBackward);
        assert_eq!(player(&c, Side::Left).current_time, from_millis(960));
        assert_eq!(player(&c, Side::Right).current_time, from_millis(1_950));

        clear(&mut c);
        c.execute(TransportCommand::SetSyncPoint);
        c.execute(TransportCommand::ToggleMerge);
        assert!(player(&c, Side::Left).commands.is_empty());
        assert!(!c.is_merging());
    }

    #[test]
    fn test_restore_sync_points() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));

        let mut points = HashMap::new();
        points.insert(PlayerId(1), from_millis(2_000));
        assert!(!c.restore_sync_points(&points));

        points.insert(PlayerId(2), from_millis(500));
        assert!(c.restore_sync_points(&points));
        let timeline = c.timeline().unwrap();
        assert_eq!(timeline.mapping(PlayerId(2)).unwrap().offset, from_millis(1_500));
        assert_eq!(c.transport().sync_marker, from_millis(2_000));
    }

    #[test]
    fn test_desynchronize_and_detach() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));

        c.desynchronize();
        assert_eq!(c.state(), SyncState::Active);
        assert!(c.timeline().is_none());
        assert!(!player(&c, Side::Left).synched);

        let players = c.detach();
        assert_eq!(c.state(), SyncState::Inactive);
        assert_eq!(players.len(), 2);
        assert!(players.iter().all(|p| p.listeners.is_empty()));
    }

    #[test]
    fn test_notifications_from_unknown_subscription_are_ignored() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        c.handle_notification(PlayerNotification {
            subscription: 999,
            player: PlayerId(7),
            event: PlayerEvent::PauseRequested,
        });
        assert_eq!(c.state(), SyncState::Synched);
    }

    #[test]
    fn test_transport_channel_replays_state() {
        let mut c = paired(MockPlayer::new(1, 10_000, 40), MockPlayer::new(2, 10_000, 40));
        let rx = c.transport_updates();
        c.execute(TransportCommand::StepForward);

        let mut mirror = TransportState::new();
        mirror.apply_all(rx.try_iter());
        assert_eq!(&mirror, c.transport());
        assert_eq!(mirror.cursor, from_millis(40));
    }

    #[test]
    fn test_export_walks_timeline_and_restores_cursor() {
        let mut c = paired(MockPlayer::new(1, 200, 40), MockPlayer::new(2, 200, 40));
        c.execute(TransportCommand::StepForward);

        let mut sink = RecordingSink::default();
        let outcome = c.export(&mut sink, &CancelFlag::new(), None).unwrap();

        assert_eq!(outcome, ExportOutcome::Completed { frames: 6 });
        assert!(sink.finished);
        assert_eq!(c.current_time(), from_millis(40));
        assert_eq!(player(&c, Side::Left).current_time, from_millis(40));
    }

    #[test]
    fn test_export_requires_sync() {
        let mut c = paired(
            MockPlayer::new(1, 200, 40),
            MockPlayer::new(2, 200, 40).unloaded(),
        );
        let mut sink = RecordingSink::default();
        assert!(matches!(
            c.export(&mut sink, &CancelFlag::new(), None),
            Err(ExportError::NotSynched)
        ));
        assert!(matches!(c.snapshot(), Err(ExportError::NotSynched)));
    }
}
