//! Recording player used by unit tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::time::{self, Time};
use crate::player::frame::VideoFrame;
use crate::player::notify::{NotificationSender, PlayerEvent, Subscription};
use crate::player::source::{PlayerId, PlayerSource};

/// Command received by the mock, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Seek(Time),
    Play,
    Pause,
    Speed(f64),
    Merge(bool),
    MergeImage,
    Synched(bool),
}

#[derive(Debug)]
pub struct MockPlayer {
    pub id: PlayerId,
    pub current_time: Time,
    pub last_time: Time,
    pub frame_interval: Time,
    pub time_origin: Time,
    pub playing: bool,
    pub loaded: bool,
    pub speed: f64,
    pub creation_time: Option<DateTime<Utc>>,
    pub merge: bool,
    pub synched: bool,
    pub has_image: bool,
    pub commands: Vec<Command>,
    pub listeners: Vec<NotificationSender>,
}

impl MockPlayer {
    /// Loaded, paused player at local zero.
    pub fn new(id: u64, last_ms: i64, frame_ms: i64) -> Self {
        Self {
            id: PlayerId(id),
            current_time: 0,
            last_time: time::from_millis(last_ms),
            frame_interval: time::from_millis(frame_ms),
            time_origin: 0,
            playing: false,
            loaded: true,
            speed: 1.0,
            creation_time: None,
            merge: false,
            synched: false,
            has_image: true,
            commands: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin_ms: i64) -> Self {
        self.time_origin = time::from_millis(origin_ms);
        self
    }

    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = Some(creation_time);
        self
    }

    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }

    pub fn seeks(&self) -> Vec<Time> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Seek(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, command: &Command) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Push an event to every listener.
    pub fn emit(&self, event: PlayerEvent) {
        for listener in &self.listeners {
            listener.notify(event.clone());
        }
    }
}

impl PlayerSource for MockPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn current_time(&self) -> Time {
        self.current_time
    }

    fn last_time(&self) -> Time {
        self.last_time
    }

    fn frame_interval(&self) -> Time {
        self.frame_interval
    }

    fn time_origin(&self) -> Time {
        self.time_origin
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    fn current_image(&mut self) -> Option<VideoFrame> {
        if self.has_image {
            Some(VideoFrame::blank(2, 2, self.current_time))
        } else {
            None
        }
    }

    fn seek_to(&mut self, local_time: Time, _allow_ui_refresh: bool) {
        self.current_time = local_time;
        self.commands.push(Command::Seek(local_time));
    }

    fn play(&mut self) {
        self.playing = true;
        self.commands.push(Command::Play);
    }

    fn pause(&mut self) {
        self.playing = false;
        self.commands.push(Command::Pause);
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
        self.commands.push(Command::Speed(speed));
    }

    fn set_merge(&mut self, merge: bool) {
        self.merge = merge;
        self.commands.push(Command::Merge(merge));
    }

    fn set_merge_image(&mut self, _image: Arc<VideoFrame>, _allow_ui_refresh: bool) {
        self.commands.push(Command::MergeImage);
    }

    fn set_synched(&mut self, synched: bool) {
        self.synched = synched;
        self.commands.push(Command::Synched(synched));
    }

    fn subscribe(&mut self, sender: NotificationSender) -> Subscription {
        let subscription = sender.subscription();
        self.listeners.push(sender);
        subscription
    }

    fn unsubscribe(&mut self, subscription: Subscription) {
        self.listeners.retain(|l| !l.matches(&subscription));
    }
}
