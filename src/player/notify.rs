//! Notifications sent by players to the synchronization controller.
//!
//! Players may deliver frames from their own decode threads. They push
//! notifications through a [`NotificationSender`]; the controller drains the
//! receiving end on its owning thread, in arrival order.

use std::sync::Arc;

use crossbeam::channel;

use crate::core::time::Time;
use crate::player::frame::VideoFrame;
use crate::player::source::PlayerId;

/// Something that happened in a player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The player finished loading its content.
    ContentLoaded,
    /// The player started playing.
    PlayStarted,
    /// The user asked this player to pause.
    PauseRequested,
    /// The playback speed changed.
    SpeedChanged,
    /// The player's time origin (sync candidate) moved.
    TimeOriginChanged,
    /// A new frame was delivered at the given local time.
    NewFrame {
        local_time: Time,
        image: Option<Arc<VideoFrame>>,
    },
}

/// A player event tagged with its origin.
#[derive(Debug, Clone)]
pub struct PlayerNotification {
    pub subscription: u64,
    pub player: PlayerId,
    pub event: PlayerEvent,
}

/// Handle returned by a subscription, needed to unsubscribe.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    player: PlayerId,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }
}

/// Sending half handed to a player on subscription.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    subscription: u64,
    player: PlayerId,
    tx: channel::Sender<PlayerNotification>,
}

impl NotificationSender {
    pub(crate) fn new(
        subscription: u64,
        player: PlayerId,
        tx: channel::Sender<PlayerNotification>,
    ) -> Self {
        Self {
            subscription,
            player,
            tx,
        }
    }

    /// Send an event to the controller.
    /// Returns false if the controller has been dropped.
    pub fn notify(&self, event: PlayerEvent) -> bool {
        self.tx
            .send(PlayerNotification {
                subscription: self.subscription,
                player: self.player,
                event,
            })
            .is_ok()
    }

    /// Handle identifying this subscription, for the player to return from
    /// `subscribe`.
    pub fn subscription(&self) -> Subscription {
        Subscription {
            id: self.subscription,
            player: self.player,
        }
    }

    /// Whether this sender belongs to the given subscription.
    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.subscription == subscription.id && self.player == subscription.player
    }
}
