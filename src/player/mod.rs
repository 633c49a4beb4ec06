//! Player-side contract: the trait a video player implements, the frames it
//! hands out and the notifications it sends back.

pub mod frame;
pub mod notify;
pub mod source;

#[cfg(test)]
pub(crate) mod mock;

pub use frame::VideoFrame;
pub use notify::{NotificationSender, PlayerEvent, PlayerNotification, Subscription};
pub use source::{PlayerId, PlayerSource};
