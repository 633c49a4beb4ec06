pub mod autostart;
pub mod controller;
pub mod state;
pub mod sync;

pub use autostart::{AutoStart, SkipReason};
pub use controller::{Side, SyncController};
pub use state::SyncState;
pub use sync::{DriftDecision, ResyncBudget};
