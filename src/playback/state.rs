//! Synchronization state machine.

/// Synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not exactly two players present
    #[default]
    Inactive,
    /// Two players attached, content not yet loaded in both
    Active,
    /// Both players aligned on the common timeline, paused
    Synched,
    /// Both players playing and kept in lockstep
    DynamicSynching,
}

impl SyncState {
    /// Two players are attached
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Inactive)
    }

    /// A common timeline is in effect
    pub fn is_synching(&self) -> bool {
        matches!(self, SyncState::Synched | SyncState::DynamicSynching)
    }

    /// Both players are playing in lockstep
    pub fn is_dynamic(&self) -> bool {
        matches!(self, SyncState::DynamicSynching)
    }
}
