//! Enablement policy for a slot.

/// A device is usable only when both the node and the operator allow it.
pub fn is_enabled(agent_enabled: bool, user_enabled: bool) -> bool {
    agent_enabled && user_enabled
}

/// The three enablement flags of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEnabled {
    /// Set by the hosting node's health/lifecycle signal.
    pub agent_enabled: bool,
    /// Set by operator action.
    pub user_enabled: bool,
    /// Whether an `AddDevice` is outstanding with the scheduler.
    pub device_added: bool,
}

impl SlotEnabled {
    /// Initial flags; a new slot is never registered.
    pub fn new(agent_enabled: bool, user_enabled: bool) -> Self {
        Self {
            agent_enabled,
            user_enabled,
            device_added: false,
        }
    }

    pub fn enabled(&self) -> bool {
        is_enabled(self.agent_enabled, self.user_enabled)
    }

    /// Whether the registration bit disagrees with the desired state.
    pub fn needs_reconcile(&self) -> bool {
        self.enabled() != self.device_added
    }
}
