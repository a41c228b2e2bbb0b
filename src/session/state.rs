//! Connection state machine.

/// Lifecycle of one incoming connection as the bridge drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// Transport accepted, nothing checked yet.
    #[default]
    Connecting,
    /// Credential is being validated.
    Authenticating,
    /// Pseudo-terminal and process are being created.
    Spawning,
    /// Bytes are flowing between transport and process.
    Active,
    /// Teardown is running.
    Closing,
    /// Terminal state; nothing is held.
    Closed,
}

impl BridgeState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Connecting -> Authenticating
    /// - Authenticating -> Spawning
    /// - Authenticating -> Closed (rejected)
    /// - Spawning -> Active
    /// - Spawning -> Closed (spawn failed)
    /// - Active -> Closing
    /// - Closing -> Closed
    pub fn can_transition_to(&self, target: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (*self, target),
            (Connecting, Authenticating)
                | (Authenticating, Spawning)
                | (Authenticating, Closed)
                | (Spawning, Active)
                | (Spawning, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: BridgeState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::BridgeError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Closed)
    }

    /// Whether resources may be held in this state.
    pub fn holds_resources(&self) -> bool {
        matches!(self, BridgeState::Active | BridgeState::Closing)
    }
}
