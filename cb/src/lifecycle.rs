//! Start/stop lifecycle shared by bridges and endpoints
//!
//! Each lifecycle-capable component owns a [`LifecycleController`] value and
//! implements [`Lifecycle`]; composites delegate to the components they own.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::bridge::BridgeError;

/// Lifecycle state of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Components with idempotent start/stop
///
/// Calls are expected from a single controlling task; `start` while running and
/// `stop` while stopped are no-ops.
#[async_trait]
pub trait Lifecycle: Send {
    async fn start(&mut self) -> Result<(), BridgeError>;

    async fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// The start/stop state machine
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. The `begin_*`
/// methods return `false` when the call is a no-op for the current state.
#[derive(Debug, Default)]
pub struct LifecycleController {
    name: String,
    state: LifecycleState,
    initialized: bool,
}

impl LifecycleController {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LifecycleState::Stopped,
            initialized: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Record initialization; fails if already initialized
    pub fn mark_initialized(&mut self) -> Result<(), BridgeError> {
        if self.initialized {
            return Err(BridgeError::InvalidConfiguration(format!(
                "'{}' is already initialized",
                self.name
            )));
        }
        self.initialized = true;
        Ok(())
    }

    /// Enter `Starting`; `Ok(false)` when already starting or running
    pub fn begin_start(&mut self) -> Result<bool, BridgeError> {
        debug!(name = %self.name, state = %self.state, "LifecycleController::begin_start: called");
        if !self.initialized {
            return Err(BridgeError::NotInitialized(self.name.clone()));
        }
        match self.state {
            LifecycleState::Stopped => {
                self.state = LifecycleState::Starting;
                Ok(true)
            }
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::Stopping => Ok(false),
        }
    }

    pub fn finish_start(&mut self) {
        debug_assert_eq!(self.state, LifecycleState::Starting);
        self.state = LifecycleState::Running;
    }

    /// Roll back a start that failed part way
    pub fn abort_start(&mut self) {
        debug!(name = %self.name, "LifecycleController::abort_start: called");
        self.state = LifecycleState::Stopped;
    }

    /// Enter `Stopping`; `false` when not running
    pub fn begin_stop(&mut self) -> bool {
        debug!(name = %self.name, state = %self.state, "LifecycleController::begin_stop: called");
        match self.state {
            LifecycleState::Running => {
                self.state = LifecycleState::Stopping;
                true
            }
            LifecycleState::Stopped | LifecycleState::Starting | LifecycleState::Stopping => false,
        }
    }

    pub fn finish_stop(&mut self) {
        debug_assert_eq!(self.state, LifecycleState::Stopping);
        self.state = LifecycleState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_requires_initialization() {
        let mut controller = LifecycleController::new("c");
        assert!(matches!(controller.begin_start(), Err(BridgeError::NotInitialized(_))));
    }

    #[test]
    fn test_double_initialize_rejected() {
        let mut controller = LifecycleController::new("c");
        controller.mark_initialized().unwrap();
        assert!(matches!(
            controller.mark_initialized(),
            Err(BridgeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_full_cycle() {
        let mut controller = LifecycleController::new("c");
        controller.mark_initialized().unwrap();
        assert_eq!(controller.state(), LifecycleState::Stopped);

        assert!(controller.begin_start().unwrap());
        assert_eq!(controller.state(), LifecycleState::Starting);
        controller.finish_start();
        assert!(controller.is_running());

        assert!(controller.begin_stop());
        assert_eq!(controller.state(), LifecycleState::Stopping);
        controller.finish_stop();
        assert_eq!(controller.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_idempotent_transitions() {
        let mut controller = LifecycleController::new("c");
        controller.mark_initialized().unwrap();

        assert!(!controller.begin_stop());
        assert!(controller.begin_start().unwrap());
        assert!(!controller.begin_start().unwrap());
        controller.finish_start();
        assert!(!controller.begin_start().unwrap());
        assert!(controller.is_running());
    }

    #[test]
    fn test_abort_start_returns_to_stopped() {
        let mut controller = LifecycleController::new("c");
        controller.mark_initialized().unwrap();
        assert!(controller.begin_start().unwrap());
        controller.abort_start();
        assert_eq!(controller.state(), LifecycleState::Stopped);
        assert!(controller.begin_start().unwrap());
    }
}
