//! Finite state machine for a deploy attempt

/// Deploy pipeline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployState {
    /// Initial state, nothing checked yet
    Pending,

    /// Checking configuration
    Validating,

    /// Running the site build
    Building,

    /// Pre-flight connectivity check
    Probing,

    /// Transferring files
    Uploading,

    /// Pipeline completed
    Succeeded,

    /// Pipeline aborted
    Failed,
}

impl DeployState {
    /// Short label used in attempt messages
    pub fn label(&self) -> &'static str {
        match self {
            DeployState::Pending => "pending",
            DeployState::Validating => "validation",
            DeployState::Building => "build",
            DeployState::Probing => "probe",
            DeployState::Uploading => "upload",
            DeployState::Succeeded => "succeeded",
            DeployState::Failed => "failed",
        }
    }
}

/// Deploy pipeline event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Begin configuration checks
    Validate,

    /// Configuration accepted, start the build
    Build,

    /// Build complete, start the connectivity probe
    Probe,

    /// Probe positive, start the transfer
    Upload,

    /// Transfer complete
    Finish,

    /// Abort from any in-flight phase
    Fail(String),
}

/// Deploy FSM
#[derive(Debug, Clone)]
pub struct DeployFsm {
    state: DeployState,
    error: Option<String>,
}

impl DeployFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeployState::Pending,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &DeployState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (DeployState::Pending, DeployEvent::Validate) => DeployState::Validating,

            (DeployState::Validating, DeployEvent::Build) => DeployState::Building,
            (DeployState::Building, DeployEvent::Probe) => DeployState::Probing,
            (DeployState::Probing, DeployEvent::Upload) => DeployState::Uploading,
            (DeployState::Uploading, DeployEvent::Finish) => DeployState::Succeeded,

            (
                DeployState::Validating
                | DeployState::Building
                | DeployState::Probing
                | DeployState::Uploading,
                DeployEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                DeployState::Failed
            }

            // A failed attempt can be retried from scratch
            (DeployState::Failed, DeployEvent::Validate) => {
                self.error = None;
                DeployState::Validating
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsm_success_flow() {
        let mut fsm = DeployFsm::new();
        assert_eq!(fsm.state(), &DeployState::Pending);

        fsm.process(DeployEvent::Validate).unwrap();
        assert_eq!(fsm.state(), &DeployState::Validating);

        fsm.process(DeployEvent::Build).unwrap();
        assert_eq!(fsm.state(), &DeployState::Building);

        fsm.process(DeployEvent::Probe).unwrap();
        assert_eq!(fsm.state(), &DeployState::Probing);

        fsm.process(DeployEvent::Upload).unwrap();
        assert_eq!(fsm.state(), &DeployState::Uploading);

        fsm.process(DeployEvent::Finish).unwrap();
        assert_eq!(fsm.state(), &DeployState::Succeeded);
    }

    #[test]
    fn test_fsm_fails_from_any_phase() {
        for events in [
            vec![DeployEvent::Validate],
            vec![DeployEvent::Validate, DeployEvent::Build],
            vec![DeployEvent::Validate, DeployEvent::Build, DeployEvent::Probe],
            vec![
                DeployEvent::Validate,
                DeployEvent::Build,
                DeployEvent::Probe,
                DeployEvent::Upload,
            ],
        ] {
            let mut fsm = DeployFsm::new();
            for event in events {
                fsm.process(event).unwrap();
            }
            fsm.process(DeployEvent::Fail("boom".to_string())).unwrap();
            assert_eq!(fsm.state(), &DeployState::Failed);
            assert_eq!(fsm.error(), Some("boom"));
        }
    }

    #[test]
    fn test_fsm_retry_after_failure() {
        let mut fsm = DeployFsm::new();
        fsm.process(DeployEvent::Validate).unwrap();
        fsm.process(DeployEvent::Fail("bad config".to_string())).unwrap();

        fsm.process(DeployEvent::Validate).unwrap();
        assert_eq!(fsm.state(), &DeployState::Validating);
        assert!(fsm.error().is_none());
    }

    #[test]
    fn test_fsm_rejects_invalid_transitions() {
        let mut fsm = DeployFsm::new();
        assert!(fsm.process(DeployEvent::Upload).is_err());
        assert!(fsm.process(DeployEvent::Finish).is_err());

        fsm.process(DeployEvent::Validate).unwrap();
        assert!(fsm.process(DeployEvent::Probe).is_err());
    }
}
