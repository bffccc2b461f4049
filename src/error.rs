//! Error taxonomy
//!
//! Registration, scheduling and push-assertion errors surfaced by the engine.

use thiserror::Error;

/// Malformed or conflicting test registration.
///
/// These are raised at process start while the registry is being populated
/// and are meant to abort the binary before anything runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("test is missing name")]
    MissingName,

    #[error("test '{0}' is missing description")]
    MissingDescription(String),

    #[error("test '{0}' is missing author")]
    MissingAuthor(String),

    #[error("test '{0}' is missing tags")]
    MissingTags(String),

    #[error("test '{0}' is missing function")]
    MissingFunction(String),

    #[error("test '{0}' is already registered")]
    DuplicateName(String),
}

/// Terminal outcome of a suite run that did not fully pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("{failed} of {total} test run(s) failed, please check logs")]
    TestsFailed { failed: usize, total: usize },

    #[error("deadline exceeded, try giving a higher time limit using --limit ({limit})")]
    DeadlineExceeded { limit: String },

    #[error("unable to bootstrap test run: {0}")]
    Bootstrap(String),
}

impl RunError {
    /// Process exit code associated with this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::TestsFailed { .. } | RunError::DeadlineExceeded { .. } => 1,
            RunError::Bootstrap(_) => 2,
        }
    }
}

/// Reason a [`Context`](crate::executor::Context) is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Push assertion failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("unable to connect to event channel: {0}")]
    SubscriptionConnectFailed(String),

    #[error("event channel disconnected while waiting: {0}")]
    SubscriptionDisconnected(String),

    #[error("did not receive a '{event_type}' event for '{identity}' in time")]
    ExpectedEventNotReceived { identity: String, event_type: String },

    #[error("received an unexpected '{event_type}' event for '{identity}'")]
    UnexpectedEventReceived { identity: String, event_type: String },

    #[error("event is not decodable: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::TestsFailed { failed: 1, total: 2 }.exit_code(), 1);
        assert_eq!(
            RunError::DeadlineExceeded {
                limit: "5m".to_string()
            }
            .exit_code(),
            1
        );
        assert_eq!(RunError::Bootstrap("bad".to_string()).exit_code(), 2);
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::MissingAuthor("create namespace".to_string());
        assert_eq!(err.to_string(), "test 'create namespace' is missing author");
    }
}
