use crate::campaign::CampaignId;
use crate::service::ServiceError;
use std::fmt;
use thiserror::Error;

/// User-initiated writes (and the one user-initiated read) the synchronizer issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Launch,
    Resume,
    Pause,
    SetCallerPhone,
    GetCallerPhone,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Launch => "launch",
            Command::Resume => "resume",
            Command::Pause => "pause",
            Command::SetCallerPhone => "set_caller_phone",
            Command::GetCallerPhone => "get_caller_phone",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Assign a caller phone number before starting the campaign")]
    MissingCallerNumber,

    #[error("The campaign has no target numbers to call")]
    NoTargets,

    #[error("The campaign is already running")]
    AlreadyLive,

    #[error("Only a running campaign can be stopped")]
    NotLive,

    #[error("Invalid phone number: {0:?}")]
    InvalidPhoneNumber(String),

    #[error("No campaign loaded yet")]
    NotLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Campaign {0} not found")]
    NotFound(CampaignId),

    #[error("Partial data loaded: {0}")]
    LoadFailure(#[source] ServiceError),

    #[error("Refresh failed: {0}")]
    TickFailure(#[source] ServiceError),

    #[error("{command} failed: {error}")]
    CommandFailure {
        command: Command,
        #[source]
        error: ServiceError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Synchronizer has been unmounted")]
    Unmounted,
}

impl SyncError {
    /// Polling failures and unmount races stay out of the notification channel.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, SyncError::TickFailure(_) | SyncError::Unmounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_command() {
        let err = SyncError::CommandFailure {
            command: Command::Pause,
            error: ServiceError::TimeoutError,
        };
        assert_eq!(err.to_string(), "pause failed: Request timeout");
        assert!(err.is_user_visible());
    }

    #[test]
    fn validation_converts_transparently() {
        let err: SyncError = ValidationFailure::NoTargets.into();
        assert_eq!(err.to_string(), "The campaign has no target numbers to call");
        assert!(!SyncError::TickFailure(ServiceError::TimeoutError).is_user_visible());
    }
}
