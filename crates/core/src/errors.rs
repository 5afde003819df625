use thiserror::Error;

use crate::domain::submission::LoaStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid LOA transition from {from:?} to {to:?}")]
    InvalidStatusTransition { from: LoaStatus, to: LoaStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("required channel `{0}` was not found")]
    MissingChannel(String),
    #[error("optional channel `{0}` was not found")]
    MissingOptionalChannel(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

/// How an error surfaces once an interaction has been accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Reported to the invoking user with an ephemeral reply.
    UserVisible,
    /// Written to the process log only.
    Logged,
    /// Skipped without a trace beyond debug logging.
    Silent,
}

impl ApplicationError {
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::MissingChannel(_) => ErrorDisposition::UserVisible,
            Self::MissingOptionalChannel(_) => ErrorDisposition::Silent,
            Self::Domain(_) | Self::Integration(_) => ErrorDisposition::Logged,
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::MissingChannel(_) => "missing_channel",
            Self::MissingOptionalChannel(_) => "missing_optional_channel",
            Self::Integration(_) => "integration",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::submission::LoaStatus;
    use crate::errors::{ApplicationError, DomainError, ErrorDisposition};

    #[test]
    fn missing_review_channel_is_user_visible() {
        let error = ApplicationError::MissingChannel("loa-review".to_owned());
        assert_eq!(error.disposition(), ErrorDisposition::UserVisible);
        assert!(error.to_string().contains("loa-review"));
    }

    #[test]
    fn remote_failures_are_logged_only() {
        let error = ApplicationError::Integration("503 from edit message".to_owned());
        assert_eq!(error.disposition(), ErrorDisposition::Logged);
    }

    #[test]
    fn missing_log_channel_is_silent() {
        let error = ApplicationError::MissingOptionalChannel("loa-logs".to_owned());
        assert_eq!(error.disposition(), ErrorDisposition::Silent);
    }

    #[test]
    fn domain_errors_convert_and_log() {
        let error = ApplicationError::from(DomainError::InvalidStatusTransition {
            from: LoaStatus::Approved,
            to: LoaStatus::Denied,
        });

        assert_eq!(error.disposition(), ErrorDisposition::Logged);
        assert_eq!(error.error_class(), "domain");
    }
}
