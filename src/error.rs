use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RemedyError {
    SubmissionError(String),
    SchedulerError(String),
    ReactorError(String),
    ConfigurationError(String),
}

impl fmt::Display for RemedyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemedyError::SubmissionError(msg) => write!(f, "Submission error: {msg}"),
            RemedyError::SchedulerError(msg) => write!(f, "Scheduler error: {msg}"),
            RemedyError::ReactorError(msg) => write!(f, "Reactor error: {msg}"),
            RemedyError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for RemedyError {}

impl From<crate::scheduler::SubmissionError> for RemedyError {
    fn from(err: crate::scheduler::SubmissionError) -> Self {
        RemedyError::SubmissionError(err.to_string())
    }
}

impl From<crate::scheduler::UnknownPolicy> for RemedyError {
    fn from(err: crate::scheduler::UnknownPolicy) -> Self {
        RemedyError::SchedulerError(err.to_string())
    }
}

impl From<crate::reactor::ReactorError> for RemedyError {
    fn from(err: crate::reactor::ReactorError) -> Self {
        RemedyError::ReactorError(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for RemedyError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        RemedyError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemedyError>;
