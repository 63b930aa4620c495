use thiserror::Error;

/// Outcome of a failed remote poll. Only two kinds matter to the sync loop.
#[derive(Error, Debug)]
pub enum PollError {
    /// The service rejected the bearer credential (401/403).
    #[error("authorization failed ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Network errors, rate limits, malformed responses and any other status.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl PollError {
    pub fn from_status_code(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized {
                status,
                message: message.into(),
            },
            _ => Self::Transient(format!("HTTP {status}: {}", message.into())),
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, PollError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status_code(status.as_u16(), err.to_string()),
            None => Self::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transient(format!("malformed response: {err}"))
    }
}

#[derive(Error, Debug)]
pub enum LocalTrackError {
    #[error("{0} is not running")]
    NoLocalProcess(String),

    #[error("window titles are not available on this platform")]
    Unsupported,
}

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("window {0} is listed by the window enumeration and cannot be the target")]
    Invalid(crate::model::TargetHandle),

    #[error("no foreground window was sampled")]
    NoForeground,
}
