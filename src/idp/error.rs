use thiserror::Error;

/// Failure of a single identity provider call.
///
/// `Rejected` keeps the provider message as-is; callers surface it to the
/// client without interpreting the code.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{message}")]
    Rejected { code: String, message: String },
    #[error("authentication challenge required: {0}")]
    Challenge(String),
    #[error("identity provider request timed out")]
    Timeout,
    #[error("identity provider request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected identity provider response: {0}")]
    Decode(String),
    #[error("invalid identity provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    /// Provider error code (e.g. `NotAuthorizedException`), if the provider sent one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}
