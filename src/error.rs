//! Errors reported to control surface callers.

use thiserror::Error;

/// Failure of a control surface operation. Carries a human-readable message.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Malformed input; nothing was changed
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("messaging gateway is not connected")]
    NotConnected,

    #[error("gateway error: {0}")]
    Gateway(String),
}

impl ControlError {
    /// Static code for logs and API consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotConnected => "not_connected",
            Self::Gateway(_) => "gateway",
        }
    }
}

impl From<anyhow::Error> for ControlError {
    fn from(err: anyhow::Error) -> Self {
        Self::Gateway(format!("{:#}", err))
    }
}
