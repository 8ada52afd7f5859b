use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensitivityError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("invalid saga transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SensitivityError>;

/// Failure reported by an external collaborator (identity, site, queue).
///
/// Collaborators convert their transport-specific errors into this type so
/// the orchestration layer never sees adapter internals.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{status} {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Messages of every nested cause, outermost first, excluding `self`.
    pub fn causes(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut next = std::error::Error::source(self);
        while let Some(err) = next {
            out.push(err.to_string());
            next = err.source();
        }
        out
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
