use sensitivity_core::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status} {message}")]
    Api { status: u16, message: String },

    #[error("token request failed: {0}")]
    Token(String),

    #[error("missing secret: environment variable {0} is not set")]
    MissingSecret(&'static str),

    #[error("invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, GraphClientError>;

impl From<GraphClientError> for ClientError {
    fn from(e: GraphClientError) -> Self {
        match e {
            GraphClientError::Http(source) => {
                ClientError::transport(format!("request failed: {}", describe(&source)), source)
            }
            GraphClientError::Api { status, message } => ClientError::Api { status, message },
            GraphClientError::Token(msg) => ClientError::Auth(msg),
            GraphClientError::MissingSecret(_) | GraphClientError::InvalidConnectionString(_) => {
                ClientError::Auth(e.to_string())
            }
            GraphClientError::InvalidUrl(_) => ClientError::Other(e.to_string()),
        }
    }
}

/// `reqwest` keeps the useful part (refused, timed out, bad certificate) in
/// the source chain, so flatten it into one line.
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Turn a non-success response into [`GraphClientError::Api`].
///
/// Graph, SharePoint and Storage all report errors differently; the message
/// is taken from whichever known shape the body matches, else the raw body.
pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GraphClientError::Api {
        status: status.as_u16(),
        message: error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    })
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(trimmed.to_string());
    };
    // Graph: {"error":{"code","message"}}
    // SharePoint: {"odata.error":{"message":{"value"}}}
    // Token endpoint: {"error","error_description"}
    let graph = value.pointer("/error/message").and_then(|v| v.as_str());
    let sharepoint = value
        .pointer("/odata.error/message/value")
        .and_then(|v| v.as_str());
    let token = value.get("error_description").and_then(|v| v.as_str());
    graph
        .or(sharepoint)
        .or(token)
        .map(str::to_string)
        .or_else(|| Some(trimmed.to_string()))
}
