use thiserror::Error;

/// Max amount of response body bytes kept in an [`ApiRequestError::UnsuccessfulResponse`].
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Closed set of failures returned by the report client.
///
/// Every public operation fails with one of these variants. Callers are expected to branch on
/// [`ClientError::kind`] (or match the variant) instead of inspecting the message.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The integration is disabled, misconfigured or the client was already closed.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The identity endpoint rejected the configured credentials.
    #[error("authentication failed: `{0}`")]
    Authentication(String),
    /// The token was rejected again after a forced refresh.
    #[error("token rejected after refresh: `{0}`")]
    TokenExpired(String),
    /// Unsuccessful HTTP response or transport failure.
    #[error("api request failed: {0}")]
    ApiRequest(#[from] ApiRequestError),
    /// The response was successful but its body could not be persisted.
    #[error("downloading file: `{0}`")]
    FileDownload(String),
}

/// Fieldless mirror of [`ClientError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    TokenExpired,
    ApiRequest,
    FileDownload,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Configuration(_) => ErrorKind::Configuration,
            ClientError::Authentication(_) => ErrorKind::Authentication,
            ClientError::TokenExpired(_) => ErrorKind::TokenExpired,
            ClientError::ApiRequest(_) => ErrorKind::ApiRequest,
            ClientError::FileDownload(_) => ErrorKind::FileDownload,
        }
    }

    /// Whether the failure happened before any HTTP response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::ApiRequest(e) if e.is_transport())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("the inspection report integration is disabled")]
    Disabled,
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("invalid value for `{0}`: `{1}`")]
    InvalidParameter(&'static str, String),
    #[error("the client has been closed")]
    ClientClosed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiRequestError {
    /// Connection refused, timeout, DNS failure...
    #[error("http transport error: `{0}`")]
    Transport(String),
    #[error("Status code: `{status}`, Body: `{body}`")]
    UnsuccessfulResponse { status: u16, body: String },
    #[error("invalid http response: `{0}`")]
    InvalidResponse(String),
}

impl ApiRequestError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiRequestError::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiRequestError::UnsuccessfulResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds an [`ApiRequestError::UnsuccessfulResponse`] keeping only an excerpt of the body.
    pub fn unsuccessful(status: u16, body: &[u8]) -> Self {
        ApiRequestError::UnsuccessfulResponse {
            status,
            body: body_excerpt(body),
        }
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_EXCERPT_LIMIT {
        return text.into_owned();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
