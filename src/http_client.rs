use std::time::Duration;

use http::{Request, Response};

use crate::error::{ApiRequestError, ClientError};

#[derive(thiserror::Error, Debug)]
pub enum HttpClientError {
    /// Represents an http transport crate error.
    #[error("HTTP Transport error: `{0}`")]
    TransportError(String),
    /// Represents an unexpected response.
    #[error("invalid http response: `{0}`")]
    InvalidResponse(String),
}

impl From<HttpClientError> for ApiRequestError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::TransportError(msg) => ApiRequestError::Transport(msg),
            HttpClientError::InvalidResponse(msg) => ApiRequestError::InvalidResponse(msg),
        }
    }
}

impl From<HttpClientError> for ClientError {
    fn from(err: HttpClientError) -> Self {
        ClientError::ApiRequest(err.into())
    }
}

/// Request extension overriding the client-wide timeout for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeout(pub Duration);

/// A synchronous trait that defines the internal methods for HTTP clients.
pub trait HttpClient {
    /// A synchronous function sends a request. The method and url are defined inside the Request.
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>;
}

// Accept closures as HttpClient implementations
impl<F> HttpClient for F
where
    F: Fn(Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError>,
{
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpClientError> {
        self(req)
    }
}
