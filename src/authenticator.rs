use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use http::header::CONTENT_TYPE;
use http::{Request, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Credentials;
use crate::error::{ApiRequestError, ClientError};
use crate::http_client::{HttpClient, HttpClientError, RequestTimeout};
use crate::token::{AccessToken, Clock, SystemClock, Token};

#[derive(Error, Debug)]
pub enum AuthenticateError {
    /// The identity endpoint refused the credentials.
    #[error("credentials rejected: `{0}`")]
    Rejected(String),
    #[error("unable to serialize request: `{0}`")]
    SerializeError(String),
    #[error("unable to deserialize token: `{0}`")]
    DeserializeError(String),
    #[error("identity server error: Status code: `{0}`, Reason: `{1}`")]
    HttpResponseError(u16, String),
    #[error("http transport error: `{0}`")]
    HttpTransportError(String),
}

impl From<HttpClientError> for AuthenticateError {
    fn from(value: HttpClientError) -> Self {
        match value {
            HttpClientError::TransportError(e) => AuthenticateError::HttpTransportError(e),
            HttpClientError::InvalidResponse(e) => AuthenticateError::DeserializeError(e),
        }
    }
}

impl From<AuthenticateError> for ClientError {
    fn from(err: AuthenticateError) -> Self {
        match err {
            AuthenticateError::Rejected(msg) => ClientError::Authentication(msg),
            AuthenticateError::HttpTransportError(msg) => {
                ClientError::ApiRequest(ApiRequestError::Transport(msg))
            }
            AuthenticateError::HttpResponseError(status, body) => {
                ClientError::ApiRequest(ApiRequestError::unsuccessful(status, body.as_bytes()))
            }
            AuthenticateError::SerializeError(msg) | AuthenticateError::DeserializeError(msg) => {
                ClientError::ApiRequest(ApiRequestError::InvalidResponse(msg))
            }
        }
    }
}

/// Obtains a new bearer token from the identity endpoint.
///
/// Implementations never retry, the caller owns the retry policy.
pub trait Authenticator {
    fn authenticate(&self, credentials: &Credentials) -> Result<Token, AuthenticateError>;
}

/// The Authenticator is responsible for obtaining a valid bearer token from the provider's login
/// endpoint.
pub struct HttpAuthenticator<C, K = SystemClock> {
    /// HTTP client
    http_client: C,
    /// Login endpoint URL
    url: Url,
    /// Lifetime assumed when the response does not declare one.
    default_lifetime: Duration,
    timeout: Option<Duration>,
    clock: K,
}

impl<C> HttpAuthenticator<C, SystemClock> {
    pub fn new(http_client: C, url: Url, default_lifetime: Duration) -> Self {
        Self {
            http_client,
            url,
            default_lifetime,
            timeout: None,
            clock: SystemClock,
        }
    }
}

impl<C, K> HttpAuthenticator<C, K> {
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_clock<K2>(self, clock: K2) -> HttpAuthenticator<C, K2> {
        HttpAuthenticator {
            http_client: self.http_client,
            url: self.url,
            default_lifetime: self.default_lifetime,
            timeout: self.timeout,
            clock,
        }
    }
}

impl<C, K> Authenticator for HttpAuthenticator<C, K>
where
    C: HttpClient,
    K: Clock,
{
    /// Executes a POST request to the login endpoint with the credentials as JSON body.
    fn authenticate(&self, credentials: &Credentials) -> Result<Token, AuthenticateError> {
        info!("authenticating user: {}", credentials.username);

        let request = build_request(&self.url, credentials, self.timeout)?;
        let response = self.http_client.send(request).inspect_err(|e| {
            warn!("authentication request failed: {e}");
        })?;

        let login = evaluate_response(response)?;
        let token = build_token(login, self.default_lifetime, self.clock.now())?;

        info!("authentication successful");
        debug!("token expires at {}", token.expires_at());
        Ok(token)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub user_name: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<LoginData>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    /// The lifetime in seconds of the access token.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn build_request(
    url: &Url,
    credentials: &Credentials,
    timeout: Option<Duration>,
) -> Result<Request<Vec<u8>>, AuthenticateError> {
    let body = serde_json::to_vec(&LoginRequest {
        user_name: &credentials.username,
        password: credentials.password.expose(),
        remember_me: false,
    })
    .map_err(|e| AuthenticateError::SerializeError(e.to_string()))?;

    let mut request = Request::post(url.as_str())
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| AuthenticateError::SerializeError(format!("Failed to build request: {e}")))?;
    if let Some(timeout) = timeout {
        request.extensions_mut().insert(RequestTimeout(timeout));
    }
    Ok(request)
}

fn evaluate_response(res: Response<Vec<u8>>) -> Result<LoginResponse, AuthenticateError> {
    let status = res.status();
    let body = res.body();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(AuthenticateError::Rejected(format!(
            "identity server answered {status}"
        )));
    }
    if !status.is_success() {
        return Err(AuthenticateError::HttpResponseError(
            status.as_u16(),
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| AuthenticateError::DeserializeError(e.to_string()))
}

fn build_token(
    login: LoginResponse,
    default_lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<Token, AuthenticateError> {
    let data = login.data.unwrap_or_default();
    let Some(access_token) = data.access_token.filter(|t| !t.is_empty()) else {
        let message = login.message.filter(|m| !m.is_empty());
        if login.success == Some(false) || message.is_some() {
            return Err(AuthenticateError::Rejected(
                message.unwrap_or_else(|| "login unsuccessful".to_string()),
            ));
        }
        return Err(AuthenticateError::DeserializeError(
            "no token received from authentication".to_string(),
        ));
    };

    let lifetime = data
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or(default_lifetime);
    let time_delta = TimeDelta::from_std(lifetime)
        .map_err(|e| AuthenticateError::DeserializeError(e.to_string()))?;
    let expires_at = now.checked_add_signed(time_delta).ok_or_else(|| {
        AuthenticateError::DeserializeError("Failed to calculate expiration time".to_string())
    })?;

    Ok(Token::new(access_token, expires_at))
}
