//! Authenticated access to the provider's report endpoints.
//!
//! Every request carries the current bearer token. When the provider rejects it (HTTP 401 or a
//! "token expired" payload) the token is refreshed once and the request is replayed; a second
//! rejection is terminal.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use http::header::{AUTHORIZATION, HeaderValue};
use http::{Request, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::TokenProvider;
use crate::authenticator::HttpAuthenticator;
use crate::cache::{KeyValueStore, TokenCache};
use crate::config::{ClientConfig, ValidatedConfig};
use crate::error::{ApiRequestError, ClientError, ConfigurationError};
use crate::http::client::HttpClient as ReqwestHttpClient;
use crate::http_client::{HttpClient, RequestTimeout};
use crate::report::ReportQuery;
use crate::token::Token;
use crate::token_manager::TokenManager;

const DETAIL_PATH: &str = "Report/InspectionDetail";
const EXPORT_PATH: &str = "Report/InspectionDetailExport";
const DOWNLOAD_PREFIX: &str = "etl_";

/// Report operations exposed to the surrounding application.
pub trait ReportApi {
    /// Queries the inspection details and returns the provider's JSON payload untouched.
    fn query_report_detail(&self, query: &ReportQuery) -> Result<Value, ClientError>;

    /// Downloads the inspection report export into `destination` and returns the file path.
    ///
    /// The file name ends with the extension of `query.file_type`. The whole export is held in
    /// memory before being written, so memory use grows with the report size.
    fn download_inspection_report(
        &self,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<PathBuf, ClientError>;
}

/// Everything released by [`ReportClient::close`].
struct Session<C, T> {
    http_client: C,
    token_provider: T,
}

pub struct ReportClient<C, T>
where
    C: HttpClient,
    T: TokenProvider,
{
    session: Option<Session<C, T>>,
    config: ValidatedConfig,
}

impl<C, T> std::fmt::Debug for ReportClient<C, T>
where
    C: HttpClient,
    T: TokenProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportClient")
            .field("config", &self.config)
            .field("closed", &self.session.is_none())
            .finish()
    }
}

/// Answer to a single authenticated request.
enum Reply {
    Accepted(Response<Vec<u8>>),
    /// HTTP 401 or a "token expired" payload.
    TokenRejected(String),
}

impl<C, T> ReportClient<C, T>
where
    C: HttpClient,
    T: TokenProvider,
{
    /// Fails with a configuration error if the integration is disabled or incomplete.
    pub fn new(
        http_client: C,
        token_provider: T,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        Ok(Self::from_validated(http_client, token_provider, config.validate()?))
    }

    pub fn from_validated(http_client: C, token_provider: T, config: ValidatedConfig) -> Self {
        Self {
            session: Some(Session {
                http_client,
                token_provider,
            }),
            config,
        }
    }

    /// Releases the underlying HTTP connections. Calling it again is a no-op.
    ///
    /// Dropping the client has the same effect.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("HTTP session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    fn session(&self) -> Result<&Session<C, T>, ClientError> {
        self.session
            .as_ref()
            .ok_or(ClientError::Configuration(ConfigurationError::ClientClosed))
    }

    /// Sends a GET to `url`, refreshing the token and replaying the request once if the provider
    /// rejects it.
    fn send_authenticated(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<Response<Vec<u8>>, ClientError> {
        let session = self.session()?;

        let token = session.token_provider.get_valid_token()?;
        let reason = match self.send_once(session, url, &token, timeout)? {
            Reply::Accepted(response) => return Ok(response),
            Reply::TokenRejected(reason) => reason,
        };
        warn!("token rejected ({reason}), attempting to refresh");

        let token = session.token_provider.force_refresh()?;
        match self.send_once(session, url, &token, timeout)? {
            Reply::Accepted(response) => Ok(response),
            Reply::TokenRejected(reason) => Err(ClientError::TokenExpired(format!(
                "token rejected after refresh: {reason}"
            ))),
        }
    }

    fn send_once(
        &self,
        session: &Session<C, T>,
        url: &Url,
        token: &Token,
        timeout: Duration,
    ) -> Result<Reply, ClientError> {
        let request = build_request(url, token, timeout)?;
        let response = session
            .http_client
            .send(request)
            .inspect_err(|e| warn!("API request failed: {e}"))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Reply::TokenRejected(status.to_string()));
        }
        let marker = self.config.token_expired_marker();
        if let Some(message) = token_expired_message(response.body(), marker) {
            return Ok(Reply::TokenRejected(message));
        }
        if !status.is_success() {
            let err = ApiRequestError::unsuccessful(status.as_u16(), response.body());
            warn!("API request failed: {err}");
            return Err(err.into());
        }
        Ok(Reply::Accepted(response))
    }
}

impl<C, T> ReportApi for ReportClient<C, T>
where
    C: HttpClient,
    T: TokenProvider,
{
    fn query_report_detail(&self, query: &ReportQuery) -> Result<Value, ClientError> {
        info!("fetching inspection details");
        let mut url = self.config.endpoint(DETAIL_PATH)?;
        url.query_pairs_mut()
            .extend_pairs(query.detail_params(self.config.default_page_size()));

        let timeout = query.timeout.unwrap_or(self.config.request_timeout());
        let response = self.send_authenticated(&url, timeout)?;

        let data = serde_json::from_slice(response.body()).map_err(|e| {
            ApiRequestError::InvalidResponse(format!("Invalid response format: {e}"))
        })?;
        info!("inspection details retrieved successfully");
        Ok(data)
    }

    fn download_inspection_report(
        &self,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<PathBuf, ClientError> {
        info!("downloading inspection detail report as {}", query.file_type);
        let mut url = self.config.endpoint(EXPORT_PATH)?;
        url.query_pairs_mut()
            .extend_pairs(query.export_params(self.config.default_page_size()));

        let timeout = query.timeout.unwrap_or(self.config.download_timeout());
        let response = self.send_authenticated(&url, timeout)?;

        let path = persist_report(
            response.body(),
            destination,
            query.file_type.extension(),
        )?;
        info!("report downloaded successfully to: {}", path.display());
        Ok(path)
    }
}

fn build_request(
    url: &Url,
    token: &Token,
    timeout: Duration,
) -> Result<Request<Vec<u8>>, ClientError> {
    let mut bearer_token_header = HeaderValue::from_str(&token.bearer()).map_err(|_| {
        ApiRequestError::InvalidResponse(
            "invalid HTTP header value set for Authorization".to_string(),
        )
    })?;
    bearer_token_header.set_sensitive(true);

    let mut request = Request::get(url.as_str())
        .header(AUTHORIZATION, bearer_token_header)
        .body(Vec::new())
        .map_err(|e| ApiRequestError::InvalidResponse(format!("Failed to build request: {e}")))?;
    request.extensions_mut().insert(RequestTimeout(timeout));
    Ok(request)
}

/// Returns the provider's message when `body` is a failure payload reporting an expired token.
fn token_expired_message(body: &[u8], marker: &str) -> Option<String> {
    if marker.is_empty() || !body.trim_ascii_start().starts_with(b"{") {
        return None;
    }
    let payload: Value = serde_json::from_slice(body).ok()?;
    if payload.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let message = payload.get("message").and_then(Value::as_str)?;
    message
        .to_lowercase()
        .contains(marker)
        .then(|| message.to_string())
}

/// Writes `body` to a new file inside `destination`. Nothing is left behind on failure.
fn persist_report(
    body: &[u8],
    destination: &Path,
    extension: &str,
) -> Result<PathBuf, ClientError> {
    if body.is_empty() {
        return Err(ClientError::FileDownload("empty response body".to_string()));
    }

    let suffix = format!(
        "_inspection_report_{}{extension}",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let mut file = tempfile::Builder::new()
        .prefix(DOWNLOAD_PREFIX)
        .suffix(&suffix)
        .tempfile_in(destination)
        .map_err(|e| {
            ClientError::FileDownload(format!("creating file in {}: {e}", destination.display()))
        })?;

    file.write_all(body)
        .and_then(|_| file.flush())
        .map_err(|e| ClientError::FileDownload(format!("writing report: {e}")))?;

    let (_, path) = file
        .keep()
        .map_err(|e| ClientError::FileDownload(format!("keeping report file: {e}")))?;
    Ok(path)
}

/// Client wired with the reqwest transport and a token cache over `S`.
pub type ConfiguredClient<S> = ReportClient<
    ReqwestHttpClient,
    TokenManager<HttpAuthenticator<ReqwestHttpClient>, TokenCache<S>>,
>;

/// Builds a client from the `INSPECTION_API_*` environment configuration.
///
/// Clients built over the same `store` (e.g. an `Arc<InMemoryStore>`) share one token.
pub fn get_configured_client<S>(store: S) -> Result<ConfiguredClient<S>, ClientError>
where
    S: KeyValueStore,
{
    configured_client(&ClientConfig::from_env()?, store)
}

pub fn configured_client<S>(
    config: &ClientConfig,
    store: S,
) -> Result<ConfiguredClient<S>, ClientError>
where
    S: KeyValueStore,
{
    let config = config.validate()?;

    let http_client = ReqwestHttpClient::new(config.http_config())
        .map_err(|e| ConfigurationError::InvalidParameter("http_client", e.to_string()))?;
    let authenticator = HttpAuthenticator::new(
        http_client.clone(),
        config.login_endpoint()?,
        config.default_token_lifetime(),
    )
    .with_timeout(config.auth_timeout());
    let token_manager = TokenManager::new(
        authenticator,
        TokenCache::new(store, config.renewal_buffer()),
        config.credentials().clone(),
    );

    Ok(ReportClient::from_validated(http_client, token_manager, config))
}
