use http::Response as HttpResponse;
use http::header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use http::{Request, Response};
use reqwest::blocking::{Client, Response as BlockingResponse};
use tracing::debug;

use super::config::{DEFAULT_ACCEPT, HttpConfig};
use crate::http_client::{
    HttpClient as ReportHttpClient, HttpClientError as ReportHttpClientError, RequestTimeout,
};

/// Blocking HTTP client holding a single connection pool for its whole lifetime.
///
/// Connections are released when the client is dropped.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a reqwest blocking client according to the provided configuration.
    pub fn new(config: HttpConfig) -> Result<Self, HttpBuildError> {
        let builder = Client::builder()
            .use_rustls_tls() // Use rust-tls backend
            .tls_built_in_native_certs(true) // Load system (native) certificates
            .default_headers(default_headers(&config)?)
            .timeout(config.timeout)
            .connect_timeout(config.conn_timeout);

        let client = builder
            .build()
            .map_err(|err| HttpBuildError::ClientBuilder(err.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, request: Request<Vec<u8>>) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
        let mut req = self
            .client
            .request(request.method().clone(), request.uri().to_string().as_str())
            .headers(request.headers().clone())
            .body(request.body().to_vec());

        if let Some(RequestTimeout(timeout)) = request.extensions().get::<RequestTimeout>() {
            req = req.timeout(*timeout);
        }

        debug!("sending {} {}", request.method(), request.uri().path());
        let res = req
            .send()
            .map_err(|err| HttpResponseError::TransportError(err.to_string()))?;

        try_build_response(res)
    }
}

fn default_headers(config: &HttpConfig) -> Result<HeaderMap, HttpBuildError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .map_err(|err| HttpBuildError::InvalidHeader("User-Agent", err.to_string()))?,
    );
    if let Some(referer) = &config.referer {
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .map_err(|err| HttpBuildError::InvalidHeader("Referer", err.to_string()))?,
        );
    }
    Ok(headers)
}

/// Helper to build a [HttpResponse<Vec<u8>>] from a reqwest's blocking response.
/// It includes status, version, headers and body.
fn try_build_response(res: BlockingResponse) -> Result<HttpResponse<Vec<u8>>, HttpResponseError> {
    let status = res.status();
    let version = res.version();
    let headers = res.headers().clone();

    let body: Vec<u8> = res
        .bytes()
        .map_err(|err| {
            // The connection failing while streaming the body is still a transport failure.
            // Without compression features a decode error can only come from the stream.
            if err.is_timeout()
                || err.is_body()
                || err.is_decode()
                || err.is_request()
                || err.is_connect()
            {
                HttpResponseError::TransportError(err.to_string())
            } else {
                HttpResponseError::ReadingResponse(err.to_string())
            }
        })?
        .into();

    let mut response_builder = http::Response::builder().status(status).version(version);
    if let Some(response_headers) = response_builder.headers_mut() {
        *response_headers = headers;
    }

    let response = response_builder
        .body(body)
        .map_err(|err| HttpResponseError::BuildingResponse(err.to_string()))?;

    Ok(response)
}

impl ReportHttpClient for HttpClient {
    fn send(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, ReportHttpClientError> {
        let response = self.send(req)?;

        Ok(response)
    }
}

impl From<HttpResponseError> for ReportHttpClientError {
    fn from(err: HttpResponseError) -> Self {
        match err {
            HttpResponseError::TransportError(msg) => ReportHttpClientError::TransportError(msg),
            HttpResponseError::BuildingResponse(msg) | HttpResponseError::ReadingResponse(msg) => {
                ReportHttpClientError::InvalidResponse(msg)
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HttpBuildError {
    #[error("could not build the http client: {0}")]
    ClientBuilder(String),
    #[error("invalid value for header `{0}`: {1}")]
    InvalidHeader(&'static str, String),
}

#[derive(thiserror::Error, Debug)]
enum HttpResponseError {
    #[error("could read response body: {0}")]
    ReadingResponse(String),
    #[error("could build response: {0}")]
    BuildingResponse(String),
    #[error("http transport error: `{0}`")]
    TransportError(String),
}
