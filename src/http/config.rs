use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
pub const DEFAULT_USER_AGENT: &str =
    concat!("inspection-report-client/", env!("CARGO_PKG_VERSION"));

/// Settings for the HTTP transport shared by every request of a client.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) user_agent: String,
    pub(crate) referer: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            conn_timeout: DEFAULT_CONN_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: None,
        }
    }
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration) -> Self {
        Self {
            timeout,
            conn_timeout,
            ..Default::default()
        }
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..self
        }
    }

    /// Some provider deployments require requests to look like they come from their web portal.
    pub fn with_referer(self, referer: Option<String>) -> Self {
        Self { referer, ..self }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
