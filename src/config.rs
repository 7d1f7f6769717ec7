//! Client configuration and its environment backed store.
//!
//! The configuration is resolved once into a [`ValidatedConfig`] snapshot when a client is built.
//! Clients never re-read it; build a new client to pick up changes.
use std::env;
use std::env::VarError;
use std::fmt;
use std::time::Duration;

use chrono::TimeDelta;
use url::Url;

use crate::error::ConfigurationError;
use crate::http::config::{DEFAULT_CONN_TIMEOUT, DEFAULT_USER_AGENT, HttpConfig};

pub const DEFAULT_RENEWAL_BUFFER: Duration = Duration::from_secs(5 * 60);
/// Lifetime assumed when the login response does not declare one.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TOKEN_EXPIRED_MARKER: &str = "token expired";

const ENV_PREFIX: &str = "INSPECTION_API_";

#[derive(Clone, PartialEq, Default)]
pub struct Password(String);

impl<S: AsRef<str>> From<S> for Password {
    fn from(password: S) -> Self {
        Password(password.as_ref().to_string())
    }
}

impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password: redacted")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: Password,
}

/// Raw configuration as read from the configuration store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<Password>,
    pub renewal_buffer: Duration,
    pub default_token_lifetime: Duration,
    pub default_page_size: u32,
    pub auth_timeout: Duration,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub referer: Option<String>,
    pub user_agent: String,
    pub token_expired_marker: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            password: None,
            renewal_buffer: DEFAULT_RENEWAL_BUFFER,
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
            default_page_size: DEFAULT_PAGE_SIZE,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            referer: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token_expired_marker: DEFAULT_TOKEN_EXPIRED_MARKER.to_string(),
        }
    }
}

/// Immutable snapshot of a usable configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    base_url: Url,
    credentials: Credentials,
    renewal_buffer: TimeDelta,
    default_token_lifetime: Duration,
    default_page_size: u32,
    auth_timeout: Duration,
    request_timeout: Duration,
    download_timeout: Duration,
    referer: Option<String>,
    user_agent: String,
    token_expired_marker: String,
}

impl ClientConfig {
    /// Reads the configuration from `INSPECTION_API_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_env_with(|name| env::var(name))
    }

    /// Reads the configuration using the provided `env_var` function. Empty values are treated as
    /// absent.
    pub fn from_env_with<F>(env_var: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let lookup = |name: &str| {
            env_var(&format!("{ENV_PREFIX}{name}"))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let enabled = match lookup("ENABLED") {
            None => defaults.enabled,
            Some(value) => parse_bool(&value)
                .ok_or(ConfigurationError::InvalidParameter("enabled", value))?,
        };
        let seconds = |name: &str, field: &'static str, default: Duration| {
            lookup(name).map_or(Ok(default), |value| {
                value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigurationError::InvalidParameter(field, e.to_string()))
            })
        };

        let default_page_size = match lookup("PAGE_SIZE") {
            None => defaults.default_page_size,
            Some(value) => value
                .parse::<u32>()
                .map_err(|e| ConfigurationError::InvalidParameter("page_size", e.to_string()))?,
        };

        Ok(Self {
            enabled,
            base_url: lookup("BASE_URL"),
            username: lookup("USERNAME"),
            password: lookup("PASSWORD").map(Password::from),
            renewal_buffer: seconds(
                "RENEWAL_BUFFER_SECS",
                "renewal_buffer",
                defaults.renewal_buffer,
            )?,
            default_token_lifetime: seconds(
                "TOKEN_LIFETIME_SECS",
                "default_token_lifetime",
                defaults.default_token_lifetime,
            )?,
            default_page_size,
            auth_timeout: seconds("AUTH_TIMEOUT_SECS", "auth_timeout", defaults.auth_timeout)?,
            request_timeout: seconds("TIMEOUT_SECS", "request_timeout", defaults.request_timeout)?,
            download_timeout: seconds(
                "DOWNLOAD_TIMEOUT_SECS",
                "download_timeout",
                defaults.download_timeout,
            )?,
            referer: lookup("REFERER"),
            user_agent: lookup("USER_AGENT").unwrap_or(defaults.user_agent),
            ..defaults
        })
    }

    /// Checks the configuration can be used to talk to the provider.
    ///
    /// A disabled integration is reported before any missing parameter.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigurationError> {
        if !self.enabled {
            return Err(ConfigurationError::Disabled);
        }
        let base_url = non_empty(self.base_url.as_deref())
            .ok_or(ConfigurationError::MissingParameter("base_url"))?;
        let username = non_empty(self.username.as_deref())
            .ok_or(ConfigurationError::MissingParameter("username"))?;
        let password = self
            .password
            .as_ref()
            .filter(|p| !p.expose().is_empty())
            .ok_or(ConfigurationError::MissingParameter("password"))?;

        // A trailing slash keeps the last path segment when joining endpoint paths.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| ConfigurationError::InvalidParameter("base_url", e.to_string()))?;
        if self.default_page_size == 0 {
            return Err(ConfigurationError::InvalidParameter(
                "page_size",
                "must be positive".into(),
            ));
        }
        let renewal_buffer = TimeDelta::from_std(self.renewal_buffer)
            .map_err(|e| ConfigurationError::InvalidParameter("renewal_buffer", e.to_string()))?;

        Ok(ValidatedConfig {
            base_url,
            credentials: Credentials {
                username: username.to_string(),
                password: password.to_owned(),
            },
            renewal_buffer,
            default_token_lifetime: self.default_token_lifetime,
            default_page_size: self.default_page_size,
            auth_timeout: self.auth_timeout,
            request_timeout: self.request_timeout,
            download_timeout: self.download_timeout,
            referer: self.referer.clone(),
            user_agent: self.user_agent.clone(),
            token_expired_marker: self.token_expired_marker.to_lowercase(),
        })
    }
}

impl ValidatedConfig {
    /// Resolves `path` relative to the API base url.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigurationError> {
        self.base_url
            .join(path)
            .map_err(|e| ConfigurationError::InvalidParameter("base_url", e.to_string()))
    }

    pub fn login_endpoint(&self) -> Result<Url, ConfigurationError> {
        self.endpoint("Security/Login")
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn renewal_buffer(&self) -> TimeDelta {
        self.renewal_buffer
    }

    pub fn default_token_lifetime(&self) -> Duration {
        self.default_token_lifetime
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    pub fn auth_timeout(&self) -> Duration {
        self.auth_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    /// Lowercase marker identifying a "token expired" payload.
    pub fn token_expired_marker(&self) -> &str {
        &self.token_expired_marker
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::new(self.request_timeout, DEFAULT_CONN_TIMEOUT)
            .with_user_agent(self.user_agent.as_str())
            .with_referer(self.referer.clone())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;

    const BASE_URL: &str = "https://api.example.test";

    /// Enabled configuration pointing to `base_url`.
    pub(crate) fn enabled_config(base_url: &str) -> ClientConfig {
        ClientConfig {
            enabled: true,
            base_url: Some(base_url.to_string()),
            username: Some("u".to_string()),
            password: Some(Password::from("p")),
            ..Default::default()
        }
    }

    fn from_map(
        values: HashMap<&'static str, &'static str>,
    ) -> Result<ClientConfig, ConfigurationError> {
        ClientConfig::from_env_with(|k| {
            values
                .get(k)
                .map(|v| v.to_string())
                .ok_or(VarError::NotPresent)
        })
    }

    #[test]
    fn reads_values_from_env() {
        let config = from_map(HashMap::from([
            ("INSPECTION_API_ENABLED", "true"),
            ("INSPECTION_API_BASE_URL", "https://api.example.test"),
            ("INSPECTION_API_USERNAME", "u"),
            ("INSPECTION_API_PASSWORD", "p"),
            ("INSPECTION_API_RENEWAL_BUFFER_SECS", "60"),
            ("INSPECTION_API_PAGE_SIZE", "100"),
            ("INSPECTION_API_DOWNLOAD_TIMEOUT_SECS", "120"),
            ("INSPECTION_API_REFERER", ""),
        ]))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.test"));
        assert_eq!(config.username.as_deref(), Some("u"));
        assert_eq!(config.password, Some(Password::from("p")));
        assert_eq!(config.renewal_buffer, Duration::from_secs(60));
        assert_eq!(config.default_page_size, 100);
        assert_eq!(config.download_timeout, Duration::from_secs(120));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.referer, None);
    }

    #[test]
    fn user_agent_and_auth_timeout_from_env() {
        let config = from_map(HashMap::from([
            ("INSPECTION_API_AUTH_TIMEOUT_SECS", "12"),
            ("INSPECTION_API_USER_AGENT", "etl-worker/2.0"),
        ]))
        .unwrap();

        assert_eq!(config.auth_timeout, Duration::from_secs(12));
        assert_eq!(config.user_agent, "etl-worker/2.0");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn defaults_without_overrides() {
        let config = from_map(HashMap::new()).unwrap();

        assert_eq!(config.auth_timeout, DEFAULT_AUTH_TIMEOUT);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn reads_the_process_environment() {
        // No INSPECTION_API_* variables are set in the test environment.
        let config = ClientConfig::from_env().unwrap();

        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn disabled_by_default() {
        let config = from_map(HashMap::new()).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.validate().unwrap_err(), ConfigurationError::Disabled);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = from_map(HashMap::from([("INSPECTION_API_ENABLED", "maybe")])).unwrap_err();
        assert_matches!(err, ConfigurationError::InvalidParameter("enabled", _));

        let err = from_map(HashMap::from([("INSPECTION_API_TIMEOUT_SECS", "-1")])).unwrap_err();
        assert_matches!(err, ConfigurationError::InvalidParameter("request_timeout", _));
    }

    #[rstest]
    #[case::no_base_url(ClientConfig { base_url: None, ..enabled_config(BASE_URL) }, "base_url")]
    #[case::blank_base_url(
        ClientConfig { base_url: Some("  ".into()), ..enabled_config(BASE_URL) },
        "base_url"
    )]
    #[case::no_username(ClientConfig { username: None, ..enabled_config(BASE_URL) }, "username")]
    #[case::no_password(ClientConfig { password: None, ..enabled_config(BASE_URL) }, "password")]
    #[case::empty_password(
        ClientConfig { password: Some("".into()), ..enabled_config(BASE_URL) },
        "password"
    )]
    fn missing_parameters(#[case] config: ClientConfig, #[case] expected: &str) {
        assert_matches!(config.validate(), Err(ConfigurationError::MissingParameter(name)) => {
            assert_eq!(name, expected)
        });
    }

    #[test]
    fn disabled_wins_over_missing_parameters() {
        let config = ClientConfig {
            enabled: false,
            ..ClientConfig::default()
        };
        assert_eq!(config.validate().unwrap_err(), ConfigurationError::Disabled);
    }

    #[test]
    fn invalid_base_url() {
        let err = enabled_config("not a url").validate().unwrap_err();
        assert_matches!(err, ConfigurationError::InvalidParameter("base_url", _));
    }

    #[rstest]
    #[case("https://api.test", "https://api.test/Security/Login")]
    #[case("https://api.test/oilcm/api", "https://api.test/oilcm/api/Security/Login")]
    #[case("https://api.test/oilcm/api/", "https://api.test/oilcm/api/Security/Login")]
    fn endpoints_keep_the_base_path(#[case] base_url: &str, #[case] expected: &str) {
        let config = enabled_config(base_url).validate().unwrap();
        assert_eq!(config.login_endpoint().unwrap().as_str(), expected);
    }

    #[test]
    fn password_is_redacted() {
        let config = enabled_config(BASE_URL).validate().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("\"p\""));
        assert!(debug.contains("redacted"));
    }
}
