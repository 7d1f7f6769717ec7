pub mod authenticator;
pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod http_client;
pub mod parameters;
pub mod report;
pub mod token;
pub mod token_manager;

pub use crate::client::{ConfiguredClient, ReportApi, ReportClient, get_configured_client};
pub use crate::error::{ClientError, ErrorKind};
pub use crate::report::{FileType, ReportQuery, SortDirection};

use crate::token::Token;

/// The TokenProvider is responsible for handing out an authorization token that is valid at the
/// time of the call.
pub trait TokenProvider {
    /// Returns the cached token, authenticating first if there is none or it is about to expire.
    fn get_valid_token(&self) -> Result<Token, ClientError>;

    /// Discards any cached token and authenticates again.
    fn force_refresh(&self) -> Result<Token, ClientError>;
}
