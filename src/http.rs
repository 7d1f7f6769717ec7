//! reqwest based implementation of [`crate::http_client::HttpClient`].
pub mod client;
pub mod config;
