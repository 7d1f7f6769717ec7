pub mod download;
pub mod list;

use thiserror::Error;

use crate::error::ClientError;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("API request failed: {0}")]
    UnsuccessfulPayload(String),
    #[error("operation failed: {0}")]
    Client(#[from] ClientError),
    #[error("inspecting downloaded file: {0}")]
    DownloadedFile(String),
}
