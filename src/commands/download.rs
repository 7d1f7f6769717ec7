use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::CommandError;
use crate::client::ReportApi;
use crate::report::ReportQuery;

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub file_path: PathBuf,
    pub file_size: u64,
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report downloaded successfully to:\n{}\nFile size: {} bytes",
            self.file_path.display(),
            self.file_size
        )
    }
}

pub struct DownloadCommand<'a, R>
where
    R: ReportApi,
{
    api: &'a R,
}

impl<'a, R> DownloadCommand<'a, R>
where
    R: ReportApi,
{
    pub fn new(api: &'a R) -> Self {
        Self { api }
    }

    pub fn download(
        &self,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<DownloadOutcome, CommandError> {
        let file_path = self.api.download_inspection_report(query, destination)?;
        let file_size = fs::metadata(&file_path)
            .map_err(|e| CommandError::DownloadedFile(format!("{}: {e}", file_path.display())))?
            .len();
        debug!("downloaded {file_size} bytes");

        Ok(DownloadOutcome {
            file_path,
            file_size,
        })
    }
}
