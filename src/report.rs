use std::fmt;
use std::time::Duration;

pub const DEFAULT_SORT_FIELD: &str = "Id";

/// Export format of a downloaded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    Csv,
    Pdf,
    #[default]
    Excel,
}

impl FileType {
    /// Value of the provider's `fileType` parameter.
    pub fn code(&self) -> u8 {
        match self {
            FileType::Csv => 1,
            FileType::Pdf => 2,
            FileType::Excel => 3,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => ".csv",
            FileType::Pdf => ".pdf",
            FileType::Excel => ".xlsx",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Csv => write!(f, "CSV"),
            FileType::Pdf => write!(f, "PDF"),
            FileType::Excel => write!(f, "Excel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Value of the provider's `sortType` parameter.
    pub fn code(&self) -> u8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => 0,
        }
    }
}

/// Filters, paging and format of a report request.
///
/// Empty `search_text`/`lab_number` mean no filter. A missing or zero `page_size` falls back to
/// the configured default.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub search_text: String,
    pub lab_number: String,
    pub page_number: u32,
    pub page_size: Option<u32>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    /// Only used by downloads.
    pub file_type: FileType,
    /// Deadline for the report request, overriding the configured one.
    pub timeout: Option<Duration>,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            lab_number: String::new(),
            page_number: 0,
            page_size: None,
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_direction: SortDirection::default(),
            file_type: FileType::default(),
            timeout: None,
        }
    }
}

impl ReportQuery {
    pub fn with_search_text(self, search_text: impl Into<String>) -> Self {
        Self {
            search_text: search_text.into(),
            ..self
        }
    }

    pub fn with_lab_number(self, lab_number: impl Into<String>) -> Self {
        Self {
            lab_number: lab_number.into(),
            ..self
        }
    }

    pub fn with_page(self, page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size: Some(page_size),
            ..self
        }
    }

    pub fn with_page_size(self, page_size: u32) -> Self {
        Self {
            page_size: Some(page_size),
            ..self
        }
    }

    pub fn with_sort(self, sort_field: impl Into<String>, sort_direction: SortDirection) -> Self {
        Self {
            sort_field: sort_field.into(),
            sort_direction,
            ..self
        }
    }

    pub fn with_file_type(self, file_type: FileType) -> Self {
        Self { file_type, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Query parameters of the detail endpoint.
    pub fn detail_params(&self, default_page_size: u32) -> Vec<(&'static str, String)> {
        let page_size = self
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(default_page_size);
        vec![
            ("searchText", self.search_text.clone()),
            ("labNumber", self.lab_number.clone()),
            ("pageNumber", self.page_number.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortField", self.sort_field.clone()),
            ("sortType", self.sort_direction.code().to_string()),
        ]
    }

    /// Query parameters of the export endpoint.
    pub fn export_params(&self, default_page_size: u32) -> Vec<(&'static str, String)> {
        let mut params = self.detail_params(default_page_size);
        params.push(("download", "true".to_string()));
        params.push(("fileType", self.file_type.code().to_string()));
        params
    }
}
