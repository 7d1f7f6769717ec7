use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::report::{FileType, ReportQuery};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the inspection records matching the filters instead of downloading a file.
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Download the inspection detail report.
    Download {
        #[command(flatten)]
        filters: FilterArgs,

        /// Export format of the report
        #[arg(long, value_enum, default_value_t = FileTypeArg::Excel)]
        file_type: FileTypeArg,

        /// Folder where the report is written. Defaults to the system temporary directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Text to search for in reports
    #[arg(long, default_value = "")]
    search_text: String,

    /// Laboratory number to filter by
    #[arg(long, default_value = "")]
    lab_number: String,

    /// Number of records per page. Defaults to the configured page size.
    #[arg(long)]
    page_size: Option<u32>,
}

impl FilterArgs {
    pub fn to_query(&self) -> ReportQuery {
        let query = ReportQuery::default()
            .with_search_text(&self.search_text)
            .with_lab_number(&self.lab_number);
        match self.page_size {
            Some(page_size) => query.with_page_size(page_size),
            None => query,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum FileTypeArg {
    #[value(name = "csv")]
    Csv,
    #[value(name = "pdf")]
    Pdf,
    #[value(name = "excel")]
    Excel,
}

impl From<FileTypeArg> for FileType {
    fn from(value: FileTypeArg) -> Self {
        match value {
            FileTypeArg::Csv => FileType::Csv,
            FileTypeArg::Pdf => FileType::Pdf,
            FileTypeArg::Excel => FileType::Excel,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn list_filters_build_the_query() {
        let cli = TestCli::try_parse_from([
            "cli",
            "list",
            "--search-text",
            "oil",
            "--lab-number",
            "LAB123",
            "--page-size",
            "10",
        ])
        .unwrap();

        let Commands::List { filters } = cli.command else {
            panic!("expected the list command");
        };
        assert_eq!(
            filters.to_query(),
            ReportQuery::default()
                .with_search_text("oil")
                .with_lab_number("LAB123")
                .with_page_size(10)
        );
    }

    #[test]
    fn download_defaults() {
        let cli = TestCli::try_parse_from(["cli", "download"]).unwrap();

        let Commands::Download {
            filters,
            file_type,
            output_dir,
        } = cli.command
        else {
            panic!("expected the download command");
        };
        assert_eq!(file_type, FileTypeArg::Excel);
        assert_eq!(output_dir, None);
        assert_eq!(filters.to_query(), ReportQuery::default());
    }

    #[rstest]
    #[case("csv", FileType::Csv)]
    #[case("pdf", FileType::Pdf)]
    #[case("excel", FileType::Excel)]
    fn file_type_values(#[case] value: &str, #[case] expected: FileType) {
        let cli = TestCli::try_parse_from(["cli", "download", "--file-type", value]).unwrap();

        let Commands::Download { file_type, .. } = cli.command else {
            panic!("expected the download command");
        };
        assert_eq!(FileType::from(file_type), expected);
    }

    #[test]
    fn unknown_file_type_is_rejected() {
        assert!(TestCli::try_parse_from(["cli", "download", "--file-type", "xml"]).is_err());
    }
}
