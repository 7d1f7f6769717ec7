use std::fmt;

use serde_json::Value;

use super::CommandError;
use crate::client::ReportApi;
use crate::report::ReportQuery;

const NOT_AVAILABLE: &str = "N/A";

/// One line of the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub lab_number: String,
    pub client_name: String,
    pub sample_date: String,
}

impl RecordSummary {
    fn from_record(record: &Value) -> Self {
        Self {
            lab_number: field(record, "labNumber"),
            client_name: field(record, "clientName"),
            sample_date: field(record, "sampleDate"),
        }
    }
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - Lab: {} | Client: {} | Date: {}",
            self.lab_number, self.client_name, self.sample_date
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportListing {
    pub total_records: u64,
    pub records: Vec<RecordSummary>,
}

impl fmt::Display for ReportListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} records, showing {}:",
            self.total_records,
            self.records.len()
        )?;
        for record in &self.records {
            write!(f, "\n{record}")?;
        }
        Ok(())
    }
}

pub struct ListCommand<'a, R>
where
    R: ReportApi,
{
    api: &'a R,
}

impl<'a, R> ListCommand<'a, R>
where
    R: ReportApi,
{
    pub fn new(api: &'a R) -> Self {
        Self { api }
    }

    /// Fetches the matching records. A payload reporting `success: false` is an error carrying
    /// the provider's message.
    pub fn list(&self, query: &ReportQuery) -> Result<ReportListing, CommandError> {
        let data = self.api.query_report_detail(query)?;

        if data.get("success").and_then(Value::as_bool) != Some(true) {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(CommandError::UnsuccessfulPayload(message.to_string()));
        }

        let records = data
            .get("data")
            .and_then(Value::as_array)
            .map(|records| records.iter().map(RecordSummary::from_record).collect())
            .unwrap_or_default();

        Ok(ReportListing {
            total_records: data
                .get("totalRecords")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
            records,
        })
    }
}

fn field(record: &Value, name: &str) -> String {
    match record.get(name) {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(value)) => value.clone(),
        Some(other) => other.to_string(),
    }
}
