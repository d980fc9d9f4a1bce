// src/export.rs
use chrono::NaiveDate;
use thiserror::Error;

use crate::aggregate::HoursSummary;
use crate::records::Employee;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV writing failed")]
    Csv(#[from] csv::Error),
    #[error("CSV buffer could not be flushed: {0}")]
    Flush(String),
    #[error("CSV output was not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Payroll sheet: one row per employee with a column per week group (labelled by
/// the week's first date), the period total, and the flagged week count.
pub fn hours_csv(
    week_starts: &[NaiveDate],
    rows: &[(Employee, HoursSummary)],
) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["employee_id".to_string(), "name".to_string()];
    header.extend(week_starts.iter().map(|d| format!("week_of_{}", d)));
    header.push("total".to_string());
    header.push("weeks_over_threshold".to_string());
    writer.write_record(&header)?;

    for (employee, summary) in rows {
        let mut record = vec![employee.id.to_string(), employee.name.clone()];
        record.extend(summary.weekly.iter().map(|h| h.normalize().to_string()));
        record.push(summary.total.normalize().to_string());
        record.push(summary.over_threshold_weeks.len().to_string());
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
