//! CSV report of per-user daily visit-plan counts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::users::SalesUser;
use crate::week::{DailyTaskCounts, WeekWindow};

/// One report row: identity columns, one count per window date, then the
/// CRM's total open-task count for the week.
#[derive(Debug, Clone)]
pub struct UserReportRow {
    pub user: SalesUser,
    pub daily: DailyTaskCounts,
    pub total_incomplete: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

pub fn report_filename(window: &WeekWindow) -> String {
    format!("visit_plan_report_{}.csv", window.start_local.format("%Y-%m-%d"))
}

/// Write the rows in processing order. The header is the identity columns,
/// every local date in the window, and the weekly total.
pub fn write_report(
    rows: &[UserReportRow],
    window: &WeekWindow,
    out_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let path = out_dir.join(report_filename(window));
    let mut writer = BufWriter::new(File::create(&path)?);

    let mut header = vec![
        "UserEmail".to_string(),
        "FirstName".to_string(),
        "LastName".to_string(),
    ];
    header.extend(window.local_dates().map(|date| date.format("%Y-%m-%d").to_string()));
    header.push("TotalIncompleteTasks".to_string());
    write_record(&mut writer, &header)?;

    for row in rows {
        let mut record = vec![
            row.user.email_address.clone(),
            row.user.first_name.clone(),
            row.user.last_name.clone(),
        ];
        record.extend(row.daily.values().map(|count| count.to_string()));
        record.push(row.total_incomplete.to_string());
        write_record(&mut writer, &record)?;
    }

    writer.flush()?;
    info!("wrote report with {} rows to {}", rows.len(), path.display());
    Ok(path)
}

fn write_record<W: Write>(writer: &mut W, fields: &[String]) -> Result<(), std::io::Error> {
    let line = fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}")
}

/// RFC 4180 quoting: only fields containing a comma, quote or newline are
/// wrapped, with embedded quotes doubled.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
