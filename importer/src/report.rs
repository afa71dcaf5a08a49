//! Import reports and list exports

use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use roastlog::{BatchReport, FileOutcome, RoastSummary};
use serde::Serialize;

/// Output format, picked from a file extension or flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    /// `.csv` selects CSV, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ReportFormat::Csv,
            _ => ReportFormat::Json,
        }
    }
}

/// One CSV row per file; every column is always present
#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    filename: &'a str,
    status: &'static str,
    roast_uuid: &'a str,
    roast_id: &'a str,
    title: &'a str,
    roast_date: Option<NaiveDate>,
    error_code: &'a str,
    error: &'a str,
}

impl<'a> From<&'a FileOutcome> for OutcomeRow<'a> {
    fn from(outcome: &'a FileOutcome) -> Self {
        Self {
            filename: &outcome.filename,
            status: outcome.status.as_str(),
            roast_uuid: outcome.roast_uuid.as_deref().unwrap_or(""),
            roast_id: outcome.roast_id.as_deref().unwrap_or(""),
            title: outcome.title.as_deref().unwrap_or(""),
            roast_date: outcome.roast_date,
            error_code: outcome.error_code.as_deref().unwrap_or(""),
            error: outcome.error.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    roast_uuid: &'a str,
    title: &'a str,
    roast_date: NaiveDate,
    roast_time: Option<NaiveTime>,
    beans: &'a str,
    operator: &'a str,
    weight_in: Option<f64>,
    drop_bt: Option<f64>,
    total_time: Option<f64>,
    roast_level: &'static str,
}

impl<'a> From<&'a RoastSummary> for SummaryRow<'a> {
    fn from(summary: &'a RoastSummary) -> Self {
        Self {
            roast_uuid: &summary.roast_uuid,
            title: &summary.title,
            roast_date: summary.roast_date,
            roast_time: summary.roast_time,
            beans: summary.beans.as_deref().unwrap_or(""),
            operator: summary.operator.as_deref().unwrap_or(""),
            weight_in: summary.weight_in,
            drop_bt: summary.drop_bt,
            total_time: summary.total_time,
            roast_level: summary.roast_level.map_or("", |level| level.as_str()),
        }
    }
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row).context("CSV serialization error")?;
    }
    let bytes = wtr.into_inner().context("CSV writer error")?;
    String::from_utf8(bytes).context("UTF-8 conversion error")
}

/// Render a batch report
pub fn render_report(report: &BatchReport, format: ReportFormat) -> anyhow::Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Csv => to_csv(report.results.iter().map(OutcomeRow::from)),
    }
}

/// Render a roast list
pub fn render_summaries(summaries: &[RoastSummary], format: ReportFormat) -> anyhow::Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(summaries)?),
        ReportFormat::Csv => to_csv(summaries.iter().map(SummaryRow::from)),
    }
}

/// Write a batch report next to the import, format from the extension
pub fn write_report(report: &BatchReport, path: &Path) -> anyhow::Result<()> {
    let text = render_report(report, ReportFormat::from_path(path))?;
    std::fs::write(path, text).with_context(|| format!("failed to write report {}", path.display()))?;
    tracing::info!("Report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastlog::{BatchStatus, FileStatus, RoastLevel};

    fn report() -> BatchReport {
        BatchReport::new(vec![
            FileOutcome {
                filename: "a.alog".to_string(),
                status: FileStatus::Success,
                roast_uuid: Some("a".to_string()),
                roast_id: Some("id-1".to_string()),
                title: Some("Guji, natural".to_string()),
                roast_date: NaiveDate::from_ymd_opt(2024, 5, 1),
                error_code: None,
                error: None,
            },
            FileOutcome::skipped("b.alog", "a"),
            FileOutcome::error("c.txt", "INVALID_FILE_TYPE", "Invalid file type. Only .alog files are accepted."),
        ])
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("out.CSV")), ReportFormat::Csv);
        assert_eq!(ReportFormat::from_path(Path::new("out.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("out")), ReportFormat::Json);
    }

    #[test]
    fn test_csv_report_has_fixed_columns() {
        let csv = render_report(&report(), ReportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "filename,status,roast_uuid,roast_id,title,roast_date,error_code,error"
        );
        assert_eq!(lines[1], "a.alog,success,a,id-1,\"Guji, natural\",2024-05-01,,");
        assert!(lines[2].starts_with("b.alog,skipped,a,,,,DUPLICATE_IDENTIFIER,"));
    }

    #[test]
    fn test_json_report_carries_summary() {
        let report = report();
        assert_eq!(report.status(), BatchStatus::PartiallyCreated);
        let json: serde_json::Value =
            serde_json::from_str(&render_report(&report, ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["summary"]["total"], 3);
        assert_eq!(json["summary"]["skipped"], 1);
        assert_eq!(json["results"][2]["error_code"], "INVALID_FILE_TYPE");
        assert!(json["results"][0].get("error").is_none());
    }

    #[test]
    fn test_summary_csv() {
        let summaries = vec![RoastSummary {
            roast_uuid: "a".to_string(),
            title: "Kenya".to_string(),
            roast_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            roast_time: None,
            beans: Some("Kenya AA".to_string()),
            weight_in: Some(250.0),
            operator: None,
            drop_bt: Some(208.0),
            total_time: Some(600.0),
            roast_level: Some(RoastLevel::MediumLight),
        }];
        let csv = render_summaries(&summaries, ReportFormat::Csv).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "a,Kenya,2024-05-01,,Kenya AA,,250.0,208.0,600.0,medium-light");
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_report(&report(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("filename,status"));
    }
}
