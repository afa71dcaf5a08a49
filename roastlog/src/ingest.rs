//! Ingestion pipeline and batch contract
//!
//! Stages run strictly forward: decode, extract, normalize, resolve events,
//! derive phases, compute ROR, decode actuators, reduce for display. Batch
//! callers get one [`FileOutcome`] per input and a [`BatchSummary`]; one bad
//! file never stops the rest.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::actuators::{decode_special_events, sampling_interval};
use crate::config::EngineConfig;
use crate::decoder::decode_bytes;
use crate::error::{IngestError, IngestFailure, IngestResult};
use crate::extract::{extract, ExtractedLog};
use crate::models::{DerivedSeries, RoastEvent, RoastRecord};
use crate::normalize::{display_window, normalize};
use crate::phases::{derive_phases, resolve_events};
use crate::ror::compute_ror;
use crate::validation::validate_log_file_name;
use crate::value::Value;

/// Ingest one log from raw bytes
#[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
pub fn ingest(bytes: &[u8], config: &EngineConfig) -> IngestResult<RoastRecord> {
    let document = decode_bytes(bytes, config.max_nesting_depth)?;
    tracing::debug!("Decoded {} top-level fields", document.as_mapping().map_or(0, |m| m.len()));
    ingest_value(document, config)
}

pub fn ingest_str(text: &str, config: &EngineConfig) -> IngestResult<RoastRecord> {
    ingest(text.as_bytes(), config)
}

/// Run every stage after decoding; the tree is kept as the raw payload
pub fn ingest_value(document: Value, config: &EngineConfig) -> IngestResult<RoastRecord> {
    let ExtractedLog {
        metadata,
        computed,
        series: raw,
        timeindex,
        special_events,
        sampling_interval: logged_interval,
        mut warnings,
    } = extract(&document)?;
    tracing::debug!(
        "Extracted roast {} with {} samples",
        metadata.roast_uuid,
        raw.len()
    );

    let normalized = normalize(&raw, timeindex.as_deref(), config);
    warnings.extend(normalized.warnings);
    let series = normalized.series;

    let resolved = resolve_events(&computed, timeindex.as_deref(), &series, config);
    warnings.extend(resolved.warnings);
    let events = resolved.events;
    let phases = derive_phases(&events);
    tracing::debug!(
        "Resolved {} events, total time {:?}",
        events.iter().count(),
        phases.total_time
    );

    let ror = compute_ror(&series.timex, &series.temp2, config);

    let interval = sampling_interval(logged_interval, &raw.timex);
    let actuators = decode_special_events(special_events.as_ref(), interval, config);
    warnings.extend(actuators.warnings);
    let timelines = actuators.timelines;

    let derived = DerivedSeries {
        ror,
        heater: timelines.heater.sample(series.len()),
        fan: timelines.fan.sample(series.len()),
    };

    let display = display_window(&series.timex, events.time(RoastEvent::Drop), config);

    for warning in &warnings {
        tracing::warn!("Roast {}: {}", metadata.roast_uuid, warning);
    }
    tracing::info!(
        "Ingested roast {} ({}), {} warnings",
        metadata.roast_uuid,
        metadata.title,
        warnings.len()
    );

    Ok(RoastRecord {
        metadata,
        computed,
        events,
        phases,
        axis: normalized.axis,
        series,
        derived,
        actuators: timelines,
        display,
        warnings,
        raw_data: document,
    })
}

/// A named log as handed over by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Ingest one source, tagging a failure with its name
pub fn ingest_named(source: &SourceFile, config: &EngineConfig) -> Result<RoastRecord, IngestFailure> {
    ingest(&source.bytes, config).map_err(|error| IngestFailure {
        source_name: source.name.clone(),
        error,
    })
}

/// Ingest many sources on `workers` scoped threads; results keep input order
pub fn ingest_batch_parallel(
    sources: &[SourceFile],
    config: &EngineConfig,
    workers: usize,
) -> Vec<Result<RoastRecord, IngestFailure>> {
    if sources.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, sources.len());
    let chunk_size = sources.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|source| ingest_named(source, config))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

// ============================================================================
// Batch Contract
// ============================================================================

/// Per-file outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    /// The roast identifier already exists
    Skipped,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Success => "success",
            FileStatus::Skipped => "skipped",
            FileStatus::Error => "error",
        }
    }
}

/// Result line for one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roast_uuid: Option<String>,
    /// Identifier assigned by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roast_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roast_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn success(filename: &str, record: &RoastRecord, roast_id: Option<String>) -> Self {
        Self {
            filename: filename.to_string(),
            status: FileStatus::Success,
            roast_uuid: Some(record.metadata.roast_uuid.clone()),
            roast_id,
            title: Some(record.metadata.title.clone()),
            roast_date: Some(record.metadata.roast_date),
            error_code: None,
            error: None,
        }
    }

    pub fn skipped(filename: &str, roast_uuid: &str) -> Self {
        Self {
            filename: filename.to_string(),
            status: FileStatus::Skipped,
            roast_uuid: Some(roast_uuid.to_string()),
            roast_id: None,
            title: None,
            roast_date: None,
            error_code: Some("DUPLICATE_IDENTIFIER".to_string()),
            error: Some(format!("Roast with UUID {} already exists", roast_uuid)),
        }
    }

    pub fn error(filename: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            status: FileStatus::Error,
            roast_uuid: None,
            roast_id: None,
            title: None,
            roast_date: None,
            error_code: Some(code.to_string()),
            error: Some(message.into()),
        }
    }

    pub fn from_ingest_error(filename: &str, error: &IngestError) -> Self {
        Self::error(filename, error.code(), error.to_string())
    }
}

/// Counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

/// Overall result of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every file produced a record
    Created,
    /// Some did, some did not
    PartiallyCreated,
    /// None did
    Failed,
}

impl BatchStatus {
    /// Matching HTTP status for an upload endpoint
    pub fn http_status(&self) -> u16 {
        match self {
            BatchStatus::Created => 201,
            BatchStatus::PartiallyCreated => 207,
            BatchStatus::Failed => 400,
        }
    }
}

/// Per-file results and their summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<FileOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn new(results: Vec<FileOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in results {
            report.push(outcome);
        }
        report
    }

    pub fn push(&mut self, outcome: FileOutcome) {
        self.summary.total += 1;
        match outcome.status {
            FileStatus::Success => self.summary.success += 1,
            FileStatus::Skipped => self.summary.skipped += 1,
            FileStatus::Error => self.summary.error += 1,
        }
        self.results.push(outcome);
    }

    /// An empty batch created nothing and counts as failed
    pub fn status(&self) -> BatchStatus {
        let BatchSummary { total, success, .. } = self.summary;
        if total > 0 && success == total {
            BatchStatus::Created
        } else if success == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartiallyCreated
        }
    }
}

/// Ingest a batch in order, enforcing identifier uniqueness
///
/// `exists` reports identifiers the caller already holds. A repeated
/// identifier inside the batch is skipped as well; the first occurrence wins.
pub fn ingest_batch<F>(
    sources: &[SourceFile],
    config: &EngineConfig,
    mut exists: F,
) -> (Vec<RoastRecord>, BatchReport)
where
    F: FnMut(&str) -> bool,
{
    let mut records = Vec::new();
    let mut report = BatchReport::default();
    let mut seen = HashSet::new();

    for source in sources {
        if let Err(message) = validate_log_file_name(&source.name) {
            report.push(FileOutcome::error(&source.name, "INVALID_FILE_TYPE", message));
            continue;
        }

        match ingest(&source.bytes, config) {
            Ok(record) => {
                let uuid = record.metadata.roast_uuid.clone();
                if exists(&uuid) || !seen.insert(uuid.clone()) {
                    tracing::info!("Skipping {}: roast {} already exists", source.name, uuid);
                    report.push(FileOutcome::skipped(&source.name, &uuid));
                } else {
                    report.push(FileOutcome::success(&source.name, &record, None));
                    records.push(record);
                }
            }
            Err(error) => {
                tracing::warn!("Failed to ingest {}: {}", source.name, error);
                report.push(FileOutcome::from_ingest_error(&source.name, &error));
            }
        }
    }

    (records, report)
}
