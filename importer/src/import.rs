//! Batch import: discover logs, ingest in parallel, store in input order

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roastlog::validation::{validate_image_file_name, validate_log_file_name};
use roastlog::{ingest, BatchReport, EngineConfig, FileOutcome, RoastRecord};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use crate::error::{ImportError, ImportResult};
use crate::store::{DuplicatePolicy, RoastStore, StoreOutcome};

/// Expand inputs into a file list
///
/// Directories contribute their `.alog` files (not recursive), sorted by
/// name. Files named directly are kept as given so a wrong extension shows
/// up in the report.
pub fn discover_logs(inputs: &[PathBuf]) -> ImportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            let entries = std::fs::read_dir(input).map_err(|e| ImportError::io(input, e))?;
            for entry in entries {
                let path = entry.map_err(|e| ImportError::io(input, e))?.path();
                if path.is_file() && validate_log_file_name(&file_name(&path)).is_ok() {
                    found.push(path);
                }
            }
            found.sort();
            tracing::debug!("Found {} logs in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Photo stored next to a log under the same stem, first by name
pub fn find_image(log: &Path) -> Option<PathBuf> {
    let stem = log.file_stem()?;
    let dir = match log.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.file_stem() == Some(stem)
                && validate_image_file_name(&file_name(path)).is_ok()
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A file read and ingested, not yet stored
struct Prepared {
    name: String,
    bytes: Vec<u8>,
    image: Option<PathBuf>,
    record: ImportResult<RoastRecord>,
}

fn prepare(path: &Path, engine: &EngineConfig) -> Prepared {
    let name = file_name(path);
    let mut prepared = Prepared {
        name: name.clone(),
        bytes: Vec::new(),
        image: None,
        record: Err(ImportError::InvalidFileType { filename: name.clone() }),
    };
    if validate_log_file_name(&name).is_err() {
        return prepared;
    }

    match std::fs::read(path) {
        Ok(bytes) => {
            prepared.record = ingest(&bytes, engine).map_err(ImportError::from);
            prepared.bytes = bytes;
            prepared.image = find_image(path);
        }
        Err(e) => prepared.record = Err(ImportError::io(path, e)),
    }
    prepared
}

/// Parsed files allowed to wait for the ordered store step
pub fn prefetch_window(concurrency: usize) -> usize {
    concurrency.max(1) * 2
}

type PrepareHandle = JoinHandle<Result<Prepared, JoinError>>;

fn spawn_prepare(path: PathBuf, engine: Arc<EngineConfig>, semaphore: Arc<Semaphore>) -> (String, PrepareHandle) {
    let name = file_name(&path);
    let handle = tokio::spawn(async move {
        let _permit = semaphore.acquire_owned().await;
        tokio::task::spawn_blocking(move || prepare(&path, &engine)).await
    });
    (name, handle)
}

/// Import every file and report one outcome per file, in input order
///
/// Parsing runs on the blocking pool, at most `concurrency` files at a
/// time, and at most [`prefetch_window`] parsed files wait in memory.
/// Records are stored sequentially in input order so the first of two
/// files sharing a roast id is the one that is kept under
/// [`DuplicatePolicy::Skip`].
pub async fn run_import(
    files: Vec<PathBuf>,
    store: &mut RoastStore,
    engine: Arc<EngineConfig>,
    concurrency: usize,
    policy: DuplicatePolicy,
) -> BatchReport {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let window = prefetch_window(concurrency);
    let mut files = files.into_iter();
    let mut pending: VecDeque<(String, PrepareHandle)> = VecDeque::with_capacity(window);
    let mut report = BatchReport::default();

    loop {
        while pending.len() < window {
            match files.next() {
                Some(path) => pending.push_back(spawn_prepare(path, engine.clone(), semaphore.clone())),
                None => break,
            }
        }
        let Some((name, handle)) = pending.pop_front() else {
            break;
        };

        let outcome = match handle.await {
            Ok(Ok(prepared)) => store_prepared(store, prepared, policy),
            Ok(Err(e)) | Err(e) => {
                tracing::error!("Import task for {} failed: {}", name, e);
                FileOutcome::error(&name, "INTERNAL_ERROR", e.to_string())
            }
        };
        report.push(outcome);
    }

    tracing::info!(
        "Import finished: {} total, {} success, {} skipped, {} error",
        report.summary.total,
        report.summary.success,
        report.summary.skipped,
        report.summary.error
    );
    report
}

fn store_prepared(store: &mut RoastStore, prepared: Prepared, policy: DuplicatePolicy) -> FileOutcome {
    let Prepared {
        name,
        bytes,
        image,
        record,
    } = prepared;

    let result = record.and_then(|record| {
        store
            .save(&record, &name, &bytes, image.as_deref(), policy)
            .map(|outcome| (record, outcome))
    });

    match result {
        Ok((record, outcome)) => {
            match outcome {
                StoreOutcome::Created(id) => tracing::info!("Imported {} as {}", name, id),
                StoreOutcome::Updated(id) => tracing::info!("Updated {} from {}", id, name),
            }
            FileOutcome::success(&name, &record, Some(outcome.id().to_string()))
        }
        Err(ImportError::DuplicateIdentifier { roast_uuid }) => {
            tracing::info!("Skipping {}: roast {} already exists", name, roast_uuid);
            FileOutcome::skipped(&name, &roast_uuid)
        }
        Err(e) => {
            tracing::warn!("Failed to import {}: {}", name, e);
            FileOutcome::error(&name, e.code(), e.to_string())
        }
    }
}
