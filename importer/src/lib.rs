//! Roast-log importer
//!
//! Reads Artisan `.alog` files, runs them through the `roastlog` engine and
//! keeps the results in a JSON-file store keyed by roast id.

pub mod config;
pub mod error;
pub mod import;
pub mod report;
pub mod store;

pub use config::Config;
pub use error::{ImportError, ImportResult};
pub use import::{discover_logs, find_image, run_import};
pub use store::{DuplicatePolicy, RoastStore, StoreOutcome, StoredRoast};
