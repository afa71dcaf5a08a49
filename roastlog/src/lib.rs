//! Roast-log ingestion and analytics engine
//!
//! Turns the text written by the Artisan roast recorder (`.alog`, a
//! dictionary-literal document) into a canonical [`RoastRecord`]: event
//! points, phase metrics, a charge-aligned time axis, a smoothed rate-of-rise
//! curve and heater/fan timelines.
//!
//! Every stage is a pure function over its input. The usual entry point is
//! [`ingest`]:
//!
//! ```
//! use roastlog::{ingest_str, EngineConfig};
//!
//! let text = "{'roastUUID': 'abc', 'title': 'Kenya AA', 'roastisodate': '2024-03-01', \
//!             'timex': [0.0, 2.0], 'temp1': [200.0, 190.0], 'temp2': [180.0, 150.0]}";
//! let record = ingest_str(text, &EngineConfig::default()).unwrap();
//! assert_eq!(record.metadata.title, "Kenya AA");
//! ```

pub mod actuators;
pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod phases;
pub mod ror;
pub mod validation;
pub mod value;

pub use config::{EngineConfig, EventIndexMap, IndexLookup};
pub use decoder::{decode, decode_bytes};
pub use error::{ConfigError, IngestError, IngestFailure, IngestResult, IngestWarning};
pub use extract::{extract, ExtractedLog};
pub use ingest::*;
pub use models::*;
pub use value::{Mapping, Value};
