//! WebAssembly bindings for the roast-log engine
//!
//! Lets a browser page parse an `.alog` file before uploading it and chart
//! the result without a server round trip:
//! - Full ingestion to a chart-ready view
//! - Batch pre-check with the same per-file report the importer writes
//! - Rate of rise, roast level and weight loss helpers

use roastlog::validation::validate_log_file_name;
use roastlog::{
    calculate_weight_loss, classify_roast_level, ingest_batch, ingest_str, ror::compute_ror,
    EngineConfig, RoastRecord, SourceFile,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// What a chart page needs from one log
#[derive(Debug, Serialize)]
pub struct RoastView {
    pub record: serde_json::Map<String, serde_json::Value>,
    pub summary: roastlog::RoastSummary,
    pub display: roastlog::DisplaySeries,
    pub warnings: Vec<String>,
}

impl From<&RoastRecord> for RoastView {
    fn from(record: &RoastRecord) -> Self {
        let mut flat = record.to_flat_map();
        flat.remove("raw_data");
        Self {
            record: flat,
            summary: record.summary(),
            display: record.display_series(),
            warnings: record.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// One file handed over from a file input
#[derive(Debug, Deserialize)]
struct UploadFile {
    name: String,
    text: String,
}

fn engine_config(config_json: Option<String>) -> Result<EngineConfig, String> {
    let config = match config_json.as_deref() {
        None | Some("") => EngineConfig::default(),
        Some(text) => serde_json::from_str(text).map_err(|e| format!("Invalid engine config: {}", e))?,
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Parse one log into its chart view, as JSON text
pub fn roast_view_json(text: &str, config: &EngineConfig) -> Result<String, String> {
    let record = ingest_str(text, config).map_err(|e| e.to_string())?;
    serde_json::to_string(&RoastView::from(&record)).map_err(|e| e.to_string())
}

/// Ingest a JSON array of `{name, text}` files into a batch report, as JSON text
pub fn batch_report_json(files_json: &str, config: &EngineConfig) -> Result<String, String> {
    let files: Vec<UploadFile> =
        serde_json::from_str(files_json).map_err(|e| format!("Invalid files JSON: {}", e))?;
    let sources: Vec<SourceFile> = files
        .into_iter()
        .map(|f| SourceFile::new(f.name, f.text.into_bytes()))
        .collect();
    let (_, report) = ingest_batch(&sources, config, |_| false);
    serde_json::to_string(&report).map_err(|e| e.to_string())
}

/// Smoothed rate of rise; NaN marks missing readings in and out
pub fn ror_series(times: &[f64], bt: &[f64], config: &EngineConfig) -> Vec<f64> {
    let readings: Vec<Option<f64>> = bt.iter().map(|&t| config.temperature(Some(t))).collect();
    let len = times.len().min(readings.len());
    compute_ror(&times[..len], &readings[..len], config)
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect()
}

fn to_js(json: Result<String, String>) -> Result<JsValue, JsValue> {
    let text = json.map_err(|e| JsValue::from_str(&e))?;
    js_sys::JSON::parse(&text)
}

// ============================================================================
// Exports
// ============================================================================

/// Parse an `.alog` file's text
///
/// `config_json` is an optional engine configuration; missing fields take
/// their defaults. Ingestion warnings are echoed to the console.
#[wasm_bindgen]
pub fn parse_roast_log(text: &str, config_json: Option<String>) -> Result<JsValue, JsValue> {
    let config = engine_config(config_json).map_err(|e| JsValue::from_str(&e))?;
    let view = to_js(roast_view_json(text, &config))?;
    if let Ok(warnings) = js_sys::Reflect::get(&view, &JsValue::from_str("warnings")) {
        let warnings = js_sys::Array::from(&warnings);
        for warning in warnings.iter() {
            web_sys::console::warn_1(&warning);
        }
    }
    Ok(view)
}

/// Pre-check several files: `[{name, text}]` in, batch report out
#[wasm_bindgen]
pub fn check_roast_logs(files_json: &str) -> Result<JsValue, JsValue> {
    to_js(batch_report_json(files_json, &EngineConfig::default()))
}

#[wasm_bindgen]
pub fn compute_rate_of_rise(times: Vec<f64>, bt: Vec<f64>) -> Vec<f64> {
    ror_series(&times, &bt, &EngineConfig::default())
}

/// Roast level for a drop bean temperature, e.g. `medium-light`
#[wasm_bindgen]
pub fn roast_level_for_drop_temp(drop_bt: f64) -> String {
    classify_roast_level(drop_bt).as_str().to_string()
}

/// Weight loss percentage to one decimal; NaN unless both weights are positive
#[wasm_bindgen]
pub fn calculate_roast_weight_loss(weight_in: f64, weight_out: f64) -> f64 {
    calculate_weight_loss(weight_in, weight_out)
        .and_then(|loss| loss.to_f64())
        .unwrap_or(f64::NAN)
}

/// `None` when the name is acceptable, otherwise the message to show
#[wasm_bindgen]
pub fn check_log_file_name(name: &str) -> Option<String> {
    validate_log_file_name(name).err().map(str::to_string)
}
