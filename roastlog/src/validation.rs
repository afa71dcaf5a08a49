//! Validation utilities for engine settings and import inputs

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::models::RoastEvent;

// ============================================================================
// Engine Settings
// ============================================================================

/// Validate the ROR look-back window (samples)
pub fn validate_ror_window(window: usize) -> Result<(), &'static str> {
    if window == 0 {
        return Err("ROR window must be at least one sample");
    }
    Ok(())
}

/// Validate the moving-average width; centered windows need an odd width
pub fn validate_smoothing_width(width: usize) -> Result<(), &'static str> {
    if width == 0 || width % 2 == 0 {
        return Err("Smoothing width must be a positive odd number");
    }
    Ok(())
}

/// Validate the ROR clamp band (°C/min)
pub fn validate_ror_bounds(min: f64, max: f64) -> Result<(), &'static str> {
    if !min.is_finite() || !max.is_finite() {
        return Err("ROR bounds must be finite");
    }
    if min >= max {
        return Err("ROR lower bound must be below the upper bound");
    }
    Ok(())
}

/// Validate display padding (seconds)
pub fn validate_display_padding(padding: f64) -> Result<(), &'static str> {
    if !padding.is_finite() || padding < 0.0 {
        return Err("Display padding must be a non-negative number of seconds");
    }
    Ok(())
}

pub fn validate_max_display_points(points: usize) -> Result<(), &'static str> {
    if points == 0 {
        return Err("Display must allow at least one point");
    }
    Ok(())
}

/// Validate the computed/index disagreement tolerance (seconds)
pub fn validate_mismatch_tolerance(tolerance: f64) -> Result<(), &'static str> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err("Mismatch tolerance must be a non-negative number of seconds");
    }
    Ok(())
}

pub fn validate_nesting_depth(depth: usize) -> Result<(), &'static str> {
    if !(1..=1024).contains(&depth) {
        return Err("Nesting depth must be between 1 and 1024");
    }
    Ok(())
}

/// Heater and fan must use different special-event type codes
pub fn validate_actuator_codes(heater: i64, fan: i64) -> Result<(), &'static str> {
    if heater == fan {
        return Err("Heater and fan event types must differ");
    }
    Ok(())
}

/// Two events cannot share one `timeindex` slot
pub fn validate_event_index_positions(config: &EngineConfig) -> Result<(), &'static str> {
    let mut positions: Vec<usize> = RoastEvent::ALL
        .into_iter()
        .filter_map(|event| config.event_index.position(event))
        .collect();
    let count = positions.len();
    positions.sort_unstable();
    positions.dedup();
    if positions.len() != count {
        return Err("Each event needs its own timeindex position");
    }
    Ok(())
}

/// Validate every engine setting
pub fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let checks: [(&'static str, Result<(), &'static str>); 9] = [
        ("ror_window", validate_ror_window(config.ror_window)),
        ("smoothing_width", validate_smoothing_width(config.smoothing_width)),
        ("ror_min", validate_ror_bounds(config.ror_min, config.ror_max)),
        ("display_padding_secs", validate_display_padding(config.display_padding_secs)),
        ("max_display_points", validate_max_display_points(config.max_display_points)),
        (
            "event_mismatch_tolerance_secs",
            validate_mismatch_tolerance(config.event_mismatch_tolerance_secs),
        ),
        ("max_nesting_depth", validate_nesting_depth(config.max_nesting_depth)),
        (
            "heater_event_type",
            validate_actuator_codes(config.heater_event_type, config.fan_event_type),
        ),
        ("event_index", validate_event_index_positions(config)),
    ];

    for (field, result) in checks {
        result.map_err(|reason| ConfigError { field, reason })?;
    }
    Ok(())
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine_config(self)
    }
}

// ============================================================================
// Import Inputs
// ============================================================================

fn has_extension(file_name: &str, allowed: &[&str]) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            allowed.iter().any(|a| ext.eq_ignore_ascii_case(a))
        })
}

/// Roast logs must carry the `.alog` extension
pub fn validate_log_file_name(file_name: &str) -> Result<(), &'static str> {
    if !has_extension(file_name, &["alog"]) {
        return Err("Invalid file type. Only .alog files are accepted.");
    }
    Ok(())
}

/// Roast photos may be JPEG or PNG
pub fn validate_image_file_name(file_name: &str) -> Result<(), &'static str> {
    if !has_extension(file_name, &["jpg", "jpeg", "png"]) {
        return Err("Invalid image type. Only .jpg, .jpeg and .png files are accepted.");
    }
    Ok(())
}
