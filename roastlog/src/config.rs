//! Engine configuration
//!
//! Every numeric constant the derivation stages use lives here so that output
//! parity can be checked against a known configuration. The defaults match
//! the reference charting behaviour for Artisan logs.

use serde::{Deserialize, Serialize};

use crate::decoder::DEFAULT_MAX_DEPTH;
use crate::models::RoastEvent;

/// Tunables for a single ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Look-back for the rate-of-rise derivative, in samples
    pub ror_window: usize,

    /// Width of the centered moving average applied after the derivative
    pub smoothing_width: usize,

    /// Lower display bound for the rate of rise (°C/min)
    pub ror_min: f64,

    /// Upper display bound for the rate of rise (°C/min)
    pub ror_max: f64,

    /// Seconds shown before charge and after drop
    pub display_padding_secs: f64,

    /// Upper bound on display samples before the window filter
    pub max_display_points: usize,

    /// The recorder's "invalid reading" marker
    pub temperature_sentinel: f64,

    /// Special-event type code for heater changes
    pub heater_event_type: i64,

    /// Special-event type code for fan changes
    pub fan_event_type: i64,

    /// Allowed disagreement between computed and indexed event times
    pub event_mismatch_tolerance_secs: f64,

    pub max_nesting_depth: usize,

    /// Which `timeindex` position holds which event
    pub event_index: EventIndexMap,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ror_window: 15,
            smoothing_width: 7,
            ror_min: -5.0,
            ror_max: 25.0,
            display_padding_secs: 30.0,
            max_display_points: 300,
            temperature_sentinel: -1.0,
            heater_event_type: 3,
            fan_event_type: 0,
            event_mismatch_tolerance_secs: 2.0,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
            event_index: EventIndexMap::default(),
        }
    }
}

impl EngineConfig {
    /// A reading is usable only when it is finite, positive and not the
    /// sentinel.
    pub fn is_valid_temperature(&self, reading: f64) -> bool {
        reading.is_finite() && reading > 0.0 && reading != self.temperature_sentinel
    }

    /// Sentinel-aware view of a temperature
    pub fn temperature(&self, reading: Option<f64>) -> Option<f64> {
        reading.filter(|r| self.is_valid_temperature(*r))
    }
}

/// Positions of named events inside the `timeindex` list
///
/// `None` means the event is never read from the index list. The default is
/// the Artisan layout `[CHARGE, DRY END, FCs, FCe, SCs, SCe, DROP, COOL]`,
/// which has no slot for the turning point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventIndexMap {
    pub charge: Option<usize>,
    pub turning_point: Option<usize>,
    pub dry_end: Option<usize>,
    pub first_crack_start: Option<usize>,
    pub drop: Option<usize>,
}

impl Default for EventIndexMap {
    fn default() -> Self {
        Self {
            charge: Some(0),
            turning_point: None,
            dry_end: Some(1),
            first_crack_start: Some(2),
            drop: Some(6),
        }
    }
}

/// Outcome of looking an event up in the index list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLookup {
    /// Not mapped, list too short, or the recorder marked it unset
    Unset,
    Resolved(usize),
    /// Set, but pointing past the end of the series
    OutOfRange(i64),
}

impl EventIndexMap {
    pub fn position(&self, event: RoastEvent) -> Option<usize> {
        match event {
            RoastEvent::Charge => self.charge,
            RoastEvent::TurningPoint => self.turning_point,
            RoastEvent::DryEnd => self.dry_end,
            RoastEvent::FirstCrackStart => self.first_crack_start,
            RoastEvent::Drop => self.drop,
        }
    }

    /// Resolve an event to a sample index
    ///
    /// The recorder writes `-1` for an unset charge and `0` for every other
    /// unset event, since only charge can legitimately sit on sample 0.
    pub fn lookup(&self, event: RoastEvent, timeindex: &[i64], series_len: usize) -> IndexLookup {
        let raw = match self.position(event).and_then(|p| timeindex.get(p)) {
            Some(raw) => *raw,
            None => return IndexLookup::Unset,
        };
        let unset = match event {
            RoastEvent::Charge => raw < 0,
            _ => raw <= 0,
        };
        if unset {
            IndexLookup::Unset
        } else if raw as u64 >= series_len as u64 {
            IndexLookup::OutOfRange(raw)
        } else {
            IndexLookup::Resolved(raw as usize)
        }
    }
}
