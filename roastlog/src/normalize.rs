//! Time axis normalization and display reduction

use crate::config::{EngineConfig, IndexLookup};
use crate::error::IngestWarning;
use crate::models::{AxisOrigin, DisplayWindow, NormalizedAxis, RoastEvent, TimeSeries};

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub axis: NormalizedAxis,
    /// Shifted time axis with sentinel temperatures removed
    pub series: TimeSeries,
    pub warnings: Vec<IngestWarning>,
}

/// Pick the axis origin
///
/// Without an index list the log is taken as already charge-aligned. With
/// one, the charge sample is the origin, falling back to the first sample
/// when charge cannot be resolved.
pub fn axis_origin(timex: &[f64], timeindex: Option<&[i64]>, config: &EngineConfig) -> NormalizedAxis {
    let timeindex = match timeindex {
        Some(ti) => ti,
        None => {
            return NormalizedAxis {
                origin: AxisOrigin::AssumedAligned,
                offset: 0.0,
                charge_index: None,
            }
        }
    };

    match config
        .event_index
        .lookup(RoastEvent::Charge, timeindex, timex.len())
    {
        IndexLookup::Resolved(index) => NormalizedAxis {
            origin: AxisOrigin::Charge,
            offset: timex[index],
            charge_index: Some(index),
        },
        IndexLookup::Unset | IndexLookup::OutOfRange(_) => NormalizedAxis {
            origin: AxisOrigin::FirstSample,
            offset: timex.first().copied().unwrap_or(0.0),
            charge_index: None,
        },
    }
}

/// Shift the time axis so the origin is 0 and drop invalid readings
pub fn normalize(raw: &TimeSeries, timeindex: Option<&[i64]>, config: &EngineConfig) -> Normalized {
    let axis = axis_origin(&raw.timex, timeindex, config);
    let warnings = monotonic_violations(&raw.timex);

    let series = TimeSeries {
        timex: raw.timex.iter().map(|t| t - axis.offset).collect(),
        temp1: raw.temp1.iter().map(|t| config.temperature(*t)).collect(),
        temp2: raw.temp2.iter().map(|t| config.temperature(*t)).collect(),
    };

    tracing::debug!(
        "Normalized {} samples, origin {:?}, offset {}",
        series.len(),
        axis.origin,
        axis.offset
    );

    Normalized {
        axis,
        series,
        warnings,
    }
}

/// One warning per backwards step
pub fn monotonic_violations(timex: &[f64]) -> Vec<IngestWarning> {
    timex
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1] < pair[0])
        .map(|(i, pair)| IngestWarning::NonMonotonicTime {
            index: i + 1,
            previous: pair[0],
            current: pair[1],
        })
        .collect()
}

/// Charting window and its reduced sample set
///
/// The window runs from `-padding` to `drop + padding`, or to the last
/// sample when the drop is unknown. Samples are taken one per
/// `⌈N / max_display_points⌉`-sized block (the first of each block) plus the
/// final sample, then filtered to the window.
pub fn display_window(timex: &[f64], drop_time: Option<f64>, config: &EngineConfig) -> DisplayWindow {
    let padding = config.display_padding_secs;
    let start = -padding;
    let end = match drop_time {
        Some(drop) => drop + padding,
        None => timex.last().copied().unwrap_or(0.0),
    };

    let n = timex.len();
    if n == 0 {
        return DisplayWindow {
            start,
            end,
            indices: Vec::new(),
        };
    }

    let stride = n.div_ceil(config.max_display_points.max(1));
    let mut candidates: Vec<usize> = (0..n).step_by(stride).collect();
    if candidates.last() != Some(&(n - 1)) {
        candidates.push(n - 1);
    }

    let indices = candidates
        .into_iter()
        .filter(|&i| timex[i] >= start && timex[i] <= end)
        .collect();

    DisplayWindow {
        start,
        end,
        indices,
    }
}
