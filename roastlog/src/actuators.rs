//! Heater and fan timelines from the recorder's special events

use crate::config::EngineConfig;
use crate::error::IngestWarning;
use crate::extract::SpecialEvents;
use crate::models::{ActuatorChange, ActuatorTimeline, ActuatorTimelines};

/// Seconds between samples
///
/// The logged interval when there is one, else the mean spacing of the raw
/// axis, else one second.
pub fn sampling_interval(logged: Option<f64>, raw_timex: &[f64]) -> f64 {
    if let Some(interval) = logged.filter(|i| i.is_finite() && *i > 0.0) {
        return interval;
    }
    match (raw_timex.first(), raw_timex.last()) {
        (Some(first), Some(last)) if raw_timex.len() > 1 => {
            let mean = (last - first) / (raw_timex.len() - 1) as f64;
            if mean.is_finite() && mean > 0.0 {
                mean
            } else {
                1.0
            }
        }
        _ => 1.0,
    }
}

/// Recorder slider value (1-11) to percent
pub fn percent_from_value(value: f64) -> f64 {
    ((value - 1.0) * 10.0).max(0.0)
}

/// Decoded timelines plus warnings for events that could not be placed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedActuators {
    pub timelines: ActuatorTimelines,
    pub warnings: Vec<IngestWarning>,
}

/// Split special events into heater and fan step functions
///
/// Ragged arrays are cut to the shortest one. Changes logged at the same
/// sample keep their original order, so the last one wins.
pub fn decode_special_events(
    events: Option<&SpecialEvents>,
    interval: f64,
    config: &EngineConfig,
) -> DecodedActuators {
    let mut decoded = DecodedActuators::default();
    decoded.timelines.sampling_interval = interval;

    let events = match events {
        Some(e) => e,
        None => return decoded,
    };

    let (n_events, n_types, n_values) = (events.indices.len(), events.types.len(), events.values.len());
    if n_events != n_types || n_types != n_values {
        decoded.warnings.push(IngestWarning::SpecialEventsRagged {
            events: n_events,
            types: n_types,
            values: n_values,
        });
    }

    let mut heater = Vec::new();
    let mut fan = Vec::new();
    let rows = events
        .indices
        .iter()
        .zip(&events.types)
        .zip(&events.values)
        .enumerate();

    for (position, ((&index, &kind), &value)) in rows {
        let target = if kind == config.heater_event_type {
            &mut heater
        } else if kind == config.fan_event_type {
            &mut fan
        } else {
            continue;
        };

        if index < 0 {
            decoded.warnings.push(IngestWarning::SpecialEventIgnored {
                position,
                reason: format!("negative sample index {}", index),
            });
            continue;
        }
        let index = index as usize;
        target.push(ActuatorChange {
            index,
            time: index as f64 * interval,
            percent: percent_from_value(value),
        });
    }

    heater.sort_by_key(|c| c.index);
    fan.sort_by_key(|c| c.index);

    tracing::debug!(
        "Decoded {} heater and {} fan changes",
        heater.len(),
        fan.len()
    );

    decoded.timelines.heater = ActuatorTimeline { changes: heater };
    decoded.timelines.fan = ActuatorTimeline { changes: fan };
    decoded
}
