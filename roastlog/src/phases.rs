//! Event resolution and phase metrics
//!
//! An event is read from the recorder's computed metrics first and from the
//! `timeindex` list second, field by field. The turning point can also be
//! detected on the bean-temperature curve. Phases are then derived from the
//! resolved events.

use rust_decimal::Decimal;

use crate::config::{EngineConfig, IndexLookup};
use crate::error::IngestWarning;
use crate::models::{
    round_one_decimal, ComputedMetrics, EventPoint, EventSource, Phase, PhaseMetrics, RoastEvent,
    RoastEvents, RoastPhases, TimeSeries,
};

/// Resolved events plus what was noticed along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEvents {
    pub events: RoastEvents,
    pub warnings: Vec<IngestWarning>,
}

/// Resolve every named event against a normalized series
pub fn resolve_events(
    computed: &ComputedMetrics,
    timeindex: Option<&[i64]>,
    series: &TimeSeries,
    config: &EngineConfig,
) -> ResolvedEvents {
    let mut resolved = ResolvedEvents::default();

    for event in RoastEvent::ALL {
        let from_computed = computed_point(computed, event, config);
        let from_index = timeindex.and_then(|ti| {
            index_point(event, ti, series, config, &mut resolved.warnings)
        });

        if let (Some(c), Some(i)) = (&from_computed, &from_index) {
            if let (Some(computed_time), Some(index_time)) = (c.time, i.time) {
                if (computed_time - index_time).abs() > config.event_mismatch_tolerance_secs {
                    resolved.warnings.push(IngestWarning::EventSourceMismatch {
                        event,
                        computed_time,
                        index_time,
                    });
                }
            }
        }

        let point = match (from_computed, from_index) {
            (Some(c), Some(i)) => Some(EventPoint {
                time: c.time.or(i.time),
                bt: c.bt.or(i.bt),
                et: c.et.or(i.et),
                source: EventSource::Computed,
                index: i.index,
            }),
            (c, i) => c.or(i),
        };
        resolved.events.set(event, point);
    }

    if resolved.events.time(RoastEvent::TurningPoint).is_none() {
        let charge_index = timeindex.and_then(|ti| {
            match config
                .event_index
                .lookup(RoastEvent::Charge, ti, series.len())
            {
                IndexLookup::Resolved(i) => Some(i),
                _ => None,
            }
        });
        if let Some(charge_index) = charge_index {
            let end_index = [RoastEvent::DryEnd, RoastEvent::FirstCrackStart, RoastEvent::Drop]
                .into_iter()
                .find_map(|ev| resolved.events.get(ev).and_then(|p| p.index))
                .unwrap_or(series.len().saturating_sub(1));
            if let Some(tp) = detect_turning_point(series, charge_index, end_index) {
                let point = match resolved.events.get(RoastEvent::TurningPoint) {
                    Some(existing) => EventPoint {
                        time: tp.time,
                        bt: existing.bt.or(tp.bt),
                        et: existing.et.or(tp.et),
                        source: existing.source,
                        index: tp.index,
                    },
                    None => tp,
                };
                resolved.events.set(RoastEvent::TurningPoint, Some(point));
            }
        }
    }

    resolved.warnings.extend(check_event_order(&resolved.events));
    resolved
}

/// An event from the computed metrics; `None` when nothing usable is there
fn computed_point(
    computed: &ComputedMetrics,
    event: RoastEvent,
    config: &EngineConfig,
) -> Option<EventPoint> {
    let raw = computed.event(event);
    let bt = config.temperature(raw.bt);
    let et = config.temperature(raw.et);
    let time = match event {
        // Charge is the origin of every computed time.
        RoastEvent::Charge => (bt.is_some() || et.is_some()).then_some(0.0),
        _ => raw.time,
    };
    if time.is_none() && bt.is_none() && et.is_none() {
        return None;
    }
    Some(EventPoint {
        time,
        bt,
        et,
        source: EventSource::Computed,
        index: None,
    })
}

fn index_point(
    event: RoastEvent,
    timeindex: &[i64],
    series: &TimeSeries,
    config: &EngineConfig,
    warnings: &mut Vec<IngestWarning>,
) -> Option<EventPoint> {
    match config.event_index.lookup(event, timeindex, series.len()) {
        IndexLookup::Resolved(index) => Some(EventPoint {
            time: Some(series.timex[index]),
            bt: series.bt(index),
            et: series.et(index),
            source: EventSource::Index,
            index: Some(index),
        }),
        IndexLookup::OutOfRange(index) => {
            warnings.push(IngestWarning::EventIndexOutOfRange {
                event,
                index,
                series_len: series.len(),
            });
            None
        }
        IndexLookup::Unset => None,
    }
}

/// First minimum of valid BT strictly after charge, up to `end_index`
pub fn detect_turning_point(
    series: &TimeSeries,
    charge_index: usize,
    end_index: usize,
) -> Option<EventPoint> {
    let last = end_index.min(series.len().checked_sub(1)?);
    let mut lowest: Option<(usize, f64)> = None;
    for i in charge_index..=last {
        if let Some(bt) = series.bt(i) {
            if lowest.map_or(true, |(_, low)| bt < low) {
                lowest = Some((i, bt));
            }
        }
    }

    let (index, bt) = lowest.filter(|(i, _)| *i > charge_index)?;
    Some(EventPoint {
        time: Some(series.timex[index]),
        bt: Some(bt),
        et: series.et(index),
        source: EventSource::Detected,
        index: Some(index),
    })
}

/// Timed events must not run backwards; each adjacent inversion is reported
pub fn check_event_order(events: &RoastEvents) -> Vec<IngestWarning> {
    let timed: Vec<(RoastEvent, f64)> = events
        .iter()
        .filter_map(|(event, point)| point.time.map(|t| (event, t)))
        .collect();

    timed
        .windows(2)
        .filter(|pair| pair[1].1 < pair[0].1)
        .map(|pair| IngestWarning::EventOrderViolation {
            earlier: pair[0].0,
            later: pair[1].0,
            earlier_time: pair[0].1,
            later_time: pair[1].1,
        })
        .collect()
}

/// Share of the total, one decimal place; absent when the total is not positive
pub fn phase_percentage(duration: f64, total: f64) -> Option<Decimal> {
    if total <= 0.0 {
        return None;
    }
    round_one_decimal(duration / total * 100.0)
}

/// Phase durations, temperature deltas, rates and shares
pub fn derive_phases(events: &RoastEvents) -> RoastPhases {
    let total_time = match (events.time(RoastEvent::Charge), events.time(RoastEvent::Drop)) {
        (Some(charge), Some(drop)) => Some(drop - charge),
        (None, Some(drop)) => Some(drop),
        _ => None,
    };

    let mut phases = RoastPhases {
        total_time,
        ..Default::default()
    };

    for phase in Phase::ALL {
        let (start, end) = phase.bounds();
        let duration = match (events.time(start), events.time(end)) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        };
        let delta_temp = match (events.bt(start), events.bt(end)) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        };
        let ror = match (delta_temp, duration) {
            (Some(delta), Some(d)) if d > 0.0 => Some(delta / (d / 60.0)),
            _ => None,
        };
        let percentage = match (duration, total_time) {
            (Some(d), Some(total)) => phase_percentage(d, total),
            _ => None,
        };

        *phases.get_mut(phase) = PhaseMetrics {
            duration,
            ror,
            delta_temp,
            percentage,
        };
    }

    phases
}
