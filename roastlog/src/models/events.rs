//! Named roast events

use serde::{Deserialize, Serialize};

/// Roast events, in canonical (chronological) order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RoastEvent {
    Charge,
    TurningPoint,
    DryEnd,
    FirstCrackStart,
    Drop,
}

impl RoastEvent {
    pub const ALL: [RoastEvent; 5] = [
        RoastEvent::Charge,
        RoastEvent::TurningPoint,
        RoastEvent::DryEnd,
        RoastEvent::FirstCrackStart,
        RoastEvent::Drop,
    ];

    /// Key prefix used by the recorder's computed metrics (`DRY_time`, ...)
    pub fn computed_prefix(&self) -> &'static str {
        match self {
            RoastEvent::Charge => "CHARGE",
            RoastEvent::TurningPoint => "TP",
            RoastEvent::DryEnd => "DRY",
            RoastEvent::FirstCrackStart => "FCs",
            RoastEvent::Drop => "DROP",
        }
    }

    /// Column prefix in the flat storage layout (`tp_time`, `fcs_bt`, ...)
    pub fn column_prefix(&self) -> &'static str {
        match self {
            RoastEvent::Charge => "charge",
            RoastEvent::TurningPoint => "tp",
            RoastEvent::DryEnd => "dry",
            RoastEvent::FirstCrackStart => "fcs",
            RoastEvent::Drop => "drop",
        }
    }
}

impl std::fmt::Display for RoastEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoastEvent::Charge => write!(f, "Charge"),
            RoastEvent::TurningPoint => write!(f, "Turning Point"),
            RoastEvent::DryEnd => write!(f, "Dry End"),
            RoastEvent::FirstCrackStart => write!(f, "First Crack Start"),
            RoastEvent::Drop => write!(f, "Drop"),
        }
    }
}

/// Where a resolved event came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// The recorder's computed metrics
    Computed,
    /// The `timeindex` list
    Index,
    /// Found in the bean-temperature curve
    Detected,
}

/// A resolved event: normalized time (charge = 0) and temperatures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventPoint {
    pub time: Option<f64>,
    pub bt: Option<f64>,
    pub et: Option<f64>,
    pub source: EventSource,
    /// Sample index, when the event could be tied to one
    pub index: Option<usize>,
}

/// All named events of one roast
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoastEvents {
    pub charge: Option<EventPoint>,
    pub turning_point: Option<EventPoint>,
    pub dry_end: Option<EventPoint>,
    pub first_crack_start: Option<EventPoint>,
    pub drop: Option<EventPoint>,
}

impl RoastEvents {
    pub fn get(&self, event: RoastEvent) -> Option<&EventPoint> {
        match event {
            RoastEvent::Charge => self.charge.as_ref(),
            RoastEvent::TurningPoint => self.turning_point.as_ref(),
            RoastEvent::DryEnd => self.dry_end.as_ref(),
            RoastEvent::FirstCrackStart => self.first_crack_start.as_ref(),
            RoastEvent::Drop => self.drop.as_ref(),
        }
    }

    pub fn set(&mut self, event: RoastEvent, point: Option<EventPoint>) {
        let slot = match event {
            RoastEvent::Charge => &mut self.charge,
            RoastEvent::TurningPoint => &mut self.turning_point,
            RoastEvent::DryEnd => &mut self.dry_end,
            RoastEvent::FirstCrackStart => &mut self.first_crack_start,
            RoastEvent::Drop => &mut self.drop,
        };
        *slot = point;
    }

    pub fn time(&self, event: RoastEvent) -> Option<f64> {
        self.get(event).and_then(|p| p.time)
    }

    pub fn bt(&self, event: RoastEvent) -> Option<f64> {
        self.get(event).and_then(|p| p.bt)
    }

    /// Resolved events in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (RoastEvent, &EventPoint)> {
        RoastEvent::ALL
            .into_iter()
            .filter_map(move |event| self.get(event).map(|p| (event, p)))
    }
}
