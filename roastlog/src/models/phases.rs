//! Roast phases

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RoastEvent;

/// Roast phases, bounded by consecutive events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Charge to dry end
    Dry,
    /// Dry end to first crack start (Maillard)
    Mid,
    /// First crack start to drop (development)
    Finish,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Dry, Phase::Mid, Phase::Finish];

    /// Opening and closing events
    pub fn bounds(&self) -> (RoastEvent, RoastEvent) {
        match self {
            Phase::Dry => (RoastEvent::Charge, RoastEvent::DryEnd),
            Phase::Mid => (RoastEvent::DryEnd, RoastEvent::FirstCrackStart),
            Phase::Finish => (RoastEvent::FirstCrackStart, RoastEvent::Drop),
        }
    }

    /// Prefix used by the recorder and the storage layout (`dry`, `mid`,
    /// `finish`)
    pub fn key(&self) -> &'static str {
        match self {
            Phase::Dry => "dry",
            Phase::Mid => "mid",
            Phase::Finish => "finish",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Dry => write!(f, "Drying"),
            Phase::Mid => write!(f, "Maillard"),
            Phase::Finish => write!(f, "Development"),
        }
    }
}

/// Derived metrics for one phase; every field is absent when its inputs are
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseMetrics {
    /// Seconds
    pub duration: Option<f64>,
    /// °C per minute over the phase
    pub ror: Option<f64>,
    /// End BT minus start BT
    pub delta_temp: Option<f64>,
    /// Share of total roast time, one decimal place
    pub percentage: Option<Decimal>,
}

/// Derived phase metrics for the whole roast
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoastPhases {
    pub dry: PhaseMetrics,
    pub mid: PhaseMetrics,
    pub finish: PhaseMetrics,
    /// Drop minus charge, or the drop time when charge is unknown
    pub total_time: Option<f64>,
}

impl RoastPhases {
    pub fn get(&self, phase: Phase) -> &PhaseMetrics {
        match phase {
            Phase::Dry => &self.dry,
            Phase::Mid => &self.mid,
            Phase::Finish => &self.finish,
        }
    }

    pub fn get_mut(&mut self, phase: Phase) -> &mut PhaseMetrics {
        match phase {
            Phase::Dry => &mut self.dry,
            Phase::Mid => &mut self.mid,
            Phase::Finish => &mut self.finish,
        }
    }
}
