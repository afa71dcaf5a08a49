//! Metrics as the recorder computed them

use serde::{Deserialize, Serialize};

use super::{Phase, RoastEvent};

/// One event as reported in the `computed` sub-mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputedEvent {
    pub time: Option<f64>,
    pub bt: Option<f64>,
    pub et: Option<f64>,
}

/// Phase metrics as logged, kept for audit next to the derived ones
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggedPhase {
    pub time: Option<f64>,
    pub ror: Option<f64>,
    pub delta_temp: Option<f64>,
}

/// The `computed` sub-mapping, typed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputedMetrics {
    pub charge: ComputedEvent,
    pub turning_point: ComputedEvent,
    pub dry_end: ComputedEvent,
    pub first_crack_start: ComputedEvent,
    pub drop: ComputedEvent,
    pub total_time: Option<f64>,
    pub total_ror: Option<f64>,
    pub fcs_ror: Option<f64>,
    pub weight_out: Option<f64>,
    pub weight_loss: Option<f64>,
    pub dry_phase: LoggedPhase,
    pub mid_phase: LoggedPhase,
    pub finish_phase: LoggedPhase,
}

impl ComputedMetrics {
    pub fn event(&self, event: RoastEvent) -> &ComputedEvent {
        match event {
            RoastEvent::Charge => &self.charge,
            RoastEvent::TurningPoint => &self.turning_point,
            RoastEvent::DryEnd => &self.dry_end,
            RoastEvent::FirstCrackStart => &self.first_crack_start,
            RoastEvent::Drop => &self.drop,
        }
    }

    pub fn event_mut(&mut self, event: RoastEvent) -> &mut ComputedEvent {
        match event {
            RoastEvent::Charge => &mut self.charge,
            RoastEvent::TurningPoint => &mut self.turning_point,
            RoastEvent::DryEnd => &mut self.dry_end,
            RoastEvent::FirstCrackStart => &mut self.first_crack_start,
            RoastEvent::Drop => &mut self.drop,
        }
    }

    pub fn phase(&self, phase: Phase) -> &LoggedPhase {
        match phase {
            Phase::Dry => &self.dry_phase,
            Phase::Mid => &self.mid_phase,
            Phase::Finish => &self.finish_phase,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut LoggedPhase {
        match phase {
            Phase::Dry => &mut self.dry_phase,
            Phase::Mid => &mut self.mid_phase,
            Phase::Finish => &mut self.finish_phase,
        }
    }
}
