//! Time series carried by a roast record

use serde::{Deserialize, Serialize};

/// Charge-aligned sensor series; all three vectors have the same length
///
/// Temperatures are `None` wherever the recorder logged the invalid-reading
/// sentinel or a non-positive value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeSeries {
    pub timex: Vec<f64>,
    /// Environment temperature (ET)
    pub temp1: Vec<Option<f64>>,
    /// Bean temperature (BT)
    pub temp2: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.timex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timex.is_empty()
    }

    pub fn bt(&self, index: usize) -> Option<f64> {
        self.temp2.get(index).copied().flatten()
    }

    pub fn et(&self, index: usize) -> Option<f64> {
        self.temp1.get(index).copied().flatten()
    }
}

/// What the normalized axis is anchored to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrigin {
    /// Shifted so that the charge sample sits at 0
    Charge,
    /// No index list: the log is taken as already charge-aligned
    AssumedAligned,
    /// Index list without a usable charge: shifted to the first sample
    FirstSample,
}

/// The shift applied to the recorder's raw timestamps
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalizedAxis {
    pub origin: AxisOrigin,
    /// Raw time of the origin; normalized = raw - offset
    pub offset: f64,
    pub charge_index: Option<usize>,
}

/// Step change of an actuator level
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorChange {
    /// Sample index the change was logged at
    pub index: usize,
    /// Absolute elapsed time (index × sampling interval)
    pub time: f64,
    pub percent: f64,
}

/// Sparse step function of one actuator, ordered by index
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActuatorTimeline {
    pub changes: Vec<ActuatorChange>,
}

impl ActuatorTimeline {
    /// Level at a sample: the latest change at or before it, else 0
    pub fn level_at_index(&self, index: usize) -> f64 {
        let after = self.changes.partition_point(|c| c.index <= index);
        if after == 0 {
            0.0
        } else {
            self.changes[after - 1].percent
        }
    }

    /// One level per sample
    pub fn sample(&self, len: usize) -> Vec<f64> {
        (0..len).map(|i| self.level_at_index(i)).collect()
    }
}

/// Decoded heater and fan timelines
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActuatorTimelines {
    pub heater: ActuatorTimeline,
    pub fan: ActuatorTimeline,
    /// Seconds between samples used to place changes in time
    pub sampling_interval: f64,
}

/// Per-sample analytics, aligned one-to-one with [`TimeSeries`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DerivedSeries {
    /// Smoothed rate of rise, °C/min
    pub ror: Vec<Option<f64>>,
    /// Heater level, percent
    pub heater: Vec<f64>,
    /// Fan level, percent
    pub fan: Vec<f64>,
}

/// The practical charting window and its reduced sample set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisplayWindow {
    /// Normalized seconds
    pub start: f64,
    /// Normalized seconds
    pub end: f64,
    /// Sample indices to plot, ascending
    pub indices: Vec<usize>,
}

/// Series projected onto the display indices
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisplaySeries {
    pub time: Vec<f64>,
    pub et: Vec<Option<f64>>,
    pub bt: Vec<Option<f64>>,
    pub ror: Vec<Option<f64>>,
    pub heater: Vec<f64>,
    pub fan: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(changes: &[(usize, f64)]) -> ActuatorTimeline {
        ActuatorTimeline {
            changes: changes
                .iter()
                .map(|&(index, percent)| ActuatorChange {
                    index,
                    time: index as f64 * 2.0,
                    percent,
                })
                .collect(),
        }
    }

    #[test]
    fn test_level_before_first_change_is_zero() {
        let heater = timeline(&[(10, 60.0)]);
        assert_eq!(heater.level_at_index(0), 0.0);
        assert_eq!(heater.level_at_index(9), 0.0);
        assert_eq!(heater.level_at_index(10), 60.0);
    }

    #[test]
    fn test_last_value_wins() {
        let heater = timeline(&[(2, 40.0), (5, 70.0), (5, 80.0), (8, 0.0)]);
        assert_eq!(heater.sample(10), vec![0.0, 0.0, 40.0, 40.0, 40.0, 80.0, 80.0, 80.0, 0.0, 0.0]);
    }

    #[test]
    fn test_series_accessors() {
        let series = TimeSeries {
            timex: vec![0.0, 2.0],
            temp1: vec![Some(200.0), None],
            temp2: vec![None, Some(150.0)],
        };
        assert_eq!(series.len(), 2);
        assert_eq!(series.bt(0), None);
        assert_eq!(series.bt(1), Some(150.0));
        assert_eq!(series.et(0), Some(200.0));
        assert_eq!(series.bt(5), None);
    }
}
