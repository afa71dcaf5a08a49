//! Canonical roast record

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    ActuatorTimelines, ComputedMetrics, DerivedSeries, DisplaySeries, DisplayWindow,
    NormalizedAxis, Phase, RoastEvent, RoastEvents, RoastPhases, TimeSeries,
};
use crate::error::IngestWarning;
use crate::value::Value;

/// Scalar facts about a roast, as logged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoastMetadata {
    /// Recorder-assigned identifier; unique across all roasts
    pub roast_uuid: String,
    pub title: String,
    pub roast_date: NaiveDate,
    pub roast_time: Option<NaiveTime>,
    pub roast_epoch: Option<i64>,
    pub operator: Option<String>,
    pub organization: Option<String>,
    pub roaster_type: Option<String>,
    pub roaster_size: Option<f64>,
    pub roaster_heating: Option<i64>,
    pub beans: Option<String>,
    pub weight: WeightInfo,
    pub color: ColorReading,
    pub defects: DefectFlags,
    pub roasting_notes: Option<String>,
    pub cupping_notes: Option<String>,
}

/// Green and roasted weights
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeightInfo {
    pub weight_in: Option<f64>,
    pub weight_out: Option<f64>,
    pub unit: Option<String>,
    /// Percentage lost during the roast, one decimal place
    pub loss_percent: Option<Decimal>,
}

/// Roast colour measurements
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColorReading {
    pub whole: Option<f64>,
    pub ground: Option<f64>,
    /// Agtron, Tonino, ...
    pub system: Option<String>,
}

/// Defect indicators ticked by the operator
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefectFlags {
    pub heavy_fc: bool,
    pub low_fc: bool,
    pub light_cut: bool,
    pub dark_cut: bool,
    pub drops: bool,
    pub oily: bool,
    pub uneven: bool,
    pub tipping: bool,
    pub scorching: bool,
    pub divots: bool,
}

impl DefectFlags {
    /// Recorder key and storage column for every flag
    pub const KEYS: [(&'static str, &'static str); 10] = [
        ("heavyFC", "heavy_fc"),
        ("lowFC", "low_fc"),
        ("lightCut", "light_cut"),
        ("darkCut", "dark_cut"),
        ("drops", "drops"),
        ("oily", "oily"),
        ("uneven", "uneven"),
        ("tipping", "tipping"),
        ("scorching", "scorching"),
        ("divots", "divots"),
    ];

    fn slot(&mut self, column: &str) -> Option<&mut bool> {
        match column {
            "heavy_fc" => Some(&mut self.heavy_fc),
            "low_fc" => Some(&mut self.low_fc),
            "light_cut" => Some(&mut self.light_cut),
            "dark_cut" => Some(&mut self.dark_cut),
            "drops" => Some(&mut self.drops),
            "oily" => Some(&mut self.oily),
            "uneven" => Some(&mut self.uneven),
            "tipping" => Some(&mut self.tipping),
            "scorching" => Some(&mut self.scorching),
            "divots" => Some(&mut self.divots),
            _ => None,
        }
    }

    /// Set a flag by storage column name; unknown names are ignored
    pub fn set(&mut self, column: &str, value: bool) {
        if let Some(slot) = self.slot(column) {
            *slot = value;
        }
    }

    /// Flags by storage column name, in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        let values = [
            self.heavy_fc,
            self.low_fc,
            self.light_cut,
            self.dark_cut,
            self.drops,
            self.oily,
            self.uneven,
            self.tipping,
            self.scorching,
            self.divots,
        ];
        Self::KEYS
            .into_iter()
            .zip(values)
            .map(|((_, column), value)| (column, value))
    }

    pub fn any(&self) -> bool {
        self.iter().any(|(_, v)| v)
    }
}

/// Roast levels, classified on drop bean temperature
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RoastLevel {
    Light,
    MediumLight,
    Medium,
    MediumDark,
    Dark,
}

impl RoastLevel {
    pub const ALL: [RoastLevel; 5] = [
        RoastLevel::Light,
        RoastLevel::MediumLight,
        RoastLevel::Medium,
        RoastLevel::MediumDark,
        RoastLevel::Dark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoastLevel::Light => "light",
            RoastLevel::MediumLight => "medium-light",
            RoastLevel::Medium => "medium",
            RoastLevel::MediumDark => "medium-dark",
            RoastLevel::Dark => "dark",
        }
    }

    pub fn from_drop_temperature(drop_bt: f64) -> Self {
        classify_roast_level(drop_bt)
    }

    /// Half-open drop-temperature interval `[low, high)` in °C
    ///
    /// This is the same table [`classify_roast_level`] applies, exposed for
    /// storage-side range filters.
    pub fn temperature_range(&self) -> (f64, f64) {
        match self {
            RoastLevel::Light => (0.0, 196.0),
            RoastLevel::MediumLight => (196.0, 205.0),
            RoastLevel::Medium => (205.0, 213.0),
            RoastLevel::MediumDark => (213.0, 221.0),
            RoastLevel::Dark => (221.0, f64::INFINITY),
        }
    }
}

impl std::fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoastLevel::Light => write!(f, "Light"),
            RoastLevel::MediumLight => write!(f, "Medium-Light"),
            RoastLevel::Medium => write!(f, "Medium"),
            RoastLevel::MediumDark => write!(f, "Medium-Dark"),
            RoastLevel::Dark => write!(f, "Dark"),
        }
    }
}

impl std::str::FromStr for RoastLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        RoastLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| format!("unknown roast level `{}`", s))
    }
}

/// Classify roast level based on drop temperature (°C)
pub fn classify_roast_level(drop_bt: f64) -> RoastLevel {
    if drop_bt < 196.0 {
        RoastLevel::Light
    } else if drop_bt < 205.0 {
        RoastLevel::MediumLight
    } else if drop_bt < 213.0 {
        RoastLevel::Medium
    } else if drop_bt < 221.0 {
        RoastLevel::MediumDark
    } else {
        RoastLevel::Dark
    }
}

/// Calculate weight loss percentage, one decimal place
/// Formula: ((weight_in - weight_out) / weight_in) × 100
///
/// Absent unless both weights were recorded as positive values.
pub fn calculate_weight_loss(weight_in: f64, weight_out: f64) -> Option<Decimal> {
    if weight_in <= 0.0 || weight_out <= 0.0 {
        return None;
    }
    round_one_decimal((weight_in - weight_out) / weight_in * 100.0)
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> Option<Decimal> {
    let mut rounded = Decimal::from_f64(value)?
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(1);
    Some(rounded)
}

/// A fully derived roast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoastRecord {
    pub metadata: RoastMetadata,
    /// Metrics exactly as the recorder computed them
    pub computed: ComputedMetrics,
    pub events: RoastEvents,
    pub phases: RoastPhases,
    pub axis: NormalizedAxis,
    pub series: TimeSeries,
    pub derived: DerivedSeries,
    pub actuators: ActuatorTimelines,
    pub display: DisplayWindow,
    pub warnings: Vec<IngestWarning>,
    /// The decoded document, untouched
    pub raw_data: Value,
}

impl RoastRecord {
    pub fn roast_uuid(&self) -> &str {
        &self.metadata.roast_uuid
    }

    pub fn drop_bt(&self) -> Option<f64> {
        self.events.bt(RoastEvent::Drop)
    }

    /// Unknown when no drop temperature was resolved
    pub fn roast_level(&self) -> Option<RoastLevel> {
        self.drop_bt().map(classify_roast_level)
    }

    /// Derived total roast time, else the one the recorder computed
    pub fn total_time(&self) -> Option<f64> {
        self.phases.total_time.or(self.computed.total_time)
    }

    /// List-view projection
    pub fn summary(&self) -> RoastSummary {
        RoastSummary {
            roast_uuid: self.metadata.roast_uuid.clone(),
            title: self.metadata.title.clone(),
            roast_date: self.metadata.roast_date,
            roast_time: self.metadata.roast_time,
            beans: self.metadata.beans.clone(),
            weight_in: self.metadata.weight.weight_in,
            operator: self.metadata.operator.clone(),
            drop_bt: self.drop_bt(),
            total_time: self.total_time(),
            roast_level: self.roast_level(),
        }
    }

    /// Series restricted to the display indices, for charting
    pub fn display_series(&self) -> DisplaySeries {
        let idx = &self.display.indices;
        DisplaySeries {
            time: idx.iter().map(|&i| self.series.timex[i]).collect(),
            et: idx.iter().map(|&i| self.series.temp1[i]).collect(),
            bt: idx.iter().map(|&i| self.series.temp2[i]).collect(),
            ror: idx.iter().map(|&i| self.derived.ror[i]).collect(),
            heater: idx.iter().map(|&i| self.derived.heater[i]).collect(),
            fan: idx.iter().map(|&i| self.derived.fan[i]).collect(),
        }
    }

    /// Flat column layout used by storage and JSON transport
    pub fn to_flat_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let meta = &self.metadata;
        let mut map = serde_json::Map::new();
        let mut put = |key: &str, value: serde_json::Value| {
            map.insert(key.to_string(), value);
        };

        put("roast_uuid", json!(meta.roast_uuid));
        put("title", json!(meta.title));
        put("roast_date", json!(meta.roast_date));
        put("roast_time", json!(meta.roast_time));
        put("roast_epoch", json!(meta.roast_epoch));
        put("operator", json!(meta.operator));
        put("organization", json!(meta.organization));
        put("roaster_type", json!(meta.roaster_type));
        put("roaster_size", json!(meta.roaster_size));
        put("roaster_heating", json!(meta.roaster_heating));
        put("beans", json!(meta.beans));
        put("weight_in", json!(meta.weight.weight_in));
        put("weight_out", json!(meta.weight.weight_out));
        put("weight_unit", json!(meta.weight.unit));
        put("weight_loss", json!(meta.weight.loss_percent));

        for event in RoastEvent::ALL {
            let point = self.events.get(event);
            let prefix = event.column_prefix();
            put(&format!("{}_time", prefix), json!(point.and_then(|p| p.time)));
            put(&format!("{}_bt", prefix), json!(point.and_then(|p| p.bt)));
            put(&format!("{}_et", prefix), json!(point.and_then(|p| p.et)));
        }
        put("fcs_ror", json!(self.computed.fcs_ror));

        put("total_time", json!(self.total_time()));
        for phase in Phase::ALL {
            let metrics = self.phases.get(phase);
            let key = phase.key();
            put(&format!("{}_phase_time", key), json!(metrics.duration));
            put(&format!("{}_phase_ror", key), json!(metrics.ror));
            put(&format!("{}_phase_delta_temp", key), json!(metrics.delta_temp));
            put(&format!("{}_phase_percentage", key), json!(metrics.percentage));
        }
        put("total_ror", json!(self.computed.total_ror));

        put("whole_color", json!(meta.color.whole));
        put("ground_color", json!(meta.color.ground));
        put("color_system", json!(meta.color.system));

        for (column, flag) in meta.defects.iter() {
            put(column, json!(flag));
        }

        put("roasting_notes", json!(meta.roasting_notes));
        put("cupping_notes", json!(meta.cupping_notes));

        put("timex", json!(self.series.timex));
        put("temp1", json!(self.series.temp1));
        put("temp2", json!(self.series.temp2));
        put("ror", json!(self.derived.ror));
        put("heater", json!(self.derived.heater));
        put("fan", json!(self.derived.fan));

        put("roast_level", json!(self.roast_level()));
        put("raw_data", json!(self.raw_data));
        map
    }
}

/// Reduced projection for list views: metadata and scalars, no series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoastSummary {
    pub roast_uuid: String,
    pub title: String,
    pub roast_date: NaiveDate,
    pub roast_time: Option<NaiveTime>,
    pub beans: Option<String>,
    pub weight_in: Option<f64>,
    pub operator: Option<String>,
    pub drop_bt: Option<f64>,
    pub total_time: Option<f64>,
    pub roast_level: Option<RoastLevel>,
}

/// List filters mirroring the roast list query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoastFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring of the bean description
    pub beans: Option<String>,
    pub roast_level: Option<RoastLevel>,
    /// Case-insensitive substring of title, beans or operator
    pub search: Option<String>,
}

impl RoastFilter {
    pub fn matches(&self, summary: &RoastSummary) -> bool {
        let contains = |field: &Option<String>, needle: &str| {
            field
                .as_deref()
                .map_or(false, |f| f.to_lowercase().contains(&needle.to_lowercase()))
        };

        if self.date_from.map_or(false, |from| summary.roast_date < from) {
            return false;
        }
        if self.date_to.map_or(false, |to| summary.roast_date > to) {
            return false;
        }
        if let Some(beans) = &self.beans {
            if !contains(&summary.beans, beans) {
                return false;
            }
        }
        if let Some(level) = self.roast_level {
            if summary.roast_level != Some(level) {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let title = Some(summary.title.clone());
            if !(contains(&title, needle)
                || contains(&summary.beans, needle)
                || contains(&summary.operator, needle))
            {
                return false;
            }
        }
        true
    }
}

/// Newest first: by date, then time of day
pub fn sort_newest_first(summaries: &mut [RoastSummary]) {
    summaries.sort_by(|a, b| {
        b.roast_date
            .cmp(&a.roast_date)
            .then_with(|| b.roast_time.cmp(&a.roast_time))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn summary(date: &str, drop_bt: Option<f64>, beans: &str) -> RoastSummary {
        RoastSummary {
            roast_uuid: format!("uuid-{}", date),
            title: "Morning batch".to_string(),
            roast_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            roast_time: None,
            beans: Some(beans.to_string()),
            weight_in: Some(250.0),
            operator: Some("Somchai".to_string()),
            drop_bt,
            total_time: None,
            roast_level: drop_bt.map(classify_roast_level),
        }
    }

    #[test]
    fn test_roast_level_boundaries() {
        assert_eq!(classify_roast_level(195.9), RoastLevel::Light);
        assert_eq!(classify_roast_level(196.0), RoastLevel::MediumLight);
        assert_eq!(classify_roast_level(204.99), RoastLevel::MediumLight);
        assert_eq!(classify_roast_level(205.0), RoastLevel::Medium);
        assert_eq!(classify_roast_level(208.0), RoastLevel::Medium);
        assert_eq!(classify_roast_level(213.0), RoastLevel::MediumDark);
        assert_eq!(classify_roast_level(221.0), RoastLevel::Dark);
        assert_eq!(classify_roast_level(260.0), RoastLevel::Dark);
    }

    #[test]
    fn test_temperature_ranges_agree_with_classification() {
        for level in RoastLevel::ALL {
            let (low, high) = level.temperature_range();
            assert_eq!(classify_roast_level(low.max(1.0)), level);
            if high.is_finite() {
                assert_eq!(classify_roast_level(high - 0.01), level);
                assert_ne!(classify_roast_level(high), level);
            }
        }
    }

    #[test]
    fn test_roast_level_parsing() {
        assert_eq!(RoastLevel::from_str("medium-light"), Ok(RoastLevel::MediumLight));
        assert_eq!(RoastLevel::from_str("Medium_Dark"), Ok(RoastLevel::MediumDark));
        assert_eq!(RoastLevel::from_str(" DARK "), Ok(RoastLevel::Dark));
        assert!(RoastLevel::from_str("cinnamon").is_err());
        assert_eq!(RoastLevel::MediumLight.to_string(), "Medium-Light");
    }

    #[test]
    fn test_weight_loss_calculation() {
        assert_eq!(calculate_weight_loss(100.0, 85.0), Decimal::from_str("15.0").ok());
        assert_eq!(calculate_weight_loss(250.0, 212.0), Decimal::from_str("15.2").ok());
        assert_eq!(calculate_weight_loss(0.0, 85.0), None);
        assert_eq!(calculate_weight_loss(100.0, 0.0), None);
    }

    #[test]
    fn test_round_one_decimal_half_away_from_zero() {
        assert_eq!(round_one_decimal(12.25), Decimal::from_str("12.3").ok());
        assert_eq!(round_one_decimal(12.24), Decimal::from_str("12.2").ok());
        assert_eq!(round_one_decimal(f64::NAN), None);
    }

    #[test]
    fn test_defect_flags() {
        let mut flags = DefectFlags::default();
        assert!(!flags.any());
        flags.set("scorching", true);
        flags.set("not_a_flag", true);
        assert!(flags.any());
        assert!(flags.scorching);
        assert_eq!(flags.iter().filter(|(_, v)| *v).count(), 1);
    }

    #[test]
    fn test_filter_by_level_and_dates() {
        let light = summary("2024-01-10", Some(190.0), "Kenya AA");
        let medium = summary("2024-02-10", Some(208.0), "Ethiopia Guji");
        let unknown = summary("2024-03-10", None, "Colombia");

        let filter = RoastFilter {
            roast_level: Some(RoastLevel::Medium),
            ..Default::default()
        };
        assert!(!filter.matches(&light));
        assert!(filter.matches(&medium));
        assert!(!filter.matches(&unknown));

        let filter = RoastFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 2, 1),
            beans: Some("guji".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&light));
        assert!(filter.matches(&medium));

        let filter = RoastFilter {
            search: Some("somchai".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&unknown));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut list = vec![
            summary("2024-01-10", None, "a"),
            summary("2024-03-10", None, "b"),
            summary("2024-02-10", None, "c"),
        ];
        sort_newest_first(&mut list);
        let beans: Vec<_> = list.iter().map(|s| s.beans.clone().unwrap()).collect();
        assert_eq!(beans, vec!["b", "c", "a"]);
    }
}
