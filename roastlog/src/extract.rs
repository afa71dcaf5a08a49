//! Field extraction: generic value tree to typed roast fields
//!
//! Required fields (identifier, title, date and the three core series) abort
//! extraction when missing or malformed. Every other field is best-effort: a
//! value of the wrong type is dropped with a [`IngestWarning`] and extraction
//! carries on.

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::error::{IngestError, IngestResult, IngestWarning};
use crate::models::{
    calculate_weight_loss, round_one_decimal, ColorReading, ComputedEvent, ComputedMetrics,
    DefectFlags, LoggedPhase, Phase, RoastEvent, RoastMetadata, TimeSeries, WeightInfo,
};
use crate::value::{Mapping, Value};

/// Parallel special-event arrays, as logged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialEvents {
    /// Sample index of each event
    pub indices: Vec<i64>,
    pub types: Vec<i64>,
    pub values: Vec<f64>,
}

/// Everything the later stages need from one decoded document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLog {
    pub metadata: RoastMetadata,
    pub computed: ComputedMetrics,
    /// Raw time axis and temperatures; sentinels are still in place
    pub series: TimeSeries,
    pub timeindex: Option<Vec<i64>>,
    pub special_events: Option<SpecialEvents>,
    pub sampling_interval: Option<f64>,
    pub warnings: Vec<IngestWarning>,
}

/// Optional-field reader that records coercion failures
struct Reader<'a> {
    map: &'a Mapping,
    scope: Option<&'static str>,
    warnings: Vec<IngestWarning>,
}

impl<'a> Reader<'a> {
    fn new(map: &'a Mapping, scope: Option<&'static str>) -> Self {
        Self {
            map,
            scope,
            warnings: Vec::new(),
        }
    }

    fn label(&self, key: &str) -> String {
        match self.scope {
            Some(scope) => format!("{}.{}", scope, key),
            None => key.to_string(),
        }
    }

    fn warn(&mut self, key: &str, expected: &str, found: &str) {
        let label = self.label(key);
        self.warnings
            .push(IngestWarning::coercion(&label, expected, found));
    }

    /// Present and not `None`
    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn number(&mut self, key: &str) -> Option<f64> {
        let value = self.present(key)?;
        match value.as_f64() {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                self.warn(key, "number", value.kind());
                None
            }
        }
    }

    fn integer(&mut self, key: &str) -> Option<i64> {
        let value = self.present(key)?;
        match value.as_i64() {
            Some(n) => Some(n),
            None => {
                self.warn(key, "integer", value.kind());
                None
            }
        }
    }

    /// Text scalar; blank text counts as not recorded
    fn text(&mut self, key: &str) -> Option<String> {
        let value = self.present(key)?;
        match value.as_str() {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.to_string()),
            None => {
                self.warn(key, "text", value.kind());
                None
            }
        }
    }

    /// Boolean flag; 0 and 1 are accepted as well
    fn flag(&mut self, key: &str) -> bool {
        let value = match self.present(key) {
            Some(v) => v,
            None => return false,
        };
        match value {
            Value::Bool(b) => *b,
            Value::Int(0) => false,
            Value::Int(1) => true,
            other => {
                self.warn(key, "boolean", other.kind());
                false
            }
        }
    }
}

/// Extract typed fields from a decoded document
pub fn extract(document: &Value) -> IngestResult<ExtractedLog> {
    let map = document
        .as_mapping()
        .ok_or_else(|| IngestError::mismatch("<document>", "mapping", document.kind()))?;

    let roast_uuid = required_text(map, "roastUUID", false)?;
    let title = required_text(map, "title", true)?;
    let mut reader = Reader::new(map, None);
    let roast_date = roast_date(&mut reader)?;
    let series = core_series(map)?;

    let computed = match map.get("computed") {
        None | Some(Value::Null) => None,
        Some(Value::Mapping(m)) => Some(m),
        Some(other) => {
            return Err(IngestError::mismatch("computed", "mapping", other.kind()));
        }
    };

    let (computed, computed_warnings) = match computed {
        Some(m) => computed_metrics(m),
        None => (ComputedMetrics::default(), Vec::new()),
    };

    let roast_time = roast_time(&mut reader);
    let weight = weight_info(&mut reader, &computed);
    let mut defects = DefectFlags::default();
    for (key, column) in DefectFlags::KEYS {
        defects.set(column, reader.flag(key));
    }

    let metadata = RoastMetadata {
        roast_uuid,
        title,
        roast_date,
        roast_time,
        roast_epoch: reader.integer("roastepoch"),
        operator: reader.text("operator"),
        organization: reader.text("organization"),
        roaster_type: reader.text("roastertype"),
        roaster_size: reader.number("roastersize"),
        roaster_heating: reader.integer("roasterheating"),
        beans: reader.text("beans"),
        weight,
        color: ColorReading {
            whole: reader.number("whole_color"),
            ground: reader.number("ground_color"),
            system: reader.text("color_system"),
        },
        defects,
        roasting_notes: reader.text("roastingnotes"),
        cupping_notes: reader.text("cuppingnotes"),
    };

    let timeindex = integer_list(&mut reader, "timeindex");
    let special_events = special_events(&mut reader);
    let sampling_interval = match reader.number("samplinginterval") {
        Some(s) if s > 0.0 => Some(s),
        Some(s) => {
            reader.warn("samplinginterval", "positive number", &s.to_string());
            None
        }
        None => None,
    };

    let mut warnings = reader.warnings;
    warnings.extend(computed_warnings);

    Ok(ExtractedLog {
        metadata,
        computed,
        series,
        timeindex,
        special_events,
        sampling_interval,
        warnings,
    })
}

fn required_text(map: &Mapping, key: &str, allow_blank: bool) -> IngestResult<String> {
    match map.get(key) {
        None | Some(Value::Null) => Err(IngestError::missing(key)),
        Some(Value::Text(s)) if s.trim().is_empty() && !allow_blank => {
            Err(IngestError::missing(key))
        }
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(other) => Err(IngestError::mismatch(key, "text", other.kind())),
    }
}

/// `roastisodate`, else the UTC date of `roastepoch`
///
/// An unusable ISO date is a coercion warning when the epoch resolves and a
/// schema mismatch when it does not.
fn roast_date(reader: &mut Reader<'_>) -> IngestResult<NaiveDate> {
    let mut iso_failure: Option<(&'static str, String)> = None;
    match reader.present("roastisodate") {
        Some(Value::Text(s)) if s.trim().is_empty() => {}
        Some(Value::Text(s)) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
            Ok(date) => return Ok(date),
            Err(_) => iso_failure = Some(("YYYY-MM-DD date", s.clone())),
        },
        Some(other) => iso_failure = Some(("text", other.kind().to_string())),
        None => {}
    }

    let epoch = match reader.present("roastepoch") {
        Some(value) => value
            .as_i64()
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| IngestError::mismatch("roastepoch", "unix timestamp", value.to_literal())),
        None => Err(match &iso_failure {
            Some((expected, found)) => IngestError::mismatch("roastisodate", expected, found.as_str()),
            None => IngestError::missing("roastisodate"),
        }),
    }?;

    if let Some((expected, found)) = &iso_failure {
        reader.warn("roastisodate", expected, found);
    }
    Ok(epoch)
}

fn roast_time(reader: &mut Reader<'_>) -> Option<NaiveTime> {
    let text = reader.text("roasttime")?;
    match NaiveTime::parse_from_str(text.trim(), "%H:%M:%S") {
        Ok(t) => Some(t),
        Err(_) => {
            reader.warn("roasttime", "HH:MM:SS time", &text);
            None
        }
    }
}

fn core_series(map: &Mapping) -> IngestResult<TimeSeries> {
    let timex = series_values(map, "timex", false)?
        .into_iter()
        .map(|v| v.unwrap_or_default())
        .collect::<Vec<f64>>();
    let temp1 = series_values(map, "temp1", true)?;
    let temp2 = series_values(map, "temp2", true)?;

    for (key, len) in [("temp1", temp1.len()), ("temp2", temp2.len())] {
        if len != timex.len() {
            return Err(IngestError::mismatch(
                key,
                &format!("{} samples like timex", timex.len()),
                format!("{} samples", len),
            ));
        }
    }

    Ok(TimeSeries {
        timex,
        temp1,
        temp2,
    })
}

/// A numeric sequence; `None` entries are allowed only in temperature series
fn series_values(map: &Mapping, key: &str, allow_null: bool) -> IngestResult<Vec<Option<f64>>> {
    let items = match map.get(key) {
        None | Some(Value::Null) => return Err(IngestError::missing(key)),
        Some(Value::Sequence(items)) => items,
        Some(other) => return Err(IngestError::mismatch(key, "numeric sequence", other.kind())),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Null if allow_null => Ok(None),
            other => match other.as_f64() {
                Some(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(IngestError::mismatch(
                    key,
                    "numeric sequence",
                    format!("{} at position {}", other.kind(), i),
                )),
            },
        })
        .collect()
}

/// `weight = [in, out, unit]`; roasted weight falls back to `computed.weightout`
fn weight_info(reader: &mut Reader<'_>, computed: &ComputedMetrics) -> WeightInfo {
    let mut info = WeightInfo::default();

    if let Some(value) = reader.present("weight") {
        match value.as_sequence() {
            Some(items) => {
                let entry = |i: usize| items.get(i).filter(|v| !v.is_null());
                let mut weights = [None, None];
                for (i, slot) in weights.iter_mut().enumerate() {
                    if let Some(v) = entry(i) {
                        match v.as_f64() {
                            Some(w) if w.is_finite() => *slot = Some(w).filter(|w| *w > 0.0),
                            _ => reader.warn(&format!("weight[{}]", i), "number", v.kind()),
                        }
                    }
                }
                info.weight_in = weights[0];
                info.weight_out = weights[1];
                info.unit = match entry(2) {
                    Some(Value::Text(u)) if u.trim().is_empty() => None,
                    Some(Value::Text(u)) => Some(u.clone()),
                    Some(other) => {
                        reader.warn("weight[2]", "text", other.kind());
                        None
                    }
                    None => None,
                };
            }
            None => reader.warn("weight", "[in, out, unit] sequence", value.kind()),
        }
    }

    if info.weight_out.is_none() {
        info.weight_out = computed.weight_out.filter(|w| *w > 0.0);
    }
    info.loss_percent = match (info.weight_in, info.weight_out) {
        (Some(w_in), Some(w_out)) => calculate_weight_loss(w_in, w_out),
        _ => computed.weight_loss.and_then(round_one_decimal),
    };
    info
}

fn computed_metrics(map: &Mapping) -> (ComputedMetrics, Vec<IngestWarning>) {
    let mut reader = Reader::new(map, Some("computed"));
    let mut metrics = ComputedMetrics::default();

    for event in RoastEvent::ALL {
        let prefix = event.computed_prefix();
        let time = if event == RoastEvent::Charge {
            None
        } else {
            reader.number(&format!("{}_time", prefix))
        };
        *metrics.event_mut(event) = ComputedEvent {
            time,
            bt: reader.number(&format!("{}_BT", prefix)),
            et: reader.number(&format!("{}_ET", prefix)),
        };
    }

    for phase in Phase::ALL {
        let key = phase.key();
        *metrics.phase_mut(phase) = LoggedPhase {
            time: reader.number(&format!("{}phasetime", key)),
            ror: reader.number(&format!("{}_phase_ror", key)),
            delta_temp: reader.number(&format!("{}_phase_delta_temp", key)),
        };
    }

    metrics.total_time = reader.number("totaltime");
    metrics.total_ror = reader.number("total_ror");
    metrics.fcs_ror = reader.number("fcs_ror");
    metrics.weight_out = reader.number("weightout");
    metrics.weight_loss = reader.number("weight_loss");

    (metrics, reader.warnings)
}

fn integer_list(reader: &mut Reader<'_>, key: &str) -> Option<Vec<i64>> {
    let value = reader.present(key)?;
    let parsed = value
        .as_sequence()
        .and_then(|items| items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>());
    if parsed.is_none() {
        reader.warn(key, "integer sequence", value.kind());
    }
    parsed
}

fn number_list(reader: &mut Reader<'_>, key: &str) -> Option<Vec<f64>> {
    let value = reader.present(key)?;
    let parsed = value
        .as_sequence()
        .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>());
    if parsed.is_none() {
        reader.warn(key, "numeric sequence", value.kind());
    }
    parsed
}

/// All three arrays are dropped together when any of them is malformed
fn special_events(reader: &mut Reader<'_>) -> Option<SpecialEvents> {
    const KEYS: [&str; 3] = ["specialevents", "specialeventstype", "specialeventsvalue"];
    if KEYS.iter().all(|k| reader.present(k).is_none()) {
        return None;
    }

    let indices = integer_list(reader, KEYS[0]);
    let types = integer_list(reader, KEYS[1]);
    let values = number_list(reader, KEYS[2]);

    let malformed = KEYS
        .iter()
        .zip([indices.is_none(), types.is_none(), values.is_none()])
        .any(|(key, missing)| missing && reader.present(key).is_some());
    if malformed {
        return None;
    }

    Some(SpecialEvents {
        indices: indices.unwrap_or_default(),
        types: types.unwrap_or_default(),
        values: values.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    const MINIMAL: &str = "{'roastUUID': 'r-1', 'title': 'Guji', 'roastisodate': '2024-05-02', \
        'timex': [0.0, 2.0, 4.0], 'temp1': [210, 205.5, 200.0], 'temp2': [180.0, -1, 150.0]}";

    fn extract_text(text: &str) -> IngestResult<ExtractedLog> {
        extract(&decode(text).unwrap())
    }

    fn with(extra: &str) -> String {
        format!("{}, {}}}", MINIMAL.trim_end_matches('}'), extra)
    }

    #[test]
    fn test_minimal_document() {
        let log = extract_text(MINIMAL).unwrap();
        assert_eq!(log.metadata.roast_uuid, "r-1");
        assert_eq!(log.metadata.roast_date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(log.series.temp1, vec![Some(210.0), Some(205.5), Some(200.0)]);
        assert_eq!(log.series.temp2[1], Some(-1.0));
        assert_eq!(log.metadata.operator, None);
        assert_eq!(log.timeindex, None);
        assert!(log.warnings.is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let err = extract_text("{'title': 'x', 'roastisodate': '2024-01-01', 'timex': [], 'temp1': [], 'temp2': []}")
            .unwrap_err();
        assert_eq!(err, IngestError::missing("roastUUID"));

        let err = extract_text("{'roastUUID': 'a', 'title': 'x', 'timex': [], 'temp1': [], 'temp2': []}")
            .unwrap_err();
        assert_eq!(err, IngestError::missing("roastisodate"));

        let err = extract_text("{'roastUUID': 'a', 'title': 'x', 'roastisodate': '2024-01-01', 'timex': [], 'temp1': []}")
            .unwrap_err();
        assert_eq!(err, IngestError::missing("temp2"));
    }

    #[test]
    fn test_schema_mismatches() {
        let err = extract_text("[1, 2]").unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { ref field, .. } if field == "<document>"));

        let err = extract_text(&MINIMAL.replace("[0.0, 2.0, 4.0]", "'0 2 4'")).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { ref field, .. } if field == "timex"));

        let err = extract_text(&MINIMAL.replace("[210, 205.5, 200.0]", "[210, 205.5]")).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { ref field, .. } if field == "temp1"));

        let err = extract_text(&with("'computed': [1, 2]")).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { ref field, .. } if field == "computed"));

        let err = extract_text(&MINIMAL.replace("2024-05-02", "02/05/2024")).unwrap_err();
        assert_eq!(err, IngestError::mismatch("roastisodate", "YYYY-MM-DD date", "02/05/2024"));
    }

    #[test]
    fn test_epoch_date_fallback() {
        let text = MINIMAL.replace("'roastisodate': '2024-05-02'", "'roastepoch': 1714608000");
        let log = extract_text(&text).unwrap();
        assert_eq!(log.metadata.roast_date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(log.metadata.roast_epoch, Some(1714608000));
    }

    #[test]
    fn test_unusable_iso_date_falls_back_to_epoch() {
        let text = MINIMAL.replace("'2024-05-02'", "'02/03/2024', 'roastepoch': 1709337600");
        let log = extract_text(&text).unwrap();
        assert_eq!(log.metadata.roast_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(
            log.warnings,
            vec![IngestWarning::coercion("roastisodate", "YYYY-MM-DD date", "02/03/2024")]
        );

        let text = MINIMAL.replace("'2024-05-02'", "20240302, 'roastepoch': 1709337600");
        let log = extract_text(&text).unwrap();
        assert_eq!(log.metadata.roast_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(
            log.warnings,
            vec![IngestWarning::coercion("roastisodate", "text", "integer")]
        );
    }

    #[test]
    fn test_unusable_iso_date_and_epoch_is_fatal() {
        let err = extract_text(&MINIMAL.replace("'2024-05-02'", "20240302")).unwrap_err();
        assert_eq!(err, IngestError::mismatch("roastisodate", "text", "integer"));

        let text = MINIMAL.replace("'2024-05-02'", "'soon', 'roastepoch': 'today'");
        let err = extract_text(&text).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { ref field, .. } if field == "roastepoch"));
    }

    #[test]
    fn test_optional_coercion_failure_is_a_warning() {
        let log = extract_text(&with("'roastersize': 'big', 'operator': 'Nok', 'roasttime': '25:99'"))
            .unwrap();
        assert_eq!(log.metadata.roaster_size, None);
        assert_eq!(log.metadata.operator.as_deref(), Some("Nok"));
        assert_eq!(log.metadata.roast_time, None);
        assert_eq!(log.warnings.len(), 2);
        assert!(log
            .warnings
            .contains(&IngestWarning::coercion("roastersize", "number", "text")));
        assert!(log
            .warnings
            .contains(&IngestWarning::coercion("roasttime", "HH:MM:SS time", "25:99")));
    }

    #[test]
    fn test_computed_metrics() {
        let log = extract_text(&with(
            "'computed': {'CHARGE_BT': 201.5, 'DRY_time': 240, 'DRY_BT': 150.2, 'FCs_time': 'soon', \
             'dryphasetime': 240, 'totaltime': 600.0, 'weightout': 212}",
        ))
        .unwrap();
        assert_eq!(log.computed.charge.bt, Some(201.5));
        assert_eq!(log.computed.charge.time, None);
        assert_eq!(log.computed.dry_end.time, Some(240.0));
        assert_eq!(log.computed.first_crack_start.time, None);
        assert_eq!(log.computed.dry_phase.time, Some(240.0));
        assert_eq!(log.computed.total_time, Some(600.0));
        assert_eq!(
            log.warnings,
            vec![IngestWarning::coercion("computed.FCs_time", "number", "text")]
        );
    }

    #[test]
    fn test_weight_and_loss() {
        let log = extract_text(&with("'weight': [250.0, 212.0, 'g']")).unwrap();
        assert_eq!(log.metadata.weight.weight_in, Some(250.0));
        assert_eq!(log.metadata.weight.unit.as_deref(), Some("g"));
        assert_eq!(log.metadata.weight.loss_percent.map(|d| d.to_string()), Some("15.2".to_string()));

        let log = extract_text(&with("'weight': [250.0, 0, 'g'], 'computed': {'weightout': 200}")).unwrap();
        assert_eq!(log.metadata.weight.weight_out, Some(200.0));
        assert_eq!(log.metadata.weight.loss_percent.map(|d| d.to_string()), Some("20.0".to_string()));
        assert_eq!(log.metadata.weight.loss_percent, Some(rust_decimal::Decimal::new(200, 1)));
    }

    #[test]
    fn test_wrong_type_weight_entries_warn() {
        let log = extract_text(&with("'weight': ['250', 212.0, 7]")).unwrap();
        assert_eq!(log.metadata.weight.weight_in, None);
        assert_eq!(log.metadata.weight.weight_out, Some(212.0));
        assert_eq!(log.metadata.weight.unit, None);
        assert_eq!(log.metadata.weight.loss_percent, None);
        assert_eq!(
            log.warnings,
            vec![
                IngestWarning::coercion("weight[0]", "number", "text"),
                IngestWarning::coercion("weight[2]", "text", "integer"),
            ]
        );

        let log = extract_text(&with("'weight': [250.0, None, '']")).unwrap();
        assert_eq!(log.metadata.weight.weight_in, Some(250.0));
        assert!(log.warnings.is_empty());
    }

    #[test]
    fn test_defect_flags() {
        let log = extract_text(&with("'oily': True, 'heavyFC': 1, 'divots': 'yes'")).unwrap();
        assert!(log.metadata.defects.oily);
        assert!(log.metadata.defects.heavy_fc);
        assert!(!log.metadata.defects.divots);
        assert_eq!(log.warnings.len(), 1);
    }

    #[test]
    fn test_auxiliary_structures() {
        let log = extract_text(&with(
            "'timeindex': [0, 1, 0, 0, 0, 0, 2, 0], 'specialevents': [1, 2], \
             'specialeventstype': [3, 0], 'specialeventsvalue': [7.0, 5.5], 'samplinginterval': 2.0",
        ))
        .unwrap();
        assert_eq!(log.timeindex, Some(vec![0, 1, 0, 0, 0, 0, 2, 0]));
        let events = log.special_events.unwrap();
        assert_eq!(events.types, vec![3, 0]);
        assert_eq!(events.values, vec![7.0, 5.5]);
        assert_eq!(log.sampling_interval, Some(2.0));
    }

    #[test]
    fn test_malformed_auxiliary_structures_are_dropped() {
        let log = extract_text(&with(
            "'timeindex': 'none', 'specialevents': [1], 'specialeventstype': ['x'], 'specialeventsvalue': [1]",
        ))
        .unwrap();
        assert_eq!(log.timeindex, None);
        assert_eq!(log.special_events, None);
        assert_eq!(log.warnings.len(), 2);
    }
}
