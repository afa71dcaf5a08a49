//! Rate of rise (°C/min) of the bean temperature
//!
//! Two passes, each callable on its own: a windowed derivative clamped to a
//! plausible band, then a centered moving average.

use crate::config::EngineConfig;

/// Windowed derivative
///
/// For sample `i` the rate is measured against sample `max(0, i - window)`.
/// A rate is missing when either endpoint is missing or no time elapsed.
/// Valid rates are clamped to `[min, max]`.
pub fn raw_ror(
    times: &[f64],
    bt: &[Option<f64>],
    window: usize,
    min: f64,
    max: f64,
) -> Vec<Option<f64>> {
    (0..times.len())
        .map(|i| {
            let j = i.saturating_sub(window);
            let current = bt.get(i).copied().flatten()?;
            let previous = bt.get(j).copied().flatten()?;
            let elapsed = times[i] - times[j];
            if elapsed <= 0.0 {
                return None;
            }
            let rate = (current - previous) / (elapsed / 60.0);
            rate.is_finite().then(|| rate.clamp(min, max))
        })
        .collect()
}

/// Centered moving average over the present values in `[i - w/2, i + w/2]`
pub fn smooth(series: &[Option<f64>], width: usize) -> Vec<Option<f64>> {
    let half = width / 2;
    (0..series.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(series.len().saturating_sub(1));
            let (sum, count) = series[lo..=hi]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Derivative then smoothing, with the configured window and bounds
pub fn compute_ror(times: &[f64], bt: &[Option<f64>], config: &EngineConfig) -> Vec<Option<f64>> {
    let raw = raw_ror(times, bt, config.ror_window, config.ror_min, config.ror_max);
    smooth(&raw, config.smoothing_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: usize, step: f64, rate_per_min: f64) -> (Vec<f64>, Vec<Option<f64>>) {
        let times: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
        let bt = times
            .iter()
            .map(|t| Some(100.0 + rate_per_min * t / 60.0))
            .collect();
        (times, bt)
    }

    #[test]
    fn test_first_sample_has_no_rate() {
        let (times, bt) = linear(5, 2.0, 10.0);
        let ror = raw_ror(&times, &bt, 15, -5.0, 25.0);
        assert_eq!(ror[0], None);
        assert!(ror[1..].iter().all(|r| (r.unwrap() - 10.0).abs() < 1e-9));
    }

    #[test]
    fn test_rates_are_clamped() {
        let (times, bt) = linear(30, 1.0, 60.0);
        let ror = raw_ror(&times, &bt, 15, -5.0, 25.0);
        assert_eq!(ror[20], Some(25.0));

        let (times, bt) = linear(30, 1.0, -30.0);
        let ror = raw_ror(&times, &bt, 15, -5.0, 25.0);
        assert_eq!(ror[20], Some(-5.0));
    }

    #[test]
    fn test_missing_endpoint_or_zero_elapsed() {
        let times = vec![0.0, 2.0, 2.0, 4.0];
        let bt = vec![Some(100.0), None, Some(101.0), Some(101.5)];
        let ror = raw_ror(&times, &bt, 1, -5.0, 25.0);
        assert_eq!(ror[1], None);
        assert_eq!(ror[2], None);
        assert!((ror[3].unwrap() - 15.0).abs() < 1e-9);

        let ror = raw_ror(&[5.0, 5.0], &[Some(100.0), Some(101.0)], 15, -5.0, 25.0);
        assert_eq!(ror, vec![None, None]);
    }

    #[test]
    fn test_smooth_averages_present_neighbours() {
        let series = vec![Some(1.0), None, Some(3.0), Some(5.0), None, None, None, None, None];
        let smoothed = smooth(&series, 7);
        assert_eq!(smoothed[0], Some(3.0));
        assert_eq!(smoothed[1], Some(3.0));
        assert_eq!(smoothed[6], Some(5.0));
        assert_eq!(smoothed[7], None);
        assert_eq!(smoothed.len(), series.len());
    }

    #[test]
    fn test_compute_ror_keeps_length() {
        let (times, bt) = linear(100, 2.0, 12.0);
        let ror = compute_ror(&times, &bt, &EngineConfig::default());
        assert_eq!(ror.len(), 100);
        assert!((ror[50].unwrap() - 12.0).abs() < 1e-9);
    }
}
