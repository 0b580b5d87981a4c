use crate::core::SignalReading;
use crate::algorithms::clamp_rssi;
use std::collections::HashMap;

/// Running RSSI average for one source
#[derive(Debug, Clone, Copy, PartialEq)]
struct SmoothedSignal {
    rssi: f64,
    last_seen_ms: i64,
}

/// Per-source exponential moving average over RSSI
///
/// Scanners report RSSI with several dB of jitter between consecutive
/// samples; averaging before the path-loss conversion keeps the range
/// estimates from jumping.
#[derive(Debug, Clone)]
pub struct RssiFilter {
    /// Weight of a new sample (0-1, higher tracks faster)
    pub alpha: f64,
    /// Sources silent for longer than this restart their average
    pub max_age_ms: i64,
    signals: HashMap<String, SmoothedSignal>,
}

impl Default for RssiFilter {
    fn default() -> Self {
        Self::new(0.3, 5000)
    }
}

impl RssiFilter {
    pub fn new(alpha: f64, max_age_ms: i64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            max_age_ms,
            signals: HashMap::new(),
        }
    }

    /// Return the readings with smoothed RSSI, updating the averages
    pub fn apply(&mut self, readings: &[SignalReading], timestamp_ms: i64) -> Vec<SignalReading> {
        let alpha = self.alpha;
        let max_age_ms = self.max_age_ms;

        readings
            .iter()
            .map(|reading| {
                let raw = clamp_rssi(reading.rssi) as f64;
                let entry = self
                    .signals
                    .entry(reading.source_id.clone())
                    .or_insert(SmoothedSignal {
                        rssi: raw,
                        last_seen_ms: timestamp_ms,
                    });

                if timestamp_ms.saturating_sub(entry.last_seen_ms) > max_age_ms {
                    entry.rssi = raw;
                } else {
                    entry.rssi += alpha * (raw - entry.rssi);
                }
                entry.last_seen_ms = timestamp_ms;

                SignalReading {
                    rssi: entry.rssi.round() as i32,
                    ..reading.clone()
                }
            })
            .collect()
    }

    /// Forget sources not heard within the age limit
    pub fn prune(&mut self, timestamp_ms: i64) {
        let max_age_ms = self.max_age_ms;
        self.signals
            .retain(|_, s| timestamp_ms.saturating_sub(s.last_seen_ms) <= max_age_ms);
    }

    pub fn tracked_sources(&self) -> usize {
        self.signals.len()
    }

    pub fn clear(&mut self) {
        self.signals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_passes_through() {
        let mut filter = RssiFilter::default();
        let out = filter.apply(&[SignalReading::new("a", -70, -59)], 0);
        assert_eq!(out[0].rssi, -70);
        assert_eq!(out[0].reference_power_at_1m, -59);
    }

    #[test]
    fn test_spike_is_damped() {
        let mut filter = RssiFilter::new(0.3, 5000);
        filter.apply(&[SignalReading::new("a", -70, -59)], 0);
        let out = filter.apply(&[SignalReading::new("a", -50, -59)], 1000);

        // -70 + 0.3 * 20
        assert_eq!(out[0].rssi, -64);
    }

    #[test]
    fn test_stale_source_restarts_average() {
        let mut filter = RssiFilter::new(0.3, 5000);
        filter.apply(&[SignalReading::new("a", -70, -59)], 0);
        let out = filter.apply(&[SignalReading::new("a", -50, -59)], 10_000);
        assert_eq!(out[0].rssi, -50);
    }

    #[test]
    fn test_prune_drops_silent_sources() {
        let mut filter = RssiFilter::new(0.3, 5000);
        filter.apply(&[SignalReading::new("a", -70, -59), SignalReading::new("b", -60, -59)], 0);
        filter.apply(&[SignalReading::new("b", -60, -59)], 8000);
        filter.prune(8000);
        assert_eq!(filter.tracked_sources(), 1);
    }
}
