use crate::model::{MetricPoint, MetricSeries};
use crate::normalize::{TimeWindow, METRIC_PERIOD_SECONDS, UNIT_BYTES, UNIT_PERCENT};
use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Shape of a synthetic series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    /// Additive jitter around a percentage, clamped to [0, 100]
    Cpu,
    /// Multiplicative jitter around a byte rate
    Network,
    /// Multiplicative jitter around a byte rate, narrower max/min spread
    Disk,
}

impl MetricFamily {
    fn unit(&self) -> &'static str {
        match self {
            MetricFamily::Cpu => UNIT_PERCENT,
            MetricFamily::Network | MetricFamily::Disk => UNIT_BYTES,
        }
    }

    /// (maximum, minimum) multipliers applied to the average
    fn spread(&self) -> (f64, f64) {
        match self {
            MetricFamily::Cpu | MetricFamily::Disk => (1.2, 0.8),
            MetricFamily::Network => (1.3, 0.7),
        }
    }
}

/// Generates plausible metric series for offline mode
///
/// Each series has one point per 5-minute bucket of the window, ascending.
/// With a seed the jitter sequence is reproducible.
pub struct Synthesizer {
    rng: Mutex<StdRng>,
}

impl Synthesizer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Synthesize a series of `window.bucket_count()` points around `baseline`
    ///
    /// # Arguments
    /// * `family` - Jitter shape and unit
    /// * `baseline` - Center value; zero yields an all-zero series
    /// * `window` - Points walk backward from `window.end` in 5-minute steps
    pub fn series(&self, family: MetricFamily, baseline: f64, window: &TimeWindow) -> MetricSeries {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (max_factor, min_factor) = family.spread();

        let mut points: MetricSeries = (0..window.bucket_count())
            .map(|bucket| {
                let timestamp = window
                    .end
                    .checked_sub_signed(Duration::seconds(METRIC_PERIOD_SECONDS * bucket as i64))
                    .unwrap_or(window.start);
                let (average, maximum, minimum) = if baseline == 0.0 {
                    (0.0, 0.0, 0.0)
                } else {
                    let average = match family {
                        MetricFamily::Cpu => {
                            (baseline + rng.gen_range(-10.0..15.0)).clamp(0.0, 100.0)
                        }
                        MetricFamily::Network | MetricFamily::Disk => {
                            baseline * rng.gen_range(0.5..1.5)
                        }
                    };
                    let maximum = match family {
                        MetricFamily::Cpu => (average * max_factor).min(100.0),
                        _ => average * max_factor,
                    };
                    (average, maximum, average * min_factor)
                };

                MetricPoint {
                    timestamp,
                    average,
                    maximum,
                    minimum,
                    unit: family.unit().to_string(),
                }
            })
            .collect();

        points.reverse();
        points
    }
}
