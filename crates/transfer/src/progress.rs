use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_MAX_SAMPLES: usize = 64;

struct SpeedSample {
    bytes: u64,
    at: Instant,
}

/// Transfer rate over a sliding time window.
///
/// Owned by a single upload task; not shared.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    window: Duration,
    max_samples: usize,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_SAMPLES)
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            max_samples: max_samples.max(2),
        }
    }

    /// Records `bytes` confirmed now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(bytes, Instant::now());
    }

    /// Records `bytes` confirmed at `at`.
    pub fn record_at(&mut self, bytes: u64, at: Instant) {
        self.samples.push_back(SpeedSample { bytes, at });

        while let Some(front) = self.samples.front() {
            if at.saturating_duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Average bytes/second across the window; 0 with fewer than two samples.
    ///
    /// The first sample only marks the window start, its bytes are not
    /// counted.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.at.saturating_duration_since(first.at);
        if self.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let bytes: u64 = self.samples.iter().skip(1).map(|s| s.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to send `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
