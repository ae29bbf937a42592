use std::fmt;
use std::time::Instant;

use serde::Serialize;

/// Returned by [`FrameTimer::average`] when no frame was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingUnderflow;

impl TimingUnderflow {
    pub fn code(&self) -> &'static str {
        "TIMING_UNDERFLOW"
    }
}

impl fmt::Display for TimingUnderflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: no frames were sampled", self.code())
    }
}

impl std::error::Error for TimingUnderflow {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub samples: u32,
    pub total_micros: u64,
    pub min_micros: Option<u64>,
    pub max_micros: Option<u64>,
    pub average_micros: Option<u64>,
}

/// Session-long accumulator of per-frame draw cost, in microseconds.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    total_micros: u64,
    samples: u32,
    min_micros: Option<u64>,
    max_micros: Option<u64>,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `draw` once on the monotonic clock and records its cost.
    /// Returns the elapsed microseconds together with `draw`'s result.
    pub fn sample<T>(&mut self, draw: impl FnOnce() -> T) -> (u64, T) {
        let start = Instant::now();
        let output = draw();
        let elapsed = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.record(elapsed);
        (elapsed, output)
    }

    pub fn record(&mut self, micros: u64) {
        self.total_micros = self.total_micros.saturating_add(micros);
        self.samples = self.samples.saturating_add(1);
        self.min_micros = Some(self.min_micros.map_or(micros, |min| min.min(micros)));
        self.max_micros = Some(self.max_micros.map_or(micros, |max| max.max(micros)));
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn total_micros(&self) -> u64 {
        self.total_micros
    }

    /// Integer mean of all samples.
    pub fn average(&self) -> Result<u64, TimingUnderflow> {
        self.total_micros
            .checked_div(u64::from(self.samples))
            .ok_or(TimingUnderflow)
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            samples: self.samples,
            total_micros: self.total_micros,
            min_micros: self.min_micros,
            max_micros: self.max_micros,
            average_micros: self.average().ok(),
        }
    }
}
