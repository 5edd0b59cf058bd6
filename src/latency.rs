use std::{str::FromStr, thread, time::Duration};

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatencyError {
    #[error("Latency range must look like `<min_ms>..<max_ms>`, got `{0}`")]
    Malformed(String),
    #[error("Latency lower bound {min:?} is greater than upper bound {max:?}")]
    InvertedBounds { min: Duration, max: Duration },
}

/// Inclusive bounds of the simulated pre-commit delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    min: Duration,
    max: Duration,
}

impl LatencyRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, LatencyError> {
        if min > max {
            return Err(LatencyError::InvertedBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(500),
        }
    }
}

/// Parses `"<min_ms>..<max_ms>"`, e.g. `"100..500"`.
impl FromStr for LatencyRange {
    type Err = LatencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LatencyError::Malformed(s.to_owned());
        let (min, max) = s.trim().split_once("..").ok_or_else(malformed)?;
        let min = min.trim().parse::<u64>().map_err(|_| malformed())?;
        let max = max.trim().parse::<u64>().map_err(|_| malformed())?;
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }
}

/// Suspends the calling thread before a transfer takes any account guard.
pub trait Delay: Send + Sync {
    fn pause(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn pause(&self) {}
}

/// Sleeps for a duration drawn uniformly from the range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDelay {
    range: LatencyRange,
}

impl RandomDelay {
    pub fn new(range: LatencyRange) -> Self {
        Self { range }
    }

    pub fn sample(&self) -> Duration {
        rand::thread_rng().gen_range(self.range.min..=self.range.max)
    }
}

impl Delay for RandomDelay {
    fn pause(&self) {
        thread::sleep(self.sample());
    }
}
