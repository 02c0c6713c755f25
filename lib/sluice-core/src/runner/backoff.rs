use std::time::Duration;

use rand::{rngs::StdRng, Rng as _, SeedableRng as _};

/// An exponential backoff strategy.
///
/// Backoff durations grow exponentially with the number of consecutive failures, bounded by a minimum and a maximum.
/// Jitter can be applied to keep several sinks that failed at the same time from retrying in lockstep.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    min_backoff: Duration,
    max_backoff: Duration,
    min_backoff_factor: f64,
    rng: Option<StdRng>,
}

impl ExponentialBackoff {
    /// Creates a new `ExponentialBackoff` with the given minimum and maximum backoff durations.
    ///
    /// Jitter is not applied to the calculated backoff durations.
    pub fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
            min_backoff_factor: 1.0,
            rng: None,
        }
    }

    /// Creates a new `ExponentialBackoff` with the given minimum and maximum backoff durations, and minimum backoff
    /// factor.
    ///
    /// With jitter, any given backoff duration falls between `D/min_backoff_factor` and `D`, where `D` is the duration
    /// calculated for the failure count. A minimum backoff factor of 1.0 or less disables jitter.
    pub fn with_jitter(min_backoff: Duration, max_backoff: Duration, min_backoff_factor: f64) -> Self {
        Self {
            min_backoff_factor: min_backoff_factor.max(1.0),
            ..Self::new(min_backoff, max_backoff)
        }
    }

    /// Seeds the random number generator used for jitter.
    ///
    /// Defaults to the thread-local generator seeded by the operating system.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Returns the minimum backoff duration.
    pub fn min_backoff(&self) -> Duration {
        self.min_backoff
    }

    /// Returns the maximum backoff duration.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Calculates the backoff duration for the given number of consecutive failures.
    pub fn get_backoff_duration(&mut self, failure_count: u32) -> Duration {
        if failure_count == 0 {
            return self.min_backoff;
        }

        let mut backoff = self.min_backoff.saturating_mul(2u32.saturating_pow(failure_count));

        if self.min_backoff_factor > 1.0 {
            let backoff_lower = backoff.div_f64(self.min_backoff_factor);
            let backoff_upper = backoff;
            backoff = match self.rng.as_mut() {
                Some(rng) => rng.random_range(backoff_lower..=backoff_upper),
                None => rand::rng().random_range(backoff_lower..=backoff_upper),
            };
        }

        backoff.clamp(self.min_backoff, self.max_backoff)
    }
}
