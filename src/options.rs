//! Options accepted by the timing and iteration helpers.
//!
//! Every struct deserializes from a camelCase map with missing fields taking
//! their defaults, so capability arguments can be read straight out of a
//! [`Value::Object`](crate::Value::Object).

use serde::Deserialize;

use crate::Error;

/// Delay, floor and cap used when no explicit time is given.
pub const DEFAULT_TIME_MS: u64 = 100;
/// Poll budget of `wait_for_key` and `wait_for_result`.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Timers applied to a single result by `attach_timers`. A zero duration is
/// treated as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timers {
    pub delay: Option<u64>,
    pub at_least: Option<u64>,
    pub timeout: Option<u64>,
}

impl Timers {
    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    pub fn at_least(mut self, ms: u64) -> Self {
        self.at_least = Some(ms);
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn is_empty(&self) -> bool {
        [self.delay, self.at_least, self.timeout].iter().all(|t| t.unwrap_or(0) == 0)
    }

    /// A floor at or above the cap can never be met.
    pub fn validate(&self) -> Result<(), Error> {
        match (self.at_least.filter(|&t| t > 0), self.timeout.filter(|&t| t > 0)) {
            (Some(at_least), Some(timeout)) if at_least >= timeout => {
                Err(Error::TimersCoherence { delay: self.delay, at_least, timeout })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapOptions {
    /// Abort on the first failure. When off, the failure becomes the slot's value.
    pub catch_error: bool,
    /// Start every element at once instead of one after the other.
    pub parallel: bool,
    #[serde(flatten)]
    pub timers: Timers,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { catch_error: true, parallel: true, timers: Timers::default() }
    }
}

impl MapOptions {
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn collect_errors(mut self) -> Self {
        self.catch_error = false;
        self
    }

    pub fn timers(mut self, timers: Timers) -> Self {
        self.timers = timers;
        self
    }
}

/// Options of the strictly ordered traversals: `find`, `some`, `sequence`
/// and `sequence_all_settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerialOptions {
    pub catch_error: bool,
    #[serde(flatten)]
    pub timers: Timers,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self { catch_error: true, timers: Timers::default() }
    }
}

impl SerialOptions {
    pub fn collect_errors(mut self) -> Self {
        self.catch_error = false;
        self
    }

    pub fn timers(mut self, timers: Timers) -> Self {
        self.timers = timers;
        self
    }
}

impl From<Timers> for SerialOptions {
    fn from(timers: Timers) -> Self {
        Self::default().timers(timers)
    }
}

impl From<SerialOptions> for MapOptions {
    fn from(options: SerialOptions) -> Self {
        Self { catch_error: options.catch_error, parallel: false, timers: options.timers }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollOptions {
    #[serde(alias = "ellapsed")]
    pub interval: u64,
    pub max_iterations: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { interval: DEFAULT_TIME_MS, max_iterations: DEFAULT_MAX_ITERATIONS }
    }
}

impl PollOptions {
    pub fn interval(mut self, ms: u64) -> Self {
        self.interval = ms;
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryOptions {
    #[serde(flatten)]
    pub poll: PollOptions,
    /// Swallow failed attempts and keep polling.
    pub retry: bool,
    #[serde(flatten)]
    pub timers: Timers,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self { poll: PollOptions::default(), retry: true, timers: Timers::default() }
    }
}

impl RetryOptions {
    pub fn interval(mut self, ms: u64) -> Self {
        self.poll.interval = ms;
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.poll.max_iterations = max;
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    pub fn timers(mut self, timers: Timers) -> Self {
        self.timers = timers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coherent_when_floor_is_below_cap() {
        assert!(Timers::default().at_least(10).timeout(20).validate().is_ok());
        assert!(Timers::default().at_least(10).validate().is_ok());
        assert!(Timers::default().at_least(0).timeout(5).validate().is_ok());
    }

    #[test]
    fn incoherent_when_floor_reaches_cap() {
        let err = Timers::default().delay(1).at_least(20).timeout(20).validate();
        assert!(matches!(
            err,
            Err(Error::TimersCoherence { delay: Some(1), at_least: 20, timeout: 20 })
        ));
    }

    #[test]
    fn map_options_read_camel_case_with_defaults() {
        let options: MapOptions =
            serde_json::from_value(serde_json::json!({"parallel": false, "atLeast": 5}))
                .expect("valid options");
        assert!(options.catch_error);
        assert!(!options.parallel);
        assert_eq!(options.timers, Timers::default().at_least(5));
    }

    #[test]
    fn retry_options_flatten_poll_and_timers() {
        let options: RetryOptions = serde_json::from_value(
            serde_json::json!({"interval": 10, "maxIterations": 3, "retry": false, "timeout": 50}),
        )
        .expect("valid options");
        assert_eq!(options.poll, PollOptions::default().interval(10).max_iterations(3));
        assert!(!options.retry);
        assert_eq!(options.timers.timeout, Some(50));
    }
}
