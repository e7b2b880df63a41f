//! Simulation configuration.

use std::time::Duration;

/// Configuration for a [`Simulation`](crate::Simulation).
///
/// Use `SimulationConfig::default()` for the reference values, or customise
/// individual knobs via the builder methods. Builders clamp instead of
/// failing, so every built config is usable.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Ring buffer slots.
    pub capacity: usize,
    /// Largest allowed `calculated - displayed` distance.
    /// Always strictly smaller than `capacity`.
    pub max_ahead: u64,
    /// Target display rate in generations per second.
    pub gen_per_sec: u32,
    /// Worker sleep while the simulation is not running.
    pub idle_sleep: Duration,
    /// Worker sleep while the lookahead bound is saturated.
    pub backoff_sleep: Duration,
    /// How long a stop waits for the worker to exit.
    pub join_timeout: Duration,
    /// Emit a haptic pulse per displayed generation at rates <= 1/s.
    pub vibrate_every_gen: bool,
    /// Rule engine compute threads. `1` evaluates on the worker thread,
    /// `0` means one per physical core.
    pub rule_threads: usize,
    /// Period of the generations-per-second telemetry.
    pub stats_interval: Duration,
}

pub const DEFAULT_CAPACITY: usize = 128;
pub const DEFAULT_MAX_AHEAD: u64 = 100;

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_ahead: DEFAULT_MAX_AHEAD,
            gen_per_sec: 1,
            idle_sleep: Duration::from_millis(10),
            backoff_sleep: Duration::from_millis(5),
            join_timeout: Duration::from_secs(1),
            vibrate_every_gen: true,
            rule_threads: 1,
            stats_interval: Duration::from_secs(1),
        }
    }
}

impl SimulationConfig {
    /// Set the ring capacity. Re-clamps `max_ahead` below it.
    pub fn capacity(mut self, slots: usize) -> Self {
        self.capacity = slots.max(2);
        self.max_ahead = self.max_ahead.min(self.capacity as u64 - 1);
        self
    }

    /// Set the lookahead bound, clamped to `1..capacity`.
    pub fn max_ahead(mut self, generations: u64) -> Self {
        self.max_ahead = generations.clamp(1, self.capacity as u64 - 1);
        self
    }

    pub fn gen_per_sec(mut self, rate: u32) -> Self {
        self.gen_per_sec = rate.max(1);
        self
    }

    pub fn idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep = sleep;
        self
    }

    pub fn backoff_sleep(mut self, sleep: Duration) -> Self {
        self.backoff_sleep = sleep;
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn vibrate_every_gen(mut self, enabled: bool) -> Self {
        self.vibrate_every_gen = enabled;
        self
    }

    pub fn rule_threads(mut self, threads: usize) -> Self {
        self.rule_threads = threads;
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Defaults with `LIFE_GEN_PER_SEC`, `LIFE_MAX_AHEAD` and
    /// `LIFE_RULE_THREADS` applied. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|v| {
                let v = v.trim();
                if v.is_empty() { None } else { v.parse().ok() }
            })
        }

        let mut config = self;
        if let Some(rate) = parsed::<u32>(lookup("LIFE_GEN_PER_SEC")) {
            config = config.gen_per_sec(rate);
        }
        if let Some(ahead) = parsed::<u64>(lookup("LIFE_MAX_AHEAD")) {
            config = config.max_ahead(ahead);
        }
        if let Some(threads) = parsed::<usize>(lookup("LIFE_RULE_THREADS")) {
            config = config.rule_threads(threads);
        }
        config
    }
}
