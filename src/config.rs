//! Engine configuration with environment overrides.
//!
//! Every knob has a compiled-in default and may be overridden through an
//! `FFTPLAN_*` environment variable when the engine is built with
//! [`EngineConfig::from_env`]. Malformed values are reported instead of being
//! silently replaced by the default.

use core::fmt;

/// Worker threads used by the parallel row sweeps.
pub const ENV_THREADS: &str = "FFTPLAN_THREADS";
/// Minimum number of elements in a transform before rows are parallelised.
pub const ENV_PAR_THRESHOLD: &str = "FFTPLAN_PAR_THRESHOLD";
/// Timing repetitions per candidate when planning with `MEASURE`.
pub const ENV_MEASURE_TRIALS: &str = "FFTPLAN_MEASURE_TRIALS";
/// Largest length for which the direct O(n²) DFT is considered.
pub const ENV_NAIVE_LIMIT: &str = "FFTPLAN_NAIVE_LIMIT";

const DEFAULT_PAR_THRESHOLD: usize = 1 << 15;
const DEFAULT_MEASURE_TRIALS: usize = 3;
const DEFAULT_NAIVE_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but does not parse as a positive integer.
    InvalidValue { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { var, value } => {
                write!(f, "{var} must be a positive integer, got {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub threads: usize,
    pub parallel_threshold: usize,
    pub measure_trials: usize,
    pub naive_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get().max(1),
            parallel_threshold: DEFAULT_PAR_THRESHOLD,
            measure_trials: DEFAULT_MEASURE_TRIALS,
            naive_limit: DEFAULT_NAIVE_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `FFTPLAN_*` variables present in the
    /// process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-supplied lookup,
    /// which keeps tests independent of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, ENV_THREADS)? {
            config.threads = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_PAR_THRESHOLD)? {
            config.parallel_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MEASURE_TRIALS)? {
            config.measure_trials = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_NAIVE_LIMIT)? {
            config.naive_limit = v;
        }
        Ok(config)
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn parallel_threshold(mut self, elements: usize) -> Self {
        self.parallel_threshold = elements;
        self
    }

    pub fn measure_trials(mut self, trials: usize) -> Self {
        self.measure_trials = trials.max(1);
        self
    }

    pub fn naive_limit(mut self, n: usize) -> Self {
        self.naive_limit = n;
        self
    }
}

fn parse_var<F>(lookup: &F, var: &'static str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Ok(Some(v)),
        _ => Err(ConfigError::InvalidValue { var, value: raw }),
    }
}
