//! Algorithm selection for a single line length.

use core::fmt;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use crate::engine::dft::{Algorithm, DftLine};
use crate::engine::wisdom::{Rigor, WisdomEntry};
use crate::engine::EngineShared;
use crate::flags::Flags;
use crate::kernels;
use crate::num::{Complex, Float};

/// Lengths up to this size use the direct DFT under `ESTIMATE` when no
/// faster structure exists.
const SMALL_DIRECT: usize = 16;

/// Reasons the planner refuses to produce a plan. Planning is
/// deterministic: the same shape and flags always fail the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerError {
    ZeroExtent { axis: usize },
    /// The extent does not fit the engine's native `int`.
    ExtentTooLarge { axis: usize, extent: usize },
    /// No algorithm can transform this length at the requested precision.
    UnsupportedLength { n: usize },
    /// `WISDOM_ONLY` was requested and no wisdom covers this length.
    NoWisdom { n: usize },
    /// A buffer pointer is not aligned for its element type, or does not
    /// share the alignment the plan was created with.
    Misaligned,
    /// The direction sign is neither -1 nor +1.
    InvalidDirection { sign: i32 },
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::ZeroExtent { axis } => write!(f, "axis {axis} has zero extent"),
            PlannerError::ExtentTooLarge { axis, extent } => {
                write!(f, "extent {extent} of axis {axis} exceeds the native int range")
            }
            PlannerError::UnsupportedLength { n } => write!(f, "no algorithm supports length {n}"),
            PlannerError::NoWisdom { n } => write!(f, "no wisdom for length {n}"),
            PlannerError::Misaligned => write!(f, "buffer alignment does not match the plan"),
            PlannerError::InvalidDirection { sign } => write!(f, "invalid direction sign {sign}"),
        }
    }
}

impl std::error::Error for PlannerError {}

pub(crate) struct Planner<'a> {
    engine: &'a EngineShared,
    flags: Flags,
}

impl<'a> Planner<'a> {
    pub fn new(engine: &'a EngineShared, flags: Flags) -> Self {
        Self { engine, flags }
    }

    /// Whether choosing algorithms under these flags may run trial
    /// transforms on caller memory.
    pub fn measures(flags: Flags) -> bool {
        !flags.contains(Flags::ESTIMATE) && !flags.contains(Flags::WISDOM_ONLY)
    }

    /// Pick an algorithm for lines of length `n`. `trial` is a buffer of at
    /// least `n` cells the planner may overwrite while measuring; without it
    /// an internal buffer is used.
    pub fn choose<T: Float>(
        &self,
        n: usize,
        trial: Option<&mut [Complex<T>]>,
    ) -> Result<Algorithm, PlannerError> {
        if n == 1 {
            return Ok(Algorithm::Identity);
        }
        let known = self
            .engine
            .wisdom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(T::PRECISION, n);

        if self.flags.contains(Flags::WISDOM_ONLY) {
            return known.map(|e| e.algorithm).ok_or(PlannerError::NoWisdom { n });
        }
        if self.flags.contains(Flags::ESTIMATE) {
            return Ok(known.map_or_else(|| self.estimate(n), |e| e.algorithm));
        }

        let rigor = Rigor::from_flags(self.flags);
        if let Some(entry) = known.filter(|e| e.rigor >= rigor) {
            trace!("wisdom hit for n = {n}: {}", entry.algorithm.as_str());
            return Ok(entry.algorithm);
        }
        let algorithm = self.measure::<T>(n, rigor, trial)?;
        self.engine
            .wisdom
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(T::PRECISION, n, WisdomEntry { algorithm, rigor });
        Ok(algorithm)
    }

    fn estimate(&self, n: usize) -> Algorithm {
        if kernels::has_kernel(n) {
            Algorithm::Kernel
        } else if n.is_power_of_two() {
            Algorithm::Stockham
        } else if n <= SMALL_DIRECT
            || (self.flags.contains(Flags::CONSERVE_MEMORY) && n <= self.engine.config.naive_limit)
        {
            Algorithm::Direct
        } else {
            Algorithm::Bluestein
        }
    }

    fn candidates(&self, n: usize, rigor: Rigor) -> Vec<Algorithm> {
        let direct_limit = self.engine.config.naive_limit.saturating_mul(rigor.effort());
        Algorithm::ALL
            .into_iter()
            .filter(|a| a.supports(n))
            .filter(|a| *a != Algorithm::Direct || n <= direct_limit)
            .collect()
    }

    fn measure<T: Float>(
        &self,
        n: usize,
        rigor: Rigor,
        trial: Option<&mut [Complex<T>]>,
    ) -> Result<Algorithm, PlannerError> {
        let candidates = self.candidates(n, rigor);
        if candidates.len() == 1 {
            return Ok(candidates[0]);
        }
        let mut owned;
        let buffer: &mut [Complex<T>] = match trial {
            Some(t) if t.len() >= n => &mut t[..n],
            _ => {
                owned = vec![Complex::zero(); n];
                &mut owned
            }
        };
        let trials = self.engine.config.measure_trials.max(1) * rigor.effort();

        let mut best: Option<(Algorithm, Duration)> = None;
        for candidate in candidates {
            let line = match DftLine::<T>::new(n, candidate) {
                Ok(line) => line,
                Err(_) => continue,
            };
            let mut scratch = vec![Complex::zero(); line.scratch_len()];
            let mut fastest = Duration::MAX;
            for _ in 0..trials {
                let start = Instant::now();
                line.forward(buffer, &mut scratch);
                fastest = fastest.min(start.elapsed());
            }
            debug!(
                "measured n = {n} {}: {:?} over {trials} trials",
                candidate.as_str(),
                fastest
            );
            if best.map_or(true, |(_, t)| fastest < t) {
                best = Some((candidate, fastest));
            }
        }
        best.map(|(a, _)| a)
            .ok_or(PlannerError::UnsupportedLength { n })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    #[test]
    fn estimate_heuristics() {
        let engine = Engine::new();
        let planner = Planner::new(engine.shared(), Flags::ESTIMATE);
        assert_eq!(planner.choose::<f64>(1, None).unwrap(), Algorithm::Identity);
        assert_eq!(planner.choose::<f64>(8, None).unwrap(), Algorithm::Kernel);
        assert_eq!(planner.choose::<f64>(64, None).unwrap(), Algorithm::Stockham);
        assert_eq!(planner.choose::<f64>(12, None).unwrap(), Algorithm::Direct);
        assert_eq!(planner.choose::<f64>(15, None).unwrap(), Algorithm::Direct);
        assert_eq!(planner.choose::<f64>(17, None).unwrap(), Algorithm::Bluestein);
        assert_eq!(planner.choose::<f64>(100, None).unwrap(), Algorithm::Bluestein);
        assert_eq!(engine.wisdom_len(), 0);
    }

    #[test]
    fn conserve_memory_prefers_direct_up_to_limit() {
        let engine = Engine::with_config(EngineConfig::default().naive_limit(128));
        let planner = Planner::new(engine.shared(), Flags::ESTIMATE | Flags::CONSERVE_MEMORY);
        assert_eq!(planner.choose::<f32>(100, None).unwrap(), Algorithm::Direct);
        assert_eq!(planner.choose::<f32>(130, None).unwrap(), Algorithm::Bluestein);
    }

    #[test]
    fn measuring_records_wisdom() {
        let engine = Engine::with_config(EngineConfig::default().measure_trials(1));
        let planner = Planner::new(engine.shared(), Flags::MEASURE);
        let chosen = planner.choose::<f64>(12, None).unwrap();
        assert!(matches!(chosen, Algorithm::Bluestein | Algorithm::Direct));
        assert_eq!(engine.wisdom_len(), 1);

        let wisdom_only = Planner::new(engine.shared(), Flags::WISDOM_ONLY);
        assert_eq!(wisdom_only.choose::<f64>(12, None).unwrap(), chosen);
        assert_eq!(
            wisdom_only.choose::<f32>(12, None),
            Err(PlannerError::NoWisdom { n: 12 })
        );
    }

    #[test]
    fn candidates_respect_direct_limit() {
        let engine = Engine::with_config(EngineConfig::default().naive_limit(8));
        let planner = Planner::new(engine.shared(), Flags::MEASURE);
        assert!(!planner.candidates(12, Rigor::Measure).contains(&Algorithm::Direct));
        assert!(planner.candidates(12, Rigor::Patient).contains(&Algorithm::Direct));
        assert_eq!(
            planner.candidates(8, Rigor::Measure),
            vec![Algorithm::Kernel, Algorithm::Stockham, Algorithm::Bluestein, Algorithm::Direct]
        );
    }
}
