//! The engine context and the native transform layer behind it.
//!
//! An [`Engine`] is the explicit init/teardown context every array and plan
//! is created through. It owns the planning wisdom, the configuration and,
//! with the `parallel` feature, a worker pool. Handles are cheap to clone and
//! all clones share the same context.
//!
//! Transforms themselves live in the submodules and are only reached through
//! the raw, pointer-and-extents planning calls in [`raw`], mirroring the ABI
//! of the C libraries this crate models.

pub mod dft;
pub(crate) mod nd;
pub mod planner;
pub(crate) mod raw;
pub(crate) mod real;
pub mod wisdom;

use core::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ndarray::{Ix1, Ix2, Ix3};

use crate::array::{AllocError, Element, FftArray1, FftArray2, FftArray3};
use crate::config::{ConfigError, EngineConfig};
use crate::engine::nd::Workers;
use crate::engine::wisdom::{Wisdom, WisdomError};

pub(crate) struct EngineShared {
    pub config: EngineConfig,
    pub wisdom: Mutex<Wisdom>,
    pub live_plans: AtomicUsize,
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl EngineShared {
    fn new(config: EngineConfig) -> Self {
        #[cfg(feature = "parallel")]
        let pool = build_pool(config.threads);
        Self {
            config,
            wisdom: Mutex::new(Wisdom::default()),
            live_plans: AtomicUsize::new(0),
            #[cfg(feature = "parallel")]
            pool,
        }
    }

    pub fn wisdom(&self) -> MutexGuard<'_, Wisdom> {
        self.wisdom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn workers(&self) -> Workers {
        #[cfg(feature = "parallel")]
        {
            Workers::new(self.pool.clone(), self.config.parallel_threshold)
        }
        #[cfg(not(feature = "parallel"))]
        {
            Workers::new(self.config.parallel_threshold)
        }
    }
}

#[cfg(feature = "parallel")]
fn build_pool(threads: usize) -> Option<Arc<rayon::ThreadPool>> {
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("fftplan-{i}"))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            warn!("failed to start {threads} worker threads, running serially: {e}");
            None
        }
    }
}

/// Shared planning context. See the [module docs](self).
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("live_plans", &self.live_plans())
            .field("wisdom", &self.wisdom_len())
            .finish()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        debug!("engine init: {config:?}");
        Self {
            shared: Arc::new(EngineShared::new(config)),
        }
    }

    /// Engine configured from the `FFTPLAN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_config(EngineConfig::from_env()?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub(crate) fn shared(&self) -> &EngineShared {
        &self.shared
    }

    /// Zeroed, aligned array of `n` cells.
    pub fn alloc_1d<E: Element>(&self, n: usize) -> Result<FftArray1<E>, AllocError> {
        FftArray1::zeroed(Ix1(n))
    }

    /// Zeroed, aligned `n0 x n1` array in row-major order.
    pub fn alloc_2d<E: Element>(&self, n0: usize, n1: usize) -> Result<FftArray2<E>, AllocError> {
        FftArray2::zeroed(Ix2(n0, n1))
    }

    /// Zeroed, aligned `n0 x n1 x n2` array in row-major order.
    pub fn alloc_3d<E: Element>(
        &self,
        n0: usize,
        n1: usize,
        n2: usize,
    ) -> Result<FftArray3<E>, AllocError> {
        FftArray3::zeroed(Ix3(n0, n1, n2))
    }

    /// Plans created through this engine (or any clone) that have not yet
    /// been destroyed.
    pub fn live_plans(&self) -> usize {
        self.shared.live_plans.load(Ordering::Acquire)
    }

    pub fn export_wisdom(&self) -> String {
        let text = self.shared.wisdom().export();
        debug!("exported wisdom ({} entries)", self.wisdom_len());
        text
    }

    /// Merge wisdom exported by [`export_wisdom`](Self::export_wisdom).
    /// Returns the number of entries read.
    pub fn import_wisdom(&self, text: &str) -> Result<usize, WisdomError> {
        let count = self.shared.wisdom().import(text)?;
        debug!("imported {count} wisdom entries");
        Ok(count)
    }

    pub fn export_wisdom_to_file(&self, path: impl AsRef<Path>) -> Result<(), WisdomError> {
        self.shared.wisdom().export_to_file(path)
    }

    pub fn import_wisdom_from_file(&self, path: impl AsRef<Path>) -> Result<usize, WisdomError> {
        let count = self.shared.wisdom().import_from_file(path)?;
        debug!("imported {count} wisdom entries from file");
        Ok(count)
    }

    pub fn forget_wisdom(&self) {
        self.shared.wisdom().clear();
    }

    pub fn wisdom_len(&self) -> usize {
        self.shared.wisdom().len()
    }

    /// Drop accumulated wisdom. Existing plans keep working.
    pub fn cleanup(&self) {
        self.forget_wisdom();
        trace!("engine cleanup");
    }

    /// End of the engine's life. Plans still alive keep the shared context
    /// (and their arrays) alive until they are destroyed or dropped.
    pub fn teardown(self) {
        let live = self.live_plans();
        if live > 0 {
            warn!("engine teardown with {live} live plan(s)");
        }
        self.cleanup();
        debug!("engine teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;

    #[test]
    fn clones_share_wisdom() {
        let engine = Engine::new();
        let other = engine.clone();
        engine
            .import_wisdom(&{
                let mut w = Wisdom::default();
                w.record(
                    crate::num::Precision::F64,
                    16,
                    wisdom::WisdomEntry {
                        algorithm: dft::Algorithm::Stockham,
                        rigor: wisdom::Rigor::Measure,
                    },
                );
                w.export()
            })
            .unwrap();
        assert_eq!(other.wisdom_len(), 1);
        other.cleanup();
        assert_eq!(engine.wisdom_len(), 0);
    }

    #[test]
    fn alloc_shapes() {
        let engine = Engine::new();
        let a = engine.alloc_3d::<Complex64>(2, 3, 4).unwrap();
        assert_eq!(a.extents(), &[2, 3, 4]);
        assert_eq!(a.dims(), (2, 3, 4));
        assert_eq!(
            engine.alloc_2d::<f32>(3, 0).unwrap_err(),
            AllocError::ZeroExtent { axis: 1 }
        );
    }
}
