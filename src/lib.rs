//! # fftplan - FFTW-style transform planning for Rust
//!
//! Plans are the unit of work: a plan is created once for a fixed shape,
//! direction and pair of arrays, executed as often as needed and destroyed
//! exactly once. Everything goes through an [`Engine`] context, which owns
//! the accumulated planning wisdom and an optional worker pool.
//!
//! ## Features
//!
//! - **Aligned arrays**: rank 1/2/3 contiguous row-major storage, 64-byte
//!   aligned and zero-initialised, addressable through `ndarray` views
//! - **Transform kinds**: complex-to-complex, real-to-complex and
//!   complex-to-real, in one, two and three dimensions
//! - **Planning strategies**: `ESTIMATE` heuristics, or timed `MEASURE`,
//!   `PATIENT` and `EXHAUSTIVE` searches recorded as wisdom
//! - **Wisdom**: export, import and file round trips with a checksum
//! - **Any length**: small-size butterflies, Stockham radix-2, Bluestein
//!   chirp-z and the direct DFT
//!
//! ## Cargo Features
//!
//! - `verbose-logging` (default): Emit planning and lifecycle events through
//!   the `log` facade
//! - `parallel`: Transform independent rows on an engine-owned Rayon pool
//!
//! ## Conventions
//!
//! Transforms are unnormalised in both directions: a forward transform
//! followed by an inverse one multiplies the data by the number of cells.
//! Direction signs and flag bits carry the FFTW ABI values.
//!
//! ## Example
//!
//! ```
//! use fftplan::{Complex64, Direction, Engine, Flags};
//!
//! let engine = Engine::new();
//! let n = 16;
//! let signal = engine.alloc_1d::<Complex64>(n).unwrap();
//! let spectrum = engine.alloc_1d::<Complex64>(n).unwrap();
//! let mut plan = engine
//!     .plan_dft_1d(&signal, &spectrum, Direction::Forward, Flags::ESTIMATE)
//!     .unwrap();
//!
//! for (i, x) in signal.write().iter_mut().enumerate() {
//!     let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
//!     *x = Complex64::new(t.cos(), 0.0);
//! }
//! plan.execute().unwrap();
//! assert!((spectrum.read()[1].re - n as f64 / 2.0).abs() < 1e-9);
//! ```
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 (<https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license (<https://opensource.org/licenses/MIT>)
//!
//! at your option.

#[macro_use]
mod logging;

/// Aligned multi-dimensional arrays
///
/// Allocation, element access and the pointer/extent views handed to the
/// engine.
pub mod array;

/// Engine configuration and `FFTPLAN_*` environment overrides
pub mod config;

/// Engine context, planner, wisdom and the native transform layer
pub mod engine;

/// Transform direction and planner flags
pub mod flags;

/// Fixed-size butterflies
pub mod kernels;

/// Complex numbers and the float abstraction
pub mod num;

/// Plan objects
pub mod plan;

pub use array::{AllocError, FftArray, FftArray1, FftArray2, FftArray3, ALIGNMENT};
pub use config::{ConfigError, EngineConfig};
pub use engine::planner::PlannerError;
pub use engine::wisdom::WisdomError;
pub use engine::Engine;
pub use flags::{Direction, Flags};
pub use num::{Complex, Complex32, Complex64, Float};
pub use plan::{Plan, PlanError, TransformKind};
