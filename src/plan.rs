//! Plan objects and the engine calls that create them.
//!
//! A [`Plan`] is bound at creation to the arrays it was planned for and
//! runs on them every time it is executed. Plans are destroyed exactly once,
//! either explicitly with [`Plan::destroy`] or implicitly on drop, and hold
//! handles to their arrays so the memory outlives them.
//!
//! ```
//! use fftplan::{Complex64, Direction, Engine, Flags};
//!
//! let engine = Engine::new();
//! let input = engine.alloc_1d::<Complex64>(8).unwrap();
//! let output = engine.alloc_1d::<Complex64>(8).unwrap();
//! let mut plan = engine
//!     .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
//!     .unwrap();
//! input.fill(Complex64::new(1.0, 0.0));
//! plan.execute().unwrap();
//! assert_eq!(output.read()[0], Complex64::new(8.0, 0.0));
//! plan.destroy().unwrap();
//! ```

use core::fmt;
use core::ptr::NonNull;

use ndarray::Dimension;

use crate::array::{Binding, BufferLock, Element, FftArray, FftArray1, FftArray2, FftArray3};
use crate::engine::dft::Algorithm;
use crate::engine::planner::{Planner, PlannerError};
use crate::engine::raw::{self, RawPlan};
use crate::engine::real::half_spectrum_len;
use crate::engine::Engine;
use crate::flags::{Direction, Flags};
use crate::num::{Complex, Float};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Complex to complex.
    C2C,
    /// Real input, half-spectrum output.
    R2C,
    /// Half-spectrum input, real output.
    C2R,
}

impl TransformKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformKind::C2C => "c2c",
            TransformKind::R2C => "r2c",
            TransformKind::C2R => "c2r",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The arrays handed to a plan do not have the extents it requires.
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// The engine refused to plan the transform.
    Construction(PlannerError),
    /// The plan has already been destroyed.
    UseAfterDestroy,
    /// A bound array is locked by a guard (or another plan) right now.
    BufferBusy,
    /// New arrays must be in-place exactly when the planned ones were.
    InPlaceMismatch,
    /// The operation is only defined for another kind of transform.
    UnsupportedKind(TransformKind),
    /// New arrays do not share the alignment of the planned ones.
    Misaligned,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::ShapeMismatch { expected, found } => {
                write!(f, "expected extents {expected:?}, found {found:?}")
            }
            PlanError::Construction(e) => write!(f, "planning failed: {e}"),
            PlanError::UseAfterDestroy => write!(f, "plan used after destroy"),
            PlanError::BufferBusy => write!(f, "a bound array is locked elsewhere"),
            PlanError::InPlaceMismatch => {
                write!(f, "arrays must be in-place exactly when the planned ones were")
            }
            PlanError::UnsupportedKind(kind) => {
                write!(f, "operation not supported by {} plans", kind.as_str())
            }
            PlanError::Misaligned => write!(f, "arrays are not aligned like the planned ones"),
        }
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlanError::Construction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlannerError> for PlanError {
    fn from(e: PlannerError) -> Self {
        PlanError::Construction(e)
    }
}

enum Bound<T: Float> {
    Dft {
        input: Binding<Complex<T>>,
        output: Binding<Complex<T>>,
    },
    R2c {
        input: Binding<T>,
        output: Binding<Complex<T>>,
    },
    C2r {
        input: Binding<Complex<T>>,
        output: Binding<T>,
    },
}

impl<T: Float> Bound<T> {
    /// Guards for one execution: shared on the input, exclusive on the
    /// output, a single exclusive one when both are the same array.
    fn lock(&self) -> Result<Vec<BufferLock<'_>>, PlanError> {
        match self {
            Bound::Dft { input, output } => lock_pair(input, output),
            Bound::R2c { input, output } => lock_pair(input, output),
            Bound::C2r { input, output } => lock_pair(input, output),
        }
    }
}

fn lock_pair<'a, A: Element, B: Element>(
    input: &'a Binding<A>,
    output: &'a Binding<B>,
) -> Result<Vec<BufferLock<'a>>, PlanError> {
    let exclusive = output.try_lock_exclusive().ok_or(PlanError::BufferBusy)?;
    if input.same_storage(output) {
        return Ok(vec![exclusive]);
    }
    let shared = input.try_lock_shared().ok_or(PlanError::BufferBusy)?;
    Ok(vec![shared, exclusive])
}

struct Live<T: Float> {
    raw: NonNull<RawPlan<T>>,
    bound: Bound<T>,
}

/// A transform bound to specific arrays.
///
/// Executing and destroying need `&mut self`, so one plan is never run from
/// two threads at once. Different plans (even on the same arrays) may be
/// used from different threads; an execute that finds a bound array locked
/// returns [`PlanError::BufferBusy`] at once instead of waiting.
pub struct Plan<T: Float> {
    engine: Engine,
    live: Option<Live<T>>,
    kind: TransformKind,
    direction: Direction,
    flags: Flags,
    extents: Vec<usize>,
    in_place: bool,
}

// SAFETY: the raw plan is only reached through `&mut self` (or `&self` for
// read-only introspection), and the buffers it points into are kept alive
// and lock-protected by the bindings.
unsafe impl<T: Float> Send for Plan<T> {}

impl<T: Float> fmt::Debug for Plan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .field("flags", &self.flags)
            .field("extents", &self.extents)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl<T: Float> Plan<T> {
    /// Overwrite the bound output with the unnormalised transform of the
    /// bound input.
    pub fn execute(&mut self) -> Result<(), PlanError> {
        let live = self.live.as_ref().ok_or(PlanError::UseAfterDestroy)?;
        let _locks = live.bound.lock()?;
        // SAFETY: the raw plan is live, the bindings keep its buffers
        // allocated and the locks keep everyone else out of them.
        unsafe { raw::execute(live.raw) };
        Ok(())
    }

    /// Run a complex plan on other arrays of the planned extents. The new
    /// arrays must be in-place exactly when the planned ones were.
    pub fn execute_dft<D: Dimension>(
        &mut self,
        input: &FftArray<Complex<T>, D>,
        output: &FftArray<Complex<T>, D>,
    ) -> Result<(), PlanError> {
        let live = self.live.as_ref().ok_or(PlanError::UseAfterDestroy)?;
        if self.kind != TransformKind::C2C {
            return Err(PlanError::UnsupportedKind(self.kind));
        }
        for found in [input.extents(), output.extents()] {
            if found != self.extents.as_slice() {
                return Err(PlanError::ShapeMismatch {
                    expected: self.extents.clone(),
                    found: found.to_vec(),
                });
            }
        }
        if input.shares_storage(output) != self.in_place {
            return Err(PlanError::InPlaceMismatch);
        }
        let input = Binding::of(input);
        let output = Binding::of(output);
        let _locks = lock_pair(&input, &output)?;
        // SAFETY: as in `execute`; the temporary bindings cover the new
        // arrays for the duration of the call.
        unsafe { raw::execute_dft(live.raw, input.ptr().as_ptr(), output.ptr().as_ptr()) }
            .map_err(|_| PlanError::Misaligned)
    }

    /// Release the plan and its hold on the bound arrays. A second call
    /// reports [`PlanError::UseAfterDestroy`].
    pub fn destroy(&mut self) -> Result<(), PlanError> {
        let live = self.live.take().ok_or(PlanError::UseAfterDestroy)?;
        // SAFETY: `live` was taken out of the plan, so the raw plan is
        // released exactly once.
        unsafe { raw::destroy_plan(self.engine.shared(), live.raw) };
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.live.is_none()
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Logical extents: the complex extents for C2C, the real ones for R2C
    /// and C2R.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    fn raw(&self) -> Result<&RawPlan<T>, PlanError> {
        let live = self.live.as_ref().ok_or(PlanError::UseAfterDestroy)?;
        // SAFETY: live raw plans are only mutated through `&mut self`.
        Ok(unsafe { live.raw.as_ref() })
    }

    /// Algorithm chosen for each axis, outermost first.
    pub fn algorithms(&self) -> Result<Vec<Algorithm>, PlanError> {
        Ok(raw::algorithms(self.raw()?))
    }

    /// Nested text description of the plan, one line per axis.
    pub fn describe(&self) -> Result<String, PlanError> {
        Ok(self.raw()?.describe())
    }

    /// Estimated floating-point operations of one execution.
    pub fn flops(&self) -> Result<f64, PlanError> {
        Ok(self.raw()?.flops())
    }
}

impl<T: Float> Drop for Plan<T> {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            // SAFETY: taken out of the plan, released exactly once.
            unsafe { raw::destroy_plan(self.engine.shared(), live.raw) };
        }
    }
}

fn spectrum_of(extents: &[usize]) -> Vec<usize> {
    let mut spectrum = extents.to_vec();
    if let Some(last) = spectrum.last_mut() {
        *last = half_spectrum_len(*last);
    }
    spectrum
}

fn expect_extents(expected: Vec<usize>, found: &[usize]) -> Result<(), PlanError> {
    if expected.as_slice() == found {
        Ok(())
    } else {
        Err(PlanError::ShapeMismatch {
            expected,
            found: found.to_vec(),
        })
    }
}

/// Hold the output exclusively while the planner may measure on it.
fn measure_lock<E: Element>(output: &Binding<E>, flags: Flags) -> Result<Option<BufferLock<'_>>, PlanError> {
    if !Planner::measures(flags) {
        return Ok(None);
    }
    output
        .try_lock_exclusive()
        .map(Some)
        .ok_or(PlanError::BufferBusy)
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    fn finish_plan<T: Float>(
        &self,
        raw: NonNull<RawPlan<T>>,
        bound: Bound<T>,
        kind: TransformKind,
        direction: Direction,
        flags: Flags,
        extents: &[usize],
        in_place: bool,
    ) -> Plan<T> {
        Plan {
            engine: self.clone(),
            live: Some(Live { raw, bound }),
            kind,
            direction,
            flags,
            extents: extents.to_vec(),
            in_place,
        }
    }

    fn plan_c2c<T: Float, D: Dimension>(
        &self,
        input: &FftArray<Complex<T>, D>,
        output: &FftArray<Complex<T>, D>,
        direction: Direction,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        let parts_in = input.raw_parts();
        let parts_out = output.raw_parts();
        expect_extents(parts_in.extents.to_vec(), parts_out.extents)?;
        let in_place = input.shares_storage(output);
        let bound_in = Binding::of(input);
        let bound_out = Binding::of(output);

        let raw = {
            let _guard = measure_lock(&bound_out, flags)?;
            // SAFETY: both pointers cover the shared extents and are kept
            // alive by the bindings; the output is locked while measuring.
            unsafe {
                raw::plan_dft(
                    self.shared(),
                    parts_in.extents,
                    parts_in.ptr.as_ptr(),
                    parts_out.ptr.as_ptr(),
                    direction.sign(),
                    flags.bits(),
                )
            }?
        };
        Ok(self.finish_plan(
            raw,
            Bound::Dft {
                input: bound_in,
                output: bound_out,
            },
            TransformKind::C2C,
            direction,
            flags,
            parts_in.extents,
            in_place,
        ))
    }

    fn plan_r2c<T: Float, D: Dimension>(
        &self,
        input: &FftArray<T, D>,
        output: &FftArray<Complex<T>, D>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        let parts_in = input.raw_parts();
        let parts_out = output.raw_parts();
        expect_extents(spectrum_of(parts_in.extents), parts_out.extents)?;
        let bound_in = Binding::of(input);
        let bound_out = Binding::of(output);

        let raw = {
            let _guard = measure_lock(&bound_out, flags)?;
            // SAFETY: as in `plan_c2c`, with the halved extents on the
            // output side.
            unsafe {
                raw::plan_dft_r2c(
                    self.shared(),
                    parts_in.extents,
                    parts_in.ptr.as_ptr(),
                    parts_out.ptr.as_ptr(),
                    flags.bits(),
                )
            }?
        };
        Ok(self.finish_plan(
            raw,
            Bound::R2c {
                input: bound_in,
                output: bound_out,
            },
            TransformKind::R2C,
            Direction::Forward,
            flags,
            parts_in.extents,
            false,
        ))
    }

    fn plan_c2r<T: Float, D: Dimension>(
        &self,
        input: &FftArray<Complex<T>, D>,
        output: &FftArray<T, D>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        let parts_in = input.raw_parts();
        let parts_out = output.raw_parts();
        expect_extents(spectrum_of(parts_out.extents), parts_in.extents)?;
        // SAFETY: as in `plan_r2c` with the roles swapped; C2R planning
        // measures on internal memory only, so nothing needs locking.
        let raw = unsafe {
            raw::plan_dft_c2r(
                self.shared(),
                parts_out.extents,
                parts_in.ptr.as_ptr(),
                parts_out.ptr.as_ptr(),
                flags.bits(),
            )
        }?;
        Ok(self.finish_plan(
            raw,
            Bound::C2r {
                input: Binding::of(input),
                output: Binding::of(output),
            },
            TransformKind::C2R,
            Direction::Inverse,
            flags,
            parts_out.extents,
            false,
        ))
    }

    /// Complex transform of a vector. `input` and `output` may be the same
    /// array for an in-place transform.
    pub fn plan_dft_1d<T: Float>(
        &self,
        input: &FftArray1<Complex<T>>,
        output: &FftArray1<Complex<T>>,
        direction: Direction,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2c(input, output, direction, flags)
    }

    pub fn plan_dft_2d<T: Float>(
        &self,
        input: &FftArray2<Complex<T>>,
        output: &FftArray2<Complex<T>>,
        direction: Direction,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2c(input, output, direction, flags)
    }

    pub fn plan_dft_3d<T: Float>(
        &self,
        input: &FftArray3<Complex<T>>,
        output: &FftArray3<Complex<T>>,
        direction: Direction,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2c(input, output, direction, flags)
    }

    /// Forward transform of `n` real samples into `n/2 + 1` bins.
    pub fn plan_dft_r2c_1d<T: Float>(
        &self,
        input: &FftArray1<T>,
        output: &FftArray1<Complex<T>>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_r2c(input, output, flags)
    }

    /// `output` is `n0 x (n1/2 + 1)`.
    pub fn plan_dft_r2c_2d<T: Float>(
        &self,
        input: &FftArray2<T>,
        output: &FftArray2<Complex<T>>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_r2c(input, output, flags)
    }

    /// `output` is `n0 x n1 x (n2/2 + 1)`.
    pub fn plan_dft_r2c_3d<T: Float>(
        &self,
        input: &FftArray3<T>,
        output: &FftArray3<Complex<T>>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_r2c(input, output, flags)
    }

    /// Inverse of [`plan_dft_r2c_1d`](Self::plan_dft_r2c_1d), unscaled: a
    /// round trip multiplies the signal by `n`. The input is left intact.
    pub fn plan_dft_c2r_1d<T: Float>(
        &self,
        input: &FftArray1<Complex<T>>,
        output: &FftArray1<T>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2r(input, output, flags)
    }

    pub fn plan_dft_c2r_2d<T: Float>(
        &self,
        input: &FftArray2<Complex<T>>,
        output: &FftArray2<T>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2r(input, output, flags)
    }

    pub fn plan_dft_c2r_3d<T: Float>(
        &self,
        input: &FftArray3<Complex<T>>,
        output: &FftArray3<T>,
        flags: Flags,
    ) -> Result<Plan<T>, PlanError> {
        self.plan_c2r(input, output, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;

    #[test]
    fn destroyed_plans_release_their_arrays() {
        let engine = Engine::new();
        let a = engine.alloc_1d::<Complex64>(4).unwrap();
        let mut plan = engine
            .plan_dft_1d(&a, &a, Direction::Forward, Flags::ESTIMATE)
            .unwrap();
        // the array, both plan bindings and the probe itself
        assert_eq!(Binding::of(&a).holders(), 4);
        plan.destroy().unwrap();
        assert_eq!(Binding::of(&a).holders(), 2);
        assert_eq!(plan.destroy(), Err(PlanError::UseAfterDestroy));
        assert!(plan.is_destroyed());
    }

    #[test]
    fn measuring_needs_the_output_unlocked() {
        let engine = Engine::new();
        let input = engine.alloc_1d::<Complex64>(16).unwrap();
        let output = engine.alloc_1d::<Complex64>(16).unwrap();
        let guard = output.read();
        let err = engine
            .plan_dft_1d(&input, &output, Direction::Forward, Flags::MEASURE)
            .unwrap_err();
        assert_eq!(err, PlanError::BufferBusy);
        assert!(engine
            .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
            .is_ok());
        drop(guard);
    }

    #[test]
    fn errors_render() {
        let err = PlanError::from(PlannerError::NoWisdom { n: 12 });
        assert_eq!(err.to_string(), "planning failed: no wisdom for length 12");
        assert!(std::error::Error::source(&err).is_some());
    }
}
