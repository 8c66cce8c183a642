//! Raw planning boundary.
//!
//! These calls have the shape of a C transform library's ABI: base pointers,
//! integer extents (outermost first), a signed direction constant and a flag
//! bitmask come in; an opaque plan pointer comes out and is later executed
//! and destroyed through the same boundary. Nothing here knows about
//! [`FftArray`](crate::array::FftArray); keeping the pointers valid is the
//! caller's job.

use core::fmt::Write as _;
use core::ptr::{self, NonNull};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::array::ALIGNMENT;
use crate::engine::dft::{Algorithm, DftLine};
use crate::engine::nd::{sweep_axis, sweep_scratch_len, Workers};
use crate::engine::planner::{Planner, PlannerError};
use crate::engine::real::{complex_line_len, half_spectrum_len, RealLine};
use crate::engine::EngineShared;
use crate::flags::{Direction, Flags};
use crate::num::{Complex, Float};

/// Largest extent the ABI's `int` can carry.
const MAX_EXTENT: usize = i32::MAX as usize;

enum Buffers<T: Float> {
    Dft {
        input: NonNull<Complex<T>>,
        output: NonNull<Complex<T>>,
    },
    R2c {
        input: NonNull<T>,
        output: NonNull<Complex<T>>,
    },
    C2r {
        input: NonNull<Complex<T>>,
        output: NonNull<T>,
    },
}

/// Opaque plan produced by the `plan_*` calls.
pub(crate) struct RawPlan<T: Float> {
    /// Logical extents; for real transforms these are the real-side extents.
    extents: Vec<usize>,
    /// Extents of the complex side. Equal to `extents` for C2C.
    spectrum: Vec<usize>,
    direction: Direction,
    flags: Flags,
    buffers: Buffers<T>,
    /// Complex line for each swept axis. Real transforms sweep every axis
    /// except the last, which is handled by `real`.
    axes: Vec<Arc<DftLine<T>>>,
    real: Option<RealLine<T>>,
    scratch: Vec<Complex<T>>,
    /// Copy of the C2R input so the caller's spectrum is left untouched.
    staging: Vec<Complex<T>>,
    workers: Workers,
    /// Offsets of the input and output pointers from [`ALIGNMENT`] at
    /// planning time.
    alignment: (usize, usize),
}

fn validate_extents(extents: &[usize]) -> Result<(), PlannerError> {
    if extents.is_empty() {
        return Err(PlannerError::ZeroExtent { axis: 0 });
    }
    for (axis, &extent) in extents.iter().enumerate() {
        if extent == 0 {
            return Err(PlannerError::ZeroExtent { axis });
        }
        if extent > MAX_EXTENT {
            return Err(PlannerError::ExtentTooLarge { axis, extent });
        }
    }
    Ok(())
}

fn checked_ptr<E>(ptr: *mut E) -> Result<NonNull<E>, PlannerError> {
    let ptr = NonNull::new(ptr).ok_or(PlannerError::Misaligned)?;
    if ptr.as_ptr() as usize % core::mem::align_of::<E>() != 0 {
        return Err(PlannerError::Misaligned);
    }
    Ok(ptr)
}

fn offset<E>(ptr: NonNull<E>) -> usize {
    ptr.as_ptr() as usize % ALIGNMENT
}

/// Choose algorithms for every distinct length in `lengths` and build one
/// shared line per length.
fn plan_lines<T: Float>(
    planner: &Planner<'_>,
    lengths: impl IntoIterator<Item = usize>,
    mut trial: Option<&mut [Complex<T>]>,
) -> Result<HashMap<usize, Arc<DftLine<T>>>, PlannerError> {
    let mut lines = HashMap::new();
    for n in lengths {
        if lines.contains_key(&n) {
            continue;
        }
        let algorithm = planner.choose::<T>(n, trial.as_deref_mut())?;
        lines.insert(n, Arc::new(DftLine::new(n, algorithm)?));
    }
    Ok(lines)
}

fn pick_axes<T: Float>(
    lines: &HashMap<usize, Arc<DftLine<T>>>,
    extents: &[usize],
) -> Result<Vec<Arc<DftLine<T>>>, PlannerError> {
    extents
        .iter()
        .map(|n| {
            lines
                .get(n)
                .cloned()
                .ok_or(PlannerError::UnsupportedLength { n: *n })
        })
        .collect()
}

fn real_line<T: Float>(
    planner: &Planner<'_>,
    n: usize,
    trial: Option<&mut [Complex<T>]>,
) -> Result<RealLine<T>, PlannerError> {
    let algorithm = match complex_line_len(n) {
        Some(len) => Some(planner.choose::<T>(len, trial)?),
        None => None,
    };
    RealLine::new(n, algorithm)
}

impl<T: Float> RawPlan<T> {
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        engine: &EngineShared,
        extents: &[usize],
        spectrum: Vec<usize>,
        direction: Direction,
        flags: Flags,
        buffers: Buffers<T>,
        axes: Vec<Arc<DftLine<T>>>,
        real: Option<RealLine<T>>,
        staging: Vec<Complex<T>>,
    ) -> NonNull<RawPlan<T>> {
        let scratch_len = axes
            .iter()
            .map(|line| sweep_scratch_len(line))
            .chain(real.as_ref().map(RealLine::scratch_len))
            .max()
            .unwrap_or(0);
        let alignment = match &buffers {
            Buffers::Dft { input, output } => (offset(*input), offset(*output)),
            Buffers::R2c { input, output } => (offset(*input), offset(*output)),
            Buffers::C2r { input, output } => (offset(*input), offset(*output)),
        };
        let plan = Box::new(RawPlan {
            extents: extents.to_vec(),
            spectrum,
            direction,
            flags,
            buffers,
            axes,
            real,
            scratch: vec![Complex::zero(); scratch_len],
            staging,
            workers: engine.workers(),
            alignment,
        });
        engine.live_plans.fetch_add(1, Ordering::AcqRel);
        debug!("planned {}", plan.describe_head());
        NonNull::from(Box::leak(plan))
    }

    fn kind_name(&self) -> &'static str {
        match self.buffers {
            Buffers::Dft { .. } => "dft",
            Buffers::R2c { .. } => "dft-r2c",
            Buffers::C2r { .. } => "dft-c2r",
        }
    }

    fn describe_head(&self) -> String {
        let shape = self
            .extents
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join("x");
        format!(
            "{}-{}d {shape} {} {:?}",
            self.kind_name(),
            self.extents.len(),
            self.direction.as_str(),
            self.flags
        )
    }

    /// Nested, human-readable account of the plan.
    pub fn describe(&self) -> String {
        let mut out = format!("({}", self.describe_head());
        for (axis, line) in self.axes.iter().enumerate() {
            let _ = write!(out, "\n  (axis {axis} {} {})", line.algorithm().as_str(), line.len());
        }
        if let Some(real) = &self.real {
            let _ = write!(
                out,
                "\n  (axis {} real {} {})",
                self.extents.len() - 1,
                real.algorithm().as_str(),
                real.len()
            );
        }
        out.push(')');
        out
    }

    /// Estimated floating-point operations of one execution.
    pub fn flops(&self) -> f64 {
        let total: usize = self.spectrum.iter().product();
        let mut flops: f64 = self
            .axes
            .iter()
            .map(|line| (total / line.len()) as f64 * line.flops())
            .sum();
        if let Some(real) = &self.real {
            let rows: usize = self.extents[..self.extents.len() - 1].iter().product();
            flops += rows as f64 * real.flops();
        }
        flops
    }

    // SAFETY (callers): `input` and `output` cover `total` cells each, and
    // nothing else accesses them for the duration of the call.
    unsafe fn run_dft(&mut self, input: NonNull<Complex<T>>, output: NonNull<Complex<T>>) {
        let total: usize = self.extents.iter().product();
        if input != output {
            ptr::copy(input.as_ptr(), output.as_ptr(), total);
        }
        let data = core::slice::from_raw_parts_mut(output.as_ptr(), total);
        let inverse = self.direction == Direction::Inverse;
        for axis in (0..self.extents.len()).rev() {
            sweep_axis(
                &self.workers,
                data,
                &self.extents,
                axis,
                &self.axes[axis],
                inverse,
                &mut self.scratch,
            );
        }
    }

    unsafe fn run_r2c(&mut self, input: NonNull<T>, output: NonNull<Complex<T>>) {
        let Some(real) = self.real.as_ref() else {
            return;
        };
        let rank = self.extents.len();
        let n = self.extents[rank - 1];
        let h = self.spectrum[rank - 1];
        let rows: usize = self.extents[..rank - 1].iter().product();
        let input = core::slice::from_raw_parts(input.as_ptr(), rows * n);
        let output = core::slice::from_raw_parts_mut(output.as_ptr(), rows * h);
        self.workers.for_each_row_pair(
            input,
            n,
            output,
            h,
            &mut self.scratch[..real.scratch_len()],
            |row_in, row_out, s| real.forward(row_in, row_out, s),
        );
        for axis in (0..rank - 1).rev() {
            sweep_axis(
                &self.workers,
                output,
                &self.spectrum,
                axis,
                &self.axes[axis],
                false,
                &mut self.scratch,
            );
        }
    }

    unsafe fn run_c2r(&mut self, input: NonNull<Complex<T>>, output: NonNull<T>) {
        let Some(real) = self.real.as_ref() else {
            return;
        };
        let rank = self.extents.len();
        let n = self.extents[rank - 1];
        let h = self.spectrum[rank - 1];
        let rows: usize = self.extents[..rank - 1].iter().product();
        self.staging
            .copy_from_slice(core::slice::from_raw_parts(input.as_ptr(), rows * h));
        for axis in (0..rank - 1).rev() {
            sweep_axis(
                &self.workers,
                &mut self.staging,
                &self.spectrum,
                axis,
                &self.axes[axis],
                true,
                &mut self.scratch,
            );
        }
        let output = core::slice::from_raw_parts_mut(output.as_ptr(), rows * n);
        self.workers.for_each_row_pair(
            &self.staging,
            h,
            output,
            n,
            &mut self.scratch[..real.scratch_len()],
            |row_in, row_out, s| real.inverse(row_in, row_out, s),
        );
    }
}

/// Plan a complex transform of rank `extents.len()`. `input` may equal
/// `output` for an in-place transform.
///
/// # Safety
/// Both pointers must be valid for reads and writes of
/// `extents.iter().product()` cells for the duration of the call, and, unless
/// `ESTIMATE` or `WISDOM_ONLY` is set, nothing else may access `output` while
/// the planner measures on it.
pub(crate) unsafe fn plan_dft<T: Float>(
    engine: &EngineShared,
    extents: &[usize],
    input: *mut Complex<T>,
    output: *mut Complex<T>,
    sign: i32,
    flags: u32,
) -> Result<NonNull<RawPlan<T>>, PlannerError> {
    validate_extents(extents)?;
    let direction = Direction::from_sign(sign).ok_or(PlannerError::InvalidDirection { sign })?;
    let input = checked_ptr(input)?;
    let output = checked_ptr(output)?;
    let flags = Flags::from_bits_retain(flags);
    let planner = Planner::new(engine, flags);

    let trial = Planner::measures(flags).then(|| {
        let total = extents.iter().product();
        // SAFETY: the caller lends `output` to the planner.
        unsafe { core::slice::from_raw_parts_mut(output.as_ptr(), total) }
    });
    let lines = plan_lines(&planner, extents.iter().copied(), trial)?;
    let axes = pick_axes(&lines, extents)?;

    Ok(RawPlan::assemble(
        engine,
        extents,
        extents.to_vec(),
        direction,
        flags,
        Buffers::Dft { input, output },
        axes,
        None,
        Vec::new(),
    ))
}

/// Plan a real-input forward transform. `extents` are the real input's;
/// the output holds `n/2 + 1` cells along the last axis.
///
/// # Safety
/// As for [`plan_dft`], with `input` covering the real extents and `output`
/// the halved complex extents.
pub(crate) unsafe fn plan_dft_r2c<T: Float>(
    engine: &EngineShared,
    extents: &[usize],
    input: *mut T,
    output: *mut Complex<T>,
    flags: u32,
) -> Result<NonNull<RawPlan<T>>, PlannerError> {
    validate_extents(extents)?;
    let input = checked_ptr(input)?;
    let output = checked_ptr(output)?;
    let flags = Flags::from_bits_retain(flags);
    let planner = Planner::new(engine, flags);
    let spectrum = spectrum_extents(extents);
    let rank = extents.len();

    let mut trial = Planner::measures(flags).then(|| {
        let total = spectrum.iter().product();
        // SAFETY: the caller lends `output` to the planner.
        unsafe { core::slice::from_raw_parts_mut(output.as_ptr(), total) }
    });
    let real = real_line(&planner, extents[rank - 1], trial.as_deref_mut())?;
    let lines = plan_lines(&planner, extents[..rank - 1].iter().copied(), trial)?;
    let axes = pick_axes(&lines, &extents[..rank - 1])?;

    Ok(RawPlan::assemble(
        engine,
        extents,
        spectrum,
        Direction::Forward,
        flags,
        Buffers::R2c { input, output },
        axes,
        Some(real),
        Vec::new(),
    ))
}

/// Plan a real-output inverse transform. `extents` are the real output's;
/// the input holds `n/2 + 1` cells along the last axis and is never written.
///
/// # Safety
/// As for [`plan_dft_r2c`] with the roles of the buffers swapped.
pub(crate) unsafe fn plan_dft_c2r<T: Float>(
    engine: &EngineShared,
    extents: &[usize],
    input: *mut Complex<T>,
    output: *mut T,
    flags: u32,
) -> Result<NonNull<RawPlan<T>>, PlannerError> {
    validate_extents(extents)?;
    let input = checked_ptr(input)?;
    let output = checked_ptr(output)?;
    let flags = Flags::from_bits_retain(flags);
    let planner = Planner::new(engine, flags);
    let spectrum = spectrum_extents(extents);
    let rank = extents.len();

    // Measuring runs on the staging copy rather than on caller memory.
    let mut staging = vec![Complex::zero(); spectrum.iter().product()];
    let mut trial = Planner::measures(flags).then_some(staging.as_mut_slice());
    let real = real_line(&planner, extents[rank - 1], trial.as_deref_mut())?;
    let lines = plan_lines(&planner, extents[..rank - 1].iter().copied(), trial)?;
    let axes = pick_axes(&lines, &extents[..rank - 1])?;

    Ok(RawPlan::assemble(
        engine,
        extents,
        spectrum,
        Direction::Inverse,
        flags,
        Buffers::C2r { input, output },
        axes,
        Some(real),
        staging,
    ))
}

fn spectrum_extents(extents: &[usize]) -> Vec<usize> {
    let mut spectrum = extents.to_vec();
    if let Some(last) = spectrum.last_mut() {
        *last = half_spectrum_len(*last);
    }
    spectrum
}

/// Run the plan on the buffers it was created with.
///
/// # Safety
/// `plan` came from one of the `plan_*` calls and has not been destroyed;
/// its buffers are still valid and not accessed by anyone else.
pub(crate) unsafe fn execute<T: Float>(mut plan: NonNull<RawPlan<T>>) {
    let plan = plan.as_mut();
    trace!("execute {}", plan.describe_head());
    match plan.buffers {
        Buffers::Dft { input, output } => plan.run_dft(input, output),
        Buffers::R2c { input, output } => plan.run_r2c(input, output),
        Buffers::C2r { input, output } => plan.run_c2r(input, output),
    }
}

/// Run a complex plan on new buffers of the planned extents. Unless the plan
/// was created with `UNALIGNED`, both pointers must have the same offset from
/// [`ALIGNMENT`] as the planned ones. Plans of other kinds are left alone.
///
/// # Safety
/// As for [`execute`], with `input` and `output` covering the planned
/// extents.
pub(crate) unsafe fn execute_dft<T: Float>(
    mut plan: NonNull<RawPlan<T>>,
    input: *mut Complex<T>,
    output: *mut Complex<T>,
) -> Result<(), PlannerError> {
    let plan = plan.as_mut();
    let input = checked_ptr(input)?;
    let output = checked_ptr(output)?;
    if !plan.flags.contains(Flags::UNALIGNED) && (offset(input), offset(output)) != plan.alignment {
        return Err(PlannerError::Misaligned);
    }
    if let Buffers::Dft { .. } = plan.buffers {
        trace!("execute_dft {}", plan.describe_head());
        plan.run_dft(input, output);
    }
    Ok(())
}

/// Release a plan.
///
/// # Safety
/// `plan` came from one of the `plan_*` calls on `engine` and is not used
/// again.
pub(crate) unsafe fn destroy_plan<T: Float>(engine: &EngineShared, plan: NonNull<RawPlan<T>>) {
    let plan = Box::from_raw(plan.as_ptr());
    trace!("destroy {}", plan.describe_head());
    engine.live_plans.fetch_sub(1, Ordering::AcqRel);
}

/// Algorithm chosen for the complex line of each axis, outermost first.
/// Real transforms report the algorithm of the packed line for the last
/// axis.
pub(crate) fn algorithms<T: Float>(plan: &RawPlan<T>) -> Vec<Algorithm> {
    plan.axes
        .iter()
        .map(|line| line.algorithm())
        .chain(plan.real.as_ref().map(RealLine::algorithm))
        .collect()
}
