//! Real-input (R2C) and real-output (C2R) line transforms.
//!
//! Even lengths pack the `n` real samples into `n/2` complex points, run a
//! half-length complex transform and split the result using the conjugate
//! symmetry of real signals. Odd lengths go through a full-length complex
//! transform. Like the complex lines, nothing is normalised: C2R after R2C
//! returns the signal scaled by `n`.

use crate::engine::dft::{Algorithm, DftLine};
use crate::engine::planner::PlannerError;
use crate::num::{unit_root, Complex, Float};

/// Number of real samples that make up a packed complex pair.
const STRIDE: usize = 2;

enum Layout<T: Float> {
    Single,
    Packed {
        half: DftLine<T>,
        /// `exp(-2πi k / n)` for `k` in `0..n/2`.
        twiddles: Vec<Complex<T>>,
    },
    Full {
        line: DftLine<T>,
    },
}

pub(crate) struct RealLine<T: Float> {
    n: usize,
    layout: Layout<T>,
}

/// Length of the complex line a real transform of length `n` runs on, or
/// `None` when no complex transform is needed.
pub(crate) fn complex_line_len(n: usize) -> Option<usize> {
    match n {
        0 | 1 => None,
        n if n % STRIDE == 0 => Some(n / STRIDE),
        n => Some(n),
    }
}

/// Number of complex bins produced from `n` real samples.
pub fn half_spectrum_len(n: usize) -> usize {
    n / 2 + 1
}

impl<T: Float> RealLine<T> {
    /// `algorithm` is used for the complex line of length
    /// [`complex_line_len(n)`](complex_line_len).
    pub fn new(n: usize, algorithm: Option<Algorithm>) -> Result<Self, PlannerError> {
        let layout = match (complex_line_len(n), algorithm) {
            (None, _) => Layout::Single,
            (Some(len), Some(algorithm)) if n % STRIDE == 0 => {
                let twiddles = (0..len)
                    .map(|k| unit_root::<T>(k, n))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(PlannerError::UnsupportedLength { n })?;
                Layout::Packed {
                    half: DftLine::new(len, algorithm)?,
                    twiddles,
                }
            }
            (Some(len), Some(algorithm)) => Layout::Full {
                line: DftLine::new(len, algorithm)?,
            },
            (Some(_), None) => return Err(PlannerError::UnsupportedLength { n }),
        };
        Ok(Self { n, layout })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn spectrum_len(&self) -> usize {
        half_spectrum_len(self.n)
    }

    pub fn algorithm(&self) -> Algorithm {
        match &self.layout {
            Layout::Single => Algorithm::Identity,
            Layout::Packed { half, .. } => half.algorithm(),
            Layout::Full { line } => line.algorithm(),
        }
    }

    pub fn scratch_len(&self) -> usize {
        match &self.layout {
            Layout::Single => 0,
            Layout::Packed { half, .. } => half.len() + half.scratch_len(),
            Layout::Full { line } => line.len() + line.scratch_len(),
        }
    }

    pub fn flops(&self) -> f64 {
        match &self.layout {
            Layout::Single => 0.0,
            Layout::Packed { half, .. } => half.flops() + 10.0 * half.len() as f64,
            Layout::Full { line } => line.flops(),
        }
    }

    /// `input.len() == n`, `output.len() == n/2 + 1`.
    pub fn forward(&self, input: &[T], output: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        debug_assert_eq!(input.len(), self.n);
        debug_assert_eq!(output.len(), self.spectrum_len());
        match &self.layout {
            Layout::Single => output[0] = Complex::new(input[0], T::zero()),
            Layout::Packed { half, twiddles } => {
                let m = half.len();
                let (z, rest) = scratch.split_at_mut(m);
                for (i, c) in z.iter_mut().enumerate() {
                    *c = Complex::new(input[STRIDE * i], input[STRIDE * i + 1]);
                }
                half.forward(z, rest);
                let y0 = z[0];
                output[0] = Complex::new(y0.re + y0.im, T::zero());
                output[m] = Complex::new(y0.re - y0.im, T::zero());
                let half_t = T::from_f32(0.5);
                for k in 1..m {
                    let a = z[k];
                    let b = z[m - k].conj();
                    let sum = a + b;
                    let t = twiddles[k] * (a - b);
                    output[k] = (sum + t.mul_neg_i()).scale(half_t);
                }
            }
            Layout::Full { line } => {
                let (work, rest) = scratch.split_at_mut(self.n);
                for (c, &x) in work.iter_mut().zip(input.iter()) {
                    *c = Complex::new(x, T::zero());
                }
                line.forward(work, rest);
                output.copy_from_slice(&work[..output.len()]);
            }
        }
    }

    /// `input.len() == n/2 + 1`, `output.len() == n`. The imaginary parts of
    /// the DC bin (and of the Nyquist bin for even `n`) are ignored.
    pub fn inverse(&self, input: &[Complex<T>], output: &mut [T], scratch: &mut [Complex<T>]) {
        debug_assert_eq!(input.len(), self.spectrum_len());
        debug_assert_eq!(output.len(), self.n);
        match &self.layout {
            Layout::Single => output[0] = input[0].re,
            Layout::Packed { half, twiddles } => {
                let m = half.len();
                let (z, rest) = scratch.split_at_mut(m);
                z[0] = Complex::new(input[0].re + input[m].re, input[0].re - input[m].re);
                for k in 1..m {
                    let a = input[k];
                    let b = input[m - k].conj();
                    let sum = a + b;
                    let t = twiddles[k].conj() * (a - b);
                    z[k] = sum + t.mul_i();
                }
                half.inverse(z, rest);
                for (i, c) in z.iter().enumerate() {
                    output[STRIDE * i] = c.re;
                    output[STRIDE * i + 1] = c.im;
                }
            }
            Layout::Full { line } => {
                let n = self.n;
                let (work, rest) = scratch.split_at_mut(n);
                work[0] = Complex::new(input[0].re, T::zero());
                for k in 1..input.len() {
                    work[k] = input[k];
                    work[n - k] = input[k].conj();
                }
                line.inverse(work, rest);
                for (x, c) in output.iter_mut().zip(work.iter()) {
                    *x = c.re;
                }
            }
        }
    }
}
