//! One-dimensional complex transforms ("lines").
//!
//! A [`DftLine`] is a precomputed transform of a fixed length using one
//! [`Algorithm`]. Every line computes the unnormalised forward transform;
//! the inverse is obtained by conjugating before and after, without any
//! `1/n` scaling.

use std::sync::Arc;

use crate::engine::planner::PlannerError;
use crate::kernels;
use crate::num::{unit_root, Complex, Float};

/// Strategy used for a single line length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    /// Length 1: the transform is the identity.
    Identity,
    /// Hard-coded butterfly for lengths 2, 4 and 8.
    Kernel,
    /// Stockham auto-sort radix-2, powers of two only.
    Stockham,
    /// Bluestein chirp-z on a padded power-of-two Stockham transform.
    Bluestein,
    /// Direct O(n²) evaluation against a table of unit roots.
    Direct,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Identity,
        Algorithm::Kernel,
        Algorithm::Stockham,
        Algorithm::Bluestein,
        Algorithm::Direct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Identity => "identity",
            Algorithm::Kernel => "kernel",
            Algorithm::Stockham => "stockham",
            Algorithm::Bluestein => "bluestein",
            Algorithm::Direct => "direct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    /// Whether the algorithm can transform a line of length `n`.
    pub fn supports(self, n: usize) -> bool {
        match self {
            Algorithm::Identity => n == 1,
            Algorithm::Kernel => kernels::has_kernel(n),
            Algorithm::Stockham => n >= 2 && n.is_power_of_two(),
            Algorithm::Bluestein | Algorithm::Direct => n >= 2,
        }
    }
}

struct Bluestein<T: Float> {
    /// Padded power-of-two convolution length.
    m: usize,
    /// `exp(-iπ k² / n)`
    chirp: Vec<Complex<T>>,
    /// Forward transform of the conjugate chirp, pre-divided by `m` so the
    /// unnormalised inverse needs no extra pass.
    filter: Vec<Complex<T>>,
    inner: DftLine<T>,
}

pub(crate) struct DftLine<T: Float> {
    n: usize,
    algorithm: Algorithm,
    twiddles: Arc<[Complex<T>]>,
    bluestein: Option<Box<Bluestein<T>>>,
}

impl<T: Float> DftLine<T> {
    pub fn new(n: usize, algorithm: Algorithm) -> Result<Self, PlannerError> {
        if !algorithm.supports(n) {
            return Err(PlannerError::UnsupportedLength { n });
        }
        let table_len = match algorithm {
            Algorithm::Stockham => n / 2,
            Algorithm::Direct => n,
            _ => 0,
        };
        let twiddles = (0..table_len)
            .map(|k| unit_root::<T>(k, n))
            .collect::<Option<Vec<_>>>()
            .ok_or(PlannerError::UnsupportedLength { n })?;
        let bluestein = if algorithm == Algorithm::Bluestein {
            Some(Box::new(Bluestein::new(n)?))
        } else {
            None
        };
        Ok(Self {
            n,
            algorithm,
            twiddles: Arc::from(twiddles),
            bluestein,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Scratch elements [`forward`](Self::forward) needs.
    pub fn scratch_len(&self) -> usize {
        match self.algorithm {
            Algorithm::Identity | Algorithm::Kernel => 0,
            Algorithm::Stockham | Algorithm::Direct => self.n,
            Algorithm::Bluestein => self
                .bluestein
                .as_ref()
                .map_or(0, |b| b.m + b.inner.scratch_len()),
        }
    }

    /// Approximate real floating-point operation count of one transform.
    pub fn flops(&self) -> f64 {
        let n = self.n as f64;
        match self.algorithm {
            Algorithm::Identity => 0.0,
            Algorithm::Kernel | Algorithm::Stockham => 5.0 * n * n.log2(),
            Algorithm::Direct => 8.0 * n * n,
            Algorithm::Bluestein => self.bluestein.as_ref().map_or(0.0, |b| {
                2.0 * b.inner.flops() + 6.0 * (2.0 * n + b.m as f64)
            }),
        }
    }

    /// In-place unnormalised forward transform of `data` (`len() == n`).
    pub fn forward(&self, data: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        debug_assert_eq!(data.len(), self.n);
        debug_assert!(scratch.len() >= self.scratch_len());
        match self.algorithm {
            Algorithm::Identity => {}
            Algorithm::Kernel => kernels::run(data),
            Algorithm::Stockham => self.stockham(data, &mut scratch[..self.n]),
            Algorithm::Direct => self.direct(data, &mut scratch[..self.n]),
            Algorithm::Bluestein => {
                if let Some(b) = &self.bluestein {
                    b.run(data, scratch);
                }
            }
        }
    }

    /// In-place unnormalised inverse transform.
    pub fn inverse(&self, data: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        for c in data.iter_mut() {
            c.im = -c.im;
        }
        self.forward(data, scratch);
        for c in data.iter_mut() {
            c.im = -c.im;
        }
    }

    pub fn run(&self, data: &mut [Complex<T>], inverse: bool, scratch: &mut [Complex<T>]) {
        if inverse {
            self.inverse(data, scratch)
        } else {
            self.forward(data, scratch)
        }
    }

    // Stockham auto-sort: ping-pong between `data` and `scratch`, `n1` groups
    // of `n2` points per pass.
    fn stockham(&self, data: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        let n = self.n;
        let twiddles = &self.twiddles;
        let mut in_scratch = false;
        {
            let mut src: &mut [Complex<T>] = &mut *data;
            let mut dst: &mut [Complex<T>] = &mut *scratch;
            let mut n1 = 1usize;
            let mut n2 = n;
            while n1 < n {
                n2 >>= 1;
                for k in 0..n1 {
                    // exp(-2πi * k / (2 * n1))
                    let w = twiddles[k * n2];
                    let base0 = 2 * k * n2;
                    let base1 = base0 + n2;
                    let out0 = k * n2;
                    let out1 = (k + n1) * n2;
                    for j in 0..n2 {
                        let u = src[base0 + j];
                        let v = src[base1 + j] * w;
                        dst[out0 + j] = u + v;
                        dst[out1 + j] = u - v;
                    }
                }
                core::mem::swap(&mut src, &mut dst);
                in_scratch = !in_scratch;
                n1 <<= 1;
            }
        }
        if in_scratch {
            data.copy_from_slice(&scratch[..n]);
        }
    }

    fn direct(&self, data: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        let n = self.n;
        scratch.copy_from_slice(data);
        for (k, out) in data.iter_mut().enumerate() {
            let mut acc = Complex::zero();
            let mut idx = 0usize;
            for &x in scratch.iter() {
                acc += x * self.twiddles[idx];
                idx += k;
                if idx >= n {
                    idx -= n;
                }
            }
            *out = acc;
        }
    }
}

impl<T: Float> Bluestein<T> {
    fn new(n: usize) -> Result<Self, PlannerError> {
        let unsupported = PlannerError::UnsupportedLength { n };
        let m = (2 * n - 1).next_power_of_two();
        let inner_algorithm = if kernels::has_kernel(m) {
            Algorithm::Kernel
        } else {
            Algorithm::Stockham
        };
        let inner = DftLine::new(m, inner_algorithm)?;
        let n_t = T::from_usize(n).ok_or(unsupported)?;
        let inv_m = T::one() / T::from_usize(m).ok_or(unsupported)?;

        let two_n = 2 * n as u64;
        let mut chirp = Vec::with_capacity(n);
        for k in 0..n {
            // k² mod 2n keeps the angle small so large lengths keep precision
            let k2 = ((k as u64 * k as u64) % two_n) as usize;
            let k2_t = T::from_usize(k2).ok_or(unsupported)?;
            chirp.push(Complex::expi(-(T::pi() * k2_t / n_t)));
        }

        let mut filter = vec![Complex::zero(); m];
        filter[0] = chirp[0].conj();
        for k in 1..n {
            let c = chirp[k].conj();
            filter[k] = c;
            filter[m - k] = c;
        }
        let mut scratch = vec![Complex::zero(); inner.scratch_len()];
        inner.forward(&mut filter, &mut scratch);
        for c in filter.iter_mut() {
            *c = c.scale(inv_m);
        }

        Ok(Self {
            m,
            chirp,
            filter,
            inner,
        })
    }

    fn run(&self, data: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        let (work, inner_scratch) = scratch.split_at_mut(self.m);
        for (w, (&x, &c)) in work.iter_mut().zip(data.iter().zip(self.chirp.iter())) {
            *w = x * c;
        }
        for w in work[data.len()..].iter_mut() {
            *w = Complex::zero();
        }
        self.inner.forward(work, inner_scratch);
        for (w, &f) in work.iter_mut().zip(self.filter.iter()) {
            *w = *w * f;
        }
        self.inner.inverse(work, inner_scratch);
        for ((out, &w), &c) in data.iter_mut().zip(work.iter()).zip(self.chirp.iter()) {
            *out = w * c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reference(input: &[Complex64]) -> Vec<Complex64> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut acc = Complex64::zero();
                for (j, &x) in input.iter().enumerate() {
                    let angle = -2.0 * core::f64::consts::PI * ((j * k) % n) as f64 / n as f64;
                    acc += x * Complex64::expi(angle);
                }
                acc
            })
            .collect()
    }

    fn random_signal(n: usize, seed: u64) -> Vec<Complex64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
            .collect()
    }

    fn check(n: usize, algorithm: Algorithm) {
        let line = DftLine::<f64>::new(n, algorithm).unwrap();
        let input = random_signal(n, n as u64);
        let expected = reference(&input);
        let mut data = input.clone();
        let mut scratch = vec![Complex64::zero(); line.scratch_len()];
        line.forward(&mut data, &mut scratch);
        for (k, (a, b)) in data.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a.re - b.re).abs() < 1e-9 && (a.im - b.im).abs() < 1e-9,
                "{algorithm:?} n = {n}, bin {k}: {a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn every_algorithm_matches_reference() {
        check(1, Algorithm::Identity);
        for n in [2, 4, 8] {
            check(n, Algorithm::Kernel);
        }
        for n in [2, 4, 16, 64, 256] {
            check(n, Algorithm::Stockham);
        }
        for n in [2, 3, 5, 12, 17, 100] {
            check(n, Algorithm::Bluestein);
            check(n, Algorithm::Direct);
        }
    }

    #[test]
    fn inverse_is_unnormalised() {
        let n = 12;
        let line = DftLine::<f64>::new(n, Algorithm::Bluestein).unwrap();
        let input = random_signal(n, 7);
        let mut data = input.clone();
        let mut scratch = vec![Complex64::zero(); line.scratch_len()];
        line.forward(&mut data, &mut scratch);
        line.inverse(&mut data, &mut scratch);
        for (a, b) in data.iter().zip(input.iter()) {
            assert!((a.re - b.re * n as f64).abs() < 1e-9);
            assert!((a.im - b.im * n as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn unsupported_combinations_are_rejected() {
        assert!(matches!(
            DftLine::<f64>::new(12, Algorithm::Stockham),
            Err(PlannerError::UnsupportedLength { n: 12 })
        ));
        assert!(DftLine::<f32>::new(16, Algorithm::Kernel).is_err());
        assert!(DftLine::<f32>::new(1, Algorithm::Direct).is_err());
    }

    #[test]
    fn algorithm_names_roundtrip() {
        for a in Algorithm::ALL {
            assert_eq!(Algorithm::parse(a.as_str()), Some(a));
        }
        assert_eq!(Algorithm::parse("radix3"), None);
    }
}
