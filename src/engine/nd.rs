//! Sweeps of line transforms over contiguous row-major blocks.
//!
//! A rank-`r` transform is `r` passes of 1-D transforms, one per axis. Lines
//! along the last axis are contiguous rows and are handed out directly (in
//! parallel when the engine owns a worker pool and the block is large
//! enough); lines along the other axes are gathered into a lane buffer,
//! transformed and scattered back.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use std::sync::Arc;

use crate::engine::dft::DftLine;
use crate::num::{Complex, Float};

/// Execution resources for row sweeps.
#[derive(Clone, Default)]
pub(crate) struct Workers {
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    threshold: usize,
}

impl Workers {
    #[cfg(feature = "parallel")]
    pub fn new(pool: Option<Arc<rayon::ThreadPool>>, threshold: usize) -> Self {
        Self { pool, threshold }
    }

    #[cfg(not(feature = "parallel"))]
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Apply `f(row, scratch)` to every row of `row_len` cells.
    pub fn for_each_row<T, F>(
        &self,
        data: &mut [Complex<T>],
        row_len: usize,
        scratch: &mut [Complex<T>],
        f: F,
    ) where
        T: Float,
        F: Fn(&mut [Complex<T>], &mut [Complex<T>]) + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = self.pool.as_ref().filter(|_| self.worth_splitting(data.len(), row_len)) {
                let scratch_len = scratch.len();
                pool.install(|| {
                    data.par_chunks_mut(row_len).for_each_init(
                        || vec![Complex::zero(); scratch_len],
                        |s, row| f(row, s),
                    )
                });
                return;
            }
        }
        for row in data.chunks_exact_mut(row_len) {
            f(row, scratch);
        }
    }

    /// Apply `f(input_row, output_row, scratch)` to paired rows of two
    /// blocks with different row lengths and cell types.
    pub fn for_each_row_pair<A, B, T, F>(
        &self,
        input: &[A],
        in_len: usize,
        output: &mut [B],
        out_len: usize,
        scratch: &mut [Complex<T>],
        f: F,
    ) where
        A: Sync,
        B: Send,
        T: Float,
        F: Fn(&[A], &mut [B], &mut [Complex<T>]) + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = self.pool.as_ref().filter(|_| self.worth_splitting(input.len(), in_len)) {
                let scratch_len = scratch.len();
                pool.install(|| {
                    input
                        .par_chunks(in_len)
                        .zip(output.par_chunks_mut(out_len))
                        .for_each_init(
                            || vec![Complex::zero(); scratch_len],
                            |s, (row_in, row_out)| f(row_in, row_out, s),
                        )
                });
                return;
            }
        }
        for (row_in, row_out) in input.chunks_exact(in_len).zip(output.chunks_exact_mut(out_len)) {
            f(row_in, row_out, scratch);
        }
    }

    #[cfg(feature = "parallel")]
    fn worth_splitting(&self, total: usize, row_len: usize) -> bool {
        total >= self.threshold && total > row_len
    }
}

/// Scratch cells [`sweep_axis`] needs for `line`.
pub(crate) fn sweep_scratch_len<T: Float>(line: &DftLine<T>) -> usize {
    line.len() + line.scratch_len()
}

/// Transform every line along `axis` of the row-major block `data` with
/// shape `extents`.
pub(crate) fn sweep_axis<T: Float>(
    workers: &Workers,
    data: &mut [Complex<T>],
    extents: &[usize],
    axis: usize,
    line: &DftLine<T>,
    inverse: bool,
    scratch: &mut [Complex<T>],
) {
    let len = extents[axis];
    debug_assert_eq!(len, line.len());
    let stride: usize = extents[axis + 1..].iter().product();
    if stride == 1 {
        workers.for_each_row(data, len, &mut scratch[..line.scratch_len()], |row, s| {
            line.run(row, inverse, s)
        });
        return;
    }
    let (lane, rest) = scratch.split_at_mut(len);
    for block in data.chunks_exact_mut(len * stride) {
        for offset in 0..stride {
            for (j, cell) in lane.iter_mut().enumerate() {
                *cell = block[offset + j * stride];
            }
            line.run(lane, inverse, rest);
            for (j, cell) in lane.iter().enumerate() {
                block[offset + j * stride] = *cell;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dft::Algorithm;
    use crate::num::Complex64;

    #[test]
    fn sweeping_columns_matches_transposed_rows() {
        // 4 x 3 block: transforming axis 0 equals transforming rows of the
        // transpose.
        let data: Vec<Complex64> = (0..12).map(|i| Complex64::new(i as f64, 0.5)).collect();
        let line = DftLine::<f64>::new(4, Algorithm::Kernel).unwrap();
        let mut scratch = vec![Complex64::zero(); sweep_scratch_len(&line)];
        let mut swept = data.clone();
        sweep_axis(&Workers::default(), &mut swept, &[4, 3], 0, &line, false, &mut scratch);

        for col in 0..3 {
            let mut lane: Vec<Complex64> = (0..4).map(|r| data[r * 3 + col]).collect();
            line.forward(&mut lane, &mut []);
            for r in 0..4 {
                assert_eq!(swept[r * 3 + col], lane[r]);
            }
        }
    }

    #[test]
    fn row_pairs_visit_every_row() {
        let input: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let mut output = vec![Complex64::zero(); 4];
        Workers::default().for_each_row_pair(&input, 3, &mut output, 2, &mut [], |a, b, _s: &mut [Complex64]| {
            b[0] = Complex64::new(a.iter().sum(), 0.0);
        });
        assert_eq!(output[0].re, 3.0);
        assert_eq!(output[2].re, 12.0);
    }
}
