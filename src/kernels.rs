//! Fixed-size forward butterflies used as leaf codelets.

use crate::num::{unit_root, Complex, Float};

#[inline(always)]
pub fn fft2<T: Float>(data: &mut [Complex<T>]) {
    debug_assert_eq!(data.len(), 2);
    let a = data[0];
    let b = data[1];
    data[0] = a + b;
    data[1] = a - b;
}

#[inline(always)]
pub fn fft4<T: Float>(data: &mut [Complex<T>]) {
    debug_assert_eq!(data.len(), 4);
    let even0 = data[0] + data[2];
    let even1 = data[0] - data[2];
    let odd0 = data[1] + data[3];
    let odd1 = (data[1] - data[3]).mul_neg_i();
    data[0] = even0 + odd0;
    data[1] = even1 + odd1;
    data[2] = even0 - odd0;
    data[3] = even1 - odd1;
}

#[inline(always)]
pub fn fft8<T: Float>(data: &mut [Complex<T>]) {
    debug_assert_eq!(data.len(), 8);
    let mut even = [data[0], data[2], data[4], data[6]];
    let mut odd = [data[1], data[3], data[5], data[7]];
    fft4(&mut even);
    fft4(&mut odd);

    // exp(-iπ/4) = (1 - i)/√2, at the precision of T
    let h = unit_root::<T>(1, 8).map_or(T::zero(), |w| w.re);
    let w1 = Complex::new(h, -h);
    let w3 = Complex::new(-h, -h);
    let t = [odd[0], odd[1] * w1, odd[2].mul_neg_i(), odd[3] * w3];
    for k in 0..4 {
        data[k] = even[k] + t[k];
        data[k + 4] = even[k] - t[k];
    }
}

/// Whether a dedicated butterfly exists for length `n`.
pub fn has_kernel(n: usize) -> bool {
    matches!(n, 2 | 4 | 8)
}

/// Run the butterfly for `data.len()`; the caller checks [`has_kernel`].
pub fn run<T: Float>(data: &mut [Complex<T>]) {
    match data.len() {
        2 => fft2(data),
        4 => fft4(data),
        8 => fft8(data),
        n => debug_assert!(false, "no kernel for length {n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Complex64;

    fn naive(input: &[Complex64]) -> Vec<Complex64> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut acc = Complex64::zero();
                for (j, &x) in input.iter().enumerate() {
                    let angle = -2.0 * core::f64::consts::PI * (j * k) as f64 / n as f64;
                    acc += x * Complex64::expi(angle);
                }
                acc
            })
            .collect()
    }

    #[test]
    fn kernels_match_direct_dft() {
        for n in [2usize, 4, 8] {
            let input: Vec<Complex64> = (0..n)
                .map(|i| Complex64::new(i as f64 + 0.5, 1.0 - i as f64))
                .collect();
            let expected = naive(&input);
            let mut data = input.clone();
            assert!(has_kernel(n));
            run(&mut data);
            for (a, b) in data.iter().zip(expected.iter()) {
                assert!((a.re - b.re).abs() < 1e-12, "n = {n}: {a:?} vs {b:?}");
                assert!((a.im - b.im).abs() < 1e-12, "n = {n}: {a:?} vs {b:?}");
            }
        }
        assert!(!has_kernel(16));
    }

    #[test]
    fn eight_point_twiddles_keep_f64_precision() {
        let mut data = vec![Complex64::zero(); 8];
        data[1] = Complex64::new(1.0, 0.0);
        fft8(&mut data);
        for (k, x) in data.iter().enumerate() {
            let angle = -2.0 * core::f64::consts::PI * k as f64 / 8.0;
            let (sin, cos) = angle.sin_cos();
            assert!((x.re - cos).abs() < 1e-15, "bin {k}: {x:?}");
            assert!((x.im - sin).abs() < 1e-15, "bin {k}: {x:?}");
        }
    }
}
