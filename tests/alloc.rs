// Test intent: verifies the aligned allocator and the extent/pointer views.

use fftplan::{AllocError, Complex32, Complex64, Engine, ALIGNMENT};
use proptest::prelude::*;

#[test]
fn arrays_are_aligned_zeroed_and_row_major() {
    let engine = Engine::new();
    let a = engine.alloc_2d::<Complex64>(3, 4).unwrap();
    assert_eq!(a.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(a.extents(), &[3, 4]);
    assert_eq!(a.dims(), (3, 4));
    assert_eq!(a.ndim(), 2);
    assert_eq!(a.len(), 12);
    assert!(a.to_vec().iter().all(|c| *c == Complex64::zero()));

    {
        let mut w = a.write();
        w[[1, 2]] = Complex64::new(5.0, -1.0);
        w.row_mut(2).fill(Complex64::new(1.0, 0.0));
    }
    let flat = a.to_vec();
    assert_eq!(flat[1 * 4 + 2], Complex64::new(5.0, -1.0));
    assert!(flat[8..].iter().all(|c| c.re == 1.0));
    assert_eq!(a.read().as_slice().map(|s| s.len()), Some(12));
}

#[test]
fn row_major_writes_read_back_without_aliasing() {
    let engine = Engine::new();
    let a = engine.alloc_3d::<Complex64>(3, 4, 5).unwrap();
    {
        let mut w = a.write();
        for (k, x) in w.iter_mut().enumerate() {
            *x = Complex64::new(k as f64, 0.0);
        }
    }
    let expected: Vec<Complex64> = (0..60).map(|k| Complex64::new(k as f64, 0.0)).collect();
    assert_eq!(a.to_vec(), expected);

    let b = engine.alloc_2d::<Complex64>(5, 7).unwrap();
    let r = b.read();
    assert_eq!(r.rows().into_iter().count(), 5);
    assert!(r.rows().into_iter().all(|row| row.len() == 7));
}

#[test]
fn three_dimensional_planes_are_addressable() {
    let engine = Engine::new();
    let a = engine.alloc_3d::<f32>(2, 3, 4).unwrap();
    {
        let mut w = a.write();
        for (i, mut plane) in w.outer_iter_mut().enumerate() {
            plane.fill(i as f32 + 1.0);
        }
    }
    let r = a.read();
    assert_eq!(r[[0, 2, 3]], 1.0);
    assert_eq!(r[[1, 0, 0]], 2.0);
}

#[test]
fn clones_share_storage() {
    let engine = Engine::new();
    let a = engine.alloc_1d::<f64>(8).unwrap();
    let b = a.clone();
    assert!(a.shares_storage(&b));
    b.fill(2.5);
    assert_eq!(a.read()[7], 2.5);
    let c = engine.alloc_1d::<f64>(8).unwrap();
    assert!(!a.shares_storage(&c));
}

#[test]
fn zero_extents_are_rejected() {
    let engine = Engine::new();
    assert_eq!(
        engine.alloc_1d::<Complex32>(0).unwrap_err(),
        AllocError::ZeroExtent { axis: 0 }
    );
    assert_eq!(
        engine.alloc_3d::<f64>(2, 2, 0).unwrap_err(),
        AllocError::ZeroExtent { axis: 2 }
    );
    assert_eq!(
        engine.alloc_2d::<f64>(usize::MAX / 2, 4).unwrap_err(),
        AllocError::TooLarge
    );
}

proptest! {
    #[test]
    fn prop_any_positive_shape_allocates(n0 in 1usize..16, n1 in 1usize..16, n2 in 1usize..16) {
        let engine = Engine::new();
        let a = engine.alloc_3d::<Complex32>(n0, n1, n2).unwrap();
        prop_assert_eq!(a.extents(), &[n0, n1, n2][..]);
        prop_assert_eq!(a.len(), n0 * n1 * n2);
        prop_assert_eq!(a.as_ptr() as usize % ALIGNMENT, 0);
    }

    #[test]
    fn prop_row_major_index(n0 in 1usize..8, n1 in 1usize..8, i in 0usize..8, j in 0usize..8) {
        let i = i % n0;
        let j = j % n1;
        let engine = Engine::new();
        let a = engine.alloc_2d::<f64>(n0, n1).unwrap();
        a.write()[[i, j]] = 1.0;
        let flat = a.to_vec();
        prop_assert_eq!(flat[i * n1 + j], 1.0);
        prop_assert_eq!(flat.iter().sum::<f64>(), 1.0);
    }
}
