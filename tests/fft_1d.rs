// Test intent: verifies one-dimensional complex plans against known spectra.

use fftplan::{Complex32, Complex64, Direction, Engine, Flags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn cosine(n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            Complex64::new(t.cos(), 0.0)
        })
        .collect()
}

fn assert_cosine_spikes(spectrum: &[Complex64], tol: f64) {
    let n = spectrum.len();
    for (k, c) in spectrum.iter().enumerate() {
        let expected = if k == 1 || k == n - 1 { n as f64 / 2.0 } else { 0.0 };
        assert!(
            (c.re - expected).abs() < tol && c.im.abs() < tol,
            "bin {k}: {c:?}, expected {expected}"
        );
    }
}

#[test]
fn estimate_planning_leaves_arrays_untouched() {
    let engine = Engine::new();
    let input = engine.alloc_1d::<Complex64>(64).unwrap();
    let output = engine.alloc_1d::<Complex64>(64).unwrap();
    input.fill(Complex64::new(3.0, 1.0));
    output.fill(Complex64::new(-2.0, 0.5));
    let _plan = engine
        .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
        .unwrap();
    assert!(input.to_vec().iter().all(|c| *c == Complex64::new(3.0, 1.0)));
    assert!(output.to_vec().iter().all(|c| *c == Complex64::new(-2.0, 0.5)));
}

#[test]
fn cosine_gives_two_real_spikes() {
    let engine = Engine::new();
    for n in [8usize, 64, 100, 97] {
        let input = engine.alloc_1d::<Complex64>(n).unwrap();
        let output = engine.alloc_1d::<Complex64>(n).unwrap();
        let mut plan = engine
            .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
            .unwrap();
        input.write().as_slice_mut().unwrap().copy_from_slice(&cosine(n));
        plan.execute().unwrap();
        assert_cosine_spikes(&output.to_vec(), 1e-9);
        // out-of-place execution never writes the input
        assert_eq!(input.to_vec(), cosine(n));
    }
}

#[test]
fn in_place_forward_then_inverse_scales_by_n() {
    let engine = Engine::new();
    let n = 48;
    let data = engine.alloc_1d::<Complex64>(n).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let signal: Vec<Complex64> = (0..n)
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let mut forward = engine
        .plan_dft_1d(&data, &data, Direction::Forward, Flags::ESTIMATE)
        .unwrap();
    let mut inverse = engine
        .plan_dft_1d(&data, &data, Direction::Inverse, Flags::ESTIMATE)
        .unwrap();
    data.write().as_slice_mut().unwrap().copy_from_slice(&signal);
    forward.execute().unwrap();
    inverse.execute().unwrap();
    for (a, b) in data.to_vec().iter().zip(signal.iter()) {
        assert!((a.re - b.re * n as f64).abs() < 1e-9);
        assert!((a.im - b.im * n as f64).abs() < 1e-9);
    }
}

#[test]
fn single_precision_plans() {
    let engine = Engine::new();
    let n = 32;
    let input = engine.alloc_1d::<Complex32>(n).unwrap();
    let output = engine.alloc_1d::<Complex32>(n).unwrap();
    let mut plan = engine
        .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
        .unwrap();
    input.write()[0] = Complex32::new(1.0, 0.0);
    plan.execute().unwrap();
    assert!(output
        .to_vec()
        .iter()
        .all(|c| (c.re - 1.0).abs() < 1e-6 && c.im.abs() < 1e-6));
}

#[test]
fn length_one_is_identity() {
    let engine = Engine::new();
    let input = engine.alloc_1d::<Complex64>(1).unwrap();
    let output = engine.alloc_1d::<Complex64>(1).unwrap();
    input.fill(Complex64::new(4.0, -3.0));
    let mut plan = engine
        .plan_dft_1d(&input, &output, Direction::Inverse, Flags::ESTIMATE)
        .unwrap();
    plan.execute().unwrap();
    assert_eq!(output.read()[0], Complex64::new(4.0, -3.0));
}

#[test]
fn new_array_execute_reuses_the_plan() {
    let engine = Engine::new();
    let n = 16;
    let a_in = engine.alloc_1d::<Complex64>(n).unwrap();
    let a_out = engine.alloc_1d::<Complex64>(n).unwrap();
    let b_in = engine.alloc_1d::<Complex64>(n).unwrap();
    let b_out = engine.alloc_1d::<Complex64>(n).unwrap();
    let mut plan = engine
        .plan_dft_1d(&a_in, &a_out, Direction::Forward, Flags::ESTIMATE)
        .unwrap();
    b_in.write().as_slice_mut().unwrap().copy_from_slice(&cosine(n));
    plan.execute_dft(&b_in, &b_out).unwrap();
    assert_cosine_spikes(&b_out.to_vec(), 1e-9);
    assert!(a_out.to_vec().iter().all(|c| *c == Complex64::zero()));

    assert_eq!(
        plan.execute_dft(&b_in, &b_in),
        Err(fftplan::PlanError::InPlaceMismatch)
    );
    let short = engine.alloc_1d::<Complex64>(8).unwrap();
    assert!(matches!(
        plan.execute_dft(&short, &b_out),
        Err(fftplan::PlanError::ShapeMismatch { .. })
    ));
}

#[test]
fn mismatched_extents_are_rejected() {
    let engine = Engine::new();
    let input = engine.alloc_1d::<Complex64>(16).unwrap();
    let output = engine.alloc_1d::<Complex64>(8).unwrap();
    let err = engine
        .plan_dft_1d(&input, &output, Direction::Forward, Flags::ESTIMATE)
        .unwrap_err();
    assert_eq!(
        err,
        fftplan::PlanError::ShapeMismatch {
            expected: vec![16],
            found: vec![8]
        }
    );
    assert_eq!(engine.live_plans(), 0);
}
