// Test intent: verifies pooled row sweeps match serial execution.
#![cfg(feature = "parallel")]

use fftplan::{Complex64, Direction, Engine, EngineConfig, Flags};

fn run(engine: &Engine, n0: usize, n1: usize) -> Vec<Complex64> {
    let input = engine.alloc_2d::<Complex64>(n0, n1).unwrap();
    let output = engine.alloc_2d::<Complex64>(n0, n1).unwrap();
    {
        let mut w = input.write();
        for ((i, j), x) in w.indexed_iter_mut() {
            *x = Complex64::new((i as f64 * 0.1).sin(), (j as f64 * 0.2).cos());
        }
    }
    let mut plan = engine
        .plan_dft_2d(&input, &output, Direction::Forward, Flags::ESTIMATE)
        .unwrap();
    plan.execute().unwrap();
    output.to_vec()
}

#[test]
fn pooled_rows_match_serial_rows() {
    let serial = Engine::with_config(EngineConfig::default().threads(1));
    let pooled = Engine::with_config(EngineConfig::default().threads(4).parallel_threshold(64));
    let a = run(&serial, 32, 64);
    let b = run(&pooled, 32, 64);
    assert_eq!(a, b);
}

#[test]
fn pooled_real_rows_match_serial_rows() {
    let serial = Engine::with_config(EngineConfig::default().threads(1));
    let pooled = Engine::with_config(EngineConfig::default().threads(3).parallel_threshold(16));
    let mut results = Vec::new();
    for engine in [&serial, &pooled] {
        let real = engine.alloc_2d::<f64>(16, 30).unwrap();
        let half = engine.alloc_2d::<Complex64>(16, 16).unwrap();
        real.write()
            .iter_mut()
            .enumerate()
            .for_each(|(i, x)| *x = (i as f64 * 0.37).sin());
        let mut plan = engine.plan_dft_r2c_2d(&real, &half, Flags::ESTIMATE).unwrap();
        plan.execute().unwrap();
        results.push(half.to_vec());
    }
    assert_eq!(results[0], results[1]);
}
