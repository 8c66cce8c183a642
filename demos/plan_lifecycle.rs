//! Plan lifecycle example for fftplan
//!
//! Allocates aligned arrays, plans forward and inverse transforms, executes
//! them and saves the planning wisdom. Run with `RUST_LOG=debug` to see the
//! planner's decisions.

use fftplan::{Complex64, Direction, Engine, Flags};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== fftplan Plan Lifecycle Example ===\n");

    let engine = Engine::from_env()?;
    println!("Engine: {engine:?}\n");

    // 1. Complex transform, measured
    println!("1. Complex 1-D transform (MEASURE)");
    let n = 24;
    let signal = engine.alloc_1d::<Complex64>(n)?;
    let spectrum = engine.alloc_1d::<Complex64>(n)?;
    let mut forward = engine.plan_dft_1d(&signal, &spectrum, Direction::Forward, Flags::MEASURE)?;
    let mut inverse = engine.plan_dft_1d(&spectrum, &signal, Direction::Inverse, Flags::MEASURE)?;
    println!("{}", forward.describe()?);

    // MEASURE may have overwritten the arrays, so fill the input afterwards
    for (i, x) in signal.write().iter_mut().enumerate() {
        let t = 2.0 * std::f64::consts::PI * 3.0 * i as f64 / n as f64;
        *x = Complex64::new(t.cos(), 0.0);
    }
    forward.execute()?;
    let peaks: Vec<usize> = spectrum
        .to_vec()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.norm_sqr() > 1.0)
        .map(|(k, _)| k)
        .collect();
    println!("   Peaks at bins {peaks:?}");
    inverse.execute()?;
    println!("   Round trip sample 0: {:.3} (n = {n})\n", signal.read()[0].re);

    // 2. Real 2-D transform
    println!("2. Real 2-D transform (ESTIMATE)");
    let image = engine.alloc_2d::<f64>(8, 16)?;
    let half = engine.alloc_2d::<Complex64>(8, 9)?;
    image.fill(1.0);
    let mut r2c = engine.plan_dft_r2c_2d(&image, &half, Flags::ESTIMATE)?;
    r2c.execute()?;
    println!("   DC bin: {:?}", half.read()[[0, 0]]);
    println!("   Estimated flops: {:.0}\n", r2c.flops()?);

    // 3. Wisdom
    println!("3. Wisdom");
    print!("{}", engine.export_wisdom());

    forward.destroy()?;
    inverse.destroy()?;
    drop(r2c);
    println!("\nLive plans after cleanup: {}", engine.live_plans());
    engine.teardown();
    Ok(())
}
