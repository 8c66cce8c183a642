// Test intent: verifies planning and lifecycle paths run with a logger
// installed.
#![cfg(feature = "verbose-logging")]

use fftplan::{Complex64, Direction, Engine, EngineConfig, Flags};

#[test]
fn lifecycle_logs_without_panicking() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();

    let engine = Engine::with_config(EngineConfig::default().measure_trials(1));
    let a = engine.alloc_2d::<Complex64>(8, 12).unwrap();
    let mut plan = engine
        .plan_dft_2d(&a, &a, Direction::Forward, Flags::MEASURE)
        .unwrap();
    plan.execute().unwrap();
    let text = engine.export_wisdom();
    engine.import_wisdom(&text).unwrap();
    engine.teardown();
    plan.destroy().unwrap();
    assert!(log::max_level() >= log::LevelFilter::Warn);
}
