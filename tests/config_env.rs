// Test intent: verifies FFTPLAN_* environment overrides reach the engine.

use fftplan::config::{ENV_MEASURE_TRIALS, ENV_NAIVE_LIMIT, ENV_THREADS};
use fftplan::{ConfigError, Engine, EngineConfig};
use std::process::Command;

#[test]
fn print_config() {
    match Engine::from_env() {
        Ok(engine) => {
            let c = engine.config();
            println!("config: {} {} {}", c.threads, c.measure_trials, c.naive_limit);
        }
        Err(e) => panic!("{e}"),
    }
}

fn run_child(vars: &[(&str, &str)]) -> std::process::Output {
    let exe = std::env::current_exe().unwrap();
    let mut cmd = Command::new(exe);
    for (k, v) in vars {
        cmd.env(k, v);
    }
    cmd.args(["--exact", "print_config", "--nocapture"])
        .output()
        .expect("run config test")
}

#[test]
fn env_overrides_reach_the_engine() {
    let output = run_child(&[(ENV_THREADS, "2"), (ENV_MEASURE_TRIALS, "5"), (ENV_NAIVE_LIMIT, "32")]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    // libtest may print the test name on the same line
    assert!(
        stdout.lines().any(|l| l.trim_end().ends_with("config: 2 5 32")),
        "{stdout}"
    );
}

#[test]
fn invalid_env_value_fails() {
    let output = run_child(&[(ENV_MEASURE_TRIALS, "lots")]);
    assert!(!output.status.success());
}

#[test]
fn lookup_reports_the_offending_variable() {
    let err = EngineConfig::from_lookup(|var| (var == ENV_THREADS).then(|| "-1".to_string())).unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue {
            var: ENV_THREADS,
            value: "-1".into()
        }
    );
    assert!(err.to_string().contains(ENV_THREADS));
}
