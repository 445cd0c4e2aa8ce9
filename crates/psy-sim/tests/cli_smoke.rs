use std::fs;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

const CONFIG: &str = r#"
procedure:
  type: bayesian-ado
  design: { start: 10, stop: 90, step: 10 }
  parameters:
    threshold: { min: 5, max: 95, points: 19 }
    slope: { min: 0.5, max: 5.0, points: 10 }
session:
  max_trials: 12
observer:
  truth: [45.0, 3.0]
seed_policy:
  master_seed: 3
"#;

fn psy_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_psy-sim"))
}

#[test]
fn simulate_resume_and_design() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, CONFIG).unwrap();
    let first = dir.path().join("first");

    let status = psy_sim()
        .args(["--log-level", "warn", "simulate", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(&first)
        .status()
        .unwrap();
    assert!(status.success());
    for artefact in ["trials.csv", "summary.json", "snapshot.json", "config.yaml"] {
        assert!(first.join(artefact).exists(), "missing {artefact}");
    }
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(first.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["report"]["n_trials"], 12);
    assert_eq!(summary["seed"], 3);

    let second = dir.path().join("second");
    let status = psy_sim()
        .args(["resume", "--snapshot"])
        .arg(first.join("snapshot.json"))
        .arg("--out")
        .arg(&second)
        .args(["--trials", "4"])
        .status()
        .unwrap();
    assert!(status.success());
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(second.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["report"]["n_trials"], 16);

    let output = psy_sim()
        .args(["design", "--config"])
        .arg(&config)
        .arg("--snapshot")
        .arg(second.join("snapshot.json"))
        .args(["--top", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let ranking: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(ranking["n_trials"], 16);
    assert_eq!(ranking["candidates"].as_array().unwrap().len(), 3);
}

#[test]
fn invalid_config_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "procedure: { type: bayesian-ado, design: [] }\n").unwrap();
    let status = psy_sim()
        .args(["simulate", "--config"])
        .arg(&config)
        .arg("--out")
        .arg(dir.path().join("out"))
        .status()
        .unwrap();
    assert!(!status.success());
}
