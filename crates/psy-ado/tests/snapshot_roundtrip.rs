use psy_core::AdaptiveProcedure;
use tempfile::tempdir;

use psy_ado::determinism::observer_seed;
use psy_ado::{
    run_session, write_rows_csv, ExperimentConfig, Procedure, ProcedureConfig, SessionPolicy,
    SessionSnapshot, SimulatedObserver, StaircaseConfig,
};

fn simulate(config: &ExperimentConfig, trials: usize) -> (Procedure, Vec<psy_ado::TrialRow>) {
    let seed = config.seed_policy.master_seed;
    let mut procedure = Procedure::from_config(&config.procedure, seed).unwrap();
    let mut observer = SimulatedObserver::new(
        config.observer.model,
        config.observer.truth.clone(),
        observer_seed(seed, 0),
    )
    .unwrap();
    let policy = SessionPolicy {
        max_trials: trials,
        early_stop: false,
    };
    let report = run_session(&mut procedure, &mut observer, &policy);
    (procedure, report.rows)
}

#[test]
fn engine_replay_reproduces_posterior() {
    let config = ExperimentConfig::default();
    let (procedure, _) = simulate(&config, 12);
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("snapshot.json");

    let snapshot =
        SessionSnapshot::capture(&config, config.seed_policy.master_seed, procedure.history());
    snapshot.store(&path).unwrap();
    let loaded = SessionSnapshot::load(&path).unwrap();
    assert_eq!(loaded.history, snapshot.history);
    assert_eq!(loaded.config, config);

    let restored = loaded.restore().unwrap();
    let original = procedure.engine().unwrap();
    let replayed = restored.engine().unwrap();
    assert_eq!(
        original.posterior().probabilities(),
        replayed.posterior().probabilities()
    );
    assert_eq!(original.estimates(), replayed.estimates());
    assert_eq!(procedure.report(), restored.report());
}

#[test]
fn staircase_replay_continues_identically() {
    let config = ExperimentConfig {
        procedure: ProcedureConfig::HeuristicStaircase(StaircaseConfig::default()),
        observer: psy_ado::ObserverConfig {
            model: psy_ado::PsychometricModel::Weibull,
            truth: vec![0.15, 3.0, 0.5, 0.02],
        },
        ..ExperimentConfig::default()
    };
    let (mut procedure, _) = simulate(&config, 15);
    let snapshot =
        SessionSnapshot::capture(&config, config.seed_policy.master_seed, procedure.history());
    let mut restored = snapshot.restore().unwrap();
    assert_eq!(restored.history(), procedure.history());
    for _ in 0..5 {
        let expected = procedure.next_stimulus();
        assert_eq!(restored.next_stimulus(), expected);
        procedure.record_response(expected, true);
        restored.record_response(expected, true);
    }
}

#[test]
fn incompatible_schema_is_rejected() {
    let config = ExperimentConfig::default();
    let mut snapshot = SessionSnapshot::capture(&config, 1, &Default::default());
    snapshot.schema_version.major = 9;
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    snapshot.store(&path).unwrap();
    let err = SessionSnapshot::load(&path).unwrap_err();
    assert_eq!(err.info().code, "snapshot-schema");
}

#[test]
fn trial_rows_export_with_estimate_columns() {
    let config = ExperimentConfig::default();
    let (_, rows) = simulate(&config, 6);
    let dir = tempdir().unwrap();
    let path = dir.path().join("trials.csv");
    write_rows_csv(&path, &rows).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(
        header,
        [
            "trial_index",
            "stimulus",
            "response",
            "reaction_time",
            "slope_mean",
            "slope_sd",
            "threshold_mean",
            "threshold_sd",
            "converged",
        ]
    );
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 6);
    assert_eq!(&records[0][0], "0");
    assert_eq!(&records[0][3], "");
    let stimulus: f64 = records[5][1].parse().unwrap();
    assert_eq!(stimulus, rows[5].stimulus);
}
