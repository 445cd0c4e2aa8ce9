use psy_core::AdaptiveProcedure;

use psy_ado::determinism::observer_seed;
use psy_ado::{
    run_session, HeuristicStaircase, Observation, Observer, Procedure, ProcedureConfig,
    ProcedureKind, PsychometricModel, SessionPolicy, SimulatedObserver, StaircaseConfig,
};

/// Responds correctly to anything at or above a fixed difference.
struct Step(f64);

impl Observer for Step {
    fn observe(&mut self, stimulus: f64) -> Observation {
        Observation {
            response: stimulus >= self.0,
            reaction_time: Some(0.8),
        }
    }
}

#[test]
fn staircase_stays_within_bounds() {
    let config = StaircaseConfig::default();
    let mut staircase = HeuristicStaircase::new(config.clone(), 5).unwrap();
    let mut observer = Step(0.12);
    for _ in 0..200 {
        let stimulus = staircase.select();
        assert!(stimulus >= config.min_difficulty && stimulus <= config.max_difficulty);
        staircase.update(stimulus, observer.observe(stimulus).response);
    }
}

#[test]
fn always_correct_drives_towards_minimum() {
    let mut staircase = HeuristicStaircase::new(StaircaseConfig::default(), 3).unwrap();
    for _ in 0..60 {
        let stimulus = staircase.select();
        staircase.update(stimulus, true);
    }
    // each step multiplies by at most 0.8 * 1.1 once the window is all correct
    assert!(staircase.current_difficulty() < 0.02);
    assert!(staircase.is_converged());
    assert!(staircase.threshold_estimate() < 0.05);
}

#[test]
fn estimate_uses_current_difficulty_early() {
    let mut staircase = HeuristicStaircase::new(StaircaseConfig::default(), 3).unwrap();
    for _ in 0..4 {
        let stimulus = staircase.select();
        staircase.update(stimulus, false);
    }
    assert_eq!(staircase.history().len(), 4);
    assert_eq!(staircase.estimate(), staircase.current_difficulty());
    assert!(!staircase.converged());
}

#[test]
fn invalid_staircase_config_is_rejected() {
    let config = StaircaseConfig {
        min_difficulty: 0.5,
        max_difficulty: 0.1,
        ..StaircaseConfig::default()
    };
    assert_eq!(
        HeuristicStaircase::new(config, 0).unwrap_err().info().code,
        "staircase-bounds"
    );
}

#[test]
fn session_runs_the_full_budget_by_default() {
    let config = ProcedureConfig::default();
    let mut procedure = Procedure::from_config(&config, 17).unwrap();
    let mut observer = SimulatedObserver::new(
        PsychometricModel::default(),
        vec![40.0, 4.0],
        observer_seed(17, 0),
    )
    .unwrap();
    let policy = SessionPolicy {
        max_trials: 20,
        early_stop: false,
    };
    let report = run_session(&mut procedure, &mut observer, &policy);
    assert_eq!(report.rows.len(), 20);
    assert!(!report.stopped_early);
    assert_eq!(report.report.kind, ProcedureKind::BayesianAdo);
    assert_eq!(report.report.n_trials, 20);
    for (index, row) in report.rows.iter().enumerate() {
        assert_eq!(row.trial_index, index);
        assert!(row.estimates.contains_key("threshold_mean"));
    }
}

#[test]
fn early_stop_ends_on_convergence() {
    let config = ProcedureConfig::HeuristicStaircase(StaircaseConfig::default());
    let mut procedure = Procedure::from_config(&config, 8).unwrap();
    let mut observer = Step(0.0);
    let policy = SessionPolicy {
        max_trials: 200,
        early_stop: true,
    };
    let report = run_session(&mut procedure, &mut observer, &policy);
    assert!(report.stopped_early);
    assert!(report.rows.len() < 200);
    assert!(report.rows.last().unwrap().converged);
    assert_eq!(report.rows.last().unwrap().reaction_time, Some(0.8));
    assert!(report.report.estimates.contains_key("current_difficulty"));

    // already converged: nothing more runs
    let again = run_session(&mut procedure, &mut observer, &policy);
    assert!(again.rows.is_empty());
    assert!(again.stopped_early);
}
