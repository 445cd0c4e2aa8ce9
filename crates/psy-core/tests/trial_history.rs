use psy_core::{TrialHistory, TrialRecord};

#[test]
fn append_assigns_chronological_indices() {
    let mut history = TrialHistory::new();
    assert!(history.is_empty());
    let first = history.append(40.0, true);
    let second = history.append(20.0, false);
    assert_eq!(first.trial_index, 0);
    assert_eq!(second.trial_index, 1);
    assert_eq!(
        history.records(),
        &[
            TrialRecord {
                trial_index: 0,
                stimulus: 40.0,
                response: true
            },
            TrialRecord {
                trial_index: 1,
                stimulus: 20.0,
                response: false
            },
        ]
    );
}

#[test]
fn derived_statistics() {
    let mut history = TrialHistory::new();
    assert_eq!(history.response_rate(), None);
    assert_eq!(history.stimulus_range(), None);
    for (stimulus, response) in [(50.0, true), (30.0, false), (70.0, true), (60.0, true)] {
        history.append(stimulus, response);
    }
    assert_eq!(history.response_rate(), Some(0.75));
    assert_eq!(history.stimulus_range(), Some((30.0, 70.0)));
    assert_eq!(history.last_n(2).len(), 2);
    assert_eq!(history.last_n(2)[0].stimulus, 70.0);
    assert_eq!(history.last_n(10).len(), 4);
}

#[test]
fn history_serializes_as_plain_array() {
    let mut history = TrialHistory::new();
    history.append(10.0, false);
    let json = serde_json::to_value(&history).unwrap();
    assert!(json.is_array());
    let restored: TrialHistory = serde_json::from_value(json).unwrap();
    assert_eq!(restored, history);
}
