//! Assertion helpers for lifecycle results.

use partkey_core::{
    AccountOutcome, BatchReport, DispatchOutcome, LifecycleError, LifecycleResult, Round,
};

// ─────────────────────────────────────────────────────────────────────────────
// Result Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert that a result is successful and return the value.
///
/// # Panics
///
/// Panics if the result is an error.
#[track_caller]
pub fn assert_ok<T: std::fmt::Debug>(result: LifecycleResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok but got: {e:?}"),
    }
}

/// Assert that a result is an error and return it.
///
/// # Panics
///
/// Panics if the result is Ok.
#[track_caller]
pub fn assert_err<T: std::fmt::Debug>(result: LifecycleResult<T>) -> LifecycleError {
    match result {
        Ok(value) => panic!("Expected Err but got Ok({value:?})"),
        Err(e) => e,
    }
}

/// Assert that an outcome was confirmed at `round`.
///
/// # Panics
///
/// Panics for any other outcome.
#[track_caller]
pub fn assert_confirmed_at(outcome: &DispatchOutcome, round: u64) {
    match outcome {
        DispatchOutcome::Confirmed { round: actual, .. } => assert_eq!(*actual, Round(round)),
        other => panic!("Expected Confirmed at round {round} but got: {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch Assertions
// ─────────────────────────────────────────────────────────────────────────────

/// Assert the outcome label of every account in a report, in order.
///
/// # Panics
///
/// Panics if the labels differ.
#[track_caller]
pub fn assert_batch_labels(report: &BatchReport, expected: &[(&str, &str)]) {
    let actual: Vec<(&str, &str)> = report
        .results
        .iter()
        .map(|r| (r.address.as_str(), r.outcome.label()))
        .collect();
    assert_eq!(actual, expected);
}

/// Assert that every result in a report is either renewed or failed.
///
/// # Panics
///
/// Panics if any account was skipped.
#[track_caller]
pub fn assert_nothing_skipped(report: &BatchReport) {
    for result in &report.results {
        assert!(
            matches!(
                result.outcome,
                AccountOutcome::Renewed(_) | AccountOutcome::Failed(_)
            ),
            "Expected {} to be attempted but got {}",
            result.address,
            result.outcome.label()
        );
    }
}
