use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kymo_core::error::KymoError;
use kymo_core::pipeline::{FieldLayout, RowLayout, TrenchOrientation};
use kymo_core::scheduler::{FieldOutcome, FieldScheduler};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn layout(fov: usize) -> FieldLayout {
    FieldLayout {
        fov,
        channels: vec!["phase".into()],
        timepoints: 3,
        crop_height: 40,
        trench_width: 10,
        rows: vec![RowLayout {
            row: 0,
            orientation: TrenchOrientation::OpenDown,
            midpoints: vec![20, 50],
            drift: vec![0, 1, 1],
        }],
    }
}

fn io_error() -> KymoError {
    KymoError::Io(std::io::Error::other("disk hiccup"))
}

/// Per-fov call counter shared with the job closure.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<HashMap<usize, usize>>>);

impl Calls {
    /// Record a call and return how many calls `fov` has had, this one included.
    fn record(&self, fov: usize) -> usize {
        let mut calls = self.0.lock().unwrap();
        let n = calls.entry(fov).or_insert(0);
        *n += 1;
        *n
    }

    fn get(&self, fov: usize) -> usize {
        self.0.lock().unwrap().get(&fov).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[test]
fn test_outcome_classification() {
    assert!(FieldOutcome::from_result(Ok(layout(0))).is_finished());
    assert_eq!(
        FieldOutcome::from_result(Err(KymoError::Detection("no rows".into()))).label(),
        "detection failure"
    );
    assert_eq!(
        FieldOutcome::from_result(Err(KymoError::Layout("odd edges".into()))).label(),
        "layout error"
    );
    assert_eq!(
        FieldOutcome::from_result(Err(KymoError::InvalidConfig("t_chunk".into()))).label(),
        "layout error"
    );
    let resource = FieldOutcome::from_result(Err(io_error()));
    assert!(resource.is_retryable());
    assert!(!FieldOutcome::DetectionFailure(String::new()).is_retryable());
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[test]
fn test_every_field_finishes() {
    let scheduler = FieldScheduler::new(3, 1).unwrap();
    let mut seen = Vec::new();
    let outcomes = scheduler.run(&[4, 0, 2, 7], |fov| Ok(layout(fov)), |fov, _| seen.push(fov));

    assert_eq!(outcomes.keys().copied().collect::<Vec<_>>(), vec![0, 2, 4, 7]);
    for (fov, outcome) in &outcomes {
        assert_eq!(outcome, &FieldOutcome::Finished(layout(*fov)));
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 2, 4, 7]);
}

#[test]
fn test_duplicate_fovs_run_once() {
    let scheduler = FieldScheduler::new(2, 0).unwrap();
    let calls = Calls::default();
    let job_calls = calls.clone();
    let outcomes = scheduler.run(
        &[1, 1, 3, 1],
        move |fov| {
            job_calls.record(fov);
            Ok(layout(fov))
        },
        |_, _| {},
    );
    assert_eq!(outcomes.len(), 2);
    assert_eq!(calls.get(1), 1);
    assert_eq!(calls.get(3), 1);
}

#[test]
fn test_resource_error_retried_until_success() {
    let scheduler = FieldScheduler::new(2, 2).unwrap();
    let calls = Calls::default();
    let job_calls = calls.clone();
    let outcomes = scheduler.run(
        &[0, 1],
        move |fov| {
            let n = job_calls.record(fov);
            if fov == 1 && n == 1 {
                Err(io_error())
            } else {
                Ok(layout(fov))
            }
        },
        |_, _| {},
    );
    assert!(outcomes.values().all(FieldOutcome::is_finished));
    assert_eq!(calls.get(0), 1);
    assert_eq!(calls.get(1), 2);
}

#[test]
fn test_detection_failure_not_retried() {
    let scheduler = FieldScheduler::new(1, 3).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let job_calls = Arc::clone(&calls);
    let outcomes = scheduler.run(
        &[5],
        move |_| {
            job_calls.fetch_add(1, Ordering::SeqCst);
            Err(KymoError::Detection("no trenches".into()))
        },
        |_, _| {},
    );
    assert!(matches!(outcomes[&5], FieldOutcome::DetectionFailure(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_persistent_resource_error_gives_up() {
    let scheduler = FieldScheduler::new(2, 2).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let job_calls = Arc::clone(&calls);
    let mut reported = 0;
    let outcomes = scheduler.run(
        &[9],
        move |_| {
            job_calls.fetch_add(1, Ordering::SeqCst);
            Err(io_error())
        },
        |_, _| reported += 1,
    );
    assert!(matches!(outcomes[&9], FieldOutcome::ResourceError(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Only the settled outcome is reported.
    assert_eq!(reported, 1);
}

#[test]
fn test_panicking_task_is_resource_error() {
    let scheduler = FieldScheduler::new(2, 0).unwrap();
    let outcomes = scheduler.run(
        &[0, 1],
        |fov| {
            if fov == 1 {
                panic!("worker blew up");
            }
            Ok(layout(fov))
        },
        |_, _| {},
    );
    assert!(outcomes[&0].is_finished());
    match &outcomes[&1] {
        FieldOutcome::ResourceError(msg) => assert!(msg.contains("worker blew up"), "{msg}"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_zero_workers_uses_available_cores() {
    let scheduler = FieldScheduler::new(0, 0).unwrap();
    assert!(scheduler.workers() >= 1);
}
