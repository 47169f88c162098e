//! Runs many fields concurrently and retries the ones that failed for
//! reasons unrelated to their image data.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};

use tracing::{info, warn};

use crate::error::{ErrorKind, KymoError, Result};
use crate::pipeline::FieldLayout;

/// How one field ended.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldOutcome {
    Finished(FieldLayout),
    /// The image data lacks the expected rows or trenches.
    DetectionFailure(String),
    /// Detected structure could not be assembled into rectangular output.
    LayoutError(String),
    /// Storage failure or a crashed task; worth resubmitting.
    ResourceError(String),
}

impl FieldOutcome {
    pub fn from_result(result: Result<FieldLayout>) -> Self {
        match result {
            Ok(layout) => Self::Finished(layout),
            Err(e) => {
                let msg = e.to_string();
                match e.kind() {
                    ErrorKind::Detection => Self::DetectionFailure(msg),
                    // A rejected configuration fails the same way on every attempt.
                    ErrorKind::Layout | ErrorKind::Config => Self::LayoutError(msg),
                    ErrorKind::Resource => Self::ResourceError(msg),
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceError(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Finished(_) => "finished",
            Self::DetectionFailure(_) => "detection failure",
            Self::LayoutError(_) => "layout error",
            Self::ResourceError(_) => "resource error",
        }
    }
}

/// Fixed-size worker pool over fields of view.
///
/// Every field is one task; tasks report back over a channel and the caller
/// thread alone decides what to resubmit.
pub struct FieldScheduler {
    pool: rayon::ThreadPool,
    max_retries: usize,
}

impl FieldScheduler {
    /// `workers == 0` uses one worker per available core.
    pub fn new(workers: usize, max_retries: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kymo-field-{i}"))
            .build()
            .map_err(|e| KymoError::InvalidConfig(format!("cannot start workers: {e}")))?;
        Ok(Self { pool, max_retries })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` once per distinct fov, resubmitting resource failures for up
    /// to `max_retries` extra rounds.
    ///
    /// `on_outcome` is called on the caller thread with each field's settled
    /// outcome, in completion order. The returned map holds the same
    /// outcomes keyed by fov.
    pub fn run<F, C>(&self, fovs: &[usize], job: F, mut on_outcome: C) -> BTreeMap<usize, FieldOutcome>
    where
        F: Fn(usize) -> Result<FieldLayout> + Send + Sync + 'static,
        C: FnMut(usize, &FieldOutcome),
    {
        let job = Arc::new(job);
        let mut pending: Vec<usize> = fovs.to_vec();
        pending.sort_unstable();
        pending.dedup();

        let mut outcomes = BTreeMap::new();
        for attempt in 0..=self.max_retries {
            if pending.is_empty() {
                break;
            }
            if attempt > 0 {
                warn!(attempt, fields = ?pending, "Resubmitting fields after resource errors");
            }

            let (tx, rx) = mpsc::channel::<(usize, FieldOutcome)>();
            for &fov in &pending {
                let tx = tx.clone();
                let job = Arc::clone(&job);
                self.pool.spawn(move || {
                    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| job(fov))) {
                        Ok(result) => FieldOutcome::from_result(result),
                        Err(payload) => FieldOutcome::ResourceError(panic_message(&*payload)),
                    };
                    let _ = tx.send((fov, outcome));
                });
            }
            drop(tx);

            let last_attempt = attempt == self.max_retries;
            let mut retry = Vec::new();
            for (fov, outcome) in rx {
                if outcome.is_retryable() && !last_attempt {
                    warn!(fov, attempt, reason = ?outcome, "Field will be retried");
                    retry.push(fov);
                    continue;
                }
                info!(fov, attempt, outcome = outcome.label(), "Field settled");
                on_outcome(fov, &outcome);
                outcomes.insert(fov, outcome);
            }
            retry.sort_unstable();
            pending = retry;
        }
        outcomes
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".into()
    }
}
