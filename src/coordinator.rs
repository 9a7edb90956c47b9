//! # Upload Coordinator
//!
//! Fans a batch of upload jobs out to the [`ObjectStore`] and fans the
//! outcomes back in.
//!
//! ## Batch semantics
//!
//! - An empty batch resolves to an empty result list without touching storage
//! - Every job is dispatched at once; none waits for another to start
//! - Each store call is bounded by the configured timeout; a timeout counts as
//!   a failure
//! - The first failure resolves the batch. Jobs still in flight are dropped
//!   and the batch scope is aborted, which cancels their remote requests.
//!   Objects already stored are not rolled back, and a request the remote side
//!   had already completed when the abort arrived may still leave an object.
//! - Otherwise the batch resolves once every job has settled, with results in
//!   completion order (not submission order)
//!
//! The set of in-flight jobs and the [`BatchTracker`] are owned by the single
//! `run_batch` call polling them, so completions are recorded one at a time
//! and a batch can only ever produce one outcome.

use std::fmt;
use std::time::Duration;

use futures::future::{self, Either};
use futures::stream::{FuturesUnordered, StreamExt};
use futures_timer::Delay;

use crate::errors::AppError;
use crate::log_data;
use crate::logging::Logger;
use crate::models::{IncomingFile, UploadJob, UploadResult};
use crate::storage::ObjectStore;
use crate::utils::generate_object_key;

#[derive(Clone, Debug, PartialEq)]
pub enum FailureReason {
    TimedOut(Duration),
    Rejected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TimedOut(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            FailureReason::Rejected(message) => f.write_str(message),
        }
    }
}

/// The terminal failure of a batch: the first job that did not succeed.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadFailure {
    pub key: String,
    pub reason: FailureReason,
}

impl From<UploadFailure> for AppError {
    fn from(failure: UploadFailure) -> Self {
        AppError::Upload {
            key: failure.key,
            reason: failure.reason.to_string(),
        }
    }
}

/// Counts settled jobs and collects their results for one batch.
#[derive(Debug)]
struct BatchTracker {
    expected: usize,
    results: Vec<UploadResult>,
}

impl BatchTracker {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            results: Vec::with_capacity(expected),
        }
    }

    fn settled(&self) -> usize {
        self.results.len()
    }

    fn record(&mut self, result: UploadResult) {
        self.results.push(result);
    }

    fn is_complete(&self) -> bool {
        self.settled() == self.expected
    }
}

/// Creates one job per file, each with a fresh random key inside `namespace`.
pub fn plan_jobs(namespace: &str, files: Vec<IncomingFile>) -> Vec<UploadJob> {
    files
        .into_iter()
        .map(|source| UploadJob {
            key: generate_object_key(),
            source,
            namespace: namespace.to_string(),
        })
        .collect()
}

pub struct UploadCoordinator<O> {
    store: O,
    timeout: Duration,
    logger: Logger,
}

impl<O: ObjectStore> UploadCoordinator<O> {
    pub fn new(store: O, timeout: Duration, logger: Logger) -> Self {
        Self {
            store,
            timeout,
            logger,
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &O {
        &self.store
    }

    pub async fn run_batch(&self, jobs: Vec<UploadJob>) -> Result<Vec<UploadResult>, UploadFailure> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        self.logger.info(
            "Dispatching upload batch",
            log_data!("jobs" => jobs.len(), "timeout_ms" => self.timeout.as_millis() as u64),
        );

        let batch = self.store.open_batch();
        let outcome = self.settle(&jobs, &batch).await;
        if outcome.is_err() {
            self.store.abort_batch(batch);
        }
        outcome
    }

    async fn settle(
        &self,
        jobs: &[UploadJob],
        batch: &O::Batch,
    ) -> Result<Vec<UploadResult>, UploadFailure> {
        let mut tracker = BatchTracker::new(jobs.len());
        let mut in_flight: FuturesUnordered<_> =
            jobs.iter().map(|job| self.run_job(job, batch)).collect();

        while let Some(outcome) = in_flight.next().await {
            match outcome {
                Ok(result) => tracker.record(result),
                Err(failure) => {
                    self.logger.warn(
                        "Upload batch failed",
                        log_data!(
                            "key" => failure.key,
                            "reason" => failure.reason.to_string(),
                            "settled" => tracker.settled(),
                            "cancelled" => in_flight.len()
                        ),
                    );
                    return Err(failure);
                }
            }
        }

        debug_assert!(tracker.is_complete());
        self.logger.info(
            "Upload batch completed",
            log_data!("settled" => tracker.settled()),
        );
        Ok(tracker.results)
    }

    async fn run_job(&self, job: &UploadJob, batch: &O::Batch) -> Result<UploadResult, UploadFailure> {
        let outcome = future::select(self.store.store(job, batch), Delay::new(self.timeout)).await;

        let reason = match outcome {
            Either::Left((Ok(location), _)) => {
                return Ok(UploadResult {
                    key: job.key.clone(),
                    location,
                })
            }
            Either::Left((Err(error), _)) => FailureReason::Rejected(error.to_string()),
            Either::Right(_) => FailureReason::TimedOut(self.timeout),
        };

        Err(UploadFailure {
            key: job.key.clone(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppResult;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};

    #[derive(Clone, Copy)]
    enum Step {
        Succeed(u64),
        Fail(u64),
    }

    /// Store whose behavior per key is scripted: settle after `ms` with
    /// success or failure.
    struct ScriptedStore {
        script: HashMap<&'static str, Step>,
        calls: Cell<usize>,
        finished: RefCell<Vec<String>>,
        opened: Cell<usize>,
        aborted: Cell<usize>,
    }

    impl ScriptedStore {
        fn new(script: &[(&'static str, Step)]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                calls: Cell::new(0),
                finished: RefCell::new(Vec::new()),
                opened: Cell::new(0),
                aborted: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl<'a> ObjectStore for &'a ScriptedStore {
        type Batch = ();

        fn open_batch(&self) {
            self.opened.set(self.opened.get() + 1);
        }

        fn abort_batch(&self, _batch: ()) {
            self.aborted.set(self.aborted.get() + 1);
        }

        async fn store(&self, job: &UploadJob, _batch: &()) -> AppResult<String> {
            self.calls.set(self.calls.get() + 1);
            let step = self.script[job.key.as_str()];
            let ms = match step {
                Step::Succeed(ms) | Step::Fail(ms) => ms,
            };
            if ms > 0 {
                Delay::new(Duration::from_millis(ms)).await;
            }
            self.finished.borrow_mut().push(job.key.clone());
            match step {
                Step::Succeed(_) => Ok(format!("https://cdn.test/{}", job.object_path())),
                Step::Fail(_) => Err(AppError::storage(format!("{} rejected", job.key))),
            }
        }
    }

    fn job(key: &str) -> UploadJob {
        UploadJob {
            key: key.to_string(),
            source: IncomingFile {
                file_name: format!("{key}.png"),
                content_type: "image/png".to_string(),
                bytes: vec![7; 4],
            },
            namespace: "airbnb/u1".to_string(),
        }
    }

    fn coordinator(store: &ScriptedStore, timeout_ms: u64) -> UploadCoordinator<&ScriptedStore> {
        UploadCoordinator::new(
            store,
            Duration::from_millis(timeout_ms),
            Logger::new("test".to_string()),
        )
    }

    fn pause(ms: u64) {
        block_on(Delay::new(Duration::from_millis(ms)));
    }

    #[test]
    fn empty_batch_resolves_without_calls() {
        let store = ScriptedStore::new(&[]);
        let results = block_on(coordinator(&store, 1_000).run_batch(Vec::new())).unwrap();
        assert!(results.is_empty());
        assert_eq!(store.calls.get(), 0);
        assert_eq!(store.opened.get(), 0);
    }

    #[test]
    fn reordered_completions_yield_every_result() {
        let store = ScriptedStore::new(&[
            ("a", Step::Succeed(60)),
            ("b", Step::Succeed(0)),
            ("c", Step::Succeed(20)),
        ]);
        let results =
            block_on(coordinator(&store, 5_000).run_batch(vec![job("a"), job("b"), job("c")]))
                .unwrap();

        let got: HashSet<UploadResult> = results.into_iter().collect();
        let expected: HashSet<UploadResult> = ["a", "b", "c"]
            .iter()
            .map(|k| UploadResult {
                key: k.to_string(),
                location: format!("https://cdn.test/airbnb/u1/{k}"),
            })
            .collect();
        assert_eq!(got, expected);
        assert_eq!(store.calls.get(), 3);
        assert_eq!(store.opened.get(), 1);
        assert_eq!(store.aborted.get(), 0);
    }

    #[test]
    fn results_follow_completion_order() {
        let store = ScriptedStore::new(&[("slow", Step::Succeed(80)), ("fast", Step::Succeed(0))]);
        let results =
            block_on(coordinator(&store, 5_000).run_batch(vec![job("slow"), job("fast")])).unwrap();
        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["fast", "slow"]);
    }

    #[test]
    fn failure_racing_successes_resolves_once() {
        let store = ScriptedStore::new(&[
            ("a", Step::Succeed(20)),
            ("b", Step::Fail(20)),
            ("c", Step::Succeed(20)),
            ("d", Step::Succeed(20)),
        ]);
        let outcome = block_on(
            coordinator(&store, 5_000).run_batch(vec![job("a"), job("b"), job("c"), job("d")]),
        );

        let failure = outcome.unwrap_err();
        assert_eq!(failure.key, "b");
        assert_eq!(failure.reason, FailureReason::Rejected("b rejected".to_string()));
        assert_eq!(store.calls.get(), 4);
        assert_eq!(store.aborted.get(), 1);
    }

    #[test]
    fn first_failure_cancels_jobs_in_flight() {
        let store = ScriptedStore::new(&[("bad", Step::Fail(0)), ("slow", Step::Succeed(100))]);
        let failure =
            block_on(coordinator(&store, 5_000).run_batch(vec![job("bad"), job("slow")]))
                .unwrap_err();
        assert_eq!(failure.key, "bad");

        assert_eq!(store.aborted.get(), 1);

        pause(200);
        assert_eq!(*store.finished.borrow(), vec!["bad".to_string()]);
    }

    #[test]
    fn timeout_fails_the_batch() {
        let store = ScriptedStore::new(&[
            ("ok", Step::Succeed(0)),
            ("stuck", Step::Succeed(10_000)),
        ]);
        let failure =
            block_on(coordinator(&store, 50).run_batch(vec![job("ok"), job("stuck")])).unwrap_err();

        assert_eq!(failure.key, "stuck");
        assert_eq!(failure.reason, FailureReason::TimedOut(Duration::from_millis(50)));
        assert_eq!(store.opened.get(), 1);
        assert_eq!(store.aborted.get(), 1);

        let error: AppError = failure.into();
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.to_string(), "Upload of stuck failed: timed out after 50ms");
    }

    #[test]
    fn planned_jobs_share_namespace_with_distinct_keys() {
        let files = (0..3)
            .map(|i| IncomingFile {
                file_name: format!("{i}.png"),
                content_type: "image/png".to_string(),
                bytes: vec![i],
            })
            .collect();
        let jobs = plan_jobs("airbnb/u1", files);

        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|j| j.namespace == "airbnb/u1"));
        let keys: HashSet<&str> = jobs.iter().map(|j| j.key.as_str()).collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(jobs[2].source.bytes, vec![2]);
    }
}
