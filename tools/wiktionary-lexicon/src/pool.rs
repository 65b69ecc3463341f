//! Bounded worker pool for build jobs.
//!
//! Jobs are independent: each worker pulls the next job spec from a shared
//! channel, runs it to completion and reports the outcome. A failed job is
//! recorded and the remaining jobs still run.

use std::sync::mpsc::{channel, Receiver};
use std::sync::Mutex;
use std::thread;

use tracing::{error, info};

use crate::config::JobSpec;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self { num_threads: cpus }
    }
}

#[derive(Debug)]
pub struct JobOutcome<T> {
    pub spec: JobSpec,
    pub result: Result<T>,
}

impl<T> JobOutcome<T> {
    pub fn failed(&self) -> bool {
        self.result.is_err()
    }
}

/// Run every job on at most `config.num_threads` threads.
///
/// Outcomes come back in job order regardless of completion order.
pub fn run_jobs<T, F>(jobs: Vec<JobSpec>, config: &PoolConfig, work: F) -> Vec<JobOutcome<T>>
where
    T: Send,
    F: Fn(&JobSpec) -> Result<T> + Sync,
{
    let total = jobs.len();
    let num_workers = config.num_threads.min(total).max(1);

    let (job_tx, job_rx) = channel::<(usize, JobSpec)>();
    for job in jobs.into_iter().enumerate() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = channel::<(usize, JobOutcome<T>)>();

    thread::scope(|scope| {
        for _ in 0..num_workers {
            let tx = result_tx.clone();
            let rx = &job_rx;
            let work = &work;
            scope.spawn(move || {
                worker(rx, work, |index, outcome| tx.send((index, outcome)).is_ok())
            });
        }
    });
    drop(result_tx);

    let mut outcomes: Vec<(usize, JobOutcome<T>)> = result_rx.into_iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

fn worker<T, F>(
    rx: &Mutex<Receiver<(usize, JobSpec)>>,
    work: &F,
    mut report: impl FnMut(usize, JobOutcome<T>) -> bool,
) where
    F: Fn(&JobSpec) -> Result<T>,
{
    loop {
        let next = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };
        let Some((index, spec)) = next else {
            break;
        };

        let result = work(&spec);
        match &result {
            Ok(_) => info!(job = %spec.pair(), "job finished"),
            Err(e) => error!(job = %spec.pair(), error = %e, "job failed"),
        }
        if !report(index, JobOutcome { spec, result }) {
            break;
        }
    }
}
