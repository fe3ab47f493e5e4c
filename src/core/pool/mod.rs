//! # Pool Module
//!
//! A fixed set of worker threads comparing unit pairs.
//!
//! ## Queues
//! - The job queue holds [`JOBS_PER_WORKER`] pairs per worker. Pairs are
//!   produced lazily, so its memory stays constant however many pairs the
//!   grid has. The producer waits only while every worker is busy, and a
//!   worker never waits on the producer, so the queue cannot deadlock.
//!   Workers pull from it until it is empty and closed.
//! - Pairs whose distance is strictly greater than the threshold are sent
//!   to the result queue from [`result_queue`], which is unbounded: it
//!   allocates per flagged pair, never per possible pair, and a worker never
//!   waits on the sink.
//!
//! Workers share nothing but the two queues. Each keeps its own counters
//! and hands them back when joined. The result sender is dropped once every
//! worker has returned, which closes the queue for the sink.

use crate::core::comparator::Comparator;
use crate::core::pairs::UnitPair;
use crate::core::pipeline::CancellationToken;
use crate::events::{CompareEvent, Event, EventSender};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread;
use tracing::{debug, trace, warn};

/// Pairs a worker compares between progress reports
const PROGRESS_INTERVAL: usize = 64;

/// Job queue slots per worker
pub const JOBS_PER_WORKER: usize = 64;

/// The queue carrying flagged pairs from the workers to a sink
pub fn result_queue<'a>() -> (Sender<DiffResult<'a>>, Receiver<DiffResult<'a>>) {
    unbounded()
}

fn job_queue<'a>(workers: usize) -> (Sender<UnitPair<'a>>, Receiver<UnitPair<'a>>) {
    bounded(workers * JOBS_PER_WORKER)
}

/// A pair known to be more different than the threshold
#[derive(Debug, Clone, Copy)]
pub struct DiffResult<'a> {
    pub pair: UnitPair<'a>,
    pub distance: f64,
}

/// Counters accumulated by the workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pairs compared
    pub compared: usize,
    /// Pairs forwarded to the result queue
    pub flagged: usize,
}

impl PoolStats {
    fn merge(self, other: PoolStats) -> PoolStats {
        PoolStats {
            compared: self.compared + other.compared,
            flagged: self.flagged + other.flagged,
        }
    }
}

/// Fixed-size pool of comparison workers
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` threads (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compare every pair, forwarding flagged ones to `results`.
    ///
    /// Blocks until all pairs are dequeued and every worker has returned.
    /// `results` is dropped on return, so a receiver draining it
    /// concurrently sees the queue close exactly when the pool is done.
    pub fn run<'a, I>(
        &self,
        pairs: I,
        comparator: &dyn Comparator,
        threshold: f64,
        results: Sender<DiffResult<'a>>,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> PoolStats
    where
        I: ExactSizeIterator<Item = UnitPair<'a>>,
    {
        let total = pairs.len();
        let (job_tx, job_rx) = job_queue(self.workers);

        events.send(Event::Compare(CompareEvent::Started {
            total_pairs: total,
            workers: self.workers,
        }));
        debug!(
            total_pairs = total,
            workers = self.workers,
            comparator = comparator.name(),
            "starting workers"
        );

        let stats = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|worker| {
                    let jobs = job_rx.clone();
                    let results = results.clone();
                    let events = events.clone();
                    scope.spawn(move || {
                        run_worker(worker, jobs, results, comparator, threshold, &events, cancel)
                    })
                })
                .collect();
            drop(job_rx);

            for pair in pairs {
                if cancel.is_cancelled() {
                    debug!("cancelled, no further pairs enqueued");
                    break;
                }
                if job_tx.send(pair).is_err() {
                    break;
                }
            }
            drop(job_tx);

            handles
                .into_iter()
                .fold(PoolStats::default(), |acc, handle| match handle.join() {
                    Ok(stats) => acc.merge(stats),
                    Err(panic) => std::panic::resume_unwind(panic),
                })
        });

        drop(results);
        stats
    }
}

fn run_worker<'a>(
    worker: usize,
    jobs: Receiver<UnitPair<'a>>,
    results: Sender<DiffResult<'a>>,
    comparator: &dyn Comparator,
    threshold: f64,
    events: &EventSender,
    cancel: &CancellationToken,
) -> PoolStats {
    let mut stats = PoolStats::default();
    let mut unreported = 0;

    for pair in jobs.iter() {
        if cancel.is_cancelled() {
            break;
        }

        let distance = comparator.compare(&pair.a.view, &pair.b.view);
        stats.compared += 1;
        unreported += 1;

        if distance > threshold {
            stats.flagged += 1;
            events.send(Event::Compare(CompareEvent::Flagged {
                unit_a: (pair.a.id.x, pair.a.id.y),
                unit_b: (pair.b.id.x, pair.b.id.y),
                distance,
            }));
            if results.send(DiffResult { pair, distance }).is_err() {
                warn!(worker, "result queue closed early; stopping worker");
                break;
            }
        }

        if unreported == PROGRESS_INTERVAL {
            events.send(Event::Compare(CompareEvent::Progress {
                compared: unreported,
            }));
            unreported = 0;
        }
    }

    if unreported > 0 {
        events.send(Event::Compare(CompareEvent::Progress {
            compared: unreported,
        }));
    }

    trace!(worker, compared = stats.compared, flagged = stats.flagged, "worker finished");
    stats
}
