//! A bounded pool of async workers.
//!
//! A [`WorkerPool`] runs a fixed number of tokio tasks that pull jobs from a shared, bounded queue and run the same
//! handler on each one. When the queue is full, [`WorkerPool::submit`] waits for space, which is how callers are
//! throttled. Every job that a worker starts produces exactly one outcome, which can be drained once the pool has
//! been stopped.
//!
//! Cancelling the pool's token (or its parent) makes idle workers exit. Jobs that are already running are allowed to
//! finish; jobs still waiting in the queue are abandoned and counted by [`WorkerPool::outstanding`].
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures_util::future::BoxFuture;
use log::*;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// The function every worker runs for each job. It receives the pool's cancellation token so that long-running jobs
/// can give up early.
pub type JobHandler<T, R, E> = Arc<dyn Fn(CancellationToken, T) -> BoxFuture<'static, Result<R, E>> + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("A worker pool needs at least one worker and one queue slot. Got {workers} workers and {capacity} slots")]
    InvalidConfiguration { workers: usize, capacity: usize },
    #[error("The worker pool has been cancelled")]
    Cancelled,
    #[error("The worker pool has been stopped")]
    Stopped,
}

pub struct WorkerPool<T, R, E> {
    jobs: Option<mpsc::Sender<T>>,
    workers: Vec<JoinHandle<()>>,
    outcomes: mpsc::UnboundedReceiver<Result<R, E>>,
    submitted: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl<T, R, E> WorkerPool<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    /// Starts `num_workers` workers sharing a queue that holds up to `capacity` jobs.
    ///
    /// The pool watches a child of `cancel`, so cancelling the parent also stops the pool.
    pub fn new(
        num_workers: usize,
        capacity: usize,
        cancel: CancellationToken,
        handler: JobHandler<T, R, E>,
    ) -> Result<Self, WorkerPoolError> {
        if num_workers == 0 || capacity == 0 {
            return Err(WorkerPoolError::InvalidConfiguration { workers: num_workers, capacity });
        }
        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let outstanding = Arc::new(AtomicUsize::new(0));
        let cancel = cancel.child_token();
        let workers = (0..num_workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    jobs: Arc::clone(&job_rx),
                    handler: Arc::clone(&handler),
                    outcomes: outcome_tx.clone(),
                    outstanding: Arc::clone(&outstanding),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        debug!("🧵️ Worker pool started with {num_workers} workers and room for {capacity} queued jobs");
        let submitted = AtomicUsize::new(0);
        Ok(Self { jobs: Some(job_tx), workers, outcomes: outcome_rx, submitted, outstanding, cancel })
    }

    /// Queues a job, waiting for a free slot if the queue is full.
    ///
    /// Fails with [`WorkerPoolError::Cancelled`] if the pool is cancelled before the job is accepted, and with
    /// [`WorkerPoolError::Stopped`] once [`WorkerPool::stop_and_wait`] has been called. A job that is rejected is
    /// dropped.
    pub async fn submit(&self, job: T) -> Result<(), WorkerPoolError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerPoolError::Stopped)?;
        if self.cancel.is_cancelled() {
            return Err(WorkerPoolError::Cancelled);
        }
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WorkerPoolError::Cancelled),
            permit = jobs.reserve() => permit.map_err(|_| WorkerPoolError::Stopped)?,
        };
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.submitted.fetch_add(1, Ordering::SeqCst);
        permit.send(job);
        Ok(())
    }

    /// Closes the queue and waits for every worker to exit.
    ///
    /// Without cancellation, the workers drain the queue first. After cancellation, they finish the job in hand and
    /// leave the rest. Calling this more than once is harmless.
    pub async fn stop_and_wait(&mut self) {
        let Some(jobs) = self.jobs.take() else {
            trace!("🧵️ Worker pool already stopped");
            return;
        };
        drop(jobs);
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                error!("🧵️ A worker did not shut down cleanly: {e}");
            }
        }
        debug!(
            "🧵️ Worker pool stopped. {} jobs submitted, {} left unprocessed",
            self.submitted(),
            self.outstanding()
        );
    }

    /// Cancels the pool. Workers stop picking up new jobs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drains the outcomes produced so far. After [`WorkerPool::stop_and_wait`], this yields every outcome.
    pub fn outcomes(&mut self) -> impl Iterator<Item = Result<R, E>> + '_ {
        std::iter::from_fn(move || self.outcomes.try_recv().ok())
    }

    /// The number of jobs accepted by [`WorkerPool::submit`].
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// The number of accepted jobs that have not produced an outcome. Once the pool has stopped, these are the jobs
    /// that were abandoned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl<T, R, E> Drop for WorkerPool<T, R, E> {
    fn drop(&mut self) {
        if self.jobs.is_some() {
            trace!("🧵️ Worker pool dropped without being stopped. Cancelling workers.");
            self.cancel.cancel();
        }
    }
}

struct Worker<T, R, E> {
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<T>>>,
    handler: JobHandler<T, R, E>,
    outcomes: mpsc::UnboundedSender<Result<R, E>>,
    outstanding: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl<T, R, E> Worker<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    async fn run(self) {
        trace!("🧵️ Worker #{} started", self.id);
        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    trace!("🧵️ Worker #{} cancelled", self.id);
                    break;
                },
                job = next_job(&self.jobs) => job,
            };
            let Some(job) = job else {
                trace!("🧵️ Worker #{} found the queue closed and empty", self.id);
                break;
            };
            let outcome = (self.handler)(self.cancel.clone(), job).await;
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            if self.outcomes.send(outcome).is_err() {
                warn!("🧵️ Worker #{} produced an outcome after the pool was dropped. It has been discarded.", self.id);
            }
        }
    }
}

async fn next_job<T>(jobs: &Mutex<mpsc::Receiver<T>>) -> Option<T> {
    jobs.lock().await.recv().await
}
