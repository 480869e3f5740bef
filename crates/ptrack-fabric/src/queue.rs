use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::{FabricError, FabricResult};

/// Sizing for a [`TaskQueue`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker before submissions are rejected.
    pub capacity: usize,
    /// Jobs executed concurrently.
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            workers: 2,
        }
    }
}

type JobFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct Job {
    label: String,
    run: JobFn,
}

/// Bounded background queue for blocking jobs.
///
/// Jobs run on tokio's blocking pool, at most `workers` at a time. A job's
/// `Err` is logged by the worker and never reaches the submitter.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Job>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    capacity: usize,
}

impl TaskQueue {
    /// Start the dispatcher on `handle` and return the submission side.
    pub fn start(handle: &Handle, config: QueueConfig) -> Self {
        let capacity = config.capacity.max(1);
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        handle.spawn(dispatch(
            receiver,
            workers,
            Arc::clone(&pending),
            Arc::clone(&idle),
        ));
        info!(capacity, workers, "task queue started");

        Self {
            sender,
            pending,
            idle,
            capacity,
        }
    }

    /// Enqueue a job without waiting.
    pub fn submit<F>(&self, label: impl Into<String>, job: F) -> FabricResult<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let label = label.into();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            label,
            run: Box::new(job),
        };
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.finish_one();
                match e {
                    mpsc::error::TrySendError::Full(job) => {
                        warn!(label = %job.label, capacity = self.capacity, "task queue full, job dropped");
                        Err(FabricError::QueueFull {
                            label: job.label,
                            capacity: self.capacity,
                        })
                    }
                    mpsc::error::TrySendError::Closed(job) => {
                        warn!(label = %job.label, "task queue shut down, job dropped");
                        Err(FabricError::Shutdown)
                    }
                }
            }
        }
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every submitted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn finish_one(&self) {
        finish(&self.pending, &self.idle);
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

fn finish(pending: &AtomicUsize, idle: &Notify) {
    if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        idle.notify_waiters();
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<Job>,
    workers: usize,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) {
    let slots = Arc::new(Semaphore::new(workers));
    // Jobs stay in the channel until a worker slot is free, so the channel
    // capacity bounds the backlog.
    loop {
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let Some(job) = receiver.recv().await else {
            break;
        };
        let pending = Arc::clone(&pending);
        let idle = Arc::clone(&idle);
        tokio::task::spawn_blocking(move || {
            let Job { label, run } = job;
            debug!(label = %label, "job started");
            match run() {
                Ok(()) => debug!(label = %label, "job finished"),
                Err(e) => error!(label = %label, error = %e, "job failed"),
            }
            drop(permit);
            finish(&pending, &idle);
        });
    }
    debug!("task queue dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn jobs_run_and_wait_idle_returns() {
        let queue = TaskQueue::start(&Handle::current(), QueueConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue
                .submit(format!("job-{i}"), move || {
                    seen.lock().unwrap().push(i);
                    Ok(())
                })
                .unwrap();
        }
        queue.wait_idle().await;
        assert_eq!(queue.pending(), 0);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_job_does_not_stop_the_queue() {
        let queue = TaskQueue::start(&Handle::current(), QueueConfig::default());
        queue
            .submit("boom", || Err(anyhow::anyhow!("boom")))
            .unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        queue
            .submit("after", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_queue_rejects_submission() {
        let queue = TaskQueue::start(
            &Handle::current(),
            QueueConfig {
                capacity: 1,
                workers: 1,
            },
        );
        let gate = Arc::new(std::sync::Barrier::new(2));
        let started = Arc::new(AtomicUsize::new(0));

        // Occupy the single worker until the barrier is released.
        let worker_gate = Arc::clone(&gate);
        let worker_started = Arc::clone(&started);
        queue
            .submit("blocker", move || {
                worker_started.store(1, Ordering::SeqCst);
                worker_gate.wait();
                Ok(())
            })
            .unwrap();
        while started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Fills the channel slot; the dispatcher is parked on the semaphore.
        queue.submit("queued", || Ok(())).unwrap();
        let err = queue.submit("overflow", || Ok(())).unwrap_err();
        assert!(matches!(err, FabricError::QueueFull { capacity: 1, .. }));
        assert_eq!(queue.pending(), 2);

        tokio::task::spawn_blocking(move || gate.wait()).await.unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn wait_idle_on_empty_queue_returns_immediately() {
        let queue = TaskQueue::start(&Handle::current(), QueueConfig::default());
        queue.wait_idle().await;
    }
}
