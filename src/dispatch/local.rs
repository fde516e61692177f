//! In-process task dispatcher backed by tokio tasks

use super::traits::{JobPerformer, TaskDispatcher};
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::types::{JobId, Status, TaskHandle};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Random bytes per task handle (rendered as 24 hex characters)
const HANDLE_BYTES: usize = 12;

struct WorkItem {
    handle: TaskHandle,
    job_id: JobId,
}

#[derive(Debug, Clone, Copy)]
struct TaskEntry {
    status: Status,
    finished_at: Option<Instant>,
}

/// Dispatcher running jobs on the local tokio runtime
///
/// Enqueued jobs go through an unbounded channel to a single worker loop,
/// which spawns one task per job while holding a semaphore permit, so at
/// most `max_concurrent_jobs` run at once. Task status moves
/// `queued → working → complete|error` and is forgotten `status_ttl` after
/// the task finishes; later queries answer `None`, like an expired entry in
/// an external status store.
///
/// Cloning is cheap; all clones share the same queue and status table.
#[derive(Clone)]
pub struct LocalDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    sender: mpsc::UnboundedSender<WorkItem>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<WorkItem>>>,
    tasks: Mutex<HashMap<TaskHandle, TaskEntry>>,
    concurrent_limit: Arc<Semaphore>,
    max_concurrent: usize,
    status_ttl: Duration,
    accepting_new: AtomicBool,
    cancel: CancellationToken,
}

impl LocalDispatcher {
    /// Create a dispatcher; jobs only start running after [`start`](Self::start)
    pub fn new(config: &DispatchConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let max_concurrent = config.max_concurrent_jobs.max(1);

        Self {
            inner: Arc::new(Inner {
                sender,
                receiver: Mutex::new(Some(receiver)),
                tasks: Mutex::new(HashMap::new()),
                concurrent_limit: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                status_ttl: config.status_ttl,
                accepting_new: AtomicBool::new(true),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Start the worker loop, handing every dequeued job to `performer`
    ///
    /// # Errors
    ///
    /// Returns `Error::Dispatch` if the worker loop was already started.
    pub async fn start(
        &self,
        performer: Arc<dyn JobPerformer>,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let mut receiver = self
            .inner
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Dispatch("dispatcher already started".into()))?;

        let inner = Arc::clone(&self.inner);

        Ok(tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    item = receiver.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                // Blocks while max_concurrent_jobs tasks are running
                let permit = tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    permit = Arc::clone(&inner.concurrent_limit).acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    },
                };

                let inner = Arc::clone(&inner);
                let performer = Arc::clone(&performer);

                tokio::spawn(async move {
                    let _permit = permit;
                    let WorkItem { handle, job_id } = item;

                    inner.set_status(&handle, Status::Working).await;

                    // Run in its own task so a panic still produces a terminal status
                    let outcome =
                        tokio::spawn(async move { performer.perform(job_id).await }).await;

                    let status = match outcome {
                        Ok(Ok(())) => Status::Complete,
                        Ok(Err(e)) => {
                            tracing::error!(job_id = %job_id, task = %handle, error = %e, "job task failed");
                            Status::Error
                        }
                        Err(e) => {
                            tracing::error!(job_id = %job_id, task = %handle, error = %e, "job task panicked");
                            Status::Error
                        }
                    };

                    inner.set_status(&handle, status).await;
                });
            }

            tracing::debug!("dispatch worker loop stopped");
        }))
    }

    /// Stop accepting work and wait up to `grace` for running tasks
    ///
    /// Jobs still waiting in the queue are abandoned; their handles stay
    /// `queued` until the process exits.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.accepting_new.store(false, Ordering::SeqCst);
        self.inner.cancel.cancel();

        let permits = u32::try_from(self.inner.max_concurrent).unwrap_or(u32::MAX);
        match tokio::time::timeout(grace, self.inner.concurrent_limit.acquire_many(permits)).await
        {
            Ok(_) => tracing::info!("all dispatched tasks finished"),
            Err(_) => tracing::warn!(
                grace_secs = grace.as_secs_f64(),
                "timeout waiting for dispatched tasks, proceeding with shutdown"
            ),
        }
    }

    /// Number of tasks currently running
    pub async fn active_tasks(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .await
            .values()
            .filter(|t| t.status == Status::Working)
            .count()
    }
}

impl Inner {
    async fn set_status(&self, handle: &TaskHandle, status: Status) {
        let mut tasks = self.tasks.lock().await;
        let finished_at = status.is_terminal().then(Instant::now);
        tasks.insert(
            handle.clone(),
            TaskEntry {
                status,
                finished_at,
            },
        );
    }

    fn purge_expired(&self, tasks: &mut HashMap<TaskHandle, TaskEntry>) {
        let ttl = self.status_ttl;
        tasks.retain(|_, entry| entry.finished_at.is_none_or(|at| at.elapsed() < ttl));
    }
}

#[async_trait]
impl TaskDispatcher for LocalDispatcher {
    async fn enqueue(&self, job_id: JobId) -> Result<TaskHandle> {
        if !self.inner.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let handle = generate_handle();
        {
            let mut tasks = self.inner.tasks.lock().await;
            self.inner.purge_expired(&mut tasks);
            tasks.insert(
                handle.clone(),
                TaskEntry {
                    status: Status::Queued,
                    finished_at: None,
                },
            );
        }

        if self
            .inner
            .sender
            .send(WorkItem {
                handle: handle.clone(),
                job_id,
            })
            .is_err()
        {
            self.inner.tasks.lock().await.remove(&handle);
            return Err(Error::Dispatch("work queue closed".into()));
        }

        tracing::debug!(job_id = %job_id, task = %handle, "job enqueued");
        Ok(handle)
    }

    async fn status(&self, handle: &TaskHandle) -> Result<Option<Status>> {
        let mut tasks = self.inner.tasks.lock().await;
        self.inner.purge_expired(&mut tasks);
        Ok(tasks.get(handle).map(|entry| entry.status))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn generate_handle() -> TaskHandle {
    let bytes: [u8; HANDLE_BYTES] = rand::thread_rng().r#gen();
    TaskHandle(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn dispatcher(max_concurrent_jobs: usize, status_ttl: Duration) -> LocalDispatcher {
        LocalDispatcher::new(&DispatchConfig {
            max_concurrent_jobs,
            status_ttl,
        })
    }

    async fn wait_for_status(
        dispatcher: &LocalDispatcher,
        handle: &TaskHandle,
        expected: Option<Status>,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = dispatcher.status(handle).await.unwrap();
            if status == expected {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "task {} stuck at {:?}, expected {:?}",
                handle,
                status,
                expected
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Blocks every job until released
    struct GatedPerformer {
        gate: Notify,
    }

    #[async_trait]
    impl JobPerformer for GatedPerformer {
        async fn perform(&self, _job_id: JobId) -> Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    /// Fails, panics or succeeds depending on the job id
    struct ScriptedPerformer;

    #[async_trait]
    impl JobPerformer for ScriptedPerformer {
        async fn perform(&self, job_id: JobId) -> Result<()> {
            match job_id.get() {
                1 => Ok(()),
                2 => Err(Error::Other("could not record outcome".into())),
                _ => panic!("performer exploded"),
            }
        }
    }

    /// Records the highest number of jobs seen running together
    #[derive(Default)]
    struct CountingPerformer {
        running: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl JobPerformer for CountingPerformer {
        async fn perform(&self, _job_id: JobId) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn handles_are_24_lowercase_hex_and_unique() {
        let handles: HashSet<String> = (0..1000).map(|_| generate_handle().0).collect();
        assert_eq!(handles.len(), 1000);
        for handle in &handles {
            assert_eq!(handle.len(), 24);
            assert!(
                handle
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            );
        }
    }

    #[tokio::test]
    async fn status_follows_task_lifecycle() {
        let dispatcher = dispatcher(2, Duration::from_secs(60));
        let performer = Arc::new(GatedPerformer {
            gate: Notify::new(),
        });

        let handle = dispatcher.enqueue(JobId(1)).await.unwrap();
        assert_eq!(
            dispatcher.status(&handle).await.unwrap(),
            Some(Status::Queued)
        );

        dispatcher.start(performer.clone()).await.unwrap();
        wait_for_status(&dispatcher, &handle, Some(Status::Working)).await;
        assert_eq!(dispatcher.active_tasks().await, 1);

        performer.gate.notify_one();
        wait_for_status(&dispatcher, &handle, Some(Status::Complete)).await;
        assert_eq!(dispatcher.active_tasks().await, 0);
    }

    #[tokio::test]
    async fn failed_and_panicked_tasks_report_error() {
        let dispatcher = dispatcher(4, Duration::from_secs(60));
        dispatcher.start(Arc::new(ScriptedPerformer)).await.unwrap();

        let ok = dispatcher.enqueue(JobId(1)).await.unwrap();
        let failed = dispatcher.enqueue(JobId(2)).await.unwrap();
        let panicked = dispatcher.enqueue(JobId(3)).await.unwrap();

        wait_for_status(&dispatcher, &ok, Some(Status::Complete)).await;
        wait_for_status(&dispatcher, &failed, Some(Status::Error)).await;
        wait_for_status(&dispatcher, &panicked, Some(Status::Error)).await;
    }

    #[tokio::test]
    async fn unknown_handle_has_no_status() {
        let dispatcher = dispatcher(1, Duration::from_secs(60));
        let status = dispatcher
            .status(&TaskHandle("0123456789abcdef01234567".into()))
            .await
            .unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn finished_status_expires_after_ttl() {
        let dispatcher = dispatcher(1, Duration::from_millis(100));
        dispatcher.start(Arc::new(ScriptedPerformer)).await.unwrap();

        let handle = dispatcher.enqueue(JobId(1)).await.unwrap();
        wait_for_status(&dispatcher, &handle, Some(Status::Complete)).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dispatcher.status(&handle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let dispatcher = dispatcher(2, Duration::from_secs(60));
        let performer = Arc::new(CountingPerformer::default());
        dispatcher.start(performer.clone()).await.unwrap();

        let mut handles = Vec::new();
        for id in 1..=6 {
            handles.push(dispatcher.enqueue(JobId(id)).await.unwrap());
        }
        for handle in &handles {
            wait_for_status(&dispatcher, handle, Some(Status::Complete)).await;
        }

        let max_seen = performer.max_seen.load(Ordering::SeqCst);
        assert!((1..=2).contains(&max_seen), "max concurrent = {}", max_seen);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let dispatcher = dispatcher(1, Duration::from_secs(60));
        dispatcher.start(Arc::new(ScriptedPerformer)).await.unwrap();
        let second = dispatcher.start(Arc::new(ScriptedPerformer)).await;
        assert!(matches!(second, Err(Error::Dispatch(_))));
    }

    #[tokio::test]
    async fn shutdown_waits_for_running_tasks_and_rejects_new_work() {
        let dispatcher = dispatcher(2, Duration::from_secs(60));
        let performer = Arc::new(GatedPerformer {
            gate: Notify::new(),
        });
        dispatcher.start(performer.clone()).await.unwrap();

        let handle = dispatcher.enqueue(JobId(1)).await.unwrap();
        wait_for_status(&dispatcher, &handle, Some(Status::Working)).await;

        let release = Arc::clone(&performer);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            release.gate.notify_one();
        });

        dispatcher.shutdown(Duration::from_secs(5)).await;
        assert_eq!(
            dispatcher.status(&handle).await.unwrap(),
            Some(Status::Complete)
        );

        let rejected = dispatcher.enqueue(JobId(2)).await;
        assert!(matches!(rejected, Err(Error::ShuttingDown)));
    }
}
