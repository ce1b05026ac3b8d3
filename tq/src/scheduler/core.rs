//! Scheduler handle
//!
//! The handle is cheap to clone. All clones talk to the same actor, which owns
//! the task sequence; the handle itself only reads published snapshots.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::eyre;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::actor::SchedulerActor;
use super::config::SchedulerConfig;
use super::error::{SchedulerError, TaskError};
use super::handle::TaskHandle;
use super::messages::{Command, Job, Outcome};
use super::queue::{QueueState, SchedulerStats, TaskList};
use crate::events::{EventBus, QueueEvent};
use crate::subject::{Subject, Subscription};
use crate::task::{IdGenerator, SchedulerId, Task};

/// Admission-controlled scheduler
///
/// At most `max_concurrency` tasks are `active` at once; the rest wait as
/// `new` and are admitted in submission order as slots free up.
#[derive(Clone)]
pub struct Scheduler {
    id: SchedulerId,
    config: SchedulerConfig,
    ids: Arc<IdGenerator>,
    tx: mpsc::UnboundedSender<Command>,
    tasks: Subject<TaskList>,
    events: EventBus,
    closed: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler with the given concurrency cap
    ///
    /// The scheduler's actor is spawned onto the current Tokio runtime;
    /// outside a runtime this returns [`SchedulerError::NoRuntime`].
    pub fn new(max_concurrency: usize) -> Result<Self, SchedulerError> {
        Self::with_config(SchedulerConfig::with_max_concurrency(max_concurrency))
    }

    /// Create a scheduler from a full configuration
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_id_generator(config, Arc::new(IdGenerator::new()))
    }

    /// Create a scheduler that draws task ids from a shared generator
    pub fn with_id_generator(config: SchedulerConfig, ids: Arc<IdGenerator>) -> Result<Self, SchedulerError> {
        debug!(?config, "Scheduler::with_id_generator: called");
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let id = SchedulerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let tasks: Subject<TaskList> = Subject::new(Vec::new().into());
        let events = EventBus::new(config.event_capacity);
        let closed = Arc::new(AtomicBool::new(false));

        let actor = SchedulerActor::new(
            id,
            config.max_concurrency,
            tasks.clone(),
            events.clone(),
            Arc::clone(&closed),
        );
        runtime.spawn(actor.run(rx));

        Ok(Self {
            id,
            config,
            ids,
            tx,
            tasks,
            events,
            closed,
        })
    }

    pub fn id(&self) -> SchedulerId {
        self.id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }

    /// Submit a work function with its arguments
    ///
    /// The task is named after the function when it is a named `fn` item and
    /// after its id otherwise. The returned handle resolves once the task is
    /// `done` or `error`, or once the scheduler shuts down.
    pub fn submit<F, Fut, R>(&self, work: F, args: Vec<Value>) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce(Task, Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.enqueue(work_name::<F>(), work, args)
    }

    /// Submit a work function under an explicit name
    pub fn submit_named<F, Fut, R>(
        &self,
        name: impl Into<String>,
        work: F,
        args: Vec<Value>,
    ) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce(Task, Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        self.enqueue(Some(name.into()), work, args)
    }

    fn enqueue<F, Fut, R>(&self, name: Option<String>, work: F, args: Vec<Value>) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce(Task, Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        if self.is_closed() {
            debug!("Scheduler::enqueue: closed, rejecting submission");
            return Err(SchedulerError::Closed);
        }

        let id = self.ids.next_id();
        let name = name.unwrap_or_else(|| id.to_string());
        debug!(%id, %name, args = args.len(), "Scheduler::enqueue: called");
        let task = Task::new(self.id, id, name, args);

        let (settle_tx, settle_rx) = oneshot::channel();
        let actor = self.tx.clone();
        let job: Job = Box::new(move |task: Task| run_job(task, work, actor, settle_tx).boxed());

        self.tx
            .send(Command::Submit {
                task: task.clone(),
                job,
            })
            .map_err(|_| SchedulerError::Closed)?;

        Ok(TaskHandle::new(task, settle_rx))
    }

    /// Watch the task sequence, starting with the current snapshot
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TaskList) + Send + Sync + 'static,
    {
        self.tasks.subscribe(listener)
    }

    /// Latest published snapshot of the task sequence
    pub fn snapshot(&self) -> TaskList {
        self.tasks.value()
    }

    /// Status counts over the latest snapshot
    pub fn queue_state(&self) -> QueueState {
        QueueState::from_tasks(&self.snapshot(), self.is_closed())
    }

    /// Subscribe to lifecycle events emitted from now on
    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Read the scheduler statistics
    pub async fn stats(&self) -> Result<SchedulerStats, SchedulerError> {
        debug!("Scheduler::stats: called");
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop admitting and force-close every outstanding task
    ///
    /// Returns once every task that had not settled is closed. Work already
    /// running is not interrupted; its outcome is discarded and its handle
    /// resolves as stopped. Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Scheduler::shutdown: already closed");
        } else {
            debug!(scheduler = %self.id.short(), "Scheduler::shutdown: called");
        }
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown { ack }).is_err() {
            return;
        }
        let _ = done.await;
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.id)
            .field("max_concurrency", &self.config.max_concurrency)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Run one admitted work function and report its outcome
///
/// The typed value reaches the handle only after the actor has recorded the
/// settlement, so an awaited handle always observes the task's final status.
async fn run_job<F, Fut, R>(
    task: Task,
    work: F,
    actor: mpsc::UnboundedSender<Command>,
    settle: oneshot::Sender<Result<R, TaskError>>,
) where
    F: FnOnce(Task, Vec<Value>) -> Fut + Send + 'static,
    Fut: Future<Output = eyre::Result<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    let id = task.id();
    let name = task.name().to_string();
    let args = task.args();

    let result = match AssertUnwindSafe(async move { work(task, args).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(eyre!("work function panicked: {}", panic_message(panic.as_ref()))),
    };

    let (outcome, settled) = match result {
        Ok(value) => {
            let rendered = serde_json::to_value(&value).unwrap_or_else(|e| {
                warn!(%id, error = %e, "Task result is not representable as JSON");
                Value::Null
            });
            (Outcome::Completed(rendered), Ok(value))
        }
        Err(report) => (
            Outcome::Failed(format!("{report:#}")),
            Err(TaskError::Execution {
                id,
                name: name.clone(),
                report,
            }),
        ),
    };

    let (ack, acked) = oneshot::channel();
    if actor.send(Command::Settled { id, outcome, ack }).is_err() || acked.await.is_err() {
        debug!(%id, %name, "run_job: scheduler discarded the outcome");
        return;
    }
    let _ = settle.send(settled);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Declared name of a work function, if it has one
///
/// Named `fn` items yield their last path segment; closures have no name.
fn work_name<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return None;
    }
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ConfigError;
    use crate::task::TaskStatus;
    use serde_json::json;

    async fn echo(_task: Task, args: Vec<Value>) -> eyre::Result<Vec<Value>> {
        Ok(args)
    }

    #[test]
    fn test_work_name_of_fn_item() {
        fn probe<F>(_: &F) -> Option<String> {
            work_name::<F>()
        }
        assert_eq!(probe(&echo), Some("echo".to_string()));
        assert_eq!(probe(&|| ()), None);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_rejected() {
        let err = Scheduler::new(0).unwrap_err();
        assert_eq!(err, SchedulerError::Config(ConfigError::InvalidConcurrency(0)));
    }

    #[test]
    fn test_new_outside_runtime_is_an_error() {
        assert_eq!(Scheduler::new(1).unwrap_err(), SchedulerError::NoRuntime);
        // Configuration is checked first
        assert!(matches!(Scheduler::new(0), Err(SchedulerError::Config(_))));
    }

    #[tokio::test]
    async fn test_submit_resolves_with_result() {
        let scheduler = Scheduler::new(2).unwrap();
        let handle = scheduler.submit(echo, vec![json!(1), json!("a")]).unwrap();
        assert_eq!(handle.name(), "echo");

        let result = handle.await.unwrap();
        assert_eq!(result, vec![json!(1), json!("a")]);

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, TaskStatus::Done);
        assert_eq!(snapshot[0].result, Some(json!([1, "a"])));
    }

    #[tokio::test]
    async fn test_closure_is_named_after_its_id() {
        let scheduler = Scheduler::new(1).unwrap();
        let handle = scheduler
            .submit(|task: Task, _args| async move { Ok::<_, eyre::Report>(task.id().as_u64()) }, Vec::new())
            .unwrap();
        assert_eq!(handle.name(), handle.id().to_string());
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_panicking_work_is_a_failure() {
        let scheduler = Scheduler::new(1).unwrap();
        let handle = scheduler
            .submit_named(
                "explode",
                |_task, _args| async move {
                    if true {
                        panic!("kaboom");
                    }
                    Ok::<(), eyre::Report>(())
                },
                Vec::new(),
            )
            .unwrap();

        let err = handle.await.unwrap_err();
        assert!(!err.is_stopped());
        assert!(err.to_string().contains("kaboom"));
        assert!(scheduler.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_shutdown() {
        let scheduler = Scheduler::new(1).unwrap();
        scheduler.submit(echo, Vec::new()).unwrap().await.unwrap();

        let stats = scheduler.stats().await.unwrap();
        assert_eq!(stats.total_submitted, 1);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.peak_concurrent, 1);

        scheduler.shutdown().await;
        scheduler.shutdown().await;
        assert!(scheduler.is_closed());
        assert!(matches!(
            scheduler.submit(echo, Vec::new()),
            Err(SchedulerError::Closed)
        ));
        assert!(scheduler.queue_state().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_tasks_before_returning() {
        let scheduler = Scheduler::new(1).unwrap();
        let running = scheduler
            .submit_named(
                "running",
                |_task, _args| async move {
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    Ok::<_, eyre::Report>(())
                },
                Vec::new(),
            )
            .unwrap();
        let queued = scheduler.submit(echo, Vec::new()).unwrap();

        scheduler.shutdown().await;

        for task in [running.task(), queued.task()] {
            assert!(task.is_terminal());
            assert!(task.is_stopped());
            assert_eq!(task.serialize(), json!("stopped"));
        }
        assert!(queued.await.unwrap_err().is_stopped());
        assert!(running.await.unwrap_err().is_stopped());
    }
}
