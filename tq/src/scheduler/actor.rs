//! Scheduler actor - owns the task sequence and drives admission
//!
//! Every mutation of the sequence (submit, admit, settle, evict, shutdown)
//! runs to completion inside this actor and ends with an explicit
//! [`SchedulerActor::try_admit`] call. Work functions run as separate tokio
//! tasks and report back through the command channel, so observers only ever
//! see whole snapshots, published in order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::error::GuardViolation;
use super::messages::{Command, Job, Outcome};
use super::queue::{SchedulerStats, TaskList};
use crate::events::{EventBus, QueueEvent};
use crate::subject::Subject;
use crate::task::{SchedulerId, Task, TaskId, TaskStatus};

pub(crate) struct SchedulerActor {
    id: SchedulerId,
    max_concurrency: usize,
    /// Tasks in submission order
    tasks: Vec<Task>,
    /// Work items of tasks not yet admitted
    jobs: HashMap<TaskId, Job>,
    list: Subject<TaskList>,
    events: EventBus,
    stats: SchedulerStats,
    closed: bool,
    closed_flag: Arc<AtomicBool>,
}

impl SchedulerActor {
    pub(crate) fn new(
        id: SchedulerId,
        max_concurrency: usize,
        list: Subject<TaskList>,
        events: EventBus,
        closed_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            max_concurrency,
            tasks: Vec::new(),
            jobs: HashMap::new(),
            list,
            events,
            stats: SchedulerStats::default(),
            closed: false,
            closed_flag,
        }
    }

    /// Process commands until shutdown or until every sender is gone
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(scheduler = %self.id.short(), max_concurrency = self.max_concurrency, "Scheduler started");

        while let Some(command) = rx.recv().await {
            debug!(?command, "SchedulerActor::run: received command");
            match command {
                Command::Submit { task, job } => self.handle_submit(task, job),
                Command::Settled { id, outcome, ack } => self.handle_settled(id, outcome, ack),
                Command::Stats { reply } => {
                    let _ = reply.send(self.stats.clone());
                }
                Command::Shutdown { ack } => {
                    self.shutdown();
                    let _ = ack.send(());
                    break;
                }
            }
        }

        // Anything still in flight is discarded; submissions that raced with
        // shutdown are force-closed so their handles resolve as stopped.
        rx.close();
        while let Ok(command) = rx.try_recv() {
            match command {
                Command::Submit { task, .. } => {
                    debug!(id = %task.id(), "SchedulerActor::run: stopping late submission");
                    self.stop(&task);
                }
                Command::Shutdown { ack } => {
                    let _ = ack.send(());
                }
                Command::Settled { .. } | Command::Stats { .. } => {}
            }
        }
        info!(scheduler = %self.id.short(), "Scheduler stopped");
    }

    fn handle_submit(&mut self, task: Task, job: Job) {
        debug!(id = %task.id(), name = %task.name(), "SchedulerActor::handle_submit: called");
        if self.is_closed() {
            self.stop(&task);
            return;
        }

        self.stats.total_submitted += 1;
        self.jobs.insert(task.id(), job);
        self.events.emit(QueueEvent::TaskQueued {
            task_id: task.id(),
            name: task.name().to_string(),
            position: self.tasks.len(),
        });
        self.tasks.push(task);
        self.publish();

        let queued = self.queued_count();
        self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(queued);

        self.try_admit();
    }

    fn handle_settled(&mut self, id: TaskId, outcome: Outcome, ack: oneshot::Sender<()>) {
        debug!(%id, ?outcome, "SchedulerActor::handle_settled: called");
        let Some(task) = self.tasks.iter().find(|t| t.id() == id).cloned() else {
            warn!(%id, "Settlement for a task no longer in the queue, discarding");
            return;
        };
        if task.is_terminal() {
            self.record_violation(GuardViolation::StoppedTaskAccess { task: id });
            return;
        }

        let current = task.state();
        match outcome {
            Outcome::Completed(result) => {
                let done = current.completed(result);
                let duration_ms: u64 = done
                    .run_time()
                    .and_then(|d| d.num_milliseconds().try_into().ok())
                    .unwrap_or(0);
                task.advance(done);
                task.complete();
                self.stats.total_completed += 1;
                info!(%id, name = %task.name(), duration_ms, "Task completed");
                self.events.emit(QueueEvent::TaskCompleted {
                    task_id: id,
                    name: task.name().to_string(),
                    duration_ms,
                });
                self.publish();
            }
            Outcome::Failed(error) => {
                warn!(%id, name = %task.name(), %error, "Task failed");
                task.advance(current.failed(error.clone()));
                task.complete();
                self.stats.total_failed += 1;
                self.events.emit(QueueEvent::TaskFailed {
                    task_id: id,
                    name: task.name().to_string(),
                    error,
                });
                self.publish();
                self.evict(&task);
            }
        }

        let _ = ack.send(());
        self.try_admit();
    }

    /// Admit queued tasks in submission order until the cap is reached
    pub(crate) fn try_admit(&mut self) {
        loop {
            if self.is_closed() {
                debug!("SchedulerActor::try_admit: closed, not admitting");
                return;
            }
            let active = self.active_count();
            if active >= self.max_concurrency {
                debug!(active, "SchedulerActor::try_admit: at capacity");
                return;
            }
            let Some(next) = self.next_eligible() else {
                debug!(active, "SchedulerActor::try_admit: nothing to do");
                return;
            };
            if let Err(violation) = self.perform(&next) {
                self.record_violation(violation);
                return;
            }
        }
    }

    /// Earliest task still waiting for a slot
    fn next_eligible(&self) -> Option<Task> {
        self.tasks
            .iter()
            .find(|t| !t.is_terminal() && t.owner() == self.id && t.status() == TaskStatus::New)
            .cloned()
    }

    /// Move a task to `active` and launch its work function
    pub(crate) fn perform(&mut self, task: &Task) -> Result<(), GuardViolation> {
        if task.is_terminal() {
            return Err(GuardViolation::StoppedTaskAccess { task: task.id() });
        }
        if task.owner() != self.id {
            return Err(GuardViolation::OwnershipViolation {
                task: task.id(),
                owner: task.owner(),
            });
        }
        let status = task.status();
        if status != TaskStatus::New {
            return Err(GuardViolation::ReentrantAdmission { task: task.id(), status });
        }
        let Some(job) = self.jobs.remove(&task.id()) else {
            return Err(GuardViolation::ReentrantAdmission { task: task.id(), status });
        };

        task.advance(task.state().activated());
        let active = self.active_count();
        self.stats.total_started += 1;
        self.stats.peak_concurrent = self.stats.peak_concurrent.max(active);
        info!(id = %task.id(), name = %task.name(), active, "Task started");
        self.events.emit(QueueEvent::TaskStarted {
            task_id: task.id(),
            name: task.name().to_string(),
            active,
        });
        self.publish();

        tokio::spawn(job(task.clone()));
        Ok(())
    }

    /// Remove a failed task from the sequence
    fn evict(&mut self, task: &Task) {
        debug!(id = %task.id(), "SchedulerActor::evict: called");
        self.tasks.retain(|t| t.id() != task.id());
        self.events.emit(QueueEvent::TaskEvicted {
            task_id: task.id(),
            name: task.name().to_string(),
        });
        self.publish();
    }

    fn shutdown(&mut self) {
        debug!("SchedulerActor::shutdown: called");
        self.closed = true;
        self.closed_flag.store(true, Ordering::SeqCst);

        let outstanding: Vec<Task> = self.tasks.iter().filter(|t| !t.is_terminal()).cloned().collect();
        for task in &outstanding {
            self.stop(task);
        }
        // Dropping the queued work items resolves their handles as stopped
        self.jobs.clear();
        self.list.complete();

        info!(stopped = outstanding.len(), "Scheduler shut down");
        self.events.emit(QueueEvent::SchedulerClosed {
            stopped: outstanding.len(),
        });
    }

    fn stop(&mut self, task: &Task) {
        if task.abort() {
            self.stats.total_stopped += 1;
            self.events.emit(QueueEvent::TaskStopped {
                task_id: task.id(),
                name: task.name().to_string(),
            });
        }
    }

    fn record_violation(&mut self, violation: GuardViolation) {
        warn!(%violation, "Guard check refused task");
        self.stats.guard_violations += 1;
        self.events.emit(QueueEvent::GuardViolation { violation });
    }

    fn publish(&self) {
        let snapshot: TaskList = self.tasks.iter().map(Task::state).collect();
        debug_assert!(
            snapshot.iter().filter(|t| t.status == TaskStatus::Active).count() <= self.max_concurrency,
            "active tasks exceed max_concurrency"
        );
        self.list.publish(snapshot);
    }

    /// Closed here, or by a `shutdown` call whose command is still queued
    fn is_closed(&self) -> bool {
        self.closed || self.closed_flag.load(Ordering::SeqCst)
    }

    fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !t.is_terminal() && t.status() == TaskStatus::Active)
            .count()
    }

    fn queued_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !t.is_terminal() && t.status() == TaskStatus::New)
            .count()
    }
}
