//! Async dispatcher driving one run to completion
//!
//! The [`Runner`] owns the arena, manager, and set for a single invocation.
//! It applies the manager's start effects (launching process work through
//! the [`Spawner`](crate::spawn::Spawner)), feeds completions back in from
//! an mpsc channel, and republishes lifecycle events on the bus. All
//! scheduling state is touched only from this loop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use convoy_core::{Error, EventBus, Result, RunEvent, RunTally, TaskEvent};
use tokio::sync::mpsc;

use crate::manager::{Effects, TaskManager};
use crate::set::TaskSet;
use crate::spawn::Spawner;
use crate::task::{TaskAction, TaskArena, TaskId, TaskStatus};

/// Terminal outcome of one task's work, reported back to the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub id: TaskId,
    pub failed: bool,
}

/// Drives a task set to completion
pub struct Runner {
    arena: TaskArena,
    manager: TaskManager,
    set: TaskSet,
    bus: EventBus,
    spawner: Arc<dyn Spawner>,
    started_at: HashMap<TaskId, Instant>,
}

impl Runner {
    pub fn new(
        arena: TaskArena,
        manager: TaskManager,
        set: TaskSet,
        bus: EventBus,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            arena,
            manager,
            set,
            bus,
            spawner,
            started_at: HashMap::new(),
        }
    }

    /// Run everything the set tracks; returns the final tally
    ///
    /// Construction errors surface as `Err`; task failures are data in the
    /// tally.
    pub async fn run(mut self) -> Result<RunTally> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

        self.bus.run(RunEvent::RunStarted {
            total_tasks: self.set.len(),
        });

        let effects = self.set.start(&mut self.manager, &mut self.arena)?;
        self.apply(effects, &tx);

        while !self.set.is_finished() {
            if self.manager.is_quiescent(&self.arena) {
                // Nothing in flight and nothing startable, yet the set has
                // not settled: the graph wiring is inconsistent.
                return Err(Error::configuration(
                    "scheduler stalled with unfinished tasks",
                ));
            }
            let Some(completion) = rx.recv().await else {
                return Err(Error::configuration(
                    "completion channel closed with tasks outstanding",
                ));
            };
            let effects =
                self.manager
                    .on_completed(&mut self.arena, completion.id, completion.failed);
            self.apply(effects, &tx);
        }

        let tally = self.set.results();
        self.bus.run(RunEvent::RunFinished { tally });
        tracing::info!(
            success = tally.success,
            failed = tally.failed,
            "run finished"
        );
        Ok(tally)
    }

    /// Apply scheduling effects, launching work and folding in the
    /// completions that resolve synchronously (noops, instantly-settled
    /// groups)
    fn apply(&mut self, effects: Effects, tx: &mpsc::UnboundedSender<Completion>) {
        let mut queue = VecDeque::new();
        queue.push_back(effects);

        while let Some(Effects { completed, started }) = queue.pop_front() {
            for id in completed {
                self.report_completed(id);
            }
            for id in started {
                self.launch(id, tx, &mut queue);
            }
        }
    }

    fn launch(
        &mut self,
        id: TaskId,
        tx: &mpsc::UnboundedSender<Completion>,
        queue: &mut VecDeque<Effects>,
    ) {
        self.started_at.insert(id, Instant::now());
        let label = self.arena.get(id).label();
        let action = self.arena.get(id).action().clone();

        queue.push_back(self.manager.on_spawned(&mut self.arena, id));
        self.bus.task(TaskEvent::Started {
            id: id.index(),
            label: label.clone(),
        });
        tracing::debug!(task = %label, id = %id, "task started");

        match action {
            TaskAction::Exec(spec) => {
                let spawner = Arc::clone(&self.spawner);
                let bus = self.bus.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let code = spawner.spawn(id.index(), spec, bus, label).await;
                    let _ = tx.send(Completion {
                        id,
                        failed: code != 0,
                    });
                });
            }
            TaskAction::Noop => {
                queue.push_back(self.manager.on_completed(&mut self.arena, id, false));
            }
            TaskAction::Group { .. } => {
                // Trigger step only: the group settles from its children,
                // which the manager already watches.
            }
        }
    }

    fn report_completed(&mut self, id: TaskId) {
        let failed = self.arena.status(id) == TaskStatus::Failed;
        let duration_ms = self
            .started_at
            .get(&id)
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let label = self.arena.get(id).label();

        self.set.on_completed(&self.arena, id);
        self.bus.task(TaskEvent::Completed {
            id: id.index(),
            label: label.clone(),
            failed,
            duration_ms,
        });
        if failed {
            tracing::error!(task = %label, duration_ms, "task failed");
        } else {
            tracing::info!(task = %label, duration_ms, "task completed");
        }
    }
}
