//! Bounded-concurrency task scheduler
//!
//! The manager is a synchronous state machine: `add` registers graphs,
//! `start`/`on_spawned`/`on_completed` advance statuses and return the
//! *effects* (tasks to launch, tasks that reached a terminal state) for the
//! async shell to act on. Keeping the bookkeeping synchronous means every
//! scheduling decision runs to completion on one event before the next is
//! observed, which is the serialization the execution model requires.

use std::collections::HashSet;

use convoy_core::{Error, Result};

use crate::task::{TaskAction, TaskArena, TaskId, TaskStatus};

/// Scheduling side effects to be applied by the caller
///
/// `completed` lists tasks that reached `done`/`failed` during the call
/// (group completions cascade here); `started` lists tasks moved to
/// `starting` whose action must now be launched.
#[derive(Debug, Default)]
pub struct Effects {
    pub completed: Vec<TaskId>,
    pub started: Vec<TaskId>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.started.is_empty()
    }
}

/// Bounded-concurrency scheduler over a task arena
#[derive(Debug)]
pub struct TaskManager {
    /// Maximum number of slot-occupying tasks in `starting`/`running`;
    /// 0 means unbounded
    jobs: usize,
    /// Registered tasks in ascending complexity, stable by insertion for
    /// ties; this is the scheduling priority
    order: Vec<TaskId>,
    registered: HashSet<TaskId>,
    started: bool,
    /// Count of slot-occupying tasks currently in flight
    active: usize,
}

impl TaskManager {
    /// Create a manager with the given concurrency bound (`0` = unbounded)
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs,
            order: Vec::new(),
            registered: HashSet::new(),
            started: false,
            active: 0,
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Slot-occupying tasks currently in flight
    pub fn active(&self) -> usize {
        self.active
    }

    /// Registered tasks in scheduling order
    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn is_registered(&self, id: TaskId) -> bool {
        self.registered.contains(&id)
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Register a task and, recursively, every dependency and group child
    /// not already known
    ///
    /// Registration memoizes each task's complexity (longest dependency
    /// chain below it) and inserts it into the scheduling order. Cycles are
    /// detected here, once, so traversals afterwards can assume a DAG.
    pub fn add(&mut self, arena: &mut TaskArena, id: TaskId) -> Result<()> {
        let mut stack = Vec::new();
        self.register(arena, id, &mut stack)?;
        Ok(())
    }

    fn register(
        &mut self,
        arena: &mut TaskArena,
        id: TaskId,
        stack: &mut Vec<TaskId>,
    ) -> Result<u32> {
        if self.registered.contains(&id) {
            return Ok(arena.get(id).complexity().unwrap_or(0));
        }
        if stack.contains(&id) {
            return Err(Error::configuration(format!(
                "circular dependency detected involving task '{}'",
                arena.get(id).label()
            )));
        }
        stack.push(id);

        let deps: Vec<TaskId> = arena.get(id).deps().to_vec();
        let mut max_dep: Option<u32> = None;
        for dep in deps {
            let c = self.register(arena, dep, stack)?;
            max_dep = Some(max_dep.map_or(c, |m| m.max(c)));
        }
        let children: Vec<TaskId> = arena.get(id).children().to_vec();
        for child in children {
            self.register(arena, child, stack)?;
        }

        stack.pop();

        let complexity = max_dep.map_or(0, |m| m + 1);
        arena.set_complexity(id, complexity);
        let pos = self
            .order
            .partition_point(|&t| arena.get(t).complexity().unwrap_or(0) <= complexity);
        self.order.insert(pos, id);
        self.registered.insert(id);
        Ok(complexity)
    }

    /// Begin scheduling; returns the initially eligible tasks
    pub fn start(&mut self, arena: &mut TaskArena) -> Effects {
        self.started = true;
        Effects {
            completed: Vec::new(),
            started: self.schedule(arena),
        }
    }

    /// Acknowledge that a starting task's work has been launched
    ///
    /// Moves the task to `running`. Groups may complete in the same breath
    /// (zero children, or children that already settled), so this can
    /// cascade completions.
    pub fn on_spawned(&mut self, arena: &mut TaskArena, id: TaskId) -> Effects {
        if arena.status(id) == TaskStatus::Starting {
            arena.set_status(id, TaskStatus::Running);
        }
        let completed = self.sweep_groups(arena);
        let started = if completed.is_empty() {
            Vec::new()
        } else {
            self.schedule(arena)
        };
        Effects { completed, started }
    }

    /// Record a task's terminal outcome and advance the schedule
    ///
    /// Returns the full set of completions (the task itself plus any group
    /// completions it settled) and the tasks that became eligible.
    pub fn on_completed(&mut self, arena: &mut TaskArena, id: TaskId, failed: bool) -> Effects {
        if arena.status(id).is_terminal() {
            return Effects::default();
        }
        let occupied = occupies_slot(arena.get(id).action()) && arena.status(id).is_active();
        arena.set_status(
            id,
            if failed {
                TaskStatus::Failed
            } else {
                TaskStatus::Done
            },
        );
        if occupied {
            self.active -= 1;
        }

        let mut completed = vec![id];
        completed.extend(self.sweep_groups(arena));
        let started = self.schedule(arena);
        Effects { completed, started }
    }

    /// True when nothing is in flight and nothing further can start
    pub fn is_quiescent(&self, arena: &TaskArena) -> bool {
        self.active == 0 && !self.order.iter().any(|&id| self.is_startable(arena, id))
    }

    fn is_startable(&self, arena: &TaskArena, id: TaskId) -> bool {
        arena.status(id) == TaskStatus::Ready
            && arena
                .get(id)
                .deps()
                .iter()
                .all(|&d| arena.status(d) == TaskStatus::Done)
    }

    /// Scan the order and start everything eligible
    ///
    /// Tasks closer to the leaves come first in the order, so long
    /// dependency chains get their slots before shallow work when several
    /// tasks are eligible at once.
    fn schedule(&mut self, arena: &mut TaskArena) -> Vec<TaskId> {
        if !self.started {
            return Vec::new();
        }
        let mut launched = Vec::new();
        for i in 0..self.order.len() {
            let id = self.order[i];
            if !self.is_startable(arena, id) {
                continue;
            }
            // Groups orchestrate rather than work; they neither occupy nor
            // wait for a job slot (a sequence group holding a slot while
            // its own children queue for one would deadlock at jobs=1).
            let occupies = occupies_slot(arena.get(id).action());
            if occupies && self.jobs != 0 && self.active >= self.jobs {
                continue;
            }
            arena.set_status(id, TaskStatus::Starting);
            if occupies {
                self.active += 1;
            }
            launched.push(id);
        }
        launched
    }

    /// Complete every in-flight group whose children have settled
    ///
    /// A group fails as soon as any child fails. Otherwise it completes
    /// once every child is terminal or can no longer start (a transitive
    /// dependency failed); unreachable children turn the aggregate into a
    /// failure. Completing one group can settle its parent, so the sweep
    /// runs to a fixpoint.
    fn sweep_groups(&mut self, arena: &mut TaskArena) -> Vec<TaskId> {
        let mut completed = Vec::new();
        loop {
            let mut progressed = false;
            for i in 0..self.order.len() {
                let id = self.order[i];
                if !arena.status(id).is_active() {
                    continue;
                }
                let outcome = match arena.get(id).action() {
                    TaskAction::Group { children, .. } => group_outcome(arena, children),
                    _ => continue,
                };
                if let Some(failed) = outcome {
                    arena.set_status(
                        id,
                        if failed {
                            TaskStatus::Failed
                        } else {
                            TaskStatus::Done
                        },
                    );
                    completed.push(id);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        completed
    }
}

/// Whether a task's action counts against the `jobs` bound
fn occupies_slot(action: &TaskAction) -> bool {
    matches!(action, TaskAction::Exec(_) | TaskAction::Noop)
}

/// Terminal outcome for a group's children, if they have settled
///
/// `Some(true)` = failed, `Some(false)` = done, `None` = still waiting.
fn group_outcome(arena: &TaskArena, children: &[TaskId]) -> Option<bool> {
    if children
        .iter()
        .any(|&c| arena.status(c) == TaskStatus::Failed)
    {
        return Some(true);
    }
    let all_settled = children
        .iter()
        .all(|&c| arena.status(c).is_terminal() || arena.is_blocked(c));
    if !all_settled {
        return None;
    }
    // No child failed outright; blocked children still mean an upstream
    // failure reached this group.
    let any_blocked = children.iter().any(|&c| !arena.status(c).is_terminal());
    Some(any_blocked)
}
