//! Run-scoped task aggregation
//!
//! A [`TaskSet`] is the view of one invocation: the caller-chosen target
//! tasks plus their transitive closure. It tallies success and failure in
//! weight units and knows when the run as a whole is finished, including
//! runs where part of the graph became unreachable behind a failed
//! dependency and will never complete.

use std::collections::HashSet;

use convoy_core::{Error, Result, RunTally};

use crate::manager::{Effects, TaskManager};
use crate::task::{TaskArena, TaskId, TaskStatus};

/// Lifecycle of a task set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    Created,
    Started,
    Finished,
}

/// A scoped, aggregating view of one invocation's tasks
#[derive(Debug)]
pub struct TaskSet {
    status: SetStatus,
    /// Closure of the targets, in registration order
    tracked: Vec<TaskId>,
    /// Tracked tasks that have not yet reached a terminal state
    remaining: HashSet<TaskId>,
    tally: RunTally,
}

impl TaskSet {
    pub fn new() -> Self {
        Self {
            status: SetStatus::Created,
            tracked: Vec::new(),
            remaining: HashSet::new(),
            tally: RunTally::default(),
        }
    }

    pub fn status(&self) -> SetStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == SetStatus::Finished
    }

    /// Number of tracked tasks (targets plus closure)
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Current tally, in weight units
    pub fn results(&self) -> RunTally {
        self.tally
    }

    /// Tracked tasks in ascending complexity (stable by registration for
    /// ties), i.e. the manager's scheduling order restricted to this set
    pub fn tasks(&self, manager: &TaskManager) -> Vec<TaskId> {
        let members: HashSet<TaskId> = self.tracked.iter().copied().collect();
        manager
            .order()
            .iter()
            .copied()
            .filter(|id| members.contains(id))
            .collect()
    }

    /// Track `target` and everything reachable from it
    ///
    /// Registers the closure with the manager. Mutating a set that has
    /// already started would corrupt the tally, so it fails loudly.
    pub fn add(
        &mut self,
        manager: &mut TaskManager,
        arena: &mut TaskArena,
        target: TaskId,
    ) -> Result<()> {
        if self.status != SetStatus::Created {
            return Err(Error::task_state(
                "task set",
                "cannot add tasks after the set has started",
            ));
        }
        manager.add(arena, target)?;

        let mut stack = vec![target];
        while let Some(id) = stack.pop() {
            if !self.remaining.insert(id) {
                continue;
            }
            self.tracked.push(id);
            stack.extend_from_slice(arena.get(id).deps());
            stack.extend_from_slice(arena.get(id).children());
        }
        Ok(())
    }

    /// Start the run
    ///
    /// An empty set finishes immediately with a zero tally. Starting twice
    /// is a programming error.
    pub fn start(&mut self, manager: &mut TaskManager, arena: &mut TaskArena) -> Result<Effects> {
        if self.status != SetStatus::Created {
            return Err(Error::task_state(
                "task set",
                "the set has already been started",
            ));
        }
        if self.tracked.is_empty() {
            self.status = SetStatus::Finished;
            return Ok(Effects::default());
        }
        self.status = SetStatus::Started;
        Ok(manager.start(arena))
    }

    /// Fold one task's terminal status into the tally
    ///
    /// Finishes the set once every tracked task has completed or sits
    /// permanently behind a failed dependency (those are not counted).
    pub fn on_completed(&mut self, arena: &TaskArena, id: TaskId) {
        if self.status != SetStatus::Started {
            return;
        }
        if !self.remaining.remove(&id) {
            return;
        }
        let data = arena.get(id);
        match data.status() {
            TaskStatus::Done => self.tally.success += data.weight(),
            TaskStatus::Failed => self.tally.failed += data.weight(),
            _ => {}
        }
        if self.remaining.iter().all(|&rest| arena.is_blocked(rest)) {
            self.status = SetStatus::Finished;
        }
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::new()
    }
}
