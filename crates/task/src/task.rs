//! Task entity, status state machine, and the task arena
//!
//! Tasks live in a [`TaskArena`] and are addressed by integer [`TaskId`]s.
//! Dependency edges and dependent back-references are ids, so no edge owns
//! the node it points at, and the whole graph is droppable in one piece.
//! Status transitions are driven exclusively by the scheduler; nothing else
//! mutates a registered task.

use std::fmt;
use std::path::PathBuf;

use convoy_core::{Error, Result};
use serde::Serialize;

/// Process-unique task identifier (index into the owning [`TaskArena`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(usize);

impl TaskId {
    /// Raw index value, for event payloads and plan output
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task execution status
///
/// Transitions are monotonic: `Ready -> Starting -> Running -> Done |
/// Failed`. A task whose dependency failed never leaves `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ready,
    Starting,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    /// True for `Done` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    /// True for `Starting` and `Running`
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Starting | TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Ready => "ready",
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Group orchestration flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Children run one after another (each depends on the previous)
    Sequence,
    /// Children share the group's own dependencies and nothing else
    Parallel,
}

/// Command and invocation site for a process-backed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// What a task does when started
///
/// Closed set of task kinds: the scheduler dispatches on this discriminant
/// rather than inspecting payloads at run time.
#[derive(Debug, Clone)]
pub enum TaskAction {
    /// Spawn an external process; exit 0 is success
    Exec(ExecSpec),
    /// Orchestrate child tasks; completes from their aggregate status
    Group {
        kind: GroupKind,
        children: Vec<TaskId>,
    },
    /// Trigger step with no work of its own; completes immediately
    Noop,
}

/// Caller-defined identification payload
///
/// Used for labeling and plan output only; the scheduler never interprets
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskContext {
    /// A named script in a workspace
    Script {
        workspace: String,
        script: String,
        args: Vec<String>,
    },
    /// A raw command invocation
    Command { command: String, args: Vec<String> },
    /// A sequence/parallel group
    Group { group: GroupKind },
    /// Internal bookkeeping task
    Internal,
}

impl TaskContext {
    /// Human-readable label carried on events
    pub fn label(&self) -> String {
        match self {
            TaskContext::Script {
                workspace, script, ..
            } => format!("{workspace}:{script}"),
            TaskContext::Command { command, args } => {
                if args.is_empty() {
                    command.clone()
                } else {
                    format!("{command} {}", args.join(" "))
                }
            }
            TaskContext::Group { group: GroupKind::Sequence } => "sequence".to_string(),
            TaskContext::Group { group: GroupKind::Parallel } => "parallel".to_string(),
            TaskContext::Internal => "internal".to_string(),
        }
    }
}

/// A single task record inside the arena
#[derive(Debug)]
pub struct TaskData {
    id: TaskId,
    action: TaskAction,
    context: TaskContext,
    status: TaskStatus,
    deps: Vec<TaskId>,
    dependents: Vec<TaskId>,
    /// Groups this task is a direct child of (shared tasks can sit in
    /// several groups; completion notifies each)
    member_of: Vec<TaskId>,
    weight: u32,
    /// Memoized longest-chain depth, set at scheduler registration
    complexity: Option<u32>,
}

impl TaskData {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn deps(&self) -> &[TaskId] {
        &self.deps
    }

    pub fn dependents(&self) -> &[TaskId] {
        &self.dependents
    }

    pub fn member_of(&self) -> &[TaskId] {
        &self.member_of
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Memoized complexity, if the task has been registered
    pub fn complexity(&self) -> Option<u32> {
        self.complexity
    }

    /// Group children, or an empty slice for non-group tasks
    pub fn children(&self) -> &[TaskId] {
        match &self.action {
            TaskAction::Group { children, .. } => children,
            _ => &[],
        }
    }

    pub fn label(&self) -> String {
        self.context.label()
    }
}

/// Arena owning every task of one invocation
///
/// The arena is graph storage only: it wires edges and answers structural
/// queries. Scheduling decisions and status transitions go through the
/// `TaskManager`.
#[derive(Debug, Default)]
pub struct TaskArena {
    tasks: Vec<TaskData>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks in the arena
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate over all task ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|t| t.id)
    }

    pub fn get(&self, id: TaskId) -> &TaskData {
        &self.tasks[id.0]
    }

    fn get_mut(&mut self, id: TaskId) -> &mut TaskData {
        &mut self.tasks[id.0]
    }

    /// Insert a task with the given action, context, and dependencies
    pub fn insert(
        &mut self,
        action: TaskAction,
        context: TaskContext,
        deps: Vec<TaskId>,
    ) -> TaskId {
        let id = TaskId(self.tasks.len());
        for &dep in &deps {
            self.tasks[dep.0].dependents.push(id);
        }
        self.tasks.push(TaskData {
            id,
            action,
            context,
            status: TaskStatus::Ready,
            deps,
            dependents: Vec::new(),
            member_of: Vec::new(),
            weight: 1,
            complexity: None,
        });
        id
    }

    /// Insert a process-backed task
    pub fn new_exec(&mut self, spec: ExecSpec, context: TaskContext, deps: Vec<TaskId>) -> TaskId {
        self.insert(TaskAction::Exec(spec), context, deps)
    }

    /// Insert a trigger task with no work of its own
    pub fn new_noop(&mut self, context: TaskContext, deps: Vec<TaskId>) -> TaskId {
        self.insert(TaskAction::Noop, context, deps)
    }

    /// Insert an empty group task
    pub fn new_group(&mut self, kind: GroupKind, deps: Vec<TaskId>) -> TaskId {
        self.insert(
            TaskAction::Group {
                kind,
                children: Vec::new(),
            },
            TaskContext::Group { group: kind },
            deps,
        )
    }

    /// Append `child` to `group`, wiring the dependencies the group kind
    /// implies
    ///
    /// Sequence: the child depends on the previously last child, or on the
    /// group's own dependencies if it is the first. Parallel: the child
    /// depends on the group's own dependencies only.
    ///
    /// Adding a child once the group has left `Ready` is a lifecycle error:
    /// the child could no longer be folded into the group's aggregation.
    pub fn push_child(&mut self, group: TaskId, child: TaskId) -> Result<()> {
        if group == child {
            return Err(Error::task_state(
                self.tasks[group.0].label(),
                "a group cannot contain itself",
            ));
        }
        let (kind, prev, group_deps) = match &self.tasks[group.0].action {
            TaskAction::Group { kind, children } => (
                *kind,
                children.last().copied(),
                self.tasks[group.0].deps.clone(),
            ),
            _ => {
                return Err(Error::task_state(
                    self.tasks[group.0].label(),
                    "not a group task",
                ))
            }
        };
        if self.tasks[group.0].status != TaskStatus::Ready {
            return Err(Error::task_state(
                self.tasks[group.0].label(),
                "cannot add a child to a group that has already started",
            ));
        }

        let implied: Vec<TaskId> = match (kind, prev) {
            (GroupKind::Sequence, Some(prev)) => vec![prev],
            (GroupKind::Sequence, None) | (GroupKind::Parallel, _) => group_deps,
        };
        for dep in implied {
            self.add_dependency(child, dep);
        }

        match &mut self.tasks[group.0].action {
            TaskAction::Group { children, .. } => children.push(child),
            _ => unreachable!(),
        }
        self.tasks[child.0].member_of.push(group);
        Ok(())
    }

    /// Add a dependency edge, maintaining the dependent back-reference
    ///
    /// Duplicate edges are collapsed. A dependency added to a group is
    /// forwarded to the children the group kind gates on it (every child
    /// of a parallel group, the first child of a sequence), so wiring
    /// stays consistent when a group gains dependencies after its children
    /// were added, e.g. a parallel group chained into a sequence.
    pub fn add_dependency(&mut self, task: TaskId, dep: TaskId) {
        if self.tasks[task.0].deps.contains(&dep) {
            return;
        }
        self.tasks[task.0].deps.push(dep);
        self.tasks[dep.0].dependents.push(task);

        let forward: Vec<TaskId> = match &self.tasks[task.0].action {
            TaskAction::Group {
                kind: GroupKind::Parallel,
                children,
            } => children.clone(),
            TaskAction::Group {
                kind: GroupKind::Sequence,
                children,
            } => children.first().copied().into_iter().collect(),
            _ => Vec::new(),
        };
        for child in forward {
            self.add_dependency(child, dep);
        }
    }

    /// Override the task's tally weight (defaults to 1)
    pub fn set_weight(&mut self, id: TaskId, weight: u32) {
        self.get_mut(id).weight = weight;
    }

    pub(crate) fn set_status(&mut self, id: TaskId, status: TaskStatus) {
        self.get_mut(id).status = status;
    }

    pub(crate) fn set_complexity(&mut self, id: TaskId, complexity: u32) {
        self.get_mut(id).complexity = Some(complexity);
    }

    pub fn status(&self, id: TaskId) -> TaskStatus {
        self.get(id).status
    }

    /// True if the task can never start because a transitive dependency
    /// failed
    pub fn is_blocked(&self, id: TaskId) -> bool {
        self.get(id)
            .deps
            .iter()
            .any(|&d| self.status(d) == TaskStatus::Failed || self.is_blocked(d))
    }

    /// Derived status of a group from its children
    ///
    /// `Failed` if any child failed, else `Running` while any child is in
    /// flight, else `Done` once all children are done; otherwise the
    /// group's own recorded status.
    pub fn group_status(&self, group: TaskId) -> TaskStatus {
        let children = self.get(group).children();
        if children.iter().any(|&c| self.status(c) == TaskStatus::Failed) {
            TaskStatus::Failed
        } else if children.iter().any(|&c| self.status(c).is_active()) {
            TaskStatus::Running
        } else if !children.is_empty()
            && children.iter().all(|&c| self.status(c) == TaskStatus::Done)
        {
            TaskStatus::Done
        } else {
            self.get(group).status
        }
    }
}
