//! Task scheduling and dependency-graph execution for convoy
//!
//! This crate is the execution engine: tasks live in an arena indexed by
//! integer ids, the [`TaskManager`] decides what runs next under a
//! concurrency bound, group tasks compose sequence/parallel structure, the
//! [`TaskSet`] scopes and tallies one invocation, and the [`Runner`] is the
//! async shell that launches process work and feeds completions back in.

pub mod manager;
pub mod runner;
pub mod set;
pub mod spawn;
pub mod task;

pub use manager::{Effects, TaskManager};
pub use runner::{Completion, Runner};
pub use set::{SetStatus, TaskSet};
pub use spawn::{ProcessSpawner, Spawner, SPAWN_FAILURE_CODE};
pub use task::{
    ExecSpec, GroupKind, TaskAction, TaskArena, TaskContext, TaskData, TaskId, TaskStatus,
};

#[cfg(test)]
mod tests;
