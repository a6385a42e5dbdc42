//! Workspace graph resolution for convoy
//!
//! Turns "run script S in workspace W" into a deduplicated,
//! dependency-ordered task graph: dependency workspaces build before their
//! dependents run, and a given (workspace, script) pair resolves to exactly
//! one task no matter how many paths reach it. The [`WorkspaceProvider`]
//! trait is the narrow seam to whatever knows the actual workspace layout;
//! a JSON manifest implementation is included for the composition point.

pub mod graph;
pub mod manifest;
pub mod plan;
pub mod provider;
pub mod resolve;

pub use graph::{GraphBuilder, ResolveOptions};
pub use manifest::Manifest;
pub use plan::{Plan, PlanNode};
pub use provider::{DepsMode, ScriptCommand, StaticProvider, WorkspaceEntry, WorkspaceProvider};
pub use resolve::build_task;
