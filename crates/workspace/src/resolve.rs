//! Expression AST to task graph resolution
//!
//! The parser produces operator trees and knows nothing about execution;
//! this pass turns them into arena tasks. A leaf resolves through the
//! graph builder (so leaves share the builder's memo with every other
//! resolution in the run); `//` groups become parallel group tasks and
//! `->` groups become sequences.

use convoy_core::Result;
use convoy_expr::{ExprNode, Op};
use convoy_task::{GroupKind, TaskId};

use crate::graph::{GraphBuilder, ResolveOptions};
use crate::provider::WorkspaceProvider;

/// Resolve one expression node into a task rooted at `workspace`
pub fn build_task<P: WorkspaceProvider>(
    builder: &mut GraphBuilder<'_, P>,
    node: &ExprNode,
    workspace: &str,
    opts: &ResolveOptions,
) -> Result<TaskId> {
    match node {
        ExprNode::Task { script, args } => {
            builder.resolve(workspace, script, args.clone(), opts)
        }
        ExprNode::Group { op, tasks } => {
            let kind = match op {
                Op::Sequence => GroupKind::Sequence,
                Op::Parallel => GroupKind::Parallel,
            };
            let group = builder.arena_mut().new_group(kind, Vec::new());
            for child in tasks {
                let child_id = build_task(builder, child, workspace, opts)?;
                builder.arena_mut().push_child(group, child_id)?;
            }
            Ok(group)
        }
    }
}
