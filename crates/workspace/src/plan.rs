//! Serializable dry-run plan
//!
//! A [`Plan`] is the machine-readable rendering of a resolved task tree:
//! an ordered list in which dependencies always precede their dependents
//! (and group children precede their group), built without starting
//! anything. Callers print or diff it; execution never consumes it.

use std::collections::HashSet;

use convoy_task::{TaskArena, TaskContext, TaskId};
use serde::Serialize;

/// One task of the plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanNode {
    pub id: usize,
    /// Owning group, if the task is a group child
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    /// Dependency task ids; always earlier in the list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<usize>,
    pub context: TaskContext,
}

/// Dependency-ordered plan for a set of target tasks
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub tasks: Vec<PlanNode>,
}

impl Plan {
    /// Build the plan for `targets` and everything reachable from them
    pub fn from_targets(arena: &TaskArena, targets: &[TaskId]) -> Plan {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for &target in targets {
            visit(arena, target, &mut seen, &mut ordered);
        }

        let tasks = ordered
            .into_iter()
            .map(|id| {
                let data = arena.get(id);
                PlanNode {
                    id: id.index(),
                    group: data.member_of().first().map(|g| g.index()),
                    deps: data.deps().iter().map(|d| d.index()).collect(),
                    context: data.context().clone(),
                }
            })
            .collect();
        Plan { tasks }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Post-order walk: dependencies and children first, then the task itself
fn visit(arena: &TaskArena, id: TaskId, seen: &mut HashSet<TaskId>, out: &mut Vec<TaskId>) {
    if !seen.insert(id) {
        return;
    }
    for &dep in arena.get(id).deps() {
        visit(arena, dep, seen, out);
    }
    for &child in arena.get(id).children() {
        visit(arena, child, seen, out);
    }
    out.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, ResolveOptions};
    use crate::provider::{StaticProvider, WorkspaceEntry};

    fn build_plan() -> Plan {
        let mut p = StaticProvider::new();
        p.add(
            "app",
            WorkspaceEntry::new("pkgs/app")
                .script("test", &["vitest"])
                .dep("web")
                .dep("lib"),
        );
        p.add(
            "web",
            WorkspaceEntry::new("pkgs/web").script("build", &["tsc"]).dep("lib"),
        );
        p.add("lib", WorkspaceEntry::new("pkgs/lib").script("build", &["tsc"]));

        let mut arena = TaskArena::new();
        let mut builder = GraphBuilder::new(&mut arena, &p);
        let target = builder
            .resolve("app", "test", Vec::new(), &ResolveOptions::default())
            .unwrap();
        Plan::from_targets(&arena, &[target])
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let plan = build_plan();
        let mut listed = HashSet::new();
        for node in &plan.tasks {
            for dep in &node.deps {
                assert!(listed.contains(dep), "dep {dep} listed after its dependent");
            }
            listed.insert(node.id);
        }
    }

    #[test]
    fn test_shared_tasks_appear_once() {
        let plan = build_plan();
        // app:test, web:build, lib:build
        assert_eq!(plan.tasks.len(), 3);
        let ids: HashSet<usize> = plan.tasks.iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_plan_serializes_contexts() {
        let plan = build_plan();
        let json = plan.to_json();
        assert!(json.contains("\"kind\": \"script\""));
        assert!(json.contains("\"workspace\": \"lib\""));
    }
}
