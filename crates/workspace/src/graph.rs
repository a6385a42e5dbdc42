//! Dependency-ordered build graph with deduplication
//!
//! Resolving `script` in `workspace` walks the workspace dependency graph
//! depth-first: every dependency workspace's build script resolves before
//! the task for the current pair is constructed, and the memo guarantees a
//! given (workspace, script) pair maps to one task instance however many
//! paths reach it: it is scheduled and executed at most once per run, and
//! every dependent waits on that one completion.

use convoy_core::{Error, Result};
use convoy_task::{ExecSpec, TaskArena, TaskContext, TaskId};
use indexmap::IndexMap;
use tracing::debug;

use crate::provider::{DepsMode, WorkspaceProvider};

/// Options controlling how a run's graph is built
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Script resolved in dependency workspaces before their dependents
    pub build_script: String,
    /// Which dependency kinds are walked
    pub deps_mode: DepsMode,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            build_script: "build".to_string(),
            deps_mode: DepsMode::All,
        }
    }
}

/// Builds the task graph for one run over a workspace provider
pub struct GraphBuilder<'a, P: WorkspaceProvider> {
    arena: &'a mut TaskArena,
    provider: &'a P,
    memo: IndexMap<(String, String), TaskId>,
}

impl<'a, P: WorkspaceProvider> GraphBuilder<'a, P> {
    pub fn new(arena: &'a mut TaskArena, provider: &'a P) -> Self {
        Self {
            arena,
            provider,
            memo: IndexMap::new(),
        }
    }

    /// The arena tasks are being built into
    pub fn arena_mut(&mut self) -> &mut TaskArena {
        self.arena
    }

    /// Resolve `script` in `workspace` to a task, building dependency
    /// tasks first
    ///
    /// A dependency workspace without the build script contributes nothing
    /// (there is simply no build step on that edge); the top-level script
    /// missing is a hard error.
    pub fn resolve(
        &mut self,
        workspace: &str,
        script: &str,
        args: Vec<String>,
        opts: &ResolveOptions,
    ) -> Result<TaskId> {
        if !self.provider.has_workspace(workspace) {
            return Err(Error::configuration(format!(
                "unknown workspace '{workspace}'"
            )));
        }
        let mut stack = Vec::new();
        match self.resolve_inner(workspace, script, args, opts, &mut stack)? {
            Some(id) => Ok(id),
            None => Err(Error::script_not_found(workspace, script)),
        }
    }

    fn resolve_inner(
        &mut self,
        workspace: &str,
        script: &str,
        args: Vec<String>,
        opts: &ResolveOptions,
        stack: &mut Vec<(String, String)>,
    ) -> Result<Option<TaskId>> {
        let key = (workspace.to_string(), script.to_string());
        if let Some(&id) = self.memo.get(&key) {
            debug!(workspace, script, task = %id, "reusing resolved task");
            return Ok(Some(id));
        }
        if stack.contains(&key) {
            return Err(Error::configuration(format!(
                "circular workspace dependency involving '{workspace}:{script}'"
            )));
        }
        let Some(cmd) = self.provider.script(workspace, script) else {
            return Ok(None);
        };

        stack.push(key.clone());
        let mut deps: Vec<TaskId> = Vec::new();
        if opts.deps_mode != DepsMode::None {
            for dep_ws in self.provider.dependencies(workspace, opts.deps_mode) {
                if !self.provider.has_workspace(&dep_ws) {
                    return Err(Error::configuration(format!(
                        "workspace '{workspace}' depends on unknown workspace '{dep_ws}'"
                    )));
                }
                let resolved =
                    self.resolve_inner(&dep_ws, &opts.build_script, Vec::new(), opts, stack)?;
                if let Some(dep_id) = resolved {
                    if !deps.contains(&dep_id) {
                        deps.push(dep_id);
                    }
                }
            }
        }
        stack.pop();

        let mut argv = cmd.args;
        argv.extend(args.iter().cloned());
        let id = self.arena.new_exec(
            ExecSpec {
                command: cmd.command,
                args: argv,
                cwd: cmd.cwd,
            },
            TaskContext::Script {
                workspace: workspace.to_string(),
                script: script.to_string(),
                args,
            },
            deps,
        );
        debug!(workspace, script, task = %id, "resolved task");
        self.memo.insert(key, id);
        Ok(Some(id))
    }
}
