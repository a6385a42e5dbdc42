//! Workspace provider interface
//!
//! The graph builder only ever asks two questions: "what command does
//! script S run in workspace W" and "which workspaces does W depend on".
//! Anything that can answer them can drive a run; [`StaticProvider`] is the
//! in-memory answer backing both the JSON manifest and the tests.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use convoy_core::Error;
use indexmap::IndexMap;

/// Which dependency kinds are walked when building a run's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepsMode {
    /// Runtime and dev dependencies
    #[default]
    All,
    /// Runtime dependencies only
    Prod,
    /// No recursive build step at all
    None,
}

impl DepsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DepsMode::All => "all",
            DepsMode::Prod => "prod",
            DepsMode::None => "none",
        }
    }
}

impl fmt::Display for DepsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DepsMode::All),
            "prod" => Ok(DepsMode::Prod),
            "none" => Ok(DepsMode::None),
            other => Err(Error::configuration(format!(
                "unknown deps mode '{other}' (expected all, prod, or none)"
            ))),
        }
    }
}

/// The literal invocation a script resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Answers workspace-layout questions for the graph builder
pub trait WorkspaceProvider {
    /// Whether a workspace with this name exists
    fn has_workspace(&self, name: &str) -> bool;

    /// All workspace names, in declaration order
    fn workspaces(&self) -> Vec<String>;

    /// The command `script` runs in `workspace`, or `None` if the
    /// workspace has no such script
    fn script(&self, workspace: &str, script: &str) -> Option<ScriptCommand>;

    /// Names of `workspace`'s dependency workspaces under `mode`
    fn dependencies(&self, workspace: &str, mode: DepsMode) -> Vec<String>;
}

/// One workspace's declaration
#[derive(Debug, Clone, Default)]
pub struct WorkspaceEntry {
    /// Directory the workspace's scripts run in
    pub path: PathBuf,
    /// Script name to argv
    pub scripts: IndexMap<String, Vec<String>>,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

impl WorkspaceEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Declare a script as an argv
    pub fn script(mut self, name: &str, argv: &[&str]) -> Self {
        self.scripts
            .insert(name.to_string(), argv.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Declare a runtime dependency workspace
    pub fn dep(mut self, name: &str) -> Self {
        self.dependencies.push(name.to_string());
        self
    }

    /// Declare a dev dependency workspace
    pub fn dev_dep(mut self, name: &str) -> Self {
        self.dev_dependencies.push(name.to_string());
        self
    }
}

/// In-memory workspace set
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    workspaces: IndexMap<String, WorkspaceEntry>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a workspace
    pub fn add(&mut self, name: impl Into<String>, entry: WorkspaceEntry) -> &mut Self {
        self.workspaces.insert(name.into(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.workspaces.get(name)
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}

impl WorkspaceProvider for StaticProvider {
    fn has_workspace(&self, name: &str) -> bool {
        self.workspaces.contains_key(name)
    }

    fn workspaces(&self) -> Vec<String> {
        self.workspaces.keys().cloned().collect()
    }

    fn script(&self, workspace: &str, script: &str) -> Option<ScriptCommand> {
        let entry = self.workspaces.get(workspace)?;
        let argv = entry.scripts.get(script)?;
        let (command, args) = argv.split_first()?;
        Some(ScriptCommand {
            command: command.clone(),
            args: args.to_vec(),
            cwd: entry.path.clone(),
        })
    }

    fn dependencies(&self, workspace: &str, mode: DepsMode) -> Vec<String> {
        let Some(entry) = self.workspaces.get(workspace) else {
            return Vec::new();
        };
        match mode {
            DepsMode::All => entry
                .dependencies
                .iter()
                .chain(&entry.dev_dependencies)
                .cloned()
                .collect(),
            DepsMode::Prod => entry.dependencies.clone(),
            DepsMode::None => Vec::new(),
        }
    }
}
