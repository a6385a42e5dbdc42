//! JSON workspace manifest
//!
//! The composition-point implementation of [`WorkspaceProvider`]: a single
//! `convoy.json` declaring workspaces, their scripts as shell-quoted
//! command lines, and their dependency edges. Command lines are split once
//! at load time; validation happens here so the graph builder can assume a
//! well-formed workspace set.

use std::path::Path;

use convoy_core::{Error, Result, ResultExt};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::provider::{StaticProvider, WorkspaceEntry};

/// Root of a `convoy.json` manifest
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub workspaces: Vec<ManifestWorkspace>,
}

/// One workspace declaration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkspace {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub scripts: IndexMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dev_dependencies: Vec<String>,
}

impl Manifest {
    /// Load and validate a manifest file; workspace paths resolve relative
    /// to the manifest's directory
    pub fn load(path: &Path) -> Result<StaticProvider> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read", e))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("invalid manifest '{}'", path.display()))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.into_provider(root)
    }

    /// Validate the declarations and build the provider
    pub fn into_provider(self, root: &Path) -> Result<StaticProvider> {
        let mut provider = StaticProvider::new();

        for ws in &self.workspaces {
            if provider.get(&ws.name).is_some() {
                return Err(Error::configuration(format!(
                    "duplicate workspace '{}'",
                    ws.name
                )));
            }
            let mut entry = WorkspaceEntry::new(root.join(&ws.path));
            for (script, line) in &ws.scripts {
                let argv = shell_words::split(line).map_err(|e| {
                    Error::configuration(format!(
                        "script '{script}' in workspace '{}' has an invalid command line: {e}",
                        ws.name
                    ))
                })?;
                if argv.is_empty() {
                    return Err(Error::configuration(format!(
                        "script '{script}' in workspace '{}' is empty",
                        ws.name
                    )));
                }
                entry.scripts.insert(script.clone(), argv);
            }
            entry.dependencies = ws.dependencies.clone();
            entry.dev_dependencies = ws.dev_dependencies.clone();
            provider.add(ws.name.clone(), entry);
        }

        // Dependency edges must point at declared workspaces
        for ws in &self.workspaces {
            for dep in ws.dependencies.iter().chain(&ws.dev_dependencies) {
                if provider.get(dep).is_none() {
                    return Err(Error::configuration(format!(
                        "workspace '{}' depends on undeclared workspace '{dep}'",
                        ws.name
                    )));
                }
            }
        }

        debug!(workspaces = provider.len(), "manifest loaded");
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DepsMode, WorkspaceProvider};
    use std::path::PathBuf;

    const MANIFEST: &str = r#"{
        "workspaces": [
            {
                "name": "web",
                "path": "pkgs/web",
                "scripts": {
                    "build": "tsc --build",
                    "test": "vitest run --silent"
                },
                "dependencies": ["lib"],
                "devDependencies": ["testkit"]
            },
            { "name": "lib", "path": "pkgs/lib", "scripts": { "build": "tsc" } },
            { "name": "testkit", "path": "pkgs/testkit" }
        ]
    }"#;

    fn provider() -> StaticProvider {
        let manifest: Manifest = serde_json::from_str(MANIFEST).unwrap();
        manifest.into_provider(Path::new("/repo")).unwrap()
    }

    #[test]
    fn test_scripts_split_per_shell_quoting() {
        let p = provider();
        let cmd = p.script("web", "test").unwrap();
        assert_eq!(cmd.command, "vitest");
        assert_eq!(cmd.args, vec!["run", "--silent"]);
        assert_eq!(cmd.cwd, PathBuf::from("/repo/pkgs/web"));
    }

    #[test]
    fn test_dependency_kinds_survive_loading() {
        let p = provider();
        assert_eq!(p.dependencies("web", DepsMode::Prod), vec!["lib"]);
        assert_eq!(p.dependencies("web", DepsMode::All), vec!["lib", "testkit"]);
    }

    #[test]
    fn test_undeclared_dependency_is_rejected() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "workspaces": [
                { "name": "a", "path": "a", "dependencies": ["ghost"] }
            ] }"#,
        )
        .unwrap();
        let err = manifest.into_provider(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("undeclared workspace 'ghost'"));
    }

    #[test]
    fn test_duplicate_workspace_is_rejected() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "workspaces": [
                { "name": "a", "path": "a" },
                { "name": "a", "path": "b" }
            ] }"#,
        )
        .unwrap();
        let err = manifest.into_provider(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("duplicate workspace 'a'"));
    }

    #[test]
    fn test_empty_script_is_rejected() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "workspaces": [
                { "name": "a", "path": "a", "scripts": { "build": "  " } }
            ] }"#,
        )
        .unwrap();
        let err = manifest.into_provider(Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("convoy.json")).unwrap_err();
        assert!(err.to_string().contains("read"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convoy.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let p = Manifest::load(&path).unwrap();
        assert_eq!(p.len(), 3);
        let cmd = p.script("lib", "build").unwrap();
        assert_eq!(cmd.cwd, dir.path().join("pkgs/lib"));
    }
}
