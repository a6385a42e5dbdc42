use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use convoy_core::EventBus;
use convoy_task::{ProcessSpawner, Runner, TaskArena, TaskId, TaskManager, TaskSet};
use convoy_workspace::{
    build_task, DepsMode, GraphBuilder, Manifest, Plan, ResolveOptions, StaticProvider,
    WorkspaceProvider,
};
use tracing_subscriber::EnvFilter;

mod console;

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Run scripts across a workspace graph", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the workspace manifest
    #[arg(long, global = true, default_value = "convoy.json")]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a script or task expression and execute it
    Run(RunArgs),
    /// Print the resolved task graph without executing anything
    Plan(PlanArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Script name or task expression, e.g. "build -> test // lint"
    expression: String,

    /// Workspace the expression resolves in (optional when the manifest
    /// declares exactly one)
    #[arg(long, short)]
    workspace: Option<String>,

    /// Maximum number of concurrently running tasks (0 = unbounded)
    #[arg(long, short, default_value_t = 0)]
    jobs: usize,

    /// Dependency kinds built before their dependents: all, prod, none
    #[arg(long, default_value = "all")]
    deps: DepsMode,

    /// Script resolved in dependency workspaces
    #[arg(long, default_value = "build")]
    build_script: String,

    /// Also report task start events
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Args)]
struct PlanArgs {
    /// Script name or task expression
    expression: String,

    #[arg(long, short)]
    workspace: Option<String>,

    #[arg(long, default_value = "all")]
    deps: DepsMode,

    #[arg(long, default_value = "build")]
    build_script: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("convoy: {e}");
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> eyre::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => run(&cli.manifest, args).await,
        Commands::Plan(args) => plan(&cli.manifest, &args),
    }
}

async fn run(manifest: &PathBuf, args: RunArgs) -> eyre::Result<ExitCode> {
    let provider = Manifest::load(manifest)?;
    let workspace = select_workspace(&provider, args.workspace)?;
    let opts = ResolveOptions {
        build_script: args.build_script,
        deps_mode: args.deps,
    };

    let mut arena = TaskArena::new();
    let targets = resolve_targets(&mut arena, &provider, &args.expression, &workspace, &opts)?;

    let mut manager = TaskManager::new(args.jobs);
    let mut set = TaskSet::new();
    for &target in &targets {
        set.add(&mut manager, &mut arena, target)?;
    }

    let bus = EventBus::default();
    let reporter = tokio::spawn(console::report(bus.subscribe(), args.verbose));

    let runner = Runner::new(
        arena,
        manager,
        set,
        bus.clone(),
        Arc::new(ProcessSpawner::new()),
    );
    let tally = runner.run().await?;

    // Dropping the last sender lets the reporter drain and stop
    drop(bus);
    let _ = reporter.await;

    Ok(if tally.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn plan(manifest: &PathBuf, args: &PlanArgs) -> eyre::Result<ExitCode> {
    let provider = Manifest::load(manifest)?;
    let workspace = select_workspace(&provider, args.workspace.clone())?;
    let opts = ResolveOptions {
        build_script: args.build_script.clone(),
        deps_mode: args.deps,
    };

    let mut arena = TaskArena::new();
    let targets = resolve_targets(&mut arena, &provider, &args.expression, &workspace, &opts)?;

    println!("{}", Plan::from_targets(&arena, &targets).to_json());
    Ok(ExitCode::SUCCESS)
}

/// Resolve every top-level expression root into a target task
fn resolve_targets(
    arena: &mut TaskArena,
    provider: &StaticProvider,
    expression: &str,
    workspace: &str,
    opts: &ResolveOptions,
) -> eyre::Result<Vec<TaskId>> {
    let roots = convoy_expr::parse(expression)?;
    if roots.is_empty() {
        eyre::bail!("empty task expression");
    }
    let mut builder = GraphBuilder::new(arena, provider);
    let mut targets = Vec::with_capacity(roots.len());
    for root in &roots {
        targets.push(build_task(&mut builder, root, workspace, opts)?);
    }
    Ok(targets)
}

fn select_workspace(
    provider: &StaticProvider,
    requested: Option<String>,
) -> eyre::Result<String> {
    if let Some(name) = requested {
        if !provider.has_workspace(&name) {
            eyre::bail!("unknown workspace '{name}'");
        }
        return Ok(name);
    }
    let all = provider.workspaces();
    match all.as_slice() {
        [only] => Ok(only.clone()),
        _ => eyre::bail!("--workspace is required when the manifest declares several workspaces"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_workspace::WorkspaceEntry;

    fn provider() -> StaticProvider {
        let mut p = StaticProvider::new();
        p.add("solo", WorkspaceEntry::new("solo").script("build", &["make"]));
        p
    }

    #[test]
    fn test_single_workspace_is_the_default() {
        let p = provider();
        assert_eq!(select_workspace(&p, None).unwrap(), "solo");
        assert_eq!(
            select_workspace(&p, Some("solo".to_string())).unwrap(),
            "solo"
        );
        assert!(select_workspace(&p, Some("ghost".to_string())).is_err());
    }

    #[test]
    fn test_multiple_workspaces_require_a_choice() {
        let mut p = provider();
        p.add("second", WorkspaceEntry::new("second"));
        assert!(select_workspace(&p, None).is_err());
    }

    #[test]
    fn test_resolve_targets_accepts_plain_script_names() {
        let p = provider();
        let mut arena = TaskArena::new();
        let targets =
            resolve_targets(&mut arena, &p, "build", "solo", &ResolveOptions::default()).unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_resolve_targets_rejects_empty_expressions() {
        let p = provider();
        let mut arena = TaskArena::new();
        assert!(
            resolve_targets(&mut arena, &p, "  ", "solo", &ResolveOptions::default()).is_err()
        );
    }
}
