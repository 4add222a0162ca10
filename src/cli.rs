//! Command-line surface: flag parsing and the handlers behind each flag.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::clients::kanboard::{KanboardClient, KanboardConnector};
use crate::clients::taskwarrior::TaskwarriorClient;
use crate::clients::Connection;
use crate::config::{self, AppConfig};
use crate::model::project::ProjectSyncConfig;
use crate::store::Store;
use crate::sync::{self, daemon, purge, ProjectOutcome, SyncOptions};
use crate::wizard;

/// Two-way sync between Kanboard projects and Taskwarrior.
#[derive(Parser, Debug)]
#[command(name = "tasksync")]
#[command(version)]
#[command(about = "Sync Kanboard projects with Taskwarrior")]
pub struct Cli {
    /// Project to act on (required by --config, --remove, --purge)
    pub project: Option<String>,

    /// Link a project interactively
    #[arg(short, long)]
    pub config: bool,

    /// Sync all projects, or only PROJECT
    #[arg(short, long)]
    pub sync: bool,

    /// With --sync, keep syncing every SECONDS (default from config, 3600)
    #[arg(short, long, value_name = "SECONDS", num_args = 0..=1)]
    pub daemonize: Option<Option<u64>>,

    /// Dry run: log what would change without changing anything
    #[arg(short, long)]
    pub test: bool,

    /// Unlink a project (tasks are kept on both sides)
    #[arg(short, long)]
    pub remove: bool,

    /// Finish deletions made on only one side
    #[arg(short, long)]
    pub purge: bool,

    /// List linked projects
    #[arg(short, long)]
    pub list: bool,

    /// Database file (overrides the config file)
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    List,
    Remove(String),
    Purge(String),
    Configure(String),
    Sync {
        project: Option<String>,
        every: Option<Option<u64>>,
    },
    Help,
}

impl Cli {
    /// Every requested action, in the order they run: list, remove, purge,
    /// configure, sync. `tasksync Work -c -s` links the project, then syncs it.
    pub fn actions(&self) -> Result<Vec<Action>> {
        let named = |flag: &str| -> Result<String> {
            match &self.project {
                Some(name) => Ok(name.clone()),
                None => bail!("{flag} needs a project name, e.g. `tasksync MyProject {flag}`"),
            }
        };
        if self.daemonize.is_some() && !self.sync {
            bail!("--daemonize only applies to a sync, e.g. `tasksync --sync --daemonize`");
        }

        let mut actions = Vec::new();
        if self.list {
            actions.push(Action::List);
        }
        if self.remove {
            actions.push(Action::Remove(named("--remove")?));
        }
        if self.purge {
            actions.push(Action::Purge(named("--purge")?));
        }
        if self.config {
            actions.push(Action::Configure(named("--config")?));
        }
        if self.sync {
            actions.push(Action::Sync {
                project: self.project.clone(),
                every: self.daemonize,
            });
        }
        if actions.is_empty() {
            actions.push(Action::Help);
        }
        Ok(actions)
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let actions = cli.actions()?;
    if actions == [Action::Help] {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config()?;
    let db_path = config.database_path(cli.db_path.as_deref());
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let taskwarrior = TaskwarriorClient::new(&config.local);

    let mut code = ExitCode::SUCCESS;
    for action in actions {
        match action {
            Action::List => handle_list(&store)?,
            Action::Remove(name) => handle_remove(&store, &name)?,
            Action::Configure(name) => {
                wizard::configure_project(&store, &name, &config.remote, &taskwarrior).await?
            }
            Action::Purge(name) => {
                handle_purge(&store, &config, &taskwarrior, &name, cli.test).await?
            }
            Action::Sync { project, every } => {
                code = handle_sync(&store, &config, &taskwarrior, project.as_deref(), every, cli.test)
                    .await?;
            }
            Action::Help => {}
        }
    }
    Ok(code)
}

fn handle_list(store: &Store) -> Result<()> {
    let projects = store.list_projects()?;
    if projects.is_empty() {
        println!("No projects linked yet. Run `tasksync <PROJECT> --config`.");
        return Ok(());
    }
    for project in &projects {
        print!("{}", describe_project(project));
    }
    Ok(())
}

pub fn describe_project(project: &ProjectSyncConfig) -> String {
    let mut out = format!(
        "{} -> {} (board project {})\n  last sync: {}\n",
        project.name,
        project.url,
        project.project_id,
        project.last_sync.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(assignee) = &project.assignee {
        out.push_str(&format!("  assignee: {}\n", assignee.name));
    }
    if project.run_ledger_sync {
        out.push_str("  runs `task sync` first\n");
    }
    for (tag, column) in project.mapping.columns.iter() {
        out.push_str(&format!("  column {tag} = {}\n", column.name));
    }
    for (alias, lane) in project.mapping.swimlanes.iter() {
        out.push_str(&format!("  swimlane {alias} = {}\n", lane.name));
    }
    for (alias, category) in project.mapping.categories.iter() {
        out.push_str(&format!("  category {alias} = {}\n", category.name));
    }
    out
}

fn handle_remove(store: &Store, name: &str) -> Result<()> {
    if !store.remove_project(name)? {
        bail!("Project {name} is not linked");
    }
    println!("Unlinked {name}. No tasks were deleted.");
    Ok(())
}

async fn handle_purge(
    store: &Store,
    config: &AppConfig,
    taskwarrior: &TaskwarriorClient,
    name: &str,
    dry_run: bool,
) -> Result<()> {
    let Some(project) = store.project(name)? else {
        bail!("Project {name} is not linked");
    };
    let remote = match KanboardClient::connect(&project.url, &project.user, &project.apitoken, &config.remote).await {
        Connection::Connected(remote) => remote,
        Connection::Unavailable(reason) => bail!("Kanboard for {name} is unreachable: {reason}"),
    };
    let report = purge::purge_project(store, &project, remote.as_ref(), taskwarrior, dry_run).await?;
    println!(
        "{name}: removed {} board task(s), deleted {} local task(s), dropped {} link(s)",
        report.remote_deleted, report.local_deleted, report.bookmarks_removed
    );
    Ok(())
}

async fn handle_sync(
    store: &Store,
    config: &AppConfig,
    taskwarrior: &TaskwarriorClient,
    project: Option<&str>,
    every: Option<Option<u64>>,
    dry_run: bool,
) -> Result<ExitCode> {
    let connector = KanboardConnector::new(config.remote.clone());
    let opts = SyncOptions { dry_run };

    if let Some(every) = every {
        let interval = Duration::from_secs(every.unwrap_or(config.daemon.interval_secs));
        daemon::run_daemon(
            store,
            &connector,
            taskwarrior,
            project,
            opts,
            interval,
            config.daemon.max_failures,
        )
        .await?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = sync::sync_projects(store, &connector, taskwarrior, project, opts).await?;
    for (name, outcome) in &report.projects {
        match outcome {
            ProjectOutcome::Synced { pairs } => println!("{name}: {pairs} task(s) synced"),
            ProjectOutcome::Skipped { reason } => println!("{name}: skipped ({reason})"),
            ProjectOutcome::Failed { error } => eprintln!("{name}: failed: {error}"),
        }
    }
    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
