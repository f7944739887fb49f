mod render;
mod version;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde_json::json;

use worklog_core::commits::{group_by_day, load_commits, CommitQuery, CommitSelection};
use worklog_core::config::{
    load_config, resolve_commit_limit, resolve_data_dir_with_source, resolve_log_level_with_source,
    resolve_only_my_commits, resolve_worklog_home, WorklogConfig,
};
use worklog_core::format::{now_ms, parse_day, parse_time};
use worklog_core::git::GitCli;
use worklog_core::project::{
    add_repository, find_project, list_projects, remove_repository, rename_repository,
    save_project, ProjectDraft,
};
use worklog_core::session::{
    active_context, discard_session, end_session, session_status, start_session, submit_task,
    TaskDetails,
};
use worklog_core::store::FileStore;
use worklog_core::token::{clear_token, get_token, mask_token, set_token};
use worklog_core::types::{Project, TaskType};
use worklog_core::worklogs::{load_worklogs, select_entries, summarize, WorklogFilter};

#[derive(Parser)]
#[command(
    name = "worklog",
    version = version::FULL,
    about = "Track timed work sessions against local git projects"
)]
struct Cli {
    /// Worklog home (defaults to WORKLOG_HOME, then ~/.worklog)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information
    Version,
    /// Manage the stored API token
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Manage projects and their repositories
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Start, inspect and end the work session
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Log tasks into the active session
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// List recent commits of a project repository, grouped by day
    Commits(CommitsArgs),
    /// Inspect the archive of finished sessions
    Worklogs {
        #[command(subcommand)]
        command: WorklogsCommand,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    Set { value: String },
    Show {
        #[arg(long)]
        reveal: bool,
    },
    Clear,
}

#[derive(Subcommand)]
enum ProjectCommand {
    List,
    Show { project: String },
    Add {
        #[arg(long)]
        name: String,
        /// Repository path (repeatable)
        #[arg(long = "repo", required = true)]
        repos: Vec<String>,
    },
    /// Rename a project and/or replace its repository list
    Edit {
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "repo")]
        repos: Vec<String>,
    },
    AddRepo {
        project: String,
        path: String,
        #[arg(long)]
        name: Option<String>,
    },
    RenameRepo {
        project: String,
        repo: String,
        name: String,
    },
    RemoveRepo { project: String, repo: String },
}

#[derive(Subcommand)]
enum SessionCommand {
    Start { project: String },
    Status,
    /// Archive the session's tasks and close it
    End,
    /// Drop the session without archiving
    Discard,
}

#[derive(Subcommand)]
enum TaskCommand {
    Log(TaskLogArgs),
}

#[derive(Args)]
struct TaskLogArgs {
    #[arg(long = "type", value_parser = parse_task_type)]
    task_type: TaskType,
    #[arg(long, short = 'd')]
    description: String,
    /// Start time (RFC3339, "YYYY-MM-DD HH:MM" or "HH:MM")
    #[arg(long)]
    start: Option<String>,
    /// End time; defaults to now
    #[arg(long)]
    end: Option<String>,
    /// Commit hash or unique prefix to link (repeatable)
    #[arg(long = "commit")]
    commits: Vec<String>,
    /// Repository name or path the commits come from
    #[arg(long)]
    repo: Option<String>,
    /// Only match commits by the configured git user
    #[arg(long)]
    mine: bool,
    /// Close the session after this task
    #[arg(long)]
    end_session: bool,
}

#[derive(Args)]
struct CommitsArgs {
    /// Defaults to the active session's project
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    repo: Option<String>,
    #[arg(long)]
    mine: bool,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Clone)]
struct WorklogFilterArgs {
    #[arg(long, conflicts_with_all = ["from", "to"])]
    date: Option<String>,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    project: Option<String>,
}

#[derive(Subcommand)]
enum WorklogsCommand {
    List(WorklogFilterArgs),
    Summary(WorklogFilterArgs),
}

fn parse_task_type(value: &str) -> Result<TaskType, String> {
    value.parse::<TaskType>()
}

struct App {
    config: WorklogConfig,
    store: FileStore,
    git: GitCli,
    json: bool,
}

impl App {
    fn open(home: Option<&Path>, json: bool) -> Result<Self> {
        let home = resolve_worklog_home(home)?;
        let config = load_config(&home)
            .with_context(|| format!("load config under {}", home.display()))?;
        let (level, _) = resolve_log_level_with_source(&config);
        worklog_core::logging::init(&level);
        let (data_dir, source) = resolve_data_dir_with_source(&home, &config);
        tracing::debug!(
            home = %home.display(),
            data_dir = %data_dir.display(),
            source,
            "opening store"
        );
        let store = FileStore::open(&data_dir)
            .with_context(|| format!("open store at {}", data_dir.display()))?;
        Ok(Self {
            config,
            store,
            git: GitCli::new(),
            json,
        })
    }

    fn emit(&self, value: serde_json::Value, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }

    fn commit_query(&self, mine: bool, limit: Option<usize>) -> CommitQuery {
        CommitQuery {
            limit: limit
                .filter(|limit| *limit > 0)
                .unwrap_or_else(|| resolve_commit_limit(&self.config)),
            only_mine: mine || resolve_only_my_commits(&self.config),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };
    match command {
        Command::Version => {
            println!("worklog {}", version::FULL);
            Ok(())
        }
        command => {
            let app = App::open(cli.home.as_deref(), cli.json)?;
            dispatch(&app, command)
        }
    }
}

fn dispatch(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Version => Ok(()),
        Command::Token { command } => run_token(app, command),
        Command::Project { command } => run_project(app, command),
        Command::Session { command } => run_session(app, command),
        Command::Task {
            command: TaskCommand::Log(args),
        } => run_task_log(app, args),
        Command::Commits(args) => run_commits(app, args),
        Command::Worklogs { command } => run_worklogs(app, command),
    }
}

fn run_token(app: &App, command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Set { value } => {
            set_token(&app.store, &value)?;
            app.emit(json!({ "ok": true }), || "Token saved".to_string())
        }
        TokenCommand::Show { reveal } => {
            let token = get_token(&app.store)?;
            let shown = token
                .as_deref()
                .map(|t| if reveal { t.to_string() } else { mask_token(t) });
            app.emit(json!({ "token": shown }), || {
                shown.clone().unwrap_or_else(|| "No token set".to_string())
            })
        }
        TokenCommand::Clear => {
            let cleared = clear_token(&app.store)?;
            app.emit(json!({ "cleared": cleared }), || {
                if cleared {
                    "Token cleared".to_string()
                } else {
                    "No token set".to_string()
                }
            })
        }
    }
}

fn run_project(app: &App, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::List => {
            let projects = list_projects(&app.store)?;
            app.emit(serde_json::to_value(&projects)?, || {
                render::project_list(&projects)
            })
        }
        ProjectCommand::Show { project } => {
            let project = find_project(&app.store, &project)?;
            app.emit(serde_json::to_value(&project)?, || {
                render::project_detail(&project)
            })
        }
        ProjectCommand::Add { name, repos } => {
            let project = save_project(
                &app.store,
                &app.git,
                &ProjectDraft {
                    id: None,
                    name,
                    repositories: repos,
                },
            )?;
            app.emit(serde_json::to_value(&project)?, || {
                format!("Project saved: {} ({})", project.name, project.id)
            })
        }
        ProjectCommand::Edit {
            project,
            name,
            repos,
        } => {
            let existing = find_project(&app.store, &project)?;
            let repositories = if repos.is_empty() {
                existing
                    .repositories
                    .iter()
                    .map(|repo| repo.url.clone())
                    .collect()
            } else {
                repos
            };
            let project = save_project(
                &app.store,
                &app.git,
                &ProjectDraft {
                    id: Some(existing.id.clone()),
                    name: name.unwrap_or(existing.name),
                    repositories,
                },
            )?;
            app.emit(serde_json::to_value(&project)?, || {
                format!("Project saved: {} ({})", project.name, project.id)
            })
        }
        ProjectCommand::AddRepo {
            project,
            path,
            name,
        } => {
            let project = add_repository(&app.store, &app.git, &project, &path, name.as_deref())?;
            app.emit(serde_json::to_value(&project)?, || {
                render::project_detail(&project)
            })
        }
        ProjectCommand::RenameRepo {
            project,
            repo,
            name,
        } => {
            let project = rename_repository(&app.store, &project, &repo, &name)?;
            app.emit(serde_json::to_value(&project)?, || {
                render::project_detail(&project)
            })
        }
        ProjectCommand::RemoveRepo { project, repo } => {
            let project = remove_repository(&app.store, &project, &repo)?;
            app.emit(serde_json::to_value(&project)?, || {
                render::project_detail(&project)
            })
        }
    }
}

fn run_session(app: &App, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Start { project } => {
            let project = find_project(&app.store, &project)?;
            let session = start_session(&app.store, &project, now_ms())?;
            app.emit(serde_json::to_value(&session)?, || {
                format!(
                    "Session started: {} at {}",
                    project.name,
                    worklog_core::format::short_time(session.start_time)
                )
            })
        }
        SessionCommand::Status => {
            let status = session_status(&app.store, now_ms())?;
            app.emit(serde_json::to_value(&status)?, || {
                render::session_status(&status)
            })
        }
        SessionCommand::End => {
            let summary = end_session(&app.store)?;
            app.emit(serde_json::to_value(&summary)?, || {
                render::session_summary(&summary)
            })
        }
        SessionCommand::Discard => {
            let dropped = discard_session(&app.store)?;
            app.emit(json!({ "discarded": dropped }), || match &dropped {
                Some(session) => format!(
                    "Session discarded ({} task(s) not archived)",
                    session.logs.len()
                ),
                None => "No active session".to_string(),
            })
        }
    }
}

fn parse_time_arg(label: &str, value: Option<&str>) -> Result<Option<i64>> {
    value
        .map(|raw| parse_time(raw).ok_or_else(|| anyhow!("Invalid {} time: {}", label, raw)))
        .transpose()
}

fn pick_repository<'a>(
    project: &'a Project,
    wanted: Option<&str>,
) -> Result<&'a worklog_core::types::LocalRepository> {
    match wanted {
        Some(name) => project.repository(name).ok_or_else(|| {
            anyhow!(
                "Repository {} is not part of project {}",
                name,
                project.name
            )
        }),
        None => project.repositories.first().ok_or_else(|| {
            anyhow!(
                "Project {} has no repositories; add one before selecting commits",
                project.name
            )
        }),
    }
}

fn run_task_log(app: &App, args: TaskLogArgs) -> Result<()> {
    let (_, project) = active_context(&app.store)?;
    let mut details = TaskDetails::new(args.task_type, args.description);
    details.start = parse_time_arg("start", args.start.as_deref())?;
    details.end = parse_time_arg("end", args.end.as_deref())?;

    if args.task_type.requires_commits() && !args.commits.is_empty() {
        let repo = pick_repository(&project, args.repo.as_deref())?;
        let commits = load_commits(
            &app.git,
            Path::new(&repo.url),
            &app.commit_query(args.mine, None),
        )
        .with_context(|| format!("list commits in {}", repo.name))?;
        let mut selection = CommitSelection::new(commits);
        for hash in &args.commits {
            selection.select(hash)?;
        }
        details.github_uris = selection.urls();
    }

    let submission = submit_task(&app.store, &details, args.end_session, now_ms())?;
    app.emit(serde_json::to_value(&submission)?, || {
        render::task_submission(&submission)
    })
}

fn run_commits(app: &App, args: CommitsArgs) -> Result<()> {
    let project = match args.project.as_deref() {
        Some(project) => find_project(&app.store, project)?,
        None => active_context(&app.store)
            .map(|(_, project)| project)
            .context("no --project given and no active session")?,
    };
    let repo = pick_repository(&project, args.repo.as_deref())?;
    let commits = load_commits(
        &app.git,
        Path::new(&repo.url),
        &app.commit_query(args.mine, args.limit),
    )
    .with_context(|| format!("list commits in {}", repo.name))?;
    let days = group_by_day(&commits);
    app.emit(serde_json::to_value(&days)?, || render::commit_days(&days))
}

fn parse_day_arg(label: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|raw| {
            parse_day(raw).ok_or_else(|| {
                anyhow!("Invalid --{} date: {} (expected YYYY-MM-DD)", label, raw)
            })
        })
        .transpose()
}

fn build_filter(app: &App, args: &WorklogFilterArgs) -> Result<WorklogFilter> {
    let mut filter = match parse_day_arg("date", args.date.as_deref())? {
        Some(day) => WorklogFilter::day(day),
        None => WorklogFilter {
            from: parse_day_arg("from", args.from.as_deref())?,
            to: parse_day_arg("to", args.to.as_deref())?,
            project_id: None,
        },
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            bail!("--from {} is after --to {}", from, to);
        }
    }
    filter.project_id = match args.project.as_deref() {
        Some(project) => Some(
            find_project(&app.store, project)
                .map(|p| p.id)
                .unwrap_or_else(|_| project.trim().to_string()),
        ),
        None => None,
    };
    Ok(filter)
}

fn run_worklogs(app: &App, command: WorklogsCommand) -> Result<()> {
    let worklogs = load_worklogs(&app.store)?;
    let projects = list_projects(&app.store)?;
    match command {
        WorklogsCommand::List(args) => {
            let filter = build_filter(app, &args)?;
            let entries = select_entries(&worklogs, &filter);
            app.emit(serde_json::to_value(&entries)?, || {
                render::worklog_entries(&entries, &projects)
            })
        }
        WorklogsCommand::Summary(args) => {
            let filter = build_filter(app, &args)?;
            let days = summarize(&worklogs, &filter);
            app.emit(serde_json::to_value(&days)?, || {
                render::worklog_summary(&days, &projects)
            })
        }
    }
}
