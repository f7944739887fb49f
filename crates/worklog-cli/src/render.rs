use worklog_core::commits::CommitDay;
use worklog_core::format::{format_hours, short_time};
use worklog_core::session::{SessionStatus, SessionSummary, TaskSubmission};
use worklog_core::types::{Project, TaskLog};
use worklog_core::worklogs::{DayTotal, WorklogEntry};

fn project_label(projects: &[Project], project_id: &str) -> String {
    projects
        .iter()
        .find(|project| project.id == project_id)
        .map(|project| project.name.clone())
        .unwrap_or_else(|| project_id.to_string())
}

fn task_line(log: &TaskLog) -> String {
    format!(
        "{} - {} | {} | {}h | {}",
        short_time(log.start_time),
        short_time(log.end_time),
        log.task_type,
        format_hours(log.duration_ms()),
        log.description
    )
}

pub fn project_list(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects".to_string();
    }
    projects
        .iter()
        .map(|project| {
            format!(
                "{} | {} | {} repo(s)",
                project.id,
                project.name,
                project.repositories.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn project_detail(project: &Project) -> String {
    let mut lines = Vec::new();
    lines.push(format!("id: {}", project.id));
    lines.push(format!("name: {}", project.name));
    lines.push("repositories:".to_string());
    for repo in &project.repositories {
        lines.push(format!("- {} ({})", repo.name, repo.url));
    }
    if project.repositories.is_empty() {
        lines.push("- None".to_string());
    }
    lines.join("\n")
}

pub fn session_status(status: &SessionStatus) -> String {
    let (Some(session), Some(project)) = (status.session.as_ref(), status.project.as_ref()) else {
        return "No active session".to_string();
    };
    let mut lines = Vec::new();
    lines.push(format!("Project: {}", project.name));
    lines.push(format!("Started: {}", short_time(session.start_time)));
    lines.push(format!(
        "Elapsed: {}h, logged: {}h",
        format_hours(status.elapsed_ms),
        format_hours(status.logged_ms)
    ));
    if let Some(next) = status.next_start {
        lines.push(format!("Next task starts: {}", short_time(next)));
    }
    lines.push(String::new());
    lines.push("Tasks:".to_string());
    for log in &session.logs {
        lines.push(format!("- {}", task_line(log)));
    }
    if session.logs.is_empty() {
        lines.push("- None".to_string());
    }
    lines.join("\n")
}

pub fn session_summary(summary: &SessionSummary) -> String {
    format!(
        "Session ended, {} hours ({} task(s) archived under {})",
        format_hours(summary.total_ms),
        summary.tasks,
        summary.date
    )
}

pub fn task_submission(submission: &TaskSubmission) -> String {
    let mut lines = vec![format!("Logged: {}", task_line(&submission.log))];
    for uri in &submission.log.github_uris {
        lines.push(format!("  {}", uri));
    }
    if let Some(summary) = submission.ended.as_ref() {
        lines.push(session_summary(summary));
    }
    lines.join("\n")
}

pub fn commit_days(days: &[CommitDay]) -> String {
    if days.is_empty() {
        return "No commits".to_string();
    }
    let mut lines = Vec::new();
    for day in days {
        lines.push(format!("{}:", day.day));
        for commit in &day.commits {
            let short = commit.hash.get(..8).unwrap_or(&commit.hash);
            lines.push(format!("  {} | {} | {}", short, commit.author, commit.message));
        }
    }
    lines.join("\n")
}

pub fn worklog_entries(entries: &[WorklogEntry], projects: &[Project]) -> String {
    if entries.is_empty() {
        return "No worklogs".to_string();
    }
    let mut lines = Vec::new();
    let mut current: Option<(&str, &str)> = None;
    for entry in entries {
        let key = (entry.date.as_str(), entry.project_id.as_str());
        if current != Some(key) {
            lines.push(format!(
                "{} {}",
                entry.date,
                project_label(projects, &entry.project_id)
            ));
            current = Some(key);
        }
        lines.push(format!("- {}", task_line(&entry.log)));
    }
    lines.join("\n")
}

pub fn worklog_summary(days: &[DayTotal], projects: &[Project]) -> String {
    if days.is_empty() {
        return "No worklogs".to_string();
    }
    let mut lines = Vec::new();
    for day in days {
        lines.push(format!("{} | {}h", day.date, format_hours(day.total_ms)));
        for total in &day.projects {
            lines.push(format!(
                "  {} | {} task(s) | {}h",
                project_label(projects, &total.project_id),
                total.tasks,
                format_hours(total.total_ms)
            ));
        }
    }
    lines.join("\n")
}
