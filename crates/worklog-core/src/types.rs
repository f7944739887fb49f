use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Store key for the opaque API token.
pub const TOKEN_KEY: &str = "token";
/// Store key for the list of projects.
pub const PROJECTS_KEY: &str = "projects";
/// Store key for the single active session.
pub const ACTIVE_SESSION_KEY: &str = "activeSession";
/// Store key for the worklog archive.
pub const WORKLOGS_KEY: &str = "worklogs";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalRepository {
    pub name: String,
    /// Local filesystem path of the working tree.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub repositories: Vec<LocalRepository>,
}

impl Project {
    pub fn repository(&self, name_or_path: &str) -> Option<&LocalRepository> {
        let needle = name_or_path.trim();
        self.repositories
            .iter()
            .find(|repo| repo.url == needle)
            .or_else(|| {
                self.repositories
                    .iter()
                    .find(|repo| repo.name.eq_ignore_ascii_case(needle))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskType {
    #[serde(rename = "Task")]
    Task,
    #[serde(rename = "Bug Fix")]
    BugFix,
    #[serde(rename = "Change Request")]
    ChangeRequest,
    #[serde(rename = "Call")]
    Call,
    #[serde(rename = "QA")]
    Qa,
    #[serde(rename = "Administrative")]
    Administrative,
    #[serde(rename = "Other")]
    Other,
}

impl TaskType {
    pub const ALL: [TaskType; 7] = [
        TaskType::Task,
        TaskType::BugFix,
        TaskType::ChangeRequest,
        TaskType::Call,
        TaskType::Qa,
        TaskType::Administrative,
        TaskType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskType::Task => "Task",
            TaskType::BugFix => "Bug Fix",
            TaskType::ChangeRequest => "Change Request",
            TaskType::Call => "Call",
            TaskType::Qa => "QA",
            TaskType::Administrative => "Administrative",
            TaskType::Other => "Other",
        }
    }

    /// Code work types must link at least one commit.
    pub fn requires_commits(self) -> bool {
        matches!(
            self,
            TaskType::Task | TaskType::BugFix | TaskType::ChangeRequest
        )
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskType {
    type Err = String;

    /// Accepts the display label or a compact form ("bugfix", "bug-fix", "cr").
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let parsed = match key.as_str() {
            "task" => TaskType::Task,
            "bugfix" | "bug" | "fix" => TaskType::BugFix,
            "changerequest" | "cr" => TaskType::ChangeRequest,
            "call" => TaskType::Call,
            "qa" => TaskType::Qa,
            "administrative" | "admin" => TaskType::Administrative,
            "other" => TaskType::Other,
            _ => return Err(format!("Invalid task type: {}", value.trim())),
        };
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskLog {
    pub project_id: String,
    pub description: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds.
    pub end_time: i64,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub github_uris: Vec<String>,
}

impl TaskLog {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub project_id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    #[serde(default)]
    pub logs: Vec<TaskLog>,
}

impl ActiveSession {
    /// Where the next task starts when no explicit start is given.
    pub fn next_task_start(&self) -> i64 {
        self.logs
            .last()
            .map(|log| log.end_time)
            .unwrap_or(self.start_time)
    }
}

/// `date (YYYY-MM-DD) -> project id -> logs`, ordered by key.
pub type WorkLogs = BTreeMap<String, BTreeMap<String, Vec<TaskLog>>>;
