//! The single active work session and its transitions.
//!
//! The session lives under the `activeSession` key. Its presence means
//! [`SessionState::Active`]; every mutating entry point loads the state and
//! checks the transition guard before touching the store.

use serde::Serialize;
use thiserror::Error;

use crate::format::day_key;
use crate::project::{list_projects, ProjectError};
use crate::store::{save_json, KvStore, StoreError};
use crate::types::{
    ActiveSession, Project, TaskLog, TaskType, ACTIVE_SESSION_KEY, WORKLOGS_KEY,
};
use crate::worklogs::{append_to_archive, WorklogError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Worklog(#[from] WorklogError),
    #[error("Session already active for project {project_id}; end it before starting a new one")]
    AlreadyActive { project_id: String },
    #[error("No active session")]
    NotActive,
    #[error("Invalid active session; the record was cleared")]
    Corrupt,
    #[error("Project not found for active session: {0}; the session was cleared")]
    ProjectNotFound(String),
    #[error("Description is required")]
    MissingDescription,
    #[error("No commits selected: select at least one commit before saving the worklog")]
    NoCommitsSelected,
    #[error("Task start ({start}) is after its end ({end})")]
    InvalidRange { start: i64, end: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active(ActiveSession),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    /// Idle -> Active.
    pub fn start(&self, project_id: &str, now: i64) -> Result<ActiveSession, SessionError> {
        match self {
            SessionState::Active(session) => Err(SessionError::AlreadyActive {
                project_id: session.project_id.clone(),
            }),
            SessionState::Idle => Ok(ActiveSession {
                project_id: project_id.to_string(),
                start_time: now,
                logs: Vec::new(),
            }),
        }
    }

    pub fn into_active(self) -> Result<ActiveSession, SessionError> {
        match self {
            SessionState::Active(session) => Ok(session),
            SessionState::Idle => Err(SessionError::NotActive),
        }
    }
}

/// What the user entered for one task.
#[derive(Debug, Clone)]
pub struct TaskDetails {
    pub task_type: TaskType,
    pub description: String,
    /// Epoch ms; defaults to the previous task's end (or the session start).
    pub start: Option<i64>,
    /// Epoch ms; defaults to now.
    pub end: Option<i64>,
    pub github_uris: Vec<String>,
}

impl TaskDetails {
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            task_type,
            description: description.into(),
            start: None,
            end: None,
            github_uris: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.description.trim().is_empty() {
            return Err(SessionError::MissingDescription);
        }
        if self.task_type.requires_commits()
            && self.github_uris.iter().all(|uri| uri.trim().is_empty())
        {
            return Err(SessionError::NoCommitsSelected);
        }
        Ok(())
    }
}

/// Builds the next log entry for `session` without mutating anything.
pub fn build_task_log(
    session: &ActiveSession,
    details: &TaskDetails,
    now: i64,
) -> Result<TaskLog, SessionError> {
    details.validate()?;
    let start = details.start.unwrap_or_else(|| session.next_task_start());
    let end = details.end.unwrap_or(now);
    if start > end {
        return Err(SessionError::InvalidRange { start, end });
    }
    let github_uris = if details.task_type.requires_commits() {
        let mut uris: Vec<String> = Vec::new();
        for uri in &details.github_uris {
            let uri = uri.trim();
            if !uri.is_empty() && !uris.iter().any(|u| u == uri) {
                uris.push(uri.to_string());
            }
        }
        uris
    } else {
        Vec::new()
    };
    Ok(TaskLog {
        project_id: session.project_id.clone(),
        description: details.description.trim().to_string(),
        start_time: start,
        end_time: end,
        task_type: details.task_type,
        github_uris,
    })
}

/// Reads the session slot. An unreadable record is removed.
pub fn load_state(store: &dyn KvStore) -> Result<SessionState, SessionError> {
    let Some(raw) = store.get(ACTIVE_SESSION_KEY)? else {
        return Ok(SessionState::Idle);
    };
    match serde_json::from_str::<ActiveSession>(&raw) {
        Ok(session) => Ok(SessionState::Active(session)),
        Err(err) => {
            tracing::warn!(error = %err, "clearing unreadable active session");
            store.remove(ACTIVE_SESSION_KEY)?;
            Err(SessionError::Corrupt)
        }
    }
}

/// The active session together with its project.
///
/// A session pointing at a project that no longer exists is cleared.
pub fn active_context(store: &dyn KvStore) -> Result<(ActiveSession, Project), SessionError> {
    let session = load_state(store)?.into_active()?;
    let project = list_projects(store)?
        .into_iter()
        .find(|project| project.id == session.project_id);
    match project {
        Some(project) => Ok((session, project)),
        None => {
            tracing::warn!(
                project_id = %session.project_id,
                "clearing session for unknown project"
            );
            store.remove(ACTIVE_SESSION_KEY)?;
            Err(SessionError::ProjectNotFound(session.project_id))
        }
    }
}

pub fn start_session(
    store: &dyn KvStore,
    project: &Project,
    now: i64,
) -> Result<ActiveSession, SessionError> {
    let _lock = store.lock()?;
    let session = load_state(store)?.start(&project.id, now)?;
    save_json(store, ACTIVE_SESSION_KEY, &session)?;
    tracing::info!(project_id = %project.id, start = now, "session started");
    Ok(session)
}

/// Appends one task to the active session.
pub fn append_task(
    store: &dyn KvStore,
    details: &TaskDetails,
    now: i64,
) -> Result<TaskLog, SessionError> {
    let _lock = store.lock()?;
    let mut session = load_state(store)?.into_active()?;
    let log = build_task_log(&session, details, now)?;
    session.logs.push(log.clone());
    save_json(store, ACTIVE_SESSION_KEY, &session)?;
    tracing::info!(
        project_id = %session.project_id,
        task_type = %log.task_type,
        count = session.logs.len(),
        "task appended"
    );
    Ok(log)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub project_id: String,
    /// Archive bucket the logs went to.
    pub date: String,
    pub tasks: usize,
    pub total_ms: i64,
}

/// Archives the session, then clears it. If clearing fails the archive is
/// put back the way it was, so a retried end archives the logs only once.
fn close_session(
    store: &dyn KvStore,
    session: ActiveSession,
) -> Result<SessionSummary, SessionError> {
    let date = day_key(session.start_time);
    let previous = store.get(WORKLOGS_KEY)?;
    append_to_archive(store, &date, &session.project_id, &session.logs)?;
    if let Err(err) = store.remove(ACTIVE_SESSION_KEY) {
        tracing::warn!(error = %err, "restoring archive after failed session clear");
        match previous {
            Some(raw) => store.set(WORKLOGS_KEY, &raw)?,
            None => store.remove(WORKLOGS_KEY)?,
        }
        return Err(err.into());
    }
    let summary = SessionSummary {
        project_id: session.project_id,
        date,
        tasks: session.logs.len(),
        total_ms: session.logs.iter().map(TaskLog::duration_ms).sum(),
    };
    tracing::info!(
        project_id = %summary.project_id,
        date = %summary.date,
        tasks = summary.tasks,
        "session ended"
    );
    Ok(summary)
}

/// Active -> Idle: archives the session's logs under its start date.
pub fn end_session(store: &dyn KvStore) -> Result<SessionSummary, SessionError> {
    let _lock = store.lock()?;
    let session = load_state(store)?.into_active()?;
    close_session(store, session)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSubmission {
    pub log: TaskLog,
    pub duration_ms: i64,
    /// Present when the submission also closed the session.
    pub ended: Option<SessionSummary>,
}

/// Logs a task and optionally closes the session in the same step.
pub fn submit_task(
    store: &dyn KvStore,
    details: &TaskDetails,
    end: bool,
    now: i64,
) -> Result<TaskSubmission, SessionError> {
    let _lock = store.lock()?;
    let (mut session, _project) = active_context(store)?;
    let log = build_task_log(&session, details, now)?;
    session.logs.push(log.clone());
    let ended = if end {
        Some(close_session(store, session)?)
    } else {
        save_json(store, ACTIVE_SESSION_KEY, &session)?;
        None
    };
    Ok(TaskSubmission {
        duration_ms: log.duration_ms(),
        log,
        ended,
    })
}

/// Drops the active session without archiving it.
pub fn discard_session(store: &dyn KvStore) -> Result<Option<ActiveSession>, SessionError> {
    let _lock = store.lock()?;
    let session = match load_state(store) {
        Ok(SessionState::Active(session)) => session,
        Ok(SessionState::Idle) | Err(SessionError::Corrupt) => return Ok(None),
        Err(err) => return Err(err),
    };
    store.remove(ACTIVE_SESSION_KEY)?;
    tracing::info!(project_id = %session.project_id, "session discarded");
    Ok(Some(session))
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    pub session: Option<ActiveSession>,
    pub project: Option<Project>,
    pub elapsed_ms: i64,
    pub logged_ms: i64,
    /// Where the next task would start.
    pub next_start: Option<i64>,
}

pub fn session_status(store: &dyn KvStore, now: i64) -> Result<SessionStatus, SessionError> {
    let (session, project) = match active_context(store) {
        Ok(context) => context,
        Err(SessionError::NotActive) => {
            return Ok(SessionStatus {
                active: false,
                session: None,
                project: None,
                elapsed_ms: 0,
                logged_ms: 0,
                next_start: None,
            })
        }
        Err(err) => return Err(err),
    };
    Ok(SessionStatus {
        active: true,
        elapsed_ms: (now - session.start_time).max(0),
        logged_ms: session.logs.iter().map(TaskLog::duration_ms).sum(),
        next_start: Some(session.next_task_start()),
        session: Some(session),
        project: Some(project),
    })
}
