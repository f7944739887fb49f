//! Date/project bucketed archive of finished task logs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::format::parse_day;
use crate::store::{load_json, save_json, KvStore, StoreError};
use crate::types::{TaskLog, WorkLogs, WORKLOGS_KEY};

#[derive(Debug, Error)]
pub enum WorklogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

pub fn load_worklogs(store: &dyn KvStore) -> Result<WorkLogs, WorklogError> {
    Ok(load_json::<WorkLogs>(store, WORKLOGS_KEY)?.unwrap_or_default())
}

/// Appends after whatever the bucket already holds.
pub fn archive_logs(worklogs: &mut WorkLogs, date: &str, project_id: &str, logs: &[TaskLog]) {
    worklogs
        .entry(date.to_string())
        .or_default()
        .entry(project_id.to_string())
        .or_default()
        .extend(logs.iter().cloned());
}

/// Read-modify-write of the archive. Callers hold the store lock.
pub fn append_to_archive(
    store: &dyn KvStore,
    date: &str,
    project_id: &str,
    logs: &[TaskLog],
) -> Result<(), WorklogError> {
    if parse_day(date).is_none() {
        return Err(WorklogError::InvalidDate(date.to_string()));
    }
    let mut worklogs = load_worklogs(store)?;
    archive_logs(&mut worklogs, date, project_id, logs);
    save_json(store, WORKLOGS_KEY, &worklogs)?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct WorklogFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub project_id: Option<String>,
}

impl WorklogFilter {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            from: Some(date),
            to: Some(date),
            project_id: None,
        }
    }

    fn accepts_day(&self, day: &str) -> bool {
        let Some(date) = parse_day(day) else {
            // Keys that are not dates only show up in unfiltered listings.
            return self.from.is_none() && self.to.is_none();
        };
        self.from.map(|from| date >= from).unwrap_or(true)
            && self.to.map(|to| date <= to).unwrap_or(true)
    }

    fn accepts_project(&self, project_id: &str) -> bool {
        self.project_id
            .as_deref()
            .map(|wanted| wanted == project_id)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorklogEntry {
    pub date: String,
    pub project_id: String,
    pub log: TaskLog,
}

/// Archived logs in date order, then project id, then original order.
pub fn select_entries(worklogs: &WorkLogs, filter: &WorklogFilter) -> Vec<WorklogEntry> {
    let mut entries = Vec::new();
    for (date, projects) in worklogs {
        if !filter.accepts_day(date) {
            continue;
        }
        for (project_id, logs) in projects {
            if !filter.accepts_project(project_id) {
                continue;
            }
            for log in logs {
                entries.push(WorklogEntry {
                    date: date.clone(),
                    project_id: project_id.clone(),
                    log: log.clone(),
                });
            }
        }
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTotal {
    pub project_id: String,
    pub tasks: usize,
    pub total_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub date: String,
    pub projects: Vec<ProjectTotal>,
    pub total_ms: i64,
}

pub fn summarize(worklogs: &WorkLogs, filter: &WorklogFilter) -> Vec<DayTotal> {
    let mut days: BTreeMap<String, BTreeMap<String, ProjectTotal>> = BTreeMap::new();
    for entry in select_entries(worklogs, filter) {
        let total = days
            .entry(entry.date)
            .or_default()
            .entry(entry.project_id.clone())
            .or_insert_with(|| ProjectTotal {
                project_id: entry.project_id,
                tasks: 0,
                total_ms: 0,
            });
        total.tasks += 1;
        total.total_ms += entry.log.duration_ms();
    }
    days.into_iter()
        .map(|(date, projects)| {
            let projects: Vec<ProjectTotal> = projects.into_values().collect();
            DayTotal {
                date,
                total_ms: projects.iter().map(|p| p.total_ms).sum(),
                projects,
            }
        })
        .collect()
}
