//! Commit listing and selection for linking work to code.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::format::git_iso_day;
use crate::git::{normalize_remote_url, parse_log_output, Commit, Git, GitError};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommitDay {
    pub day: String,
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone)]
pub struct CommitQuery {
    pub limit: usize,
    /// Keep only commits authored by the repository's `user.name`.
    pub only_mine: bool,
}

impl Default for CommitQuery {
    fn default() -> Self {
        Self {
            limit: crate::git::DEFAULT_COMMIT_LIMIT,
            only_mine: false,
        }
    }
}

/// Resolves the web remote first; commit URLs are built from it.
pub fn load_commits(
    git: &dyn Git,
    repo: &Path,
    query: &CommitQuery,
) -> Result<Vec<Commit>, GitError> {
    let remote = normalize_remote_url(&git.remote_origin_url(repo)?);
    let stdout = git.log(repo, query.limit)?;
    let mut commits = parse_log_output(&stdout, Some(&remote));
    if query.only_mine {
        let me = git.user_name(repo)?;
        commits.retain(|commit| commit.author == me);
    }
    tracing::debug!(
        repo = %repo.display(),
        count = commits.len(),
        only_mine = query.only_mine,
        "loaded commits"
    );
    Ok(commits)
}

/// Bucket for commits whose date cannot be read.
pub const UNKNOWN_DAY: &str = "unknown";

/// Newest day first, undated commits last; commits keep their log order
/// within a day.
pub fn group_by_day(commits: &[Commit]) -> Vec<CommitDay> {
    let mut days: BTreeMap<String, Vec<Commit>> = BTreeMap::new();
    let mut undated = Vec::new();
    for commit in commits {
        match git_iso_day(&commit.date) {
            Some(day) => days.entry(day).or_default().push(commit.clone()),
            None => undated.push(commit.clone()),
        }
    }
    let mut grouped: Vec<CommitDay> = days
        .into_iter()
        .rev()
        .map(|(day, commits)| CommitDay { day, commits })
        .collect();
    if !undated.is_empty() {
        grouped.push(CommitDay {
            day: UNKNOWN_DAY.to_string(),
            commits: undated,
        });
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("No commit matches {0}")]
    NotFound(String),
    #[error("Commit prefix {0} is ambiguous ({})", .1.join(", "))]
    Ambiguous(String, Vec<String>),
}

/// Ordered set of picked commits out of a listed page.
#[derive(Debug, Clone, Default)]
pub struct CommitSelection {
    available: Vec<Commit>,
    selected: Vec<String>,
}

impl CommitSelection {
    pub fn new(available: Vec<Commit>) -> Self {
        Self {
            available,
            selected: Vec::new(),
        }
    }

    pub fn available(&self) -> &[Commit] {
        &self.available
    }

    fn resolve(&self, hash_or_prefix: &str) -> Result<String, SelectError> {
        let needle = hash_or_prefix.trim().to_lowercase();
        if needle.is_empty() {
            return Err(SelectError::NotFound(hash_or_prefix.to_string()));
        }
        if let Some(exact) = self
            .available
            .iter()
            .find(|commit| commit.hash.to_lowercase() == needle)
        {
            return Ok(exact.hash.clone());
        }
        let matches: Vec<String> = self
            .available
            .iter()
            .filter(|commit| commit.hash.to_lowercase().starts_with(&needle))
            .map(|commit| commit.hash.clone())
            .collect();
        match matches.len() {
            0 => Err(SelectError::NotFound(hash_or_prefix.to_string())),
            1 => Ok(matches[0].clone()),
            _ => Err(SelectError::Ambiguous(hash_or_prefix.to_string(), matches)),
        }
    }

    pub fn is_selected(&self, hash: &str) -> bool {
        self.selected.iter().any(|h| h == hash)
    }

    /// Selects an unselected commit, unselects a selected one. Returns the new state.
    pub fn toggle(&mut self, hash_or_prefix: &str) -> Result<bool, SelectError> {
        let hash = self.resolve(hash_or_prefix)?;
        if self.is_selected(&hash) {
            self.selected.retain(|h| h != &hash);
            return Ok(false);
        }
        self.selected.push(hash);
        Ok(true)
    }

    /// Idempotent select.
    pub fn select(&mut self, hash_or_prefix: &str) -> Result<(), SelectError> {
        let hash = self.resolve(hash_or_prefix)?;
        if !self.is_selected(&hash) {
            self.selected.push(hash);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> Vec<&Commit> {
        self.selected
            .iter()
            .filter_map(|hash| self.available.iter().find(|c| &c.hash == hash))
            .collect()
    }

    /// URLs in the order commits were picked.
    pub fn urls(&self) -> Vec<String> {
        self.selected()
            .into_iter()
            .map(|commit| commit.commit_url.clone())
            .collect()
    }
}
