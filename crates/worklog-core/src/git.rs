use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_COMMIT_LIMIT: usize = 150;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found on PATH")]
    NotInstalled,
    #[error("Failed to run git {args} in {dir}: {source}")]
    Spawn {
        args: String,
        dir: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args} failed in {dir}: {message}")]
    CommandFailed {
        args: String,
        dir: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub hash: String,
    pub author: String,
    /// ISO timestamp as printed by `git log --date=iso`.
    pub date: String,
    pub message: String,
    #[serde(default)]
    pub commit_url: String,
}

/// The version-control operations the rest of the crate depends on.
pub trait Git {
    fn is_work_tree(&self, path: &Path) -> bool;
    /// Raw `remote.origin.url` value.
    fn remote_origin_url(&self, repo: &Path) -> Result<String, GitError>;
    fn user_name(&self, repo: &Path) -> Result<String, GitError>;
    /// Raw `hash|author|date|subject` log output.
    fn log(&self, repo: &Path, limit: usize) -> Result<String, GitError>;
}

/// Runs the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    binary: Option<PathBuf>,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            binary: which::which("git").ok(),
        }
    }

    pub fn available(&self) -> bool {
        self.binary.is_some()
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let binary = self.binary.as_ref().ok_or(GitError::NotInstalled)?;
        let joined = args.join(" ");
        tracing::debug!(dir = %dir.display(), args = %joined, "running git");
        let output = Command::new(binary)
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|source| GitError::Spawn {
                args: joined.clone(),
                dir: dir.display().to_string(),
                source,
            })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() || !stderr.is_empty() {
            let message = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            };
            return Err(GitError::CommandFailed {
                args: joined,
                dir: dir.display().to_string(),
                message,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Git for GitCli {
    fn is_work_tree(&self, path: &Path) -> bool {
        let Some(binary) = self.binary.as_ref() else {
            return false;
        };
        let output = Command::new(binary)
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "--is-inside-work-tree"])
            .output();
        match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            _ => false,
        }
    }

    fn remote_origin_url(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, &["config", "--get", "remote.origin.url"])
    }

    fn user_name(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, &["config", "user.name"])
            .map(|name| name.trim().to_string())
    }

    fn log(&self, repo: &Path, limit: usize) -> Result<String, GitError> {
        let limit = limit.to_string();
        self.run(
            repo,
            &[
                "log",
                "-n",
                limit.as_str(),
                "--pretty=format:%H|%an|%ad|%s",
                "--date=iso",
            ],
        )
    }
}

fn scp_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^git@([^:]+):").expect("regex"))
}

fn ssh_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ssh://(git@)?").expect("regex"))
}

fn dot_git_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.git/?$").expect("regex"))
}

/// Turns a remote URL into the HTTPS web URL of the repository.
pub fn normalize_remote_url(raw: &str) -> String {
    let single_line: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let trimmed = single_line.trim();
    let url = dot_git_re().replace(trimmed, "").to_string();
    if url.starts_with("git@") {
        return scp_like_re().replace(&url, "https://$1/").to_string();
    }
    if url.starts_with("ssh://") {
        return ssh_re().replace(&url, "https://").to_string();
    }
    url
}

pub fn commit_url(web_remote: &str, hash: &str) -> String {
    format!("{}/commit/{}", web_remote.trim_end_matches('/'), hash.trim())
}

/// Parses `hash|author|date|subject` lines; the subject may itself contain `|`.
pub fn parse_log_output(stdout: &str, web_remote: Option<&str>) -> Vec<Commit> {
    stdout
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(4, '|');
            let hash = parts.next()?.trim().to_string();
            let author = parts.next().unwrap_or("").trim().to_string();
            let date = parts.next().unwrap_or("").trim().to_string();
            let message = parts.next().unwrap_or("").trim().to_string();
            if hash.is_empty() {
                return None;
            }
            let commit_url = web_remote
                .map(|remote| commit_url(remote, &hash))
                .unwrap_or_default();
            Some(Commit {
                hash,
                author,
                date,
                message,
                commit_url,
            })
        })
        .collect()
}
