use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use worklog_core::commits::{group_by_day, load_commits, CommitQuery, CommitSelection};
use worklog_core::git::{Git, GitCli, GitError};

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git {:?} failed", args);
}

fn commit_as(repo: &Path, author: &str, message: &str) {
    let name = format!("user.name={}", author);
    git(
        repo,
        &[
            "-c",
            name.as_str(),
            "-c",
            "user.email=dev@example.com",
            "commit",
            "-q",
            "--allow-empty",
            "-m",
            message,
        ],
    );
}

fn sample_repo() -> Option<(TempDir, std::path::PathBuf)> {
    if !GitCli::new().available() {
        eprintln!("git not available; skipping");
        return None;
    }
    let root = TempDir::new().expect("tempdir");
    let repo = root.path().join("api");
    std::fs::create_dir_all(&repo).expect("repo dir");
    git(&repo, &["init", "-q"]);
    git(&repo, &["config", "user.name", "Ada"]);
    git(&repo, &["config", "user.email", "ada@example.com"]);
    git(&repo, &["remote", "add", "origin", "git@github.com:acme/api.git"]);
    commit_as(&repo, "Ada", "feat: search | filters");
    commit_as(&repo, "Bob", "chore: deps");
    Some((root, repo))
}

#[test]
fn lists_commits_with_web_urls_newest_first() {
    let Some((_root, repo)) = sample_repo() else {
        return;
    };
    let commits = load_commits(&GitCli::new(), &repo, &CommitQuery::default()).expect("load");
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].message, "chore: deps");
    assert_eq!(commits[1].message, "feat: search | filters");
    assert_eq!(
        commits[0].commit_url,
        format!("https://github.com/acme/api/commit/{}", commits[0].hash)
    );
    assert_eq!(commits[0].hash.len(), 40);

    let days = group_by_day(&commits);
    assert_eq!(days.iter().map(|d| d.commits.len()).sum::<usize>(), 2);
}

#[test]
fn only_mine_uses_configured_user_name() {
    let Some((_root, repo)) = sample_repo() else {
        return;
    };
    let query = CommitQuery {
        only_mine: true,
        ..CommitQuery::default()
    };
    let commits = load_commits(&GitCli::new(), &repo, &query).expect("load");
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].author, "Ada");
}

#[test]
fn selection_produces_urls_for_picked_commits() {
    let Some((_root, repo)) = sample_repo() else {
        return;
    };
    let commits = load_commits(&GitCli::new(), &repo, &CommitQuery::default()).expect("load");
    let first_hash = commits[1].hash.clone();
    let mut selection = CommitSelection::new(commits);
    assert!(selection.is_empty());
    selection.select(&first_hash[..10]).expect("select by prefix");
    assert_eq!(
        selection.urls(),
        vec![format!("https://github.com/acme/api/commit/{}", first_hash)]
    );
}

#[test]
fn missing_remote_is_a_command_failure() {
    let git_cli = GitCli::new();
    if !git_cli.available() {
        return;
    }
    let root = TempDir::new().expect("tempdir");
    git(root.path(), &["init", "-q"]);
    let err = git_cli.remote_origin_url(root.path()).unwrap_err();
    assert!(matches!(err, GitError::CommandFailed { .. }));
}
