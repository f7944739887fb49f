use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use ulid::Ulid;

use crate::git::Git;
use crate::store::{load_json, save_json, KvStore, StoreError};
use crate::types::{LocalRepository, Project, PROJECTS_KEY};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Invalid(ValidationReport),
    #[error("Project not found: {0}")]
    NotFound(String),
    #[error("Repository not found in project {project}: {repository}")]
    RepositoryNotFound { project: String, repository: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ValidationIssue {
    MissingName,
    NoRepositories,
    EmptyPath,
    DuplicatePaths,
    MissingPath(String),
    NotGitRepository(String),
    Nested { inner: String, outer: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingName => f.write_str("Project name is required."),
            ValidationIssue::NoRepositories => {
                f.write_str("At least one repository is required.")
            }
            ValidationIssue::EmptyPath => f.write_str("Repository path is required."),
            ValidationIssue::DuplicatePaths => {
                f.write_str("Duplicate repository paths are not allowed.")
            }
            ValidationIssue::MissingPath(path) => {
                write!(f, "Repository at \"{}\" does not exist.", path)
            }
            ValidationIssue::NotGitRepository(path) => {
                write!(f, "Repository at \"{}\" is not a valid Git repository.", path)
            }
            ValidationIssue::Nested { inner, outer } => write!(
                f,
                "Repository at \"{}\" is a subdirectory of \"{}\".",
                inner, outer
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// The message shown to the user: the first issue found.
    pub fn message(&self) -> Option<String> {
        self.issues.first().map(|issue| issue.to_string())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => f.write_str(&message),
            None => f.write_str("valid"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    /// Set when editing an existing project.
    pub id: Option<String>,
    pub name: String,
    pub repositories: Vec<String>,
}

pub fn new_project_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Absolute, lexically normalized form of `path` (no symlink resolution).
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Last path segment, used as the default repository name.
pub fn repository_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_string()
}

/// Checks a set of repository paths before a project is saved.
pub fn validate_repositories(paths: &[String], git: &dyn Git) -> ValidationReport {
    let mut report = ValidationReport::default();
    if paths.iter().all(|path| path.trim().is_empty()) {
        report.issues.push(ValidationIssue::NoRepositories);
        return report;
    }

    for _ in paths.iter().filter(|path| path.trim().is_empty()) {
        report.issues.push(ValidationIssue::EmptyPath);
    }

    let normalized: Vec<PathBuf> = paths
        .iter()
        .filter(|path| !path.trim().is_empty())
        .map(|path| normalize_path(Path::new(path.trim())))
        .collect();

    let mut unique = normalized.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != normalized.len() {
        report.issues.push(ValidationIssue::DuplicatePaths);
    }

    for path in &normalized {
        let display = path.display().to_string();
        if !path.is_dir() {
            report.issues.push(ValidationIssue::MissingPath(display));
        } else if !git.is_work_tree(path) {
            report.issues.push(ValidationIssue::NotGitRepository(display));
        }
    }

    for (i, outer) in normalized.iter().enumerate() {
        for (j, inner) in normalized.iter().enumerate() {
            if i == j || inner == outer {
                continue;
            }
            if inner.starts_with(outer) {
                report.issues.push(ValidationIssue::Nested {
                    inner: inner.display().to_string(),
                    outer: outer.display().to_string(),
                });
            }
        }
    }
    report
}

pub fn validate_project(draft: &ProjectDraft, git: &dyn Git) -> ValidationReport {
    let mut report = ValidationReport::default();
    if draft.name.trim().is_empty() {
        report.issues.push(ValidationIssue::MissingName);
    }
    report
        .issues
        .extend(validate_repositories(&draft.repositories, git).issues);
    report
}

/// Check for a single repository entry: the path exists and holds `.git`.
pub fn validate_repository_path(path: &str) -> Result<(), ValidationIssue> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ValidationIssue::EmptyPath);
    }
    let path = Path::new(trimmed);
    if !path.exists() {
        return Err(ValidationIssue::MissingPath(trimmed.to_string()));
    }
    if !path.join(".git").exists() {
        return Err(ValidationIssue::NotGitRepository(trimmed.to_string()));
    }
    Ok(())
}

pub fn list_projects(store: &dyn KvStore) -> Result<Vec<Project>, ProjectError> {
    Ok(load_json::<Vec<Project>>(store, PROJECTS_KEY)?.unwrap_or_default())
}

/// Looks up by id first, then by case-insensitive name.
pub fn find_project(store: &dyn KvStore, id_or_name: &str) -> Result<Project, ProjectError> {
    let needle = id_or_name.trim();
    let projects = list_projects(store)?;
    projects
        .iter()
        .find(|project| project.id == needle)
        .or_else(|| {
            projects
                .iter()
                .find(|project| project.name.eq_ignore_ascii_case(needle))
        })
        .cloned()
        .ok_or_else(|| ProjectError::NotFound(needle.to_string()))
}

/// Creates or replaces a project after validating it.
pub fn save_project(
    store: &dyn KvStore,
    git: &dyn Git,
    draft: &ProjectDraft,
) -> Result<Project, ProjectError> {
    let report = validate_project(draft, git);
    if !report.is_ok() {
        return Err(ProjectError::Invalid(report));
    }

    let _lock = store.lock()?;
    let mut projects = list_projects(store)?;
    let existing = draft
        .id
        .as_deref()
        .and_then(|id| projects.iter().position(|project| project.id == id));
    if let (Some(id), None) = (draft.id.as_deref(), existing) {
        return Err(ProjectError::NotFound(id.to_string()));
    }

    let previous = existing.map(|index| projects[index].clone());
    let repositories = draft
        .repositories
        .iter()
        .filter(|path| !path.trim().is_empty())
        .map(|path| {
            let url = normalize_path(Path::new(path.trim()))
                .display()
                .to_string();
            let name = previous
                .as_ref()
                .and_then(|project| project.repositories.iter().find(|repo| repo.url == url))
                .map(|repo| repo.name.clone())
                .unwrap_or_else(|| repository_name(Path::new(&url)));
            LocalRepository { name, url }
        })
        .collect();

    let project = Project {
        id: draft.id.clone().unwrap_or_else(new_project_id),
        name: draft.name.trim().to_string(),
        repositories,
    };
    match existing {
        Some(index) => projects[index] = project.clone(),
        None => projects.push(project.clone()),
    }
    save_json(store, PROJECTS_KEY, &projects)?;
    tracing::info!(project_id = %project.id, name = %project.name, "project saved");
    Ok(project)
}

fn draft_from(project: &Project) -> ProjectDraft {
    ProjectDraft {
        id: Some(project.id.clone()),
        name: project.name.clone(),
        repositories: project
            .repositories
            .iter()
            .map(|repo| repo.url.clone())
            .collect(),
    }
}

fn replace_project(store: &dyn KvStore, project: &Project) -> Result<(), ProjectError> {
    let _lock = store.lock()?;
    let mut projects = list_projects(store)?;
    let Some(index) = projects.iter().position(|p| p.id == project.id) else {
        return Err(ProjectError::NotFound(project.id.clone()));
    };
    projects[index] = project.clone();
    save_json(store, PROJECTS_KEY, &projects)?;
    Ok(())
}

pub fn add_repository(
    store: &dyn KvStore,
    git: &dyn Git,
    project_id: &str,
    path: &str,
    name: Option<&str>,
) -> Result<Project, ProjectError> {
    let project = find_project(store, project_id)?;
    if let Err(issue) = validate_repository_path(path) {
        return Err(ProjectError::Invalid(ValidationReport {
            issues: vec![issue],
        }));
    }

    let mut draft = draft_from(&project);
    draft.repositories.push(path.trim().to_string());
    let mut saved = save_project(store, git, &draft)?;

    if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
        let url = normalize_path(Path::new(path.trim())).display().to_string();
        if let Some(repo) = saved.repositories.iter_mut().find(|repo| repo.url == url) {
            repo.name = name.to_string();
        }
        replace_project(store, &saved)?;
    }
    Ok(saved)
}

pub fn rename_repository(
    store: &dyn KvStore,
    project_id: &str,
    repository: &str,
    new_name: &str,
) -> Result<Project, ProjectError> {
    let mut project = find_project(store, project_id)?;
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(ProjectError::Invalid(ValidationReport {
            issues: vec![ValidationIssue::MissingName],
        }));
    }
    let url = project
        .repository(repository)
        .map(|repo| repo.url.clone())
        .ok_or_else(|| ProjectError::RepositoryNotFound {
            project: project.name.clone(),
            repository: repository.to_string(),
        })?;
    if let Some(repo) = project.repositories.iter_mut().find(|repo| repo.url == url) {
        repo.name = new_name.to_string();
    }
    replace_project(store, &project)?;
    Ok(project)
}

pub fn remove_repository(
    store: &dyn KvStore,
    project_id: &str,
    repository: &str,
) -> Result<Project, ProjectError> {
    let mut project = find_project(store, project_id)?;
    let url = project
        .repository(repository)
        .map(|repo| repo.url.clone())
        .ok_or_else(|| ProjectError::RepositoryNotFound {
            project: project.name.clone(),
            repository: repository.to_string(),
        })?;
    project.repositories.retain(|repo| repo.url != url);
    if project.repositories.is_empty() {
        return Err(ProjectError::Invalid(ValidationReport {
            issues: vec![ValidationIssue::NoRepositories],
        }));
    }
    replace_project(store, &project)?;
    Ok(project)
}
