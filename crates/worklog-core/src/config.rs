use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::DEFAULT_COMMIT_LIMIT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklogConfig {
    /// Directory of the key/value files; relative paths are under the home.
    pub data_dir: Option<String>,
    /// How many commits the picker lists per repository.
    pub commit_limit: Option<usize>,
    /// Only list commits authored by the repository's `user.name`.
    pub only_my_commits: Option<bool>,
    /// tracing filter directive, e.g. "info" or "worklog_core=debug".
    pub log_level: Option<String>,
}

pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

/// `--home` flag, then `WORKLOG_HOME`, then `~/.worklog`.
pub fn resolve_worklog_home(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(value) = std::env::var("WORKLOG_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir()
        .map(|home| home.join(".worklog"))
        .ok_or_else(|| {
            anyhow!("Unable to resolve home directory; set WORKLOG_HOME to an absolute path")
        })
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Missing file is an empty config; a malformed one is an error.
pub fn load_config(home: &Path) -> Result<WorklogConfig, ConfigError> {
    let path = config_path(home);
    if !path.is_file() {
        return Ok(WorklogConfig::default());
    }
    let text = fs::read_to_string(&path)?;
    Ok(toml::from_str::<WorklogConfig>(&text)?)
}

pub fn write_config(home: &Path, config: &WorklogConfig) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(home)?;
    let path = config_path(home);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}

pub fn resolve_data_dir_with_source(
    home: &Path,
    config: &WorklogConfig,
) -> (PathBuf, &'static str) {
    if let Some(dir) = config
        .data_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
    {
        let path = PathBuf::from(dir);
        let path = if path.is_absolute() {
            path
        } else {
            home.join(path)
        };
        return (path, "global");
    }
    (home.join("data"), "default")
}

pub fn resolve_commit_limit(config: &WorklogConfig) -> usize {
    config
        .commit_limit
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_COMMIT_LIMIT)
}

pub fn resolve_only_my_commits(config: &WorklogConfig) -> bool {
    config.only_my_commits.unwrap_or(false)
}

pub fn resolve_log_level_with_source(config: &WorklogConfig) -> (String, &'static str) {
    if let Ok(value) = std::env::var("WORKLOG_LOG") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return (trimmed.to_string(), "env");
        }
    }
    if let Some(level) = config
        .log_level
        .as_deref()
        .map(str::trim)
        .filter(|level| !level.is_empty())
    {
        return (level.to_string(), "global");
    }
    (DEFAULT_LOG_LEVEL.to_string(), "default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
        let _guard = crate::test_env::lock();
        f()
    }

    struct EnvGuard {
        worklog_home: Option<OsString>,
        worklog_log: Option<OsString>,
    }

    impl EnvGuard {
        fn capture() -> Self {
            Self {
                worklog_home: std::env::var_os("WORKLOG_HOME"),
                worklog_log: std::env::var_os("WORKLOG_LOG"),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.worklog_home.as_ref() {
                Some(value) => std::env::set_var("WORKLOG_HOME", value),
                None => std::env::remove_var("WORKLOG_HOME"),
            }
            match self.worklog_log.as_ref() {
                Some(value) => std::env::set_var("WORKLOG_LOG", value),
                None => std::env::remove_var("WORKLOG_LOG"),
            }
        }
    }

    #[test]
    fn write_and_read_config() {
        let temp = TempDir::new().expect("tempdir");
        let config = WorklogConfig {
            data_dir: Some("store".to_string()),
            commit_limit: Some(40),
            only_my_commits: Some(true),
            log_level: Some("debug".to_string()),
        };
        write_config(temp.path(), &config).expect("write config");
        let loaded = load_config(temp.path()).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_config_is_default_and_malformed_is_error() {
        let temp = TempDir::new().expect("tempdir");
        assert_eq!(
            load_config(temp.path()).expect("load"),
            WorklogConfig::default()
        );
        fs::write(config_path(temp.path()), "commit_limit = \"many\"\n").expect("write");
        assert!(matches!(
            load_config(temp.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn data_dir_is_relative_to_home_unless_absolute() {
        let home = Path::new("/tmp/worklog-home");
        let (dir, source) = resolve_data_dir_with_source(home, &WorklogConfig::default());
        assert_eq!(dir, home.join("data"));
        assert_eq!(source, "default");

        let config = WorklogConfig {
            data_dir: Some("kv".to_string()),
            ..WorklogConfig::default()
        };
        let (dir, source) = resolve_data_dir_with_source(home, &config);
        assert_eq!(dir, home.join("kv"));
        assert_eq!(source, "global");
    }

    #[test]
    fn commit_limit_falls_back_to_default() {
        let config = WorklogConfig {
            commit_limit: Some(0),
            ..WorklogConfig::default()
        };
        assert_eq!(resolve_commit_limit(&config), DEFAULT_COMMIT_LIMIT);
    }

    #[test]
    fn home_prefers_flag_then_env() {
        with_env_lock(|| {
            let _env = EnvGuard::capture();
            let flag = TempDir::new().expect("flag tempdir");
            let env_home = TempDir::new().expect("env tempdir");
            std::env::set_var("WORKLOG_HOME", env_home.path());

            let resolved = resolve_worklog_home(Some(flag.path())).expect("resolve");
            assert_eq!(resolved, flag.path());
            let resolved = resolve_worklog_home(None).expect("resolve");
            assert_eq!(resolved, env_home.path());
        });
    }

    #[test]
    fn log_level_prefers_env_over_config_then_default() {
        with_env_lock(|| {
            let _env = EnvGuard::capture();
            std::env::remove_var("WORKLOG_LOG");

            let (level, source) = resolve_log_level_with_source(&WorklogConfig::default());
            assert_eq!(level, DEFAULT_LOG_LEVEL);
            assert_eq!(source, "default");

            let config = WorklogConfig {
                log_level: Some("info".to_string()),
                ..WorklogConfig::default()
            };
            let (level, source) = resolve_log_level_with_source(&config);
            assert_eq!(level, "info");
            assert_eq!(source, "global");

            std::env::set_var("WORKLOG_LOG", "trace");
            let (level, source) = resolve_log_level_with_source(&config);
            assert_eq!(level, "trace");
            assert_eq!(source, "env");
        });
    }
}
