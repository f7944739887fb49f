//! Core domain for worklog: projects, the active session and the archive.

pub mod commits;
pub mod config;
pub mod format;
pub mod git;
pub mod logging;
pub mod project;
pub mod session;
pub mod store;
pub mod token;
pub mod types;
pub mod worklogs;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
