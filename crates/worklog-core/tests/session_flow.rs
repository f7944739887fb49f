use std::cell::Cell;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use worklog_core::format::day_key;
use worklog_core::git::{Git, GitError};
use worklog_core::project::{save_project, ProjectDraft};
use worklog_core::session::{
    active_context, append_task, discard_session, end_session, load_state, session_status,
    start_session, submit_task, SessionError, SessionState, TaskDetails,
};
use worklog_core::store::{FileStore, KvStore, MemoryStore, StoreError};
use worklog_core::types::{Project, TaskType, ACTIVE_SESSION_KEY, WORKLOGS_KEY};
use worklog_core::worklogs::load_worklogs;

const HOUR: i64 = 3_600_000;
// 2024-03-01T12:00:00Z; noon UTC stays on the same calendar day in most zones.
const T0: i64 = 1_709_294_400_000;

struct AlwaysRepo;

impl Git for AlwaysRepo {
    fn is_work_tree(&self, _path: &Path) -> bool {
        true
    }
    fn remote_origin_url(&self, _repo: &Path) -> Result<String, GitError> {
        Ok("git@github.com:acme/api.git".to_string())
    }
    fn user_name(&self, _repo: &Path) -> Result<String, GitError> {
        Ok("Ada".to_string())
    }
    fn log(&self, _repo: &Path, _limit: usize) -> Result<String, GitError> {
        Ok(String::new())
    }
}

/// Fails the first removal of the active session record.
struct FailFirstSessionClear {
    inner: MemoryStore,
    failed: Cell<bool>,
}

impl FailFirstSessionClear {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failed: Cell::new(false),
        }
    }
}

impl KvStore for FailFirstSessionClear {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if key == ACTIVE_SESSION_KEY && !self.failed.replace(true) {
            return Err(StoreError::Io {
                path: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.remove(key)
    }
}

fn project(store: &dyn KvStore, repos: &TempDir, name: &str) -> Project {
    let repo = repos.path().join(name);
    std::fs::create_dir_all(&repo).expect("repo dir");
    save_project(
        store,
        &AlwaysRepo,
        &ProjectDraft {
            id: None,
            name: name.to_string(),
            repositories: vec![repo.display().to_string()],
        },
    )
    .expect("save project")
}

#[test]
fn start_append_end_moves_logs_into_start_day_bucket() {
    worklog_core::logging::init_test();
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");

    start_session(&store, &p, T0).expect("start");
    let log = append_task(&store, &TaskDetails::new(TaskType::Call, "kickoff"), T0 + HOUR)
        .expect("append");
    assert_eq!((log.start_time, log.end_time), (T0, T0 + HOUR));

    let summary = end_session(&store).expect("end");
    assert_eq!(summary.tasks, 1);
    assert_eq!(summary.total_ms, HOUR);
    assert_eq!(summary.date, day_key(T0));

    let worklogs = load_worklogs(&store).expect("worklogs");
    let bucket = &worklogs[&day_key(T0)][&p.id];
    assert_eq!(bucket.len(), 1);
    assert_eq!((bucket[0].start_time, bucket[0].end_time), (T0, T0 + HOUR));
    assert_eq!(store.get(ACTIVE_SESSION_KEY).expect("get"), None);
}

#[test]
fn only_one_session_can_be_active() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let a = project(&store, &repos, "a");
    let b = project(&store, &repos, "b");

    start_session(&store, &a, T0).expect("start a");
    let err = start_session(&store, &b, T0 + 1).unwrap_err();
    assert!(matches!(err, SessionError::AlreadyActive { .. }));

    let state = load_state(&store).expect("state");
    match state {
        SessionState::Active(session) => {
            assert_eq!(session.project_id, a.id);
            assert_eq!(session.start_time, T0);
        }
        SessionState::Idle => panic!("expected active session"),
    }
}

#[test]
fn tasks_chain_from_previous_end() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");
    start_session(&store, &p, T0).expect("start");

    let details = TaskDetails::new(TaskType::Administrative, "email");
    append_task(&store, &details, T0 + HOUR).expect("first");
    let second = append_task(&store, &details, T0 + 3 * HOUR).expect("second");
    assert_eq!(second.start_time, T0 + HOUR);
    assert!(second.start_time <= second.end_time);

    let status = session_status(&store, T0 + 4 * HOUR).expect("status");
    assert!(status.active);
    assert_eq!(status.elapsed_ms, 4 * HOUR);
    assert_eq!(status.logged_ms, 3 * HOUR);
    assert_eq!(status.next_start, Some(T0 + 3 * HOUR));
}

#[test]
fn no_commits_selected_leaves_state_untouched() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");
    start_session(&store, &p, T0).expect("start");
    let before = store.get(ACTIVE_SESSION_KEY).expect("get");

    let details = TaskDetails::new(TaskType::Task, "implement search");
    let err = submit_task(&store, &details, true, T0 + HOUR).unwrap_err();
    assert!(matches!(err, SessionError::NoCommitsSelected));

    assert_eq!(store.get(ACTIVE_SESSION_KEY).expect("get"), before);
    assert_eq!(store.get(WORKLOGS_KEY).expect("get"), None);
}

#[test]
fn submit_with_end_archives_every_log_once_in_order() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");
    start_session(&store, &p, T0).expect("start");

    let mut first = TaskDetails::new(TaskType::BugFix, "fix crash");
    first.github_uris = vec!["https://github.com/acme/api/commit/abc".to_string()];
    let submitted = submit_task(&store, &first, false, T0 + HOUR).expect("first");
    assert!(submitted.ended.is_none());
    assert_eq!(submitted.duration_ms, HOUR);

    let second = TaskDetails::new(TaskType::Qa, "verify fix");
    let submitted = submit_task(&store, &second, true, T0 + 2 * HOUR).expect("second");
    let ended = submitted.ended.expect("session ended");
    assert_eq!(ended.tasks, 2);

    let worklogs = load_worklogs(&store).expect("worklogs");
    let occurrences: usize = worklogs
        .values()
        .flat_map(|projects| projects.values())
        .map(|logs| logs.len())
        .sum();
    assert_eq!(occurrences, 2);
    let bucket = &worklogs[&day_key(T0)][&p.id];
    let descriptions: Vec<&str> = bucket.iter().map(|l| l.description.as_str()).collect();
    assert_eq!(descriptions, vec!["fix crash", "verify fix"]);
    assert_eq!(
        bucket[0].github_uris,
        vec!["https://github.com/acme/api/commit/abc".to_string()]
    );

    assert!(matches!(end_session(&store), Err(SessionError::NotActive)));
}

#[test]
fn second_session_same_day_appends_to_bucket() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");

    for offset in [0, 2 * HOUR] {
        start_session(&store, &p, T0 + offset).expect("start");
        append_task(
            &store,
            &TaskDetails::new(TaskType::Call, format!("call {}", offset)),
            T0 + offset + HOUR,
        )
        .expect("append");
        end_session(&store).expect("end");
    }

    let worklogs = load_worklogs(&store).expect("worklogs");
    let bucket = &worklogs[&day_key(T0)][&p.id];
    assert_eq!(bucket.len(), 2);
    assert_eq!(bucket[0].description, "call 0");
}

#[test]
fn corrupt_session_record_is_cleared() {
    let store = MemoryStore::new();
    store.set(ACTIVE_SESSION_KEY, "{\"projectId\":").expect("set");
    assert!(matches!(load_state(&store), Err(SessionError::Corrupt)));
    assert_eq!(store.get(ACTIVE_SESSION_KEY).expect("get"), None);
    assert!(matches!(load_state(&store), Ok(SessionState::Idle)));
}

#[test]
fn session_for_deleted_project_is_cleared() {
    let store = MemoryStore::new();
    store
        .set(
            ACTIVE_SESSION_KEY,
            r#"{"projectId":"gone","startTime":1,"logs":[]}"#,
        )
        .expect("set");
    let err = active_context(&store).unwrap_err();
    assert!(matches!(err, SessionError::ProjectNotFound(id) if id == "gone"));
    assert_eq!(store.get(ACTIVE_SESSION_KEY).expect("get"), None);
}

#[test]
fn discard_drops_session_without_archiving() {
    let repos = TempDir::new().expect("tempdir");
    let store = MemoryStore::new();
    let p = project(&store, &repos, "api");
    start_session(&store, &p, T0).expect("start");
    append_task(&store, &TaskDetails::new(TaskType::Call, "sync"), T0 + HOUR).expect("append");

    let dropped = discard_session(&store).expect("discard").expect("was active");
    assert_eq!(dropped.logs.len(), 1);
    assert_eq!(store.get(WORKLOGS_KEY).expect("get"), None);
    assert!(discard_session(&store).expect("discard idle").is_none());
}

#[test]
fn file_store_persists_session_between_handles() {
    let home = TempDir::new().expect("home");
    let repos = TempDir::new().expect("repos");
    let data = home.path().join("data");

    {
        let store = FileStore::open(&data).expect("open");
        let p = project(&store, &repos, "api");
        start_session(&store, &p, T0).expect("start");
    }

    let store = FileStore::open(&data).expect("reopen");
    let log = append_task(&store, &TaskDetails::new(TaskType::Call, "later"), T0 + HOUR)
        .expect("append");
    assert_eq!(log.start_time, T0);
    end_session(&store).expect("end");
    assert!(!data.join("activeSession.json").exists());
    assert!(data.join("worklogs.json").is_file());
}

#[test]
fn failed_session_clear_restores_archive_and_retry_archives_once() {
    let repos = TempDir::new().expect("tempdir");
    let store = FailFirstSessionClear::new();
    let p = project(&store, &repos, "api");

    start_session(&store, &p, T0).expect("start");
    append_task(&store, &TaskDetails::new(TaskType::Call, "sync"), T0 + HOUR).expect("append");

    let err = end_session(&store).expect_err("first end fails");
    assert!(matches!(err, SessionError::Store(_)));
    assert_eq!(store.get(WORKLOGS_KEY).expect("get"), None);
    assert!(load_state(&store).expect("state").is_active());

    end_session(&store).expect("retry");
    let worklogs = load_worklogs(&store).expect("worklogs");
    assert_eq!(worklogs[&day_key(T0)][&p.id].len(), 1);
    assert_eq!(store.get(ACTIVE_SESSION_KEY).expect("get"), None);
}

#[test]
fn failed_session_clear_keeps_earlier_archive_entries() {
    let repos = TempDir::new().expect("tempdir");
    let store = FailFirstSessionClear::new();
    let p = project(&store, &repos, "api");
    store
        .set(WORKLOGS_KEY, r#"{"2020-01-01":{"old":[]}}"#)
        .expect("seed archive");

    start_session(&store, &p, T0).expect("start");
    append_task(&store, &TaskDetails::new(TaskType::Call, "sync"), T0 + HOUR).expect("append");
    end_session(&store).expect_err("first end fails");

    assert_eq!(
        store.get(WORKLOGS_KEY).expect("get").as_deref(),
        Some(r#"{"2020-01-01":{"old":[]}}"#)
    );
}

#[test]
fn concurrent_appends_through_separate_handles_keep_every_log() {
    let home = TempDir::new().expect("home");
    let repos = TempDir::new().expect("repos");
    let data = home.path().join("data");
    {
        let store = FileStore::open(&data).expect("open");
        let p = project(&store, &repos, "api");
        start_session(&store, &p, T0).expect("start");
    }

    let workers: Vec<_> = (0..2i64)
        .map(|worker| {
            let data = data.clone();
            std::thread::spawn(move || {
                let store = FileStore::open(&data).expect("open");
                for round in 0..10i64 {
                    let mut details = TaskDetails::new(
                        TaskType::Call,
                        format!("worker {} round {}", worker, round),
                    );
                    details.start = Some(T0);
                    append_task(&store, &details, T0 + HOUR).expect("append");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("join");
    }

    let store = FileStore::open(&data).expect("reopen");
    let session = load_state(&store)
        .expect("state")
        .into_active()
        .expect("active");
    assert_eq!(session.logs.len(), 20);
}
