// Lives in its own test binary: `shutdown_all` stops every scheduler in the
// process.

use autopush_daemon::error::BackendError;
use autopush_daemon::git::backend::{CommitRecord, Signature, TreeStatus, VcsBackend};
use autopush_daemon::git::gate::RepositoryGate;
use autopush_daemon::scheduler::{registry, Autopush, Period, SchedulerState};
use chrono::Utc;
use tempfile::TempDir;

struct CleanBackend;

impl VcsBackend for CleanBackend {
    fn verify_repository(&self) -> Result<(), BackendError> {
        Ok(())
    }
    fn fetch(&self) -> Result<(), BackendError> {
        Ok(())
    }
    fn status(&self) -> Result<TreeStatus, BackendError> {
        Ok(TreeStatus::Clean)
    }
    fn log(&self, _max_count: usize) -> Result<Vec<CommitRecord>, BackendError> {
        Ok(vec![CommitRecord {
            id: "abc123".to_string(),
            committed_at: Utc::now(),
            author_name: "Alice".to_string(),
            author_email: "alice@example.test".to_string(),
            summary: "Initial".to_string(),
        }])
    }
    fn add(&self, _pattern: &str) -> Result<(), BackendError> {
        Ok(())
    }
    fn commit(&self, _message: &str, _author: &Signature) -> Result<(), BackendError> {
        Ok(())
    }
    fn push(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_all_stops_attached_and_detached_schedulers() {
    let period = Period::from_secs(600).expect("valid period");
    let dirs: Vec<TempDir> = (0..3).map(|_| TempDir::new().expect("tempdir")).collect();

    let mut schedulers = Vec::new();
    for dir in &dirs {
        let handle = RepositoryGate::open_with(dir.path(), CleanBackend).expect("open");
        schedulers.push(Autopush::start_with_handle(period, handle).await.expect("start"));
    }
    let detached = schedulers.pop().expect("three schedulers");
    let detached_id = detached.id();
    drop(detached);

    assert_eq!(registry::live_instances().len(), 3);

    registry::shutdown_all(true).await.expect("shutdown_all should succeed");

    assert!(registry::live_instances().is_empty());
    assert!(!registry::is_registered(detached_id));
    for scheduler in &schedulers {
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
