// Process-wide set of live schedulers.
//
// An instance is inserted once its initial cycle succeeded and removed by its
// worker when it reaches `Stopped`. The entry keeps a scheduler reachable
// (and shut-down-able) after the caller dropped its `Autopush`.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::warn;
use uuid::Uuid;

use super::period::Period;
use super::{SchedulerControl, SchedulerState};
use crate::error::AutopushError;

static REGISTRY: LazyLock<Mutex<HashMap<SchedulerId, Arc<SchedulerControl>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchedulerId(Uuid);

impl SchedulerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SchedulerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SchedulerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot of one registered scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub id: SchedulerId,
    pub repository: PathBuf,
    pub period: Period,
    pub state: SchedulerState,
}

fn registry() -> MutexGuard<'static, HashMap<SchedulerId, Arc<SchedulerControl>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn register(control: Arc<SchedulerControl>) {
    registry().insert(control.id(), control);
}

pub(crate) fn deregister(id: SchedulerId) {
    registry().remove(&id);
}

pub fn is_registered(id: SchedulerId) -> bool {
    registry().contains_key(&id)
}

pub fn live_instances() -> Vec<InstanceInfo> {
    let mut instances: Vec<InstanceInfo> =
        registry().values().map(|control| control.info()).collect();
    instances.sort_by(|a, b| a.repository.cmp(&b.repository).then(a.id.cmp(&b.id)));
    instances
}

/// Shut down the scheduler registered under `id`. Unknown or already
/// stopped instances are a no-op.
pub async fn shutdown(id: SchedulerId, await_completion: bool) -> Result<(), AutopushError> {
    let control = registry().get(&id).cloned();
    match control {
        Some(control) => control.shutdown(await_completion).await,
        None => Ok(()),
    }
}

/// Shut down every registered scheduler. All instances are asked to stop
/// even if some fail; the first error is returned.
pub async fn shutdown_all(await_completion: bool) -> Result<(), AutopushError> {
    let controls: Vec<Arc<SchedulerControl>> = registry().values().cloned().collect();

    let mut first_error = None;
    for control in controls {
        if let Err(error) = control.shutdown(await_completion).await {
            warn!(scheduler = %control.id(), %error, "scheduler did not shut down cleanly");
            first_error.get_or_insert(error);
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
