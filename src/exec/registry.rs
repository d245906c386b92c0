// src/exec/registry.rs

//! Process-wide tracking of live child processes.
//!
//! Every handle spawned by the engine is registered here so that
//! [`ProcessRegistry::kill_all`] can reach it (e.g. on shutdown) no matter
//! which invocation owns it. The registry only keeps `Weak` references: it
//! never extends the lifetime of a handle.
//!
//! [`ProcessRegistry::global`] is the shared instance used by the binary.
//! Tests and embedders can create isolated instances with
//! [`ProcessRegistry::new`] and inject them into a
//! [`ProcessEngine`](crate::exec::ProcessEngine).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use tracing::{debug, info};

use crate::exec::handle::ProcessControl;

type Members = HashMap<u64, Weak<ProcessControl>>;

static GLOBAL: OnceLock<ProcessRegistry> = OnceLock::new();

/// Shared set of live processes. Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    members: Arc<Mutex<Members>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ProcessRegistry {
        GLOBAL.get_or_init(ProcessRegistry::new)
    }

    /// Track `control` until the returned guard is dropped.
    ///
    /// The engine drops the guard as soon as it has observed the process
    /// exit, whether that exit was natural or caused by [`kill_all`].
    ///
    /// [`kill_all`]: ProcessRegistry::kill_all
    #[must_use = "the process is unregistered when the guard is dropped"]
    pub fn register(&self, control: &Arc<ProcessControl>) -> Registration {
        let id = control.id();
        self.lock().insert(id, Arc::downgrade(control));
        debug!(id, pid = ?control.pid(), "registered process");

        Registration {
            registry: self.clone(),
            id,
        }
    }

    /// Request forced termination of every tracked process, then forget them.
    ///
    /// Membership is snapshotted under the lock and the kills are issued
    /// without holding it. Per-member failures (already exited, handle gone)
    /// are logged and skipped. Processes registered after the snapshot stay
    /// tracked.
    pub fn kill_all(&self) {
        let snapshot: Vec<(u64, Weak<ProcessControl>)> = self
            .lock()
            .iter()
            .map(|(id, weak)| (*id, weak.clone()))
            .collect();

        if snapshot.is_empty() {
            debug!("kill_all: no tracked processes");
            return;
        }

        info!(count = snapshot.len(), "killing all tracked processes");

        for (id, weak) in &snapshot {
            let Some(control) = weak.upgrade() else {
                debug!(id, "kill_all: handle already released");
                continue;
            };

            if control.has_exited() {
                continue;
            }

            if let Err(e) = control.request_kill() {
                debug!(
                    id,
                    pid = ?control.pid(),
                    error = %e,
                    "kill_all: termination request failed; continuing"
                );
            }
        }

        let mut members = self.lock();
        for (id, _) in snapshot {
            members.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// OS pids of the tracked processes that are still alive.
    pub fn pids(&self) -> Vec<u32> {
        self.lock()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|c| !c.has_exited())
            .filter_map(|c| c.pid())
            .collect()
    }

    fn unregister(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!(id, "unregistered process");
        }
    }

    // Critical sections never leave the map half-updated, so a poisoned lock
    // is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Membership guard returned by [`ProcessRegistry::register`].
#[derive(Debug)]
pub struct Registration {
    registry: ProcessRegistry,
    id: u64,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
