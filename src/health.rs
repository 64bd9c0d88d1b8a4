//! Liveness reporting for long-running components.
//!
//! A component registers itself with a [`Registry`] and consumes heartbeats
//! from the returned [`Liveness`] handle inside its main loop. A component
//! that stops consuming heartbeats for longer than the deadline is marked
//! unhealthy until it catches up again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const HEARTBEAT_DEADLINE: Duration = Duration::from_secs(30);

/// Reported liveness of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Healthy,
    Unhealthy,
}

/// Tracks the liveness of registered components.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct Registry {
    statuses: Arc<Mutex<HashMap<String, Status>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component and returns the handle it must consume
    /// heartbeats from.
    pub fn register_liveness(&self, name: impl Into<String>) -> Liveness {
        let name = name.into();
        let (tx, rx) = mpsc::channel(1);

        self.statuses
            .lock()
            .expect("health registry lock poisoned")
            .insert(name.clone(), Status::Healthy);

        tokio::spawn(watch(name.clone(), tx, Arc::clone(&self.statuses)));

        Liveness {
            name,
            rx,
            statuses: Arc::clone(&self.statuses),
        }
    }

    /// Returns the status of a registered component, or `None` if no
    /// component with that name is registered.
    pub fn status(&self, name: &str) -> Option<Status> {
        self.statuses
            .lock()
            .expect("health registry lock poisoned")
            .get(name)
            .copied()
    }

    pub fn statuses(&self) -> HashMap<String, Status> {
        self.statuses
            .lock()
            .expect("health registry lock poisoned")
            .clone()
    }
}

async fn watch(name: String, tx: mpsc::Sender<()>, statuses: Arc<Mutex<HashMap<String, Status>>>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        ticker.tick().await;

        match tokio::time::timeout(HEARTBEAT_DEADLINE, tx.send(())).await {
            Ok(Ok(())) => set_status(&statuses, &name, Status::Healthy),
            Ok(Err(_)) => {
                // Handle dropped without deregistering; stop watching.
                log::debug!("liveness handle for `{name}` dropped without deregistering");
                statuses
                    .lock()
                    .expect("health registry lock poisoned")
                    .remove(&name);
                return;
            }
            Err(_) => set_status(&statuses, &name, Status::Unhealthy),
        }
    }
}

fn set_status(statuses: &Mutex<HashMap<String, Status>>, name: &str, status: Status) {
    let mut statuses = statuses.lock().expect("health registry lock poisoned");
    let previous = statuses.insert(name.to_owned(), status);

    if previous != Some(status) && status == Status::Unhealthy {
        log::warn!("component `{name}` missed its liveness deadline");
    }
}

/// Heartbeat handle held by a registered component.
pub struct Liveness {
    name: String,
    rx: mpsc::Receiver<()>,
    statuses: Arc<Mutex<HashMap<String, Status>>>,
}

impl Liveness {
    /// Consumes the next heartbeat. Intended as an arm of the component's
    /// `select!` loop.
    pub async fn tick(&mut self) {
        let _ = self.rx.recv().await;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Removes the component from the registry and stops its watcher.
    pub fn deregister(self) {
        self.statuses
            .lock()
            .expect("health registry lock poisoned")
            .remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_register_reports_healthy() {
        let registry = Registry::new();
        let mut liveness = registry.register_liveness("store");

        assert_eq!(registry.status("store"), Some(Status::Healthy));
        liveness.tick().await;
        assert_eq!(registry.status("store"), Some(Status::Healthy));

        liveness.deregister();
        assert_eq!(registry.status("store"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_deadline_marks_unhealthy() {
        let registry = Registry::new();
        let mut liveness = registry.register_liveness("store");

        // The first heartbeat buffers in the channel; the deadline clock
        // starts once a heartbeat actually blocks, one interval in.
        tokio::time::sleep(HEARTBEAT_INTERVAL + HEARTBEAT_DEADLINE + Duration::from_secs(5)).await;
        assert_eq!(registry.status("store"), Some(Status::Unhealthy));

        // Catching up on heartbeats recovers the component.
        liveness.tick().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.status("store"), Some(Status::Healthy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_is_removed() {
        let registry = Registry::new();
        let liveness = registry.register_liveness("store");

        drop(liveness);
        tokio::time::sleep(HEARTBEAT_DEADLINE + HEARTBEAT_INTERVAL).await;
        assert_eq!(registry.status("store"), None);
    }
}
