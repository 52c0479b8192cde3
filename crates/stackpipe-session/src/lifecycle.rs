use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::reaper::ShutdownTrigger;

/// Registry of live sessions' shutdown triggers.
///
/// A signal handler (or any other shutdown path) calls
/// [`shutdown_all`](Lifecycle::shutdown_all) to kill every registered worker.
/// Once shut down, the registry fires new registrations immediately.
#[derive(Debug, Default)]
pub struct Lifecycle {
    next_id: AtomicU64,
    shutdown: AtomicBool,
    triggers: Mutex<HashMap<u64, ShutdownTrigger>>,
}

static GLOBAL: OnceLock<Arc<Lifecycle>> = OnceLock::new();

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Lifecycle> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Lifecycle::new())))
    }

    /// Register a trigger until the returned [`Registration`] is dropped.
    pub fn register(self: &Arc<Self>, trigger: ShutdownTrigger) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut triggers = self.lock();
            triggers.insert(id, trigger.clone());
        }
        if self.shutdown.load(Ordering::SeqCst) {
            trigger.fire();
        }
        Registration {
            id,
            owner: Arc::clone(self),
        }
    }

    /// Fire every registered trigger and mark the registry as shut down.
    ///
    /// Returns how many triggers fired.
    pub fn shutdown_all(&self) -> usize {
        self.shutdown.store(true, Ordering::SeqCst);
        let triggers: Vec<ShutdownTrigger> = self.lock().values().cloned().collect();
        tracing::info!(sessions = triggers.len(), "shutting down active sessions");
        for trigger in &triggers {
            trigger.fire();
        }
        triggers.len()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of registered triggers.
    pub fn active(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ShutdownTrigger>> {
        match self.triggers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Deregisters its trigger from the owning [`Lifecycle`] on drop.
#[derive(Debug)]
pub struct Registration {
    id: u64,
    owner: Arc<Lifecycle>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.id);
    }
}
