//! In-memory store of recent preflight rejections.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::violation::PolicyViolation;

/// Maximum number of events to store.
const MAX_EVENTS: usize = 100;

/// One rejected run.
#[derive(Debug, Clone)]
pub struct SandboxViolationEvent {
    /// Profile that rejected the run.
    pub profile: String,
    /// Source path for file runs.
    pub path: Option<String>,
    /// Everything the preflight found.
    pub violations: Vec<PolicyViolation>,
    /// When the rejection happened.
    pub timestamp: std::time::SystemTime,
}

impl SandboxViolationEvent {
    /// Create a new violation event.
    pub fn new(profile: &str, path: Option<String>, violations: Vec<PolicyViolation>) -> Self {
        Self {
            profile: profile.to_string(),
            path,
            violations,
            timestamp: std::time::SystemTime::now(),
        }
    }
}

/// Type for violation listeners.
pub type ViolationListener = Box<dyn Fn(&SandboxViolationEvent) + Send + Sync>;

/// Bounded in-memory store for rejected runs.
pub struct SandboxViolationStore {
    events: RwLock<Vec<SandboxViolationEvent>>,
    total_count: RwLock<usize>,
    listeners: RwLock<Vec<Arc<ViolationListener>>>,
}

impl Default for SandboxViolationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxViolationStore {
    /// Create a new violation store.
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            total_count: RwLock::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Add an event to the store.
    pub fn add(&self, event: SandboxViolationEvent) {
        let listeners = self.listeners.read();
        for listener in listeners.iter() {
            listener(&event);
        }
        drop(listeners);

        let mut events = self.events.write();
        let mut total = self.total_count.write();

        events.push(event);
        *total += 1;

        if events.len() > MAX_EVENTS {
            events.remove(0);
        }
    }

    /// Get stored events, oldest first (up to a limit).
    pub fn events(&self, limit: Option<usize>) -> Vec<SandboxViolationEvent> {
        let events = self.events.read();
        let limit = limit.unwrap_or(events.len());
        events.iter().take(limit).cloned().collect()
    }

    /// Get the current count of stored events.
    pub fn count(&self) -> usize {
        self.events.read().len()
    }

    /// Get the total count of all events (including trimmed).
    pub fn total_count(&self) -> usize {
        *self.total_count.read()
    }

    /// Get events for a specific source path.
    pub fn events_for_path(&self, path: &str) -> Vec<SandboxViolationEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.path.as_deref() == Some(path))
            .cloned()
            .collect()
    }

    /// Clear all events.
    pub fn clear(&self) {
        let mut events = self.events.write();
        let mut total = self.total_count.write();
        events.clear();
        *total = 0;
    }

    /// Subscribe to new events. Returns the listener id.
    pub fn subscribe(&self, listener: ViolationListener) -> usize {
        let mut listeners = self.listeners.write();
        let id = listeners.len();
        listeners.push(Arc::new(listener));
        id
    }
}
