use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hearth_core::{ConnectionId, ValidationErrors};
use tracing::debug;

struct Entry {
    errors: ValidationErrors,
    stored_at: Instant,
}

/// Last validation failure per connection, read at most once.
///
/// Ephemeral: entries are dropped when read, when the connection's live
/// view closes, on the next successful submission, or once they outlive the
/// TTL.
pub struct ValidationErrorStore {
    ttl: Duration,
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

impl Default for ValidationErrorStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(hearth_config::DEFAULT_VALIDATION_TTL_SECS))
    }
}

impl ValidationErrorStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces any record already held for `connection`.
    pub fn store(&self, connection: &ConnectionId, errors: ValidationErrors) {
        let mut entries = self.entries.lock().expect("validation store lock poisoned");
        let ttl = self.ttl;
        entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        entries.insert(
            connection.clone(),
            Entry {
                errors,
                stored_at: Instant::now(),
            },
        );
    }

    /// Read-and-clear. Expired records read as absent.
    pub fn take(&self, connection: &ConnectionId) -> Option<ValidationErrors> {
        let entry = self
            .entries
            .lock()
            .expect("validation store lock poisoned")
            .remove(connection)?;
        if entry.stored_at.elapsed() >= self.ttl {
            debug!(%connection, "validation record expired before it was read");
            return None;
        }
        Some(entry.errors)
    }

    /// Returns whether a record was dropped.
    pub fn clear(&self, connection: &ConnectionId) -> bool {
        self.entries
            .lock()
            .expect("validation store lock poisoned")
            .remove(connection)
            .is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().expect("validation store lock poisoned");
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("validation store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
