use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use hearth_core::ActorId;

use crate::record_key::RecordKey;
use crate::{HouseholdStore, StorageError};

/// Process-local store. Lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryHouseholdStore {
    rows: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryHouseholdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HouseholdStore for MemoryHouseholdStore {
    fn list_raw(&self, actor: &ActorId, collection: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let (start, end) = RecordKey::range_for_collection(actor.as_str(), collection)?;
        let rows = self.rows.lock().expect("memory store lock poisoned");
        Ok(rows.range(start..end).map(|(_, v)| v.clone()).collect())
    }

    fn get_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let rows = self.rows.lock().expect("memory store lock poisoned");
        Ok(rows.get(&key).cloned())
    }

    fn put_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
        value: &[u8],
    ) -> Result<(), StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let mut rows = self.rows.lock().expect("memory store lock poisoned");
        rows.insert(key, value.to_vec());
        Ok(())
    }

    fn delete_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
    ) -> Result<bool, StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let mut rows = self.rows.lock().expect("memory store lock poisoned");
        Ok(rows.remove(&key).is_some())
    }
}
