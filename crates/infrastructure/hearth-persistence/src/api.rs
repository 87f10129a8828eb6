use hearth_core::{ActorId, Record};

use crate::codec::{decode_record, encode_record};
use crate::StorageError;

pub const HEARTH_REDB_FILENAME: &str = "hearth.redb";
pub const CURRENT_SCHEMA: u32 = 1;

/// Per-actor record storage. Opaque to the command pipeline: handlers and
/// views call it, nothing coordinates transactions across calls.
pub trait HouseholdStore: Send + Sync + 'static {
    fn list_raw(&self, actor: &ActorId, collection: &str) -> Result<Vec<Vec<u8>>, StorageError>;

    fn get_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    fn put_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
        value: &[u8],
    ) -> Result<(), StorageError>;

    /// Returns whether a record was removed.
    fn delete_raw(&self, actor: &ActorId, collection: &str, id: &str)
        -> Result<bool, StorageError>;
}

/// Typed access on top of [`HouseholdStore`].
pub trait RecordStoreExt {
    fn list<R: Record>(&self, actor: &ActorId) -> Result<Vec<R>, StorageError>;
    fn get<R: Record>(&self, actor: &ActorId, id: &str) -> Result<Option<R>, StorageError>;
    fn put<R: Record>(&self, actor: &ActorId, record: &R) -> Result<(), StorageError>;
    fn delete<R: Record>(&self, actor: &ActorId, id: &str) -> Result<bool, StorageError>;
}

impl<S: HouseholdStore + ?Sized> RecordStoreExt for S {
    fn list<R: Record>(&self, actor: &ActorId) -> Result<Vec<R>, StorageError> {
        self.list_raw(actor, R::COLLECTION)?
            .iter()
            .map(|bytes| decode_record(bytes))
            .collect()
    }

    fn get<R: Record>(&self, actor: &ActorId, id: &str) -> Result<Option<R>, StorageError> {
        self.get_raw(actor, R::COLLECTION, id)?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    fn put<R: Record>(&self, actor: &ActorId, record: &R) -> Result<(), StorageError> {
        let bytes = encode_record(record)?;
        self.put_raw(actor, R::COLLECTION, record.id(), &bytes)
    }

    fn delete<R: Record>(&self, actor: &ActorId, id: &str) -> Result<bool, StorageError> {
        self.delete_raw(actor, R::COLLECTION, id)
    }
}
