use crate::StorageError;

pub const RECORD_KEY_SEPARATOR: u8 = 0;

/// `actor \0 collection \0 id`, so one actor's collection is a contiguous range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey<'a> {
    pub actor: &'a str,
    pub collection: &'a str,
    pub id: &'a str,
}

impl<'a> RecordKey<'a> {
    pub fn new(actor: &'a str, collection: &'a str, id: &'a str) -> Self {
        Self {
            actor,
            collection,
            id,
        }
    }

    pub fn validate_segment(segment: &str) -> Result<(), StorageError> {
        if segment.is_empty() || segment.as_bytes().contains(&RECORD_KEY_SEPARATOR) {
            return Err(StorageError::InvalidKey(segment.to_string()));
        }
        Ok(())
    }

    pub fn prefix_for_collection(actor: &str, collection: &str) -> Result<Vec<u8>, StorageError> {
        Self::validate_segment(actor)?;
        Self::validate_segment(collection)?;
        let mut prefix = Vec::with_capacity(actor.len() + collection.len() + 2);
        prefix.extend_from_slice(actor.as_bytes());
        prefix.push(RECORD_KEY_SEPARATOR);
        prefix.extend_from_slice(collection.as_bytes());
        prefix.push(RECORD_KEY_SEPARATOR);
        Ok(prefix)
    }

    /// Half-open byte range covering every id in `actor`'s `collection`.
    pub fn range_for_collection(
        actor: &str,
        collection: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), StorageError> {
        let start = Self::prefix_for_collection(actor, collection)?;
        let mut end = start.clone();
        if let Some(last) = end.last_mut() {
            *last = RECORD_KEY_SEPARATOR + 1;
        }
        Ok((start, end))
    }

    pub fn to_bytes(self) -> Result<Vec<u8>, StorageError> {
        Self::validate_segment(self.id)?;
        let mut key = Self::prefix_for_collection(self.actor, self.collection)?;
        key.extend_from_slice(self.id.as_bytes());
        Ok(key)
    }
}
