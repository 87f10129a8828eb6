use hearth_core::Record;

use crate::StorageError;

pub fn encode_record<R: Record>(record: &R) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(record)?)
}

pub fn decode_record<R: Record>(bytes: &[u8]) -> Result<R, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}
