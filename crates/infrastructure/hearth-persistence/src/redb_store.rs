use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use hearth_core::ActorId;
use redb::{Database, ReadableTable, TableDefinition};

use crate::api::{CURRENT_SCHEMA, HEARTH_REDB_FILENAME};
use crate::maintenance::quarantine_corrupt_file;
use crate::record_key::RecordKey;
use crate::{HouseholdStore, StorageError};

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

const FORMAT_KEY: &str = "format";
const FORMAT: &str = "hearth-redb";
const SCHEMA_KEY: &str = "schema_version";
const CREATED_AT_KEY: &str = "created_at";

/// redb-backed store: one file per data directory, opened once per process
/// and shared by cloning.
#[derive(Clone)]
pub struct RedbHouseholdStore {
    db: Arc<Database>,
    path: Utf8PathBuf,
}

impl RedbHouseholdStore {
    pub fn path_for_dir(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(HEARTH_REDB_FILENAME)
    }

    /// Opens (or creates) the store. A corrupt file is quarantined and
    /// reported as [`StorageError::Corrupt`].
    pub fn open(dir: &Utf8Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_for_dir(dir);

        let opened = Database::create(path.as_std_path())
            .map_err(|e| {
                if unreadable(&e) {
                    StorageError::Corrupt
                } else {
                    e.into()
                }
            })
            .and_then(|db| stamp_or_check_schema(&db).map(|()| db));

        match opened {
            Ok(db) => {
                tracing::debug!(path = %path, "household store opened");
                Ok(Self {
                    db: Arc::new(db),
                    path,
                })
            }
            Err(StorageError::Corrupt) => {
                if let Err(e) = quarantine_corrupt_file(&path) {
                    tracing::error!(path = %path, "could not quarantine corrupt store: {e}");
                }
                Err(StorageError::Corrupt)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`open`](Self::open), but starts over with an empty file when the
    /// existing one was corrupt.
    pub fn open_or_recover(dir: &Utf8Path) -> Result<Self, StorageError> {
        match Self::open(dir) {
            Err(StorageError::Corrupt) => Self::open(dir),
            other => other,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

fn unreadable(err: &redb::DatabaseError) -> bool {
    let redb::DatabaseError::Storage(storage) = err else {
        return false;
    };
    match storage {
        redb::StorageError::Corrupted(_) => true,
        redb::StorageError::Io(io) => matches!(
            io.kind(),
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Stamps a fresh file with the format marker and schema version, or checks
/// an existing file's stamp. Runs in a single write transaction.
fn stamp_or_check_schema(db: &Database) -> Result<(), StorageError> {
    let tx = db.begin_write()?;
    {
        let mut meta = tx.open_table(META)?;
        let format = meta.get(FORMAT_KEY)?.map(|g| g.value().to_owned());
        match format.as_deref() {
            None => {
                let version = CURRENT_SCHEMA.to_string();
                let created_at = Utc::now().to_rfc3339();
                meta.insert(FORMAT_KEY, FORMAT)?;
                meta.insert(SCHEMA_KEY, version.as_str())?;
                meta.insert(CREATED_AT_KEY, created_at.as_str())?;
            }
            Some(FORMAT) => {
                let found = meta
                    .get(SCHEMA_KEY)?
                    .and_then(|g| g.value().parse::<u32>().ok())
                    .ok_or(StorageError::Corrupt)?;
                if found > CURRENT_SCHEMA {
                    return Err(StorageError::NewerSchema {
                        found,
                        supported: CURRENT_SCHEMA,
                    });
                }
            }
            Some(_) => return Err(StorageError::Corrupt),
        }
        tx.open_table(RECORDS)?;
    }
    tx.commit()?;
    Ok(())
}

impl HouseholdStore for RedbHouseholdStore {
    fn list_raw(&self, actor: &ActorId, collection: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let (start, end) = RecordKey::range_for_collection(actor.as_str(), collection)?;
        let read_tx = self.db.begin_read()?;
        let records = read_tx.open_table(RECORDS)?;
        let mut out = Vec::new();
        for row in records.range(start.as_slice()..end.as_slice())? {
            let (_, v) = row?;
            out.push(v.value().to_vec());
        }
        Ok(out)
    }

    fn get_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let read_tx = self.db.begin_read()?;
        let records = read_tx.open_table(RECORDS)?;
        let value = records.get(key.as_slice())?.map(|g| g.value().to_vec());
        Ok(value)
    }

    fn put_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
        value: &[u8],
    ) -> Result<(), StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let write_tx = self.db.begin_write()?;
        {
            let mut records = write_tx.open_table(RECORDS)?;
            records.insert(key.as_slice(), value)?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn delete_raw(
        &self,
        actor: &ActorId,
        collection: &str,
        id: &str,
    ) -> Result<bool, StorageError> {
        let key = RecordKey::new(actor.as_str(), collection, id).to_bytes()?;
        let write_tx = self.db.begin_write()?;
        let removed = {
            let mut records = write_tx.open_table(RECORDS)?;
            let removed = records.remove(key.as_slice())?.is_some();
            removed
        };
        write_tx.commit()?;
        Ok(removed)
    }
}
