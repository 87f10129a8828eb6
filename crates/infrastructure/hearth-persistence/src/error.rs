#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{} is invalid or corrupt", crate::HEARTH_REDB_FILENAME)]
    Corrupt,
    #[error(
        "household data was written by a newer Hearth \
         (schema {found}, this build reads up to {supported})"
    )]
    NewerSchema { found: u32, supported: u32 },
    #[error("household store is held by another process")]
    Busy,
    #[error("invalid record key segment: {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("redb: {0}")]
    Backend(Box<redb::Error>),
}

impl From<redb::Error> for StorageError {
    fn from(value: redb::Error) -> Self {
        match value {
            redb::Error::DatabaseAlreadyOpen => Self::Busy,
            other => Self::Backend(Box::new(other)),
        }
    }
}

// Every redb error type folds into `redb::Error` first.
macro_rules! from_redb {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(value: $ty) -> Self {
                    redb::Error::from(value).into()
                }
            }
        )+
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
