//! wardgate-store: Patient/visitor records and their photos.
//!
//! Records live in SQLite behind a [`tokio_rusqlite::Connection`]; every
//! query runs with scoped access on the connection's own thread, so async
//! handlers never share a cursor. Photos live in two plain directories
//! managed by [`MediaStore`].

pub mod code;
mod media;
mod records;
mod schema;

pub use code::{derive_patient_code, has_code_length, CodeError, PATIENT_CODE_LEN};
pub use media::{MediaError, MediaStore};
pub use records::{NewPatient, NewVisitor, Patient, Visitor};
pub use schema::SCHEMA;

use std::path::Path;
use thiserror::Error;

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async handle to the patient/visitor database. Cheap to clone.
#[derive(Clone)]
pub struct RecordStore {
    conn: tokio_rusqlite::Connection,
}

impl RecordStore {
    /// Open the database at `path`, creating the file and schema if needed.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.initialize().await?;
        tracing::info!(path = %path.display(), "record store opened");
        Ok(store)
    }

    /// In-memory database (for testing).
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> StoreResult<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
