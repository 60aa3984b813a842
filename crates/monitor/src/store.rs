//! Enrolled driver records persisted as a single postcard file

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use driver_auth::StoredRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Store file is corrupt: {0}")]
    Corrupt(postcard::Error),

    #[error("Serialization error: {0}")]
    Serialization(postcard::Error),

    #[error("Driver '{0}' is already enrolled")]
    Duplicate(String),

    #[error("License '{0}' is already registered")]
    DuplicateLicense(String),
}

/// One enrolled driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub record: StoredRecord,
    pub license_no: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    drivers: Vec<DriverEntry>,
}

/// Driver records keyed by identity, in enrollment order
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    file: StoreFile,
}

impl RecordStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = match fs::read(&path) {
            Ok(bytes) => postcard::from_bytes(&bytes).map_err(StoreError::Corrupt)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", path.display());
                StoreFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[DriverEntry] {
        &self.file.drivers
    }

    /// Stored records, ready for a gallery rebuild
    pub fn records(&self) -> Vec<StoredRecord> {
        self.file.drivers.iter().map(|d| d.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.file.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.drivers.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.file.drivers.iter().any(|d| d.record.identity == identity)
    }

    /// Add a driver; identity and license number must be unique
    pub fn add(&mut self, record: StoredRecord, license_no: Option<String>) -> Result<(), StoreError> {
        if self.contains(&record.identity) {
            return Err(StoreError::Duplicate(record.identity));
        }
        if let Some(license) = &license_no {
            if self.file.drivers.iter().any(|d| d.license_no.as_ref() == Some(license)) {
                return Err(StoreError::DuplicateLicense(license.clone()));
            }
        }
        info!("Driver '{}' added to store", record.identity);
        self.file.drivers.push(DriverEntry { record, license_no });
        Ok(())
    }

    /// Remove a driver by identity; returns whether one was removed
    pub fn remove(&mut self, identity: &str) -> bool {
        let before = self.file.drivers.len();
        self.file.drivers.retain(|d| d.record.identity != identity);
        let removed = self.file.drivers.len() != before;
        if removed {
            info!("Driver '{}' removed from store", identity);
        }
        removed
    }

    /// Write the store back to disk
    pub fn save(&self) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(&self.file).map_err(StoreError::Serialization)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved {} driver(s) to {}", self.len(), self.path.display());
        Ok(())
    }
}
