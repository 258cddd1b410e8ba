//! Persistent storage for pillbot data.
//!
//! One JSON file per collection under the data directory. Collections are
//! loaded whole at startup and written through on every mutation; writes go
//! to a temp file first and are renamed into place so a crash mid-write
//! never truncates a collection. A missing file is an empty collection.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::accounts::{Session, UserAccount};
use crate::dose::DoseLog;
use crate::error::{CoreError, Result};
use crate::medicine::Medicine;
use crate::reconcile::DeviceBinding;

/// Storage backend for pillbot data.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance rooted at `data_dir`.
    #[must_use]
    pub const fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Storage rooted at the platform default data directory.
    #[must_use]
    pub fn at_default_dir() -> Self {
        Self::new(crate::config::default_data_dir())
    }

    /// The directory this store writes to.
    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    // =========================================================================
    // TYPED COLLECTIONS
    // =========================================================================

    /// Load all user accounts.
    pub fn load_users(&self) -> Result<Vec<UserAccount>> {
        self.load_collection("users")
    }

    /// Save all user accounts.
    pub fn save_users(&self, users: &[UserAccount]) -> Result<()> {
        self.save_collection("users", users)
    }

    /// Load all sessions.
    pub fn load_sessions(&self) -> Result<Vec<Session>> {
        self.load_collection("sessions")
    }

    /// Save all sessions.
    pub fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        self.save_collection("sessions", sessions)
    }

    /// Load all medicines.
    pub fn load_medicines(&self) -> Result<Vec<Medicine>> {
        self.load_collection("medicines")
    }

    /// Save all medicines.
    pub fn save_medicines(&self, medicines: &[Medicine]) -> Result<()> {
        self.save_collection("medicines", medicines)
    }

    /// Load the dose-log ledger.
    pub fn load_dose_logs(&self) -> Result<Vec<DoseLog>> {
        self.load_collection("dose_logs")
    }

    /// Save the dose-log ledger.
    pub fn save_dose_logs(&self, logs: &[DoseLog]) -> Result<()> {
        self.save_collection("dose_logs", logs)
    }

    /// Load hardware device bindings.
    pub fn load_device_bindings(&self) -> Result<Vec<DeviceBinding>> {
        self.load_collection("devices")
    }

    /// Save hardware device bindings.
    pub fn save_device_bindings(&self, bindings: &[DeviceBinding]) -> Result<()> {
        self.save_collection("devices", bindings)
    }

    // =========================================================================
    // GENERIC FILE HANDLING
    // =========================================================================

    fn load_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.collection_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let items: Vec<T> = serde_json::from_str(&content).map_err(|e| {
            CoreError::PersistenceError(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(items)
    }

    fn save_collection<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.collection_path(name);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(items)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }
}
