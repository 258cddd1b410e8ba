//! Application state shared across handlers.

use std::sync::Arc;

use pillbot_core::{
    AccountManager, DeviceGateway, DoseLedger, MedicineRegistry, ServerConfig, Storage,
};
use tokio::sync::RwLock;

/// Shared application state. All handlers read or write through the lock;
/// taking the write lock serializes domain mutations, which is what makes
/// the terminal-status check on dose logs an atomic compare-and-act.
pub type SharedState = Arc<RwLock<AppState>>;

/// The state behind the lock.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Patient accounts and sessions.
    pub accounts: AccountManager,
    /// Medicine definitions.
    pub medicines: MedicineRegistry,
    /// Dose-log ledger.
    pub ledger: DoseLedger,
    /// Hardware device bindings.
    pub gateway: DeviceGateway,
}

impl AppState {
    /// Build state from configuration, loading all collections from the
    /// configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error when a collection file exists but cannot be read.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let storage = Storage::new(config.data_dir.clone());
        let accounts = AccountManager::load(storage.clone(), config.session_ttl_hours)?;
        let medicines = MedicineRegistry::load(storage.clone())?;
        let ledger = DoseLedger::load(storage.clone())?;
        let gateway = DeviceGateway::load(storage)?;

        Ok(Self {
            config,
            accounts,
            medicines,
            ledger,
            gateway,
        })
    }

    /// Wrap the state for sharing with the router.
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
