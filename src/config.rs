//! Configuration for persistbridge
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a bridge instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Namespace Configuration
    // -------------------------------------------------------------------------
    /// The single writable tree. Every script path, relative or absolute,
    /// is rewritten under this root:
    ///   "notes.txt"   -> {namespace_root}/notes.txt
    ///   "/db/users"   -> {namespace_root}/db/users
    pub namespace_root: String,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to sync the store WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// File name of the WAL inside each store directory
    pub wal_file_name: String,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// sync after every write (safest, slowest)
    EveryWrite,

    /// sync after N unsynced records (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace_root: "/Data".to_string(),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            wal_file_name: "wal.log".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the writable namespace root (must be absolute, e.g. "/Data")
    pub fn namespace_root(mut self, root: impl Into<String>) -> Self {
        self.config.namespace_root = root.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL file name used inside store directories
    pub fn wal_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.wal_file_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
