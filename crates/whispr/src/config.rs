//! Server configuration.
//!
//! Settings come from three places, later ones winning: built-in
//! defaults, an optional JSON file, and command-line flags (or their
//! environment variables) on the `whispr-server` binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use whispr_session::{FileUserStore, MemoryUserStore, StoreError, UserStore};

use crate::WhisprError;

/// Listen address used when nothing else is configured.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5555";

/// Settings for [`WhisprServer`](crate::WhisprServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Where accounts are persisted. `None` keeps them in memory only.
    pub users_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            users_file: None,
        }
    }
}

impl ServerConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WhisprError> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Opens the user store this config describes.
    pub fn open_store(&self) -> Result<Box<dyn UserStore>, StoreError> {
        Ok(match &self.users_file {
            Some(path) => Box::new(FileUserStore::open(path)?),
            None => Box::new(MemoryUserStore::new()),
        })
    }
}
