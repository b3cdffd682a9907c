//! Vault configuration - session timing, KDF cost and master password policy

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::DEFAULT_KDF_ITERATIONS;
use crate::error::{Result, VaultError};

/// Categories a brand new vault starts with
pub const DEFAULT_CATEGORIES: [&str; 5] = ["General", "Social Media", "Email", "Banking", "Work"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Auto-save cadence (seconds)
    pub auto_save_interval_secs: u64,

    /// PBKDF2-HMAC-SHA256 rounds. Files only open with the count they were written with.
    pub kdf_iterations: u32,

    /// Minimum master password length for new vaults and password changes
    pub min_master_password_length: usize,

    /// Categories seeded into a newly created vault
    pub default_categories: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            auto_save_interval_secs: 300, // 5 minutes
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            min_master_password_length: 8,
            default_categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl VaultConfig {
    /// Cheap KDF, short auto-save interval. Vaults written with this are NOT
    /// readable with the default configuration.
    pub fn fast_for_tests() -> Self {
        Self {
            auto_save_interval_secs: 1,
            kdf_iterations: 1_000,
            ..Default::default()
        }
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }

    /// Checks a prospective master password against the policy
    pub fn validate_master_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_master_password_length {
            return Err(VaultError::WeakMasterPassword(format!(
                "must be at least {} characters",
                self.min_master_password_length
            )));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: VaultConfig =
            serde_json::from_str(&json).map_err(|e| VaultError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Loads `path` if given, else the per-user config file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(p) if p.exists() => Self::load(p),
            _ => Ok(Self::default()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| VaultError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `<config dir>/securevault/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("securevault").join("config.json"))
    }

    fn check(&self) -> Result<()> {
        if self.kdf_iterations == 0 {
            return Err(VaultError::Config("kdf_iterations must be positive".into()));
        }
        if self.auto_save_interval_secs == 0 {
            return Err(VaultError::Config("auto_save_interval_secs must be positive".into()));
        }
        Ok(())
    }
}
