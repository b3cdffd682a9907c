//! Error types for SecureVault

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong master password or a corrupted/tampered vault file.
    /// Both causes produce this same variant.
    #[error("Incorrect password or corrupted file")]
    AuthenticationFailure,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Decryption succeeded but the payload is not a valid vault document.
    /// Never leaves `VaultFile::load`; it is folded into `AuthenticationFailure` there.
    #[error("Vault payload is malformed")]
    MalformedPayload,

    #[error("Vault is locked - unlock it first")]
    NotUnlocked,

    #[error("No entry with id {0}")]
    InvalidReference(usize),

    #[error("No file path set for this vault - choose one to save")]
    NoFilePath,

    #[error("Master password rejected: {0}")]
    WeakMasterPassword(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// Errors that a caller may retry without changing its inputs
    /// (e.g. the disk was full or the target directory was briefly unavailable).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Errors that mean the vault file itself can't be trusted
    pub fn is_untrusted_source(&self) -> bool {
        matches!(self, Self::AuthenticationFailure | Self::MalformedPayload)
    }
}
