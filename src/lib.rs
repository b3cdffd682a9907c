//! # SecureVault
//!
//! Local, single-user password vault.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       SECUREVAULT                        │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │   SESSION   │──▶│  VAULT FILE  │──▶│    CRYPTO     │  │
//! │  │ lock/dirty  │   │ salt + token │   │ PBKDF2/Fernet │  │
//! │  └──────┬──────┘   └──────┬───────┘   └───────────────┘  │
//! │         │                 │                              │
//! │  ┌──────┴──────┐   ┌──────┴───────┐   ┌───────────────┐  │
//! │  │  SCHEDULER  │   │ ENTRY STORE  │   │   PASSGEN     │  │
//! │  │  auto-save  │   │ CRUD/search  │   │ gen/strength  │  │
//! │  └─────────────┘   └──────────────┘   └───────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Key: PBKDF2-HMAC-SHA256 (600 000 rounds) over the master password and a
//!   16-byte random salt stored at the head of the file
//! - Payload: one Fernet token (AES-128-CBC + HMAC-SHA256)
//! - No stored password hash; a successful decrypt is the verification
//! - Wrong password and tampered file are reported identically
//! - Keys and decrypted entries are zeroized on lock and drop

pub mod config;
pub mod crypto;
pub mod error;
pub mod passgen;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod vault_file;

pub use config::{VaultConfig, DEFAULT_CATEGORIES};
pub use error::{Result, VaultError};
pub use passgen::{estimate_strength, generate_password, PasswordPolicy, StrengthReport};
pub use scheduler::{AutoSaveTask, AutoSaveTimer, SharedSession};
pub use session::{AutoSaveOutcome, LockState, Session, SessionEvent};
pub use store::{Entry, EntryData, EntryStore};
pub use vault_file::FORMAT_VERSION;

/// SecureVault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
