//! Crypto module - PBKDF2 key derivation and Fernet authenticated encryption

mod fernet;
mod kdf;

pub use fernet::{decrypt, encrypt};
pub use kdf::{derive_key, DEFAULT_KDF_ITERATIONS};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Salt length stored at the head of every vault file
pub const SALT_LEN: usize = 16;

/// Derived key length (Fernet: 16 bytes signing + 16 bytes encryption)
pub const KEY_LEN: usize = 32;

pub type Salt = [u8; SALT_LEN];

/// Symmetric vault key. Zeroized on drop.
pub struct VaultKey(SecretBox<[u8; KEY_LEN]>);

impl VaultKey {
    pub fn from_bytes(bytes: Box<[u8; KEY_LEN]>) -> Self {
        Self(SecretBox::new(bytes))
    }

    /// Parses the URL-safe base64 text form used by Fernet tooling
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            URL_SAFE
                .decode(encoded.trim())
                .map_err(|_| VaultError::Crypto("key is not valid url-safe base64".into()))?,
        );
        if decoded.len() != KEY_LEN {
            return Err(VaultError::Crypto(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }
        let mut bytes = Box::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> SecretString {
        SecretString::from(URL_SAFE.encode(self.0.expose_secret()))
    }

    pub(crate) fn signing_key(&self) -> &[u8] {
        &self.0.expose_secret()[..16]
    }

    pub(crate) fn encryption_key(&self) -> &[u8] {
        &self.0.expose_secret()[16..]
    }

    /// Constant-time equality
    pub fn ct_eq(&self, other: &VaultKey) -> bool {
        self.0
            .expose_secret()
            .iter()
            .zip(other.0.expose_secret().iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// The live key of an unlocked vault together with the salt it was derived from
#[derive(Debug)]
pub struct KeyMaterial {
    key: VaultKey,
    salt: Salt,
}

impl KeyMaterial {
    /// Derives the key for an existing salt
    pub fn derive(password: &SecretString, salt: Salt, iterations: u32) -> Self {
        Self {
            key: derive_key(password, &salt, iterations),
            salt,
        }
    }

    /// Fresh salt + key, for a new vault or a master password change
    pub fn generate(password: &SecretString, iterations: u32) -> Result<Self> {
        let salt = generate_salt()?;
        Ok(Self::derive(password, salt, iterations))
    }

    pub fn key(&self) -> &VaultKey {
        &self.key
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

/// 16 bytes from the OS CSPRNG
pub fn generate_salt() -> Result<Salt> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    Ok(salt)
}

pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|e| VaultError::Crypto(format!("RNG failed: {}", e)))
}
