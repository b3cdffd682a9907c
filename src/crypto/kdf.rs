//! PBKDF2-HMAC-SHA256 derivation of the vault key from the master password

use std::time::Instant;

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::{Salt, VaultKey, KEY_LEN};

/// Iteration count of every vault written with the default configuration
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Deterministic: the same (password, salt, iterations) always yields the same key.
/// There is no stored password hash; a successful decrypt is the verification.
pub fn derive_key(password: &SecretString, salt: &Salt, iterations: u32) -> VaultKey {
    let started = Instant::now();

    let mut output = Box::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut output[..],
    );

    tracing::debug!(
        iterations,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "derived vault key"
    );

    VaultKey::from_bytes(output)
}
