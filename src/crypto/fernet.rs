//! Fernet tokens: AES-128-CBC + HMAC-SHA256, encrypt-then-MAC
//!
//! ```text
//! 0x80 | timestamp (u64 BE) | IV (16) | ciphertext (n*16) | HMAC-SHA256 (32)
//! ```
//! The whole token is URL-safe base64 (padded). The HMAC covers everything
//! before it and is checked before any decryption happens.

use aes::Aes128;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{fill_random, VaultKey};
use crate::error::{Result, VaultError};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 8 + IV_LEN;

/// Encrypts `plaintext` into an ASCII Fernet token
pub fn encrypt(plaintext: &[u8], key: &VaultKey) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_LEN];
    fill_random(&mut iv)?;
    let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
    encrypt_with(plaintext, key, &iv, timestamp)
}

fn encrypt_with(plaintext: &[u8], key: &VaultKey, iv: &[u8; IV_LEN], timestamp: u64) -> Result<Vec<u8>> {
    let cipher = Aes128CbcEnc::new_from_slices(key.encryption_key(), iv)
        .map_err(|e| VaultError::Crypto(format!("AES init failed: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
    token.push(VERSION);
    token.extend_from_slice(&timestamp.to_be_bytes());
    token.extend_from_slice(iv);
    token.extend_from_slice(&ciphertext);

    let mut mac = HmacSha256::new_from_slice(key.signing_key())
        .map_err(|e| VaultError::Crypto(format!("HMAC init failed: {}", e)))?;
    mac.update(&token);
    token.extend_from_slice(&mac.finalize().into_bytes());

    Ok(URL_SAFE.encode(token).into_bytes())
}

/// Verifies and decrypts a Fernet token.
///
/// Every failure (bad base64, wrong version, truncated token, HMAC mismatch,
/// bad padding) is reported as the same `AuthenticationFailure`.
pub fn decrypt(token: &[u8], key: &VaultKey) -> Result<Vec<u8>> {
    let raw = URL_SAFE
        .decode(trim_ascii(token))
        .map_err(|_| VaultError::AuthenticationFailure)?;

    if raw.len() < HEADER_LEN + BLOCK_LEN + MAC_LEN || raw[0] != VERSION {
        return Err(VaultError::AuthenticationFailure);
    }
    let (signed, tag) = raw.split_at(raw.len() - MAC_LEN);
    let ciphertext = &signed[HEADER_LEN..];
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(VaultError::AuthenticationFailure);
    }

    let mut mac = HmacSha256::new_from_slice(key.signing_key())
        .map_err(|_| VaultError::AuthenticationFailure)?;
    mac.update(signed);
    mac.verify_slice(tag)
        .map_err(|_| VaultError::AuthenticationFailure)?;

    let iv = &signed[1 + 8..HEADER_LEN];
    Aes128CbcDec::new_from_slices(key.encryption_key(), iv)
        .map_err(|_| VaultError::AuthenticationFailure)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::AuthenticationFailure)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}
