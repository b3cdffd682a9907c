//! Vault file framing and payload
//!
//! ```text
//! offset 0,  16 bytes : salt (raw)
//! offset 16, N bytes  : Fernet token (ASCII)
//! ```
//! No magic, no length prefix, no framing version. The schema version lives
//! inside the encrypted JSON document.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{self, KeyMaterial, Salt, SALT_LEN};
use crate::error::{Result, VaultError};
use crate::store::{Entry, EntryStore};

/// Schema version written into every payload
pub const FORMAT_VERSION: &str = "1.3";

#[derive(Serialize)]
struct PayloadOut<'a> {
    entries: &'a [Entry],
    categories: &'a [String],
    created: NaiveDateTime,
    version: &'a str,
}

#[derive(Deserialize)]
struct PayloadIn {
    #[serde(default)]
    entries: Vec<Entry>,
    categories: Option<Vec<String>>,
    #[serde(default)]
    version: Option<String>,
}

/// Serializes, encrypts and writes the store, replacing any existing file.
///
/// The salt written is always the one `material` was derived with.
pub fn save(path: &Path, material: &KeyMaterial, store: &EntryStore) -> Result<()> {
    let payload = PayloadOut {
        entries: store.entries(),
        categories: store.categories(),
        created: Local::now().naive_local(),
        version: FORMAT_VERSION,
    };
    let json = Zeroizing::new(
        serde_json::to_vec_pretty(&payload).map_err(|_| VaultError::MalformedPayload)?,
    );
    let token = crypto::encrypt(&json, material.key())?;

    let mut framed = Vec::with_capacity(SALT_LEN + token.len());
    framed.extend_from_slice(material.salt());
    framed.extend_from_slice(&token);

    write_atomic(path, &framed)?;
    tracing::debug!(path = %path.display(), entries = store.len(), "vault written");
    Ok(())
}

/// Reads, derives, decrypts and parses a vault file.
///
/// Only a failure to read the file surfaces as `Io`; everything after that
/// (short file, wrong password, tampering, bad JSON) is `AuthenticationFailure`.
pub fn load(
    path: &Path,
    password: &SecretString,
    iterations: u32,
    fallback_categories: &[String],
) -> Result<(EntryStore, KeyMaterial)> {
    let bytes = fs::read(path)?;
    if bytes.len() <= SALT_LEN {
        return Err(VaultError::AuthenticationFailure);
    }
    let (salt, token) = bytes.split_at(SALT_LEN);
    let salt: Salt = salt
        .try_into()
        .map_err(|_| VaultError::AuthenticationFailure)?;

    let material = KeyMaterial::derive(password, salt, iterations);
    let plaintext = Zeroizing::new(crypto::decrypt(token, material.key())?);
    let store = parse_payload(&plaintext, fallback_categories)
        .map_err(|_| VaultError::AuthenticationFailure)?;

    Ok((store, material))
}

fn parse_payload(plaintext: &[u8], fallback_categories: &[String]) -> Result<EntryStore> {
    let payload: PayloadIn =
        serde_json::from_slice(plaintext).map_err(|_| VaultError::MalformedPayload)?;

    match payload.version.as_deref() {
        Some(FORMAT_VERSION) => {}
        other => tracing::info!(version = ?other, "loading vault with a different schema version"),
    }

    let categories = payload
        .categories
        .unwrap_or_else(|| fallback_categories.to_vec());
    Ok(EntryStore::from_parts(payload.entries, categories))
}

/// Write to a sibling temp file, sync, then rename over the target
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(temp_path);
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use crate::store::EntryData;
    use base64::engine::general_purpose::URL_SAFE;
    use base64::Engine;
    use tempfile::tempdir;

    const ITER: u32 = 1_000;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn defaults() -> Vec<String> {
        VaultConfig::default().default_categories
    }

    fn sample_store() -> EntryStore {
        let mut store = EntryStore::new(defaults());
        store.add(EntryData {
            username: "alice".into(),
            password: "p@ss".into(),
            category: "Banking".into(),
            ..EntryData::new("Bank")
        });
        store.add(EntryData::new("Mail"));
        store
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        let store = sample_store();

        save(&path, &material, &store).unwrap();
        let (loaded, loaded_material) = load(&path, &pw("master-pass"), ITER, &[]).unwrap();

        assert_eq!(loaded, store);
        assert_eq!(loaded_material.salt(), material.salt());
        assert!(loaded_material.key().ct_eq(material.key()));
    }

    #[test]
    fn test_file_starts_with_salt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();

        save(&path, &material, &sample_store()).unwrap();
        save(&path, &material, &EntryStore::default()).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..SALT_LEN], material.salt());
        assert_eq!(bytes[SALT_LEN], b'g'); // base64 of the 0x80 version byte
        assert!(!dir.path().join("test.svdb.tmp").exists());
    }

    #[test]
    fn test_payload_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        save(&path, &material, &sample_store()).unwrap();

        let bytes = fs::read(&path).unwrap();
        let json = crypto::decrypt(&bytes[SALT_LEN..], material.key()).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(doc["version"], "1.3");
        assert!(doc["created"].is_string());
        assert_eq!(doc["categories"][3], "Banking");
        let first = &doc["entries"][0];
        for field in [
            "id", "title", "username", "password", "url", "category", "notes", "created",
            "modified",
        ] {
            assert!(first.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(first["id"], 0);
        assert_eq!(first["title"], "Bank");
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("password-A"), ITER).unwrap();
        save(&path, &material, &sample_store()).unwrap();

        assert!(matches!(
            load(&path, &pw("password-B"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_flipped_ciphertext_bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        save(&path, &material, &sample_store()).unwrap();

        // flip one bit of the AES ciphertext inside the token, keep the salt intact
        let bytes = fs::read(&path).unwrap();
        let mut raw = URL_SAFE.decode(&bytes[SALT_LEN..]).unwrap();
        raw[30] ^= 0x01;
        let mut tampered = bytes[..SALT_LEN].to_vec();
        tampered.extend_from_slice(URL_SAFE.encode(raw).as_bytes());
        fs::write(&path, tampered).unwrap();

        assert!(matches!(
            load(&path, &pw("master-pass"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.svdb");
        fs::write(&path, [0u8; 10]).unwrap();
        assert!(matches!(
            load(&path, &pw("x"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("absent.svdb"), &pw("x"), ITER, &[]),
            Err(VaultError::Io(_))
        ));
    }

    fn write_raw_payload(path: &Path, material: &KeyMaterial, json: &str) {
        let token = crypto::encrypt(json.as_bytes(), material.key()).unwrap();
        let mut framed = material.salt().to_vec();
        framed.extend_from_slice(&token);
        fs::write(path, framed).unwrap();
    }

    #[test]
    fn test_bad_json_reported_as_auth_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(&path, &material, "{ this is not json");

        assert!(matches!(
            load(&path, &pw("master-pass"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_unknown_entry_field_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(
            &path,
            &material,
            r#"{"entries":[{"id":0,"title":"t","created":"2024-01-01T00:00:00","modified":"2024-01-01T00:00:00","totp":"x"}]}"#,
        );

        assert!(load(&path, &pw("master-pass"), ITER, &[]).is_err());
    }

    #[test]
    fn test_missing_title_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(
            &path,
            &material,
            r#"{"entries":[{"id":0,"created":"2024-01-01T00:00:00","modified":"2024-01-01T00:00:00"}]}"#,
        );

        assert!(matches!(
            load(&path, &pw("master-pass"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_lenient_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(
            &path,
            &material,
            r#"{"entries":[
                {"id":4,"title":"a","created":"2024-01-01T00:00:00","modified":"2024-01-01T00:00:00"},
                {"id":4,"title":"b","created":"2024-01-01T00:00:00.5","modified":"2024-01-02T00:00:00"}
            ],"version":"0.9","salt":"ignored"}"#,
        );

        let (store, _) = load(&path, &pw("master-pass"), ITER, &defaults()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().id, 0);
        assert_eq!(store.get(1).unwrap().id, 1);
        assert_eq!(store.get(0).unwrap().category, "General");
        assert_eq!(store.get(0).unwrap().username, "");
        assert_eq!(store.categories(), defaults().as_slice());
    }

    #[test]
    fn test_edited_entry_without_created_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(
            &path,
            &material,
            r#"{"entries":[
                {"id":0,"title":"Mail","username":"bob","password":"pw","url":"",
                 "category":"Email","notes":"","modified":"2024-05-02T10:00:00.250000"},
                {"id":1,"title":"Bank","created":"2024-01-01T00:00:00","modified":"2024-01-01T00:00:00"}
            ],"categories":["General","Email"],"created":"2024-05-02T10:00:01","version":"1.3"}"#,
        );

        let (store, _) = load(&path, &pw("master-pass"), ITER, &[]).unwrap();
        let edited = store.get(0).unwrap();
        assert_eq!(edited.title, "Mail");
        assert_eq!(edited.created, edited.modified);
        assert_eq!(edited.modified.to_string(), "2024-05-02 10:00:00.250");
        assert_eq!(store.get(1).unwrap().created.to_string(), "2024-01-01 00:00:00");

        // survives a save in the current format
        save(&path, &material, &store).unwrap();
        let (again, _) = load(&path, &pw("master-pass"), ITER, &[]).unwrap();
        assert_eq!(again, store);
    }

    #[test]
    fn test_entry_without_modified_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.svdb");
        let material = KeyMaterial::generate(&pw("master-pass"), ITER).unwrap();
        write_raw_payload(
            &path,
            &material,
            r#"{"entries":[{"id":0,"title":"t","created":"2024-01-01T00:00:00"}]}"#,
        );

        assert!(matches!(
            load(&path, &pw("master-pass"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_reads_legacy_vault_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.svdb");
        fs::write(
            &path,
            include_bytes!("../tests/fixtures/legacy_1000_iter.svdb"),
        )
        .unwrap();

        let (store, material) = load(&path, &pw("legacy-pass-123"), ITER, &[]).unwrap();
        assert_eq!(store.len(), 2);

        let mail = store.get(0).unwrap();
        assert_eq!(mail.title, "Mail");
        assert_eq!(mail.username, "bob@example.com");
        assert_eq!(mail.password, "hunter2");
        assert_eq!(mail.category, "Email");
        assert_eq!(mail.created.to_string(), "2024-03-01 09:15:00.123456");

        let bank = store.get(1).unwrap();
        assert_eq!(bank.id, 1);
        assert_eq!(bank.notes, "");
        assert_eq!(store.categories().len(), 5);

        let mut expected_salt = [0u8; SALT_LEN];
        for (i, b) in expected_salt.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(material.salt(), &expected_salt);

        assert!(matches!(
            load(&path, &pw("legacy-pass-124"), ITER, &[]),
            Err(VaultError::AuthenticationFailure)
        ));
    }
}
