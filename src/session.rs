//! Session lifecycle - unlock state, dirty tracking, current file path
//!
//! A `Session` is an explicit value owned by the caller. It starts `Locked`
//! (or `Unlocked` straight away through [`Session::create`] / [`Session::open`]),
//! holds the key material and the decrypted store only while unlocked, and
//! reports state changes to subscribers over crossbeam channels.

use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender};
use secrecy::{ExposeSecret, SecretString};

use crate::config::VaultConfig;
use crate::crypto::KeyMaterial;
use crate::error::{Result, VaultError};
use crate::store::{Entry, EntryData, EntryStore};
use crate::vault_file;

/// Public view of the unlock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// Notifications for whoever renders session status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Unlocked,
    Locked,
    DirtyChanged(bool),
    Saved(PathBuf),
    AutoSaved(PathBuf),
    AutoSaveFailed { path: PathBuf, reason: String },
}

/// Result of one auto-save trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveOutcome {
    /// Clean, locked, or no file path yet
    Skipped,
    Saved(PathBuf),
    Failed(String),
}

enum State {
    Locked,
    Unlocked {
        material: KeyMaterial,
        store: EntryStore,
    },
}

pub struct Session {
    config: VaultConfig,
    state: State,
    dirty: bool,
    path: Option<PathBuf>,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl Session {
    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Locked session with no file
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            state: State::Locked,
            dirty: false,
            path: None,
            subscribers: Vec::new(),
        }
    }

    /// New, empty vault: fresh salt, default categories, no file path yet
    pub fn create(password: &SecretString, config: VaultConfig) -> Result<Self> {
        config.validate_master_password(password.expose_secret())?;

        let material = KeyMaterial::generate(password, config.kdf_iterations)?;
        let store = EntryStore::new(config.default_categories.clone());
        tracing::info!("created new vault");

        let mut session = Self::new(config);
        session.state = State::Unlocked { material, store };
        Ok(session)
    }

    /// Opens an existing vault file. The path becomes the current path.
    pub fn open(path: impl AsRef<Path>, password: &SecretString, config: VaultConfig) -> Result<Self> {
        let mut session = Self::new(config);
        session.path = Some(path.as_ref().to_path_buf());
        session.unlock(password)?;
        Ok(session)
    }

    /// Unlocks a locked session from its remembered file.
    ///
    /// No-op if already unlocked. On failure the session stays locked.
    pub fn unlock(&mut self, password: &SecretString) -> Result<()> {
        if self.is_unlocked() {
            return Ok(());
        }
        let path = self.path.clone().ok_or(VaultError::NoFilePath)?;

        let (store, material) = vault_file::load(
            &path,
            password,
            self.config.kdf_iterations,
            &self.config.default_categories,
        )?;

        tracing::info!(path = %path.display(), entries = store.len(), "vault unlocked");
        self.state = State::Unlocked { material, store };
        self.set_dirty(false);
        self.emit(SessionEvent::Unlocked);
        Ok(())
    }

    /// Drops the key and wipes the decrypted entries. Unsaved changes are lost.
    pub fn lock(&mut self) {
        let State::Unlocked { store, .. } = &mut self.state else {
            return;
        };
        if self.dirty {
            tracing::warn!("locking vault with unsaved changes; they are discarded");
        }
        store.wipe();

        self.state = State::Locked;
        self.set_dirty(false);
        tracing::info!("vault locked");
        self.emit(SessionEvent::Locked);
    }

    /// Saves to `path`, or to the current path when `None`.
    ///
    /// On success `path` becomes current and the session is clean. On failure
    /// nothing changes: the dirty flag and the previous path are kept.
    pub fn save(&mut self, path: Option<&Path>) -> Result<()> {
        self.ensure_unlocked()?;
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self.path.clone().ok_or(VaultError::NoFilePath)?,
        };

        self.write(&target)?;

        tracing::info!(path = %target.display(), "vault saved");
        self.path = Some(target.clone());
        self.set_dirty(false);
        self.emit(SessionEvent::Saved(target));
        Ok(())
    }

    /// One auto-save trigger. Saves only when dirty, unlocked and a path is set.
    /// Failures are logged and reported as events, never returned.
    pub fn auto_save(&mut self) -> AutoSaveOutcome {
        if !self.dirty || !self.is_unlocked() {
            return AutoSaveOutcome::Skipped;
        }
        let Some(path) = self.path.clone() else {
            return AutoSaveOutcome::Skipped;
        };

        match self.write(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "auto-saved");
                self.set_dirty(false);
                self.emit(SessionEvent::AutoSaved(path.clone()));
                AutoSaveOutcome::Saved(path)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    transient = e.is_transient(),
                    "auto-save failed, will retry"
                );
                self.emit(SessionEvent::AutoSaveFailed {
                    path,
                    reason: reason.clone(),
                });
                AutoSaveOutcome::Failed(reason)
            }
        }
    }

    /// Re-keys the vault under a new master password with a fresh salt.
    /// Takes effect on disk at the next save.
    pub fn change_master_password(&mut self, current: &SecretString, new: &SecretString) -> Result<()> {
        self.config.validate_master_password(new.expose_secret())?;
        let iterations = self.config.kdf_iterations;

        match &mut self.state {
            State::Locked => return Err(VaultError::NotUnlocked),
            State::Unlocked { material, .. } => {
                let check = KeyMaterial::derive(current, *material.salt(), iterations);
                if !check.key().ct_eq(material.key()) {
                    return Err(VaultError::AuthenticationFailure);
                }
                *material = KeyMaterial::generate(new, iterations)?;
            }
        }

        tracing::info!("master password changed");
        self.set_dirty(true);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENTRIES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_entry(&mut self, data: EntryData) -> Result<usize> {
        let id = self.store_mut()?.add(data);
        self.set_dirty(true);
        Ok(id)
    }

    pub fn update_entry(&mut self, id: usize, data: EntryData) -> Result<()> {
        self.store_mut()?.update(id, data)?;
        self.set_dirty(true);
        Ok(())
    }

    pub fn delete_entry(&mut self, id: usize) -> Result<()> {
        self.store_mut()?.delete(id)?;
        self.set_dirty(true);
        Ok(())
    }

    pub fn add_category(&mut self, name: impl Into<String>) -> Result<()> {
        self.store_mut()?.add_category(name);
        self.set_dirty(true);
        Ok(())
    }

    pub fn get_entry(&self, id: usize) -> Result<&Entry> {
        self.store()?.get(id).ok_or(VaultError::InvalidReference(id))
    }

    pub fn entries(&self) -> Result<&[Entry]> {
        Ok(self.store()?.entries())
    }

    pub fn search(&self, query: &str) -> Result<Vec<&Entry>> {
        Ok(self.store()?.search(query))
    }

    pub fn entries_by_category(&self, category: &str) -> Result<Vec<&Entry>> {
        Ok(self.store()?.entries_by_category(category))
    }

    pub fn categories(&self) -> Result<&[String]> {
        Ok(self.store()?.categories())
    }

    /// Read access to the decrypted store
    pub fn store(&self) -> Result<&EntryStore> {
        match &self.state {
            State::Unlocked { store, .. } => Ok(store),
            State::Locked => Err(VaultError::NotUnlocked),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATUS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> LockState {
        match self.state {
            State::Locked => LockState::Locked,
            State::Unlocked { .. } => LockState::Unlocked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == LockState::Unlocked
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// New event stream. Dropped receivers are pruned on the next event.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════

    fn ensure_unlocked(&self) -> Result<()> {
        self.store().map(|_| ())
    }

    fn store_mut(&mut self) -> Result<&mut EntryStore> {
        match &mut self.state {
            State::Unlocked { store, .. } => Ok(store),
            State::Locked => Err(VaultError::NotUnlocked),
        }
    }

    fn write(&self, path: &Path) -> Result<()> {
        match &self.state {
            State::Unlocked { material, store } => vault_file::save(path, material, store),
            State::Locked => Err(VaultError::NotUnlocked),
        }
    }

    fn set_dirty(&mut self, dirty: bool) {
        if self.dirty != dirty {
            self.dirty = dirty;
            self.emit(SessionEvent::DirtyChanged(dirty));
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let State::Unlocked { store, .. } = &mut self.state {
            store.wipe();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("dirty", &self.dirty)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
