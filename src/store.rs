//! In-memory entry store - ordered credential records and categories

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{Result, VaultError};

/// One stored credential.
///
/// `id` always equals the entry's position in its store; the store reassigns
/// it after every structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredEntry")]
pub struct Entry {
    pub id: usize,
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub category: String,
    pub notes: String,
    /// Local time, ISO-8601 without offset
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

/// On-disk shape of an entry. Records rewritten by an edit may lack
/// `created`; those take `modified` instead.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEntry {
    id: usize,
    title: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    url: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    created: Option<NaiveDateTime>,
    modified: NaiveDateTime,
}

impl From<StoredEntry> for Entry {
    fn from(stored: StoredEntry) -> Self {
        Self {
            id: stored.id,
            title: stored.title,
            username: stored.username,
            password: stored.password,
            url: stored.url,
            category: stored.category,
            notes: stored.notes,
            created: stored.created.unwrap_or(stored.modified),
            modified: stored.modified,
        }
    }
}

fn default_category() -> String {
    "General".to_string()
}

impl Entry {
    /// The user-editable part of this entry
    pub fn data(&self) -> EntryData {
        EntryData {
            title: self.title.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            url: self.url.clone(),
            category: self.category.clone(),
            notes: self.notes.clone(),
        }
    }

    fn wipe(&mut self) {
        self.title.zeroize();
        self.username.zeroize();
        self.password.zeroize();
        self.url.zeroize();
        self.category.zeroize();
        self.notes.zeroize();
    }

    fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.username, &self.url, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Fields supplied by the caller on add/update.
///
/// The store does not validate these (e.g. non-empty title); that is the
/// caller's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryData {
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub category: String,
    pub notes: String,
}

impl Default for EntryData {
    fn default() -> Self {
        Self {
            title: String::new(),
            username: String::new(),
            password: String::new(),
            url: String::new(),
            category: default_category(),
            notes: String::new(),
        }
    }
}

impl EntryData {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Ordered entries plus the category list. Insertion order is the persisted
/// and displayed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryStore {
    entries: Vec<Entry>,
    categories: Vec<String>,
}

impl EntryStore {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            entries: Vec::new(),
            categories,
        }
    }

    /// Builds a store from persisted parts, reassigning ids to positions
    pub fn from_parts(entries: Vec<Entry>, categories: Vec<String>) -> Self {
        let mut store = Self { entries, categories };
        store.reindex();
        store
    }

    /// Appends an entry and returns its id
    pub fn add(&mut self, data: EntryData) -> usize {
        let id = self.entries.len();
        let now = now();
        self.entries.push(Entry {
            id,
            title: data.title,
            username: data.username,
            password: data.password,
            url: data.url,
            category: data.category,
            notes: data.notes,
            created: now,
            modified: now,
        });
        id
    }

    /// Replaces the fields of entry `id`, keeping its id and creation time
    pub fn update(&mut self, id: usize, data: EntryData) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or(VaultError::InvalidReference(id))?;

        entry.wipe();
        entry.title = data.title;
        entry.username = data.username;
        entry.password = data.password;
        entry.url = data.url;
        entry.category = data.category;
        entry.notes = data.notes;
        entry.modified = now();
        Ok(())
    }

    /// Removes entry `id`; every later entry moves down one position
    pub fn delete(&mut self, id: usize) -> Result<Entry> {
        if id >= self.entries.len() {
            return Err(VaultError::InvalidReference(id));
        }
        let removed = self.entries.remove(id);
        self.reindex();
        Ok(removed)
    }

    pub fn get(&self, id: usize) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Appends a category. Duplicates are not rejected.
    pub fn add_category(&mut self, name: impl Into<String>) {
        self.categories.push(name.into());
    }

    pub fn entries_by_category(&self, category: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.category == category).collect()
    }

    /// Case-insensitive substring match on title, username, url and notes.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&Entry> {
        let needle = query.to_lowercase();
        self.entries.iter().filter(|e| e.matches(&needle)).collect()
    }

    /// Zeroizes every entry string, then empties the store
    pub fn wipe(&mut self) {
        for entry in &mut self.entries {
            entry.wipe();
        }
        self.entries.clear();
        self.categories.clear();
    }

    fn reindex(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.id = i;
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
