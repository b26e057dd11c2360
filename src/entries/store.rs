use anyhow::{Context, Result};

use crate::{
    entries::normalize::{normalize_entry, StoredEntry},
    models::CoffeeEntry,
    storage::KeyValueStorage,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// Storage key holding the whole collection as one JSON array.
pub const STORAGE_KEY: &str = "coffee_entries";

/// The entry collection persisted as a single document.
///
/// Every mutation re-reads the document, edits it in memory and writes it
/// back. There is no lock between the read and the write, so two overlapping
/// mutations race and the later write wins.
pub struct EntryStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> EntryStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Every stored entry, normalized to the current schema.
    ///
    /// Never fails: a missing, unreadable or unparseable document is treated
    /// as an empty collection and the cause is logged.
    pub async fn get_entries(&self) -> Vec<CoffeeEntry> {
        match self.try_get_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                log_error!("Error getting entries: {err:#}");
                Vec::new()
            }
        }
    }

    /// Like `get_entries` but surfaces storage read errors.
    ///
    /// An unparseable document is logged and read as an empty collection,
    /// the same view `get_entries` gives and the one the next mutation
    /// will write over.
    pub async fn try_get_entries(&self) -> Result<Vec<CoffeeEntry>> {
        let Some(raw) = self
            .storage
            .read(STORAGE_KEY)
            .await
            .context("failed to read stored entries")?
        else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<StoredEntry>>(&raw) {
            Ok(stored) => Ok(stored.into_iter().map(normalize_entry).collect()),
            Err(err) => {
                log_warn!("Discarding unparseable entry document: {err}");
                Ok(Vec::new())
            }
        }
    }

    async fn write_entries(&self, entries: &[CoffeeEntry]) -> Result<()> {
        let serialized = serde_json::to_string(entries).context("failed to serialize entries")?;
        self.storage
            .write(STORAGE_KEY, serialized)
            .await
            .context("failed to write entries")
    }

    pub async fn save_entry(&self, entry: CoffeeEntry) -> Result<()> {
        let mut entries = self.try_get_entries().await?;
        entries.push(entry);
        self.write_entries(&entries).await.map_err(|err| {
            log_error!("Error saving entry: {err:#}");
            err
        })
    }

    /// Replaces the entry with the same id. Returns `false` without writing
    /// when no entry matches.
    pub async fn update_entry(&self, entry: CoffeeEntry) -> Result<bool> {
        let mut entries = self.try_get_entries().await?;
        let Some(slot) = entries.iter_mut().find(|existing| existing.id == entry.id) else {
            return Ok(false);
        };
        *slot = entry;
        self.write_entries(&entries).await.map_err(|err| {
            log_error!("Error updating entry: {err:#}");
            err
        })?;
        Ok(true)
    }

    /// Removes the entry with `id`. The document is rewritten even when the
    /// id is absent.
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let entries = self.try_get_entries().await?;
        let remaining: Vec<CoffeeEntry> = entries.into_iter().filter(|e| e.id != id).collect();
        self.write_entries(&remaining).await.map_err(|err| {
            log_error!("Error deleting entry: {err:#}");
            err
        })
    }

    pub async fn get_entry(&self, id: &str) -> Option<CoffeeEntry> {
        self.get_entries()
            .await
            .into_iter()
            .find(|entry| entry.id == id)
    }
}
