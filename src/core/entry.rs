//! In-memory entries for the current session

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::schema::Collection;
use super::validation::{validate_entry, Issue};

/// One entry of a collection
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: u64,
    pub values: Map<String, Value>,
    /// Whether the entry has been saved at least once
    pub saved: bool,
}

/// Entries of every collection, keyed by collection path
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, Vec<Entry>>,
    next_id: u64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of a collection
    pub fn list(&self, collection: &str) -> &[Entry] {
        self.entries
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &str, id: u64) -> Option<&Entry> {
        self.list(collection).iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, collection: &str, id: u64) -> Option<&mut Entry> {
        self.entries
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
    }

    /// Add an unsaved entry with default values and return its id
    pub fn create(&mut self, collection: &Collection, now: DateTime<Utc>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries
            .entry(collection.path.clone())
            .or_default()
            .push(Entry {
                id,
                values: collection.new_entry(now),
                saved: false,
            });
        tracing::info!("Created {} entry {}", collection.path, id);
        id
    }

    /// Validate an entry and, when it passes, refresh its update dates and
    /// mark it saved. Returns the issues that blocked the save.
    pub fn save(
        &mut self,
        collection: &Collection,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<(), Vec<Issue>> {
        let issues = {
            let entries = self.list(&collection.path);
            let Some(entry) = entries.iter().find(|e| e.id == id) else {
                return Ok(());
            };
            let others: Vec<_> = entries
                .iter()
                .filter(|e| e.id != id && e.saved)
                .map(|e| &e.values)
                .collect();
            validate_entry(collection, &entry.values, &others)
        };

        if !issues.is_empty() {
            tracing::info!("Entry {} has {} validation issues", id, issues.len());
            return Err(issues);
        }

        if let Some(entry) = self.get_mut(&collection.path, id) {
            collection.touch(&mut entry.values, now);
            entry.saved = true;
            tracing::info!("Saved {} entry {}", collection.path, id);
        }
        Ok(())
    }

    pub fn delete(&mut self, collection: &str, id: u64) {
        if let Some(entries) = self.entries.get_mut(collection) {
            entries.retain(|e| e.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections;

    #[test]
    fn test_create_save_and_uniqueness() {
        let collection = collections::byte_series();
        let mut store = EntryStore::new();
        let now = Utc::now();

        let first = store.create(&collection, now);
        assert!(store.save(&collection, first, now).is_err());

        let entry = store.get_mut(&collection.path, first).unwrap();
        entry.values.insert("title".into(), Value::String("Maths".into()));
        entry.values.insert("accentColour".into(), Value::String("#00ff00".into()));
        assert!(store.save(&collection, first, now).is_ok());
        assert!(store.get(&collection.path, first).unwrap().saved);

        let second = store.create(&collection, now);
        let entry = store.get_mut(&collection.path, second).unwrap();
        entry.values.insert("title".into(), Value::String("Maths".into()));
        entry.values.insert("accentColour".into(), Value::String("#000".into()));
        let issues = store.save(&collection, second, now).unwrap_err();
        assert_eq!(issues[0].message, "Title must be unique");

        store.delete(&collection.path, first);
        assert!(store.save(&collection, second, now).is_ok());
        assert_eq!(store.list(&collection.path).len(), 1);
    }
}
