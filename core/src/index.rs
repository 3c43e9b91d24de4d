use crate::{DocumentIndexEntry, PageFeatureSet};
use std::collections::HashMap;

/// In-memory corpus: document id to entry, iterated in insertion order.
/// Replacing an id keeps its original position.
#[derive(Debug, Default, Clone)]
pub struct DocumentIndex {
    entries: Vec<DocumentIndexEntry>,
    slots: HashMap<String, usize>,
}

impl DocumentIndex {
    pub fn new() -> Self { Self::default() }

    /// Later entries win when ids repeat.
    pub fn from_entries(entries: Vec<DocumentIndexEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry);
        }
        index
    }

    /// Stores `entry`, returning the entry it replaced.
    pub fn insert(&mut self, entry: DocumentIndexEntry) -> Option<DocumentIndexEntry> {
        match self.slots.get(&entry.id) {
            Some(&slot) => Some(std::mem::replace(&mut self.entries[slot], entry)),
            None => {
                self.slots.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<DocumentIndexEntry> {
        let slot = self.slots.remove(id)?;
        let removed = self.entries.remove(slot);
        for s in self.slots.values_mut() {
            if *s > slot {
                *s -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&DocumentIndexEntry> {
        self.slots.get(id).map(|&slot| &self.entries[slot])
    }

    pub fn page(&self, id: &str, page_number: u32) -> Option<&PageFeatureSet> {
        self.get(id)?.page(page_number)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    pub fn entries(&self) -> &[DocumentIndexEntry] { &self.entries }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentIndexEntry> { self.entries.iter() }
}
