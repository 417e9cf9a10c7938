use std::collections::HashMap;

use rustcord_protocol::RosterEntry;

/// Outcome of [`PresenceStore::upsert`], used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Ordered roster of participants, at most one entry per id.
///
/// Entries keep the position of their first insertion; an update to an
/// existing id overwrites it in place.
#[derive(Debug, Default, Clone)]
pub struct PresenceStore {
    entries: Vec<RosterEntry>,
    index: HashMap<String, usize>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster with `entries`.
    ///
    /// A duplicate id inside `entries` keeps the first position and the
    /// last value.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = RosterEntry>) {
        let mut next = Self::new();
        for entry in entries {
            next.upsert(entry);
        }
        *self = next;
    }

    /// Insert `entry`, or overwrite the existing entry with the same id.
    pub fn upsert(&mut self, entry: RosterEntry) -> Upsert {
        if let Some(&pos) = self.index.get(&entry.id) {
            self.entries[pos] = entry;
            Upsert::Replaced
        } else {
            self.index.insert(entry.id.clone(), self.entries.len());
            self.entries.push(entry);
            Upsert::Inserted
        }
    }

    /// Number of entries whose status is anything but offline.
    pub fn online_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_online()).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn get(&self, id: &str) -> Option<&RosterEntry> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
