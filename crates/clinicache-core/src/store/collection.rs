// A single record collection persisted as one JSON document.
// Every mutation is written through before it returns; a failed write rolls
// the in-memory state back so memory and disk never disagree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::error::{Result, StoreError};
use crate::models::{Appointment, Doctor};
use crate::utils::write_atomic;

/// A record that lives in a collection and carries its own identifier.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Collection name, used for file names and error messages.
    const COLLECTION: &'static str;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

impl Record for Doctor {
    const COLLECTION: &'static str = "doctors";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Record for Appointment {
    const COLLECTION: &'static str = "appointments";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Deserialize)]
struct CollectionFile<T> {
    next_id: u64,
    records: Vec<T>,
}

#[derive(Serialize)]
struct CollectionFileRef<'a, T> {
    next_id: u64,
    records: Vec<&'a T>,
}

pub struct Collection<T> {
    path: Option<PathBuf>,
    next_id: u64,
    records: BTreeMap<u64, T>,
}

impl<T: Record> Collection<T> {
    /// A collection that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            next_id: 1,
            records: BTreeMap::new(),
        }
    }

    /// Open (or start) the collection file `<dir>/<collection>.json`.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{}.json", T::COLLECTION));
        if !path.exists() {
            debug!(collection = T::COLLECTION, "No collection file yet, starting empty");
            return Ok(Self {
                path: Some(path),
                next_id: 1,
                records: BTreeMap::new(),
            });
        }

        let contents = std::fs::read_to_string(&path)?;
        let file: CollectionFile<T> = serde_json::from_str(&contents).map_err(|source| {
            StoreError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;

        let records: BTreeMap<u64, T> = file.records.into_iter().map(|r| (r.id(), r)).collect();
        // A hand-edited file may carry a stale counter; never hand out a live id
        let max_id = records.keys().next_back().copied().unwrap_or(0);
        let next_id = file.next_id.max(max_id + 1);

        debug!(collection = T::COLLECTION, count = records.len(), next_id, "Loaded collection");
        Ok(Self {
            path: Some(path),
            next_id,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The identifier the next insert will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.records.get(&id)
    }

    /// All records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn list(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }

    pub fn insert(&mut self, record: T) -> Result<u64> {
        let ids = self.insert_many(vec![record])?;
        Ok(ids[0])
    }

    /// Insert several records with a single write. Returns the assigned ids in input order.
    pub fn insert_many(&mut self, records: Vec<T>) -> Result<Vec<u64>> {
        let previous_next_id = self.next_id;
        let mut ids = Vec::with_capacity(records.len());

        for mut record in records {
            let id = self.next_id;
            self.next_id += 1;
            record.set_id(id);
            self.records.insert(id, record);
            ids.push(id);
        }

        if let Err(e) = self.persist() {
            self.discard(&ids, previous_next_id);
            return Err(e);
        }
        Ok(ids)
    }

    /// Undo a successful `insert_many`: drop `ids`, restore the counter and persist.
    /// `previous_next_id` is the value of `next_id()` before that insert.
    pub fn rollback_insert(&mut self, ids: &[u64], previous_next_id: u64) -> Result<()> {
        self.discard(ids, previous_next_id);
        self.persist()
    }

    fn discard(&mut self, ids: &[u64], previous_next_id: u64) {
        for id in ids {
            self.records.remove(id);
        }
        self.next_id = previous_next_id;
    }

    /// Apply `change` to the record with `id` and persist it. Returns the updated record.
    pub fn update_with(&mut self, id: u64, change: impl FnOnce(&mut T)) -> Result<T> {
        let record = self.records.get_mut(&id).ok_or(StoreError::NotFound {
            collection: T::COLLECTION,
            id,
        })?;
        let previous = record.clone();
        change(record);
        // The id is owned by the collection
        record.set_id(id);
        let updated = record.clone();

        if let Err(e) = self.persist() {
            self.records.insert(id, previous);
            return Err(e);
        }
        Ok(updated)
    }

    /// Remove a record. Returns the removed record, or `None` if it did not exist.
    pub fn remove(&mut self, id: u64) -> Result<Option<T>> {
        let Some(removed) = self.records.remove(&id) else {
            return Ok(None);
        };

        if let Err(e) = self.persist() {
            self.records.insert(id, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = CollectionFileRef {
            next_id: self.next_id,
            records: self.records.values().collect(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        write_atomic(path, contents.as_bytes())?;
        Ok(())
    }
}
