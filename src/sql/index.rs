use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::sql::types::Value;

/// Hash index mapping a column value to the set of row positions holding it.
///
/// Values are keyed by their bincode encoding, so NULL and floats can serve
/// as keys without `Eq + Hash` on [`Value`] itself. Two values collide only
/// when both type and payload are identical (an integer 1 and a float 1.0
/// are distinct keys).
#[derive(Debug, Default)]
pub struct HashIndex {
    data: HashMap<Vec<u8>, HashSet<usize>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(value: &Value) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    /// Records `position` under `value`. Idempotent.
    pub fn add(&mut self, value: &Value, position: usize) -> Result<()> {
        self.data.entry(Self::key(value)?).or_default().insert(position);
        Ok(())
    }

    /// Removes `position` from `value`'s set; removing an absent position is
    /// a no-op. A key whose set empties is dropped entirely.
    pub fn remove(&mut self, value: &Value, position: usize) -> Result<()> {
        let key = Self::key(value)?;
        if let Some(positions) = self.data.get_mut(&key) {
            positions.remove(&position);
            if positions.is_empty() {
                self.data.remove(&key);
            }
        }
        Ok(())
    }

    /// Returns a snapshot of the positions holding `value`; an absent key
    /// yields an empty set. Never a live view into the index.
    pub fn lookup(&self, value: &Value) -> Result<HashSet<usize>> {
        Ok(self
            .data
            .get(&Self::key(value)?)
            .cloned()
            .unwrap_or_default())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// True when no key holds any position; lets uniqueness checks skip the
    /// key encoding entirely on an empty table.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
