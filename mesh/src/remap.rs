//! Generic record deduplication.
//!
//! [`remap`] collapses value-equal records into a canonical list and returns
//! the two tables needed to move between original and canonical indices:
//!
//! - `remap[original] = canonical`
//! - `implementation[canonical] = first original index with that value`
//!
//! The first occurrence always wins, so canonical order follows the order in
//! which distinct values were first seen.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

/// Result of a deduplication pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapped<T> {
    /// Unique records in first-seen order.
    pub unique: Vec<T>,
    /// Original index → canonical index (length N).
    pub remap: Vec<u32>,
    /// Canonical index → first original index (length M).
    pub implementation: Vec<u32>,
}

impl<T> Remapped<T> {
    /// Number of canonical records.
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    /// True if there are no records.
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// Canonical index for an original index.
    pub fn canonical(&self, original: usize) -> u32 {
        self.remap[original]
    }
}

/// Deduplicate `records`.
///
/// When `deduplicate` is false every record is kept and both tables are the
/// identity.
pub fn remap<T>(records: &[T], deduplicate: bool) -> Remapped<T>
where
    T: Eq + Hash + Clone,
{
    if !deduplicate {
        let identity: Vec<u32> = (0..records.len() as u32).collect();
        return Remapped {
            unique: records.to_vec(),
            remap: identity.clone(),
            implementation: identity,
        };
    }

    let mut seen: HashMap<&T, u32> = HashMap::with_capacity(records.len());
    let mut unique = Vec::new();
    let mut remap = Vec::with_capacity(records.len());
    let mut implementation = Vec::new();

    for (original, record) in records.iter().enumerate() {
        let canonical = match seen.entry(record) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let canonical = unique.len() as u32;
                entry.insert(canonical);
                unique.push(record.clone());
                implementation.push(original as u32);
                canonical
            }
        };
        remap.push(canonical);
    }

    log::trace!(
        "Remapped {} records to {} unique",
        records.len(),
        unique.len()
    );

    Remapped {
        unique,
        remap,
        implementation,
    }
}
