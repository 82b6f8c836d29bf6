// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live tag table
//!
//! One record per chip id. Not internally synchronized: the coordinator task is
//! the only owner.

use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::record::{TagFields, TagRecord};

#[derive(Debug, Default)]
pub struct TagStore {
    records: AHashMap<String, TagRecord>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `fields` into the chip's record, creating it if absent
    ///
    /// `last_seen_local` strictly increases per record even if the caller's clock
    /// returns the same instant twice.
    pub fn upsert(&mut self, chip_id: &str, fields: TagFields, now: Instant) -> &TagRecord {
        match self.records.entry(chip_id.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let record = entry.into_mut();
                record.merge(fields);
                record.last_seen_local = if now > record.last_seen_local {
                    now
                } else {
                    record.last_seen_local + Duration::from_nanos(1)
                };
                record
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(TagRecord::new(chip_id, fields, now))
            }
        }
    }

    /// Remove and return every record last seen before `cutoff`
    pub fn evict_older_than(&mut self, cutoff: Instant) -> Vec<TagRecord> {
        let stale: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| record.last_seen_local < cutoff)
            .map(|(chip_id, _)| chip_id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|chip_id| self.records.remove(&chip_id))
            .collect()
    }

    /// Copy of all current records, in no particular order
    pub fn snapshot(&self) -> Vec<TagRecord> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, chip_id: &str) -> Option<&TagRecord> {
        self.records.get(chip_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(epc: &str) -> TagFields {
        TagFields {
            epc: epc.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_creates_then_merges() {
        let mut store = TagStore::new();
        let t0 = Instant::now();

        store.upsert(
            "00001",
            TagFields {
                antenna_id: Some(1),
                peak_rssi: Some(-60),
                tag_seen_count: Some(3),
                ..fields("E2000000000000001")
            },
            t0,
        );
        let record = store.upsert(
            "00001",
            TagFields {
                peak_rssi: Some(-52),
                ..fields("E2000000000000001")
            },
            t0 + Duration::from_secs(1),
        );

        assert_eq!(record.chip_id(), "00001");
        assert_eq!(record.peak_rssi, Some(-52));
        assert_eq!(record.antenna_id, Some(1));
        assert_eq!(record.tag_seen_count, Some(3));
        assert_eq!(record.last_seen_local, t0 + Duration::from_secs(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_seen_local_strictly_increases_on_same_instant() {
        let mut store = TagStore::new();
        let t0 = Instant::now();
        let first = store.upsert("00001", fields("E2000000000000001"), t0).last_seen_local;
        let second = store.upsert("00001", fields("E2000000000000001"), t0).last_seen_local;
        let third = store.upsert("00001", fields("E2000000000000001"), t0).last_seen_local;
        assert!(first < second && second < third);
    }

    #[test]
    fn test_evict_older_than() {
        let mut store = TagStore::new();
        let t0 = Instant::now();
        store.upsert("00001", fields("E2000000000000001"), t0);
        store.upsert("00002", fields("E2000000000000002"), t0 + Duration::from_secs(20));

        let evicted = store.evict_older_than(t0 + Duration::from_secs(10));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].chip_id(), "00001");
        assert!(store.get("00001").is_none());
        assert!(store.get("00002").is_some());

        assert!(store.evict_older_than(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let mut store = TagStore::new();
        let t0 = Instant::now();
        store.upsert("00001", fields("E2000000000000001"), t0);
        assert!(store.evict_older_than(t0).is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut store = TagStore::new();
        let t0 = Instant::now();
        store.upsert("00001", fields("E2000000000000001"), t0);
        let snapshot = store.snapshot();
        store.evict_older_than(t0 + Duration::from_secs(1));
        assert_eq!(snapshot.len(), 1);
        assert!(store.is_empty());
    }
}
