// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Indexing Tree
//!
//! In-memory index over monitoring records, read through from a
//! [`BackingStore`].
//!
//! ## Layout
//! ```text
//! IndexingTree
//! ├── (RecordKind, agent_id) -> Bucket      DashMap, one shard lock per lookup
//! │   └── RwLock<BTreeMap<(timestamp, sequence), Arc<MonitoringRecord>>>
//! └── agent gates                           first touch loads the agent's log
//! ```
//!
//! Without a backing store the tree is purely in memory and keeps no gates.
//!
//! A query against one agent only locks that agent's buckets, so inserts
//! for other agents proceed concurrently. Within a bucket, readers share
//! the lock and inserts take it exclusively.

use crate::backing::BackingStore;
use crate::descriptor::QueryDescriptor;
use crate::segment::SegmentFileStore;
use apmindex_core::{MonitoringRecord, RecordKind, Result, StorageSettings};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::{Bound, Deref};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Bucket key: (record kind, owning agent id)
pub type BucketKey = (RecordKind, u64);

/// Ordering key inside a bucket.
type EntryKey = (DateTime<Utc>, u64);

/// A record as held by the tree, tagged with its insertion sequence.
///
/// Sequence numbers are unique per tree and strictly increasing in
/// insertion order; they tell apart records with identical content.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub sequence: u64,
    pub record: Arc<MonitoringRecord>,
}

impl IndexedRecord {
    /// Key used to order records: timestamp, then insertion sequence.
    pub fn order_key(&self) -> EntryKey {
        (self.record.timestamp, self.sequence)
    }
}

impl Deref for IndexedRecord {
    type Target = MonitoringRecord;

    fn deref(&self) -> &MonitoringRecord {
        &self.record
    }
}

#[derive(Debug, Default)]
struct Bucket {
    entries: BTreeMap<EntryKey, Arc<MonitoringRecord>>,
}

impl Bucket {
    fn collect_into(&self, descriptor: &QueryDescriptor, out: &mut Vec<IndexedRecord>) {
        let window = descriptor.window();
        let lower = match window.from {
            Some(from) => Bound::Included((from, 0)),
            None => Bound::Unbounded,
        };
        let upper = match window.to {
            Some(to) => Bound::Excluded((to, 0)),
            None => Bound::Unbounded,
        };

        out.extend(
            self.entries
                .range((lower, upper))
                .filter(|(_, record)| descriptor.matches(record))
                .map(|((_, sequence), record)| IndexedRecord {
                    sequence: *sequence,
                    record: Arc::clone(record),
                }),
        );
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub records: usize,
    pub buckets: usize,
    /// Queries that reached the buckets (guarded queries are not counted).
    pub queries: u64,
    pub buckets_scanned: u64,
    pub materialized_agents: u64,
    /// Agents with a live materialisation gate.
    pub gated_agents: usize,
}

/// Materialisation state of one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum GateState {
    #[default]
    Unloaded,
    Loaded,
    /// Dropped from the gate map; holders must fetch a fresh gate.
    Retired,
}

/// Hierarchical record index: kind -> agent -> timestamp.
pub struct IndexingTree {
    buckets: DashMap<BucketKey, Arc<RwLock<Bucket>>>,
    backing: Option<Arc<dyn BackingStore>>,
    agent_gates: DashMap<u64, Arc<Mutex<GateState>>>,
    /// `true` once every agent known to the backing store has been loaded.
    catalog_loaded: Mutex<bool>,
    next_sequence: AtomicU64,
    queries: AtomicU64,
    buckets_scanned: AtomicU64,
    materialized_agents: AtomicU64,
}

impl Default for IndexingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexingTree {
    /// Purely in-memory tree.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Tree reading through to, and writing through to, `backing`.
    pub fn with_backing(backing: Arc<dyn BackingStore>) -> Self {
        Self::build(Some(backing))
    }

    fn build(backing: Option<Arc<dyn BackingStore>>) -> Self {
        Self {
            buckets: DashMap::new(),
            backing,
            agent_gates: DashMap::new(),
            catalog_loaded: Mutex::new(false),
            next_sequence: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            buckets_scanned: AtomicU64::new(0),
            materialized_agents: AtomicU64::new(0),
        }
    }

    /// Segment store when a directory is configured, memory only otherwise.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self> {
        Ok(match SegmentFileStore::from_settings(settings)? {
            Some(store) => Self::with_backing(Arc::new(store)),
            None => Self::new(),
        })
    }

    pub fn has_backing_store(&self) -> bool {
        self.backing.is_some()
    }

    /// Add a record under its (kind, agent) bucket.
    ///
    /// The record is appended to the backing store, if any, before it
    /// becomes visible to queries.
    pub fn insert(&self, record: MonitoringRecord) -> Result<IndexedRecord> {
        let Some(backing) = &self.backing else {
            return Ok(self.index_record(record));
        };

        let agent_id = record.agent_id;
        self.with_gate(agent_id, |state| {
            self.materialize_locked(agent_id, backing.as_ref(), state, false)?;
            backing.append(&record)?;
            Ok(self.index_record(record))
        })
    }

    pub fn insert_all(
        &self,
        records: impl IntoIterator<Item = MonitoringRecord>,
    ) -> Result<Vec<IndexedRecord>> {
        records.into_iter().map(|r| self.insert(r)).collect()
    }

    /// Every record matching the descriptor.
    ///
    /// Ascending by timestamp (then insertion sequence) within each bucket;
    /// buckets are visited kind by kind in descriptor order and, within a
    /// kind, by ascending agent id.
    pub fn query(&self, descriptor: &QueryDescriptor) -> Result<Vec<IndexedRecord>> {
        if descriptor.window().is_empty() {
            debug!(window = ?descriptor.window(), "Empty window, skipping traversal");
            return Ok(Vec::new());
        }

        self.queries.fetch_add(1, Ordering::Relaxed);

        match descriptor.agent_id() {
            Some(agent_id) => self.ensure_materialized(agent_id)?,
            None => self.ensure_all_materialized()?,
        }

        let mut results = Vec::new();
        for kind in descriptor.kinds() {
            for bucket in self.buckets_for(*kind, descriptor.agent_id()) {
                self.buckets_scanned.fetch_add(1, Ordering::Relaxed);
                bucket.read().collect_into(descriptor, &mut results);
            }
        }

        debug!(
            kinds = ?descriptor.kinds(),
            agent_id = ?descriptor.agent_id(),
            matched = results.len(),
            "Query complete"
        );
        Ok(results)
    }

    /// Remove every bucket of an agent, in memory and in the backing store.
    ///
    /// Idempotent; returns the number of records removed from memory.
    pub fn delete(&self, agent_id: u64) -> Result<usize> {
        let removed = match &self.backing {
            Some(backing) => self.with_gate(agent_id, |state| {
                let removed = self.remove_buckets(agent_id);
                backing.remove_agent(agent_id)?;
                self.retire_gate(agent_id, state);
                Ok(removed)
            })?,
            None => self.remove_buckets(agent_id),
        };

        info!(agent_id, removed, "Deleted agent records");
        Ok(removed)
    }

    fn remove_buckets(&self, agent_id: u64) -> usize {
        let mut removed = 0;
        self.buckets.retain(|(_, agent), bucket| {
            if *agent == agent_id {
                removed += bucket.read().entries.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Agents with at least one bucket in memory, ascending.
    pub fn agents(&self) -> Vec<u64> {
        let mut agents: Vec<u64> = self.buckets.iter().map(|e| e.key().1).collect();
        agents.sort_unstable();
        agents.dedup();
        agents
    }

    /// Number of records held in memory.
    pub fn len(&self) -> usize {
        self.snapshot_buckets()
            .iter()
            .map(|(_, bucket)| bucket.read().entries.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            records: self.len(),
            buckets: self.buckets.len(),
            queries: self.queries.load(Ordering::Relaxed),
            buckets_scanned: self.buckets_scanned.load(Ordering::Relaxed),
            materialized_agents: self.materialized_agents.load(Ordering::Relaxed),
            gated_agents: self.agent_gates.len(),
        }
    }

    fn index_record(&self, record: MonitoringRecord) -> IndexedRecord {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = (record.kind(), record.agent_id);
        let record = Arc::new(record);

        let bucket = Arc::clone(&self.buckets.entry(key).or_default());
        bucket
            .write()
            .entries
            .insert((record.timestamp, sequence), Arc::clone(&record));

        IndexedRecord { sequence, record }
    }

    /// Run `f` holding the agent's gate.
    ///
    /// A gate retired while we waited for it is no longer in the map, so we
    /// retry with the current one.
    fn with_gate<T>(
        &self,
        agent_id: u64,
        f: impl FnOnce(&mut GateState) -> Result<T>,
    ) -> Result<T> {
        loop {
            let gate = Arc::clone(&self.agent_gates.entry(agent_id).or_default());
            let mut state = gate.lock();
            if *state == GateState::Retired {
                continue;
            }
            return f(&mut *state);
        }
    }

    /// Caller holds the gate, so the map entry is the gate in `state`.
    fn retire_gate(&self, agent_id: u64, state: &mut GateState) {
        *state = GateState::Retired;
        self.agent_gates.remove(&agent_id);
    }

    /// Load an agent's log the first time the agent is touched.
    ///
    /// With `retire_if_empty`, an agent with nothing persisted keeps no
    /// gate, so reads of unknown agents leave no trace.
    fn materialize_locked(
        &self,
        agent_id: u64,
        backing: &dyn BackingStore,
        state: &mut GateState,
        retire_if_empty: bool,
    ) -> Result<()> {
        if *state == GateState::Loaded {
            return Ok(());
        }

        let records = backing.load_agent(agent_id)?;
        if records.is_empty() && retire_if_empty {
            self.retire_gate(agent_id, state);
            return Ok(());
        }

        let count = records.len();
        for record in records {
            self.index_record(record);
        }

        *state = GateState::Loaded;
        self.materialized_agents.fetch_add(1, Ordering::Relaxed);
        debug!(agent_id, records = count, "Materialized agent");
        Ok(())
    }

    fn ensure_materialized(&self, agent_id: u64) -> Result<()> {
        let Some(backing) = &self.backing else {
            return Ok(());
        };
        self.with_gate(agent_id, |state| {
            self.materialize_locked(agent_id, backing.as_ref(), state, true)
        })
    }

    fn ensure_all_materialized(&self) -> Result<()> {
        let Some(backing) = &self.backing else {
            return Ok(());
        };

        let mut catalog_loaded = self.catalog_loaded.lock();
        if *catalog_loaded {
            return Ok(());
        }

        for agent_id in backing.agent_ids()? {
            self.ensure_materialized(agent_id)?;
        }

        *catalog_loaded = true;
        Ok(())
    }

    /// Buckets of one kind, narrowed to one agent when given, by agent id.
    fn buckets_for(&self, kind: RecordKind, agent_id: Option<u64>) -> Vec<Arc<RwLock<Bucket>>> {
        match agent_id {
            Some(agent_id) => self
                .buckets
                .get(&(kind, agent_id))
                .map(|b| vec![Arc::clone(&b)])
                .unwrap_or_default(),
            None => {
                let mut buckets: Vec<(u64, Arc<RwLock<Bucket>>)> = self
                    .buckets
                    .iter()
                    .filter(|e| e.key().0 == kind)
                    .map(|e| (e.key().1, Arc::clone(e.value())))
                    .collect();
                buckets.sort_by_key(|(agent, _)| *agent);
                buckets.into_iter().map(|(_, b)| b).collect()
            }
        }
    }

    fn snapshot_buckets(&self) -> Vec<(BucketKey, Arc<RwLock<Bucket>>)> {
        self.buckets
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::MemoryBackingStore;
    use crate::descriptor::TimeWindow;
    use crate::restriction::Restriction;
    use apmindex_core::TimerData;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn jmx(agent: u64, def: u64, secs: i64) -> MonitoringRecord {
        MonitoringRecord::jmx(agent, 3, def, ts(secs), format!("{}", secs))
    }

    fn timer(agent: u64, method: u64, secs: i64) -> MonitoringRecord {
        MonitoringRecord::timer(
            agent,
            4,
            ts(secs),
            TimerData {
                method_id: method,
                duration: secs as f64,
                count: 1,
                min: 0.0,
                max: 0.0,
            },
        )
    }

    fn jmx_query() -> QueryDescriptor {
        QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_keeps_timestamp_order() {
        let tree = IndexingTree::new();
        tree.insert(jmx(7, 42, 30)).unwrap();
        tree.insert(jmx(7, 42, 10)).unwrap();
        tree.insert(jmx(7, 42, 20)).unwrap();

        let results = tree.query(&jmx_query()).unwrap();
        let times: Vec<i64> = results.iter().map(|r| r.timestamp.timestamp()).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_duplicates_are_distinct_records() {
        let tree = IndexingTree::new();
        let a = tree.insert(jmx(7, 42, 10)).unwrap();
        let b = tree.insert(jmx(7, 42, 10)).unwrap();
        assert!(b.sequence > a.sequence);

        let results = tree.query(&jmx_query()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sequence, a.sequence);
        assert_eq!(results[1].sequence, b.sequence);
    }

    #[test]
    fn test_window_is_half_open() {
        let tree = IndexingTree::new();
        for secs in [10, 20, 30] {
            tree.insert(jmx(7, 42, secs)).unwrap();
        }

        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .window(TimeWindow::new(ts(10), ts(30)))
            .build()
            .unwrap();
        let times: Vec<i64> = tree
            .query(&q)
            .unwrap()
            .iter()
            .map(|r| r.timestamp.timestamp())
            .collect();
        assert_eq!(times, vec![10, 20]);
    }

    #[test]
    fn test_agent_filter_only_scans_that_agent() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();
        tree.insert(jmx(2, 42, 10)).unwrap();
        tree.insert(jmx(3, 42, 10)).unwrap();

        let before = tree.stats().buckets_scanned;
        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .agent(2)
            .build()
            .unwrap();
        let results = tree.query(&q).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].agent_id, 2);
        assert_eq!(tree.stats().buckets_scanned - before, 1);
    }

    #[test]
    fn test_scan_all_agents_in_agent_order() {
        let tree = IndexingTree::new();
        tree.insert(jmx(9, 1, 5)).unwrap();
        tree.insert(jmx(2, 1, 50)).unwrap();
        tree.insert(jmx(5, 1, 1)).unwrap();

        let agents: Vec<u64> = tree
            .query(&jmx_query())
            .unwrap()
            .iter()
            .map(|r| r.agent_id)
            .collect();
        assert_eq!(agents, vec![2, 5, 9]);
    }

    #[test]
    fn test_kinds_are_separate() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();
        tree.insert(timer(1, 8, 10)).unwrap();

        assert_eq!(tree.query(&jmx_query()).unwrap().len(), 1);

        let both = QueryDescriptor::builder()
            .kinds(RecordKind::ALL)
            .build()
            .unwrap();
        assert_eq!(tree.query(&both).unwrap().len(), 2);
    }

    #[test]
    fn test_kind_without_records_is_empty() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();

        let q = QueryDescriptor::builder()
            .kind(RecordKind::Timer)
            .build()
            .unwrap();
        assert!(tree.query(&q).unwrap().is_empty());
    }

    #[test]
    fn test_sensor_type_and_restrictions_filter_survivors() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();
        tree.insert(jmx(1, 43, 10)).unwrap();
        tree.insert(MonitoringRecord::jmx(1, 99, 42, ts(10), "other")).unwrap();

        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .sensor_type(3)
            .restrict(Restriction::equals("jmx_definition_id", 42u64))
            .build()
            .unwrap();
        let results = tree.query(&q).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].secondary_id(), 42);
        assert_eq!(results[0].sensor_type_id, 3);
    }

    #[test]
    fn test_inverted_window_does_not_traverse() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();
        let before = tree.stats();

        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .window(TimeWindow::new(ts(20), ts(10)))
            .build()
            .unwrap();
        assert!(tree.query(&q).unwrap().is_empty());

        let after = tree.stats();
        assert_eq!(after.queries, before.queries);
        assert_eq!(after.buckets_scanned, before.buckets_scanned);
    }

    #[test]
    fn test_delete_agent() {
        let tree = IndexingTree::new();
        tree.insert(jmx(1, 42, 10)).unwrap();
        tree.insert(timer(1, 8, 10)).unwrap();
        tree.insert(jmx(2, 42, 10)).unwrap();

        assert_eq!(tree.delete(1).unwrap(), 2);
        assert_eq!(tree.delete(1).unwrap(), 0);

        assert_eq!(tree.agents(), vec![2]);
        assert_eq!(tree.len(), 1);

        let q = QueryDescriptor::builder()
            .kinds(RecordKind::ALL)
            .agent(1)
            .build()
            .unwrap();
        assert!(tree.query(&q).unwrap().is_empty());
    }

    #[test]
    fn test_reads_through_backing_store_once() {
        let backing = Arc::new(MemoryBackingStore::with_records([
            jmx(4, 42, 10),
            jmx(4, 42, 20),
            jmx(6, 42, 30),
        ]));
        let tree = IndexingTree::with_backing(backing.clone());
        assert!(tree.is_empty());

        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .agent(4)
            .build()
            .unwrap();
        assert_eq!(tree.query(&q).unwrap().len(), 2);
        assert_eq!(tree.query(&q).unwrap().len(), 2);
        assert_eq!(tree.stats().materialized_agents, 1);

        // A full scan picks up the remaining agent.
        assert_eq!(tree.query(&jmx_query()).unwrap().len(), 3);
        assert_eq!(tree.stats().materialized_agents, 2);
    }

    #[test]
    fn test_insert_writes_through() {
        let backing = Arc::new(MemoryBackingStore::new());
        let tree = IndexingTree::with_backing(backing.clone());
        tree.insert(jmx(4, 42, 10)).unwrap();
        assert_eq!(backing.record_count(), 1);

        tree.delete(4).unwrap();
        assert_eq!(backing.record_count(), 0);
    }

    #[test]
    fn test_insert_after_lazy_load_keeps_old_records() {
        let backing = Arc::new(MemoryBackingStore::with_records([jmx(4, 42, 10)]));
        let tree = IndexingTree::with_backing(backing);

        tree.insert(jmx(4, 42, 20)).unwrap();
        assert_eq!(tree.query(&jmx_query()).unwrap().len(), 2);
    }

    #[test]
    fn test_in_memory_tree_keeps_single_copy() {
        let tree = IndexingTree::new();
        assert!(!tree.has_backing_store());
        assert!(!IndexingTree::from_settings(&StorageSettings::default())
            .unwrap()
            .has_backing_store());

        tree.insert(jmx(4, 42, 10)).unwrap();
        let results = tree.query(&jmx_query()).unwrap();
        assert_eq!(results.len(), 1);
        // Only the bucket and this result share the record.
        assert_eq!(Arc::strong_count(&results[0].record), 2);

        tree.delete(4).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.stats().gated_agents, 0);
        assert_eq!(tree.stats().materialized_agents, 0);
    }

    #[test]
    fn test_unknown_agent_reads_leave_no_gates() {
        let tree = IndexingTree::with_backing(Arc::new(MemoryBackingStore::new()));
        let q = QueryDescriptor::builder()
            .kind(RecordKind::JmxSensorValue)
            .agent(99)
            .build()
            .unwrap();

        for _ in 0..3 {
            assert!(tree.query(&q).unwrap().is_empty());
        }
        assert_eq!(tree.stats().gated_agents, 0);

        tree.insert(jmx(4, 42, 10)).unwrap();
        assert_eq!(tree.stats().gated_agents, 1);

        tree.delete(4).unwrap();
        assert_eq!(tree.stats().gated_agents, 0);
    }

    #[test]
    fn test_reinsert_after_delete_is_not_duplicated() {
        let backing = Arc::new(MemoryBackingStore::new());
        let tree = IndexingTree::with_backing(backing.clone());
        tree.insert(jmx(4, 42, 10)).unwrap();
        tree.delete(4).unwrap();

        tree.insert(jmx(4, 42, 20)).unwrap();
        tree.insert(jmx(4, 42, 30)).unwrap();

        let times: Vec<i64> = tree
            .query(&jmx_query())
            .unwrap()
            .iter()
            .map(|r| r.timestamp.timestamp())
            .collect();
        assert_eq!(times, vec![20, 30]);
        assert_eq!(backing.record_count(), 2);
    }

    #[test]
    fn test_concurrent_delete_and_insert_stay_consistent() {
        let backing = Arc::new(MemoryBackingStore::new());
        let tree = Arc::new(IndexingTree::with_backing(backing.clone()));

        let writer = {
            let tree = Arc::clone(&tree);
            std::thread::spawn(move || {
                for secs in 0..200 {
                    tree.insert(jmx(4, 1, secs)).unwrap();
                }
            })
        };
        for _ in 0..20 {
            tree.delete(4).unwrap();
        }
        writer.join().unwrap();

        // Memory and the backing log hold exactly the same surviving records.
        assert_eq!(tree.len(), backing.record_count());
        let fresh = IndexingTree::with_backing(backing.clone());
        assert_eq!(fresh.query(&jmx_query()).unwrap().len(), tree.len());
    }

    #[test]
    fn test_concurrent_inserts_across_agents() {
        let tree = Arc::new(IndexingTree::new());
        let handles: Vec<_> = (1..=4u64)
            .map(|agent| {
                let tree = Arc::clone(&tree);
                std::thread::spawn(move || {
                    for secs in 0..250 {
                        tree.insert(jmx(agent, 1, secs)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tree.len(), 1000);
        assert_eq!(tree.agents(), vec![1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_query_matches_brute_force(
            records in prop::collection::vec((1u64..4, 0i64..500), 0..80),
            from in 0i64..500,
            span in 1i64..500,
        ) {
            let tree = IndexingTree::new();
            for (agent, secs) in &records {
                tree.insert(jmx(*agent, 1, *secs)).unwrap();
            }

            let window = TimeWindow::new(ts(from), ts(from + span));
            let q = QueryDescriptor::builder()
                .kind(RecordKind::JmxSensorValue)
                .window(window)
                .build()
                .unwrap();
            let results = tree.query(&q).unwrap();

            let expected = records
                .iter()
                .filter(|(_, secs)| *secs >= from && *secs < from + span)
                .count();
            prop_assert_eq!(results.len(), expected);

            for pair in results.windows(2) {
                if pair[0].agent_id == pair[1].agent_id {
                    prop_assert!(pair[0].order_key() < pair[1].order_key());
                } else {
                    prop_assert!(pair[0].agent_id < pair[1].agent_id);
                }
            }
        }
    }
}
