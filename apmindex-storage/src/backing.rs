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

//! Backing stores the indexing tree reads through.
//!
//! The tree treats a backing store as a durable per-agent log: it appends
//! every inserted record and materialises an agent's log into memory the
//! first time that agent is touched.

use apmindex_core::{MonitoringRecord, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Durable record log consulted by the indexing tree.
pub trait BackingStore: Send + Sync {
    /// Agents with at least one persisted record.
    fn agent_ids(&self) -> Result<Vec<u64>>;

    /// Every persisted record of one agent, in append order.
    fn load_agent(&self, agent_id: u64) -> Result<Vec<MonitoringRecord>>;

    fn append(&self, record: &MonitoringRecord) -> Result<()>;

    /// Drop an agent's log. Removing an unknown agent is not an error.
    fn remove_agent(&self, agent_id: u64) -> Result<()>;
}

/// Backing store without persistence.
///
/// Seeds a tree with records it has not indexed yet, for embedders that
/// hand over a batch up front and for read-through tests. A tree with no
/// backing store at all keeps a single copy of each record.
#[derive(Default)]
pub struct MemoryBackingStore {
    logs: RwLock<BTreeMap<u64, Vec<MonitoringRecord>>>,
}

impl MemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = MonitoringRecord>) -> Self {
        let store = Self::new();
        {
            let mut logs = store.logs.write();
            for record in records {
                logs.entry(record.agent_id).or_default().push(record);
            }
        }
        store
    }

    pub fn record_count(&self) -> usize {
        self.logs.read().values().map(Vec::len).sum()
    }
}

impl BackingStore for MemoryBackingStore {
    fn agent_ids(&self) -> Result<Vec<u64>> {
        Ok(self.logs.read().keys().copied().collect())
    }

    fn load_agent(&self, agent_id: u64) -> Result<Vec<MonitoringRecord>> {
        Ok(self.logs.read().get(&agent_id).cloned().unwrap_or_default())
    }

    fn append(&self, record: &MonitoringRecord) -> Result<()> {
        self.logs
            .write()
            .entry(record.agent_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn remove_agent(&self, agent_id: u64) -> Result<()> {
        self.logs.write().remove(&agent_id);
        Ok(())
    }
}
