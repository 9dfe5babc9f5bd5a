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

//! Query executor
//!
//! Runs a descriptor against the indexing tree and optionally reduces the
//! result to the latest record per secondary id.

use apmindex_core::{MonitoringRecord, RecordKind, Result};
use apmindex_storage::{IndexedRecord, IndexingTree, QueryDescriptor, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Read path over an [`IndexingTree`].
#[derive(Clone)]
pub struct QueryExecutor {
    tree: Arc<IndexingTree>,
}

impl QueryExecutor {
    pub fn new(tree: Arc<IndexingTree>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &Arc<IndexingTree> {
        &self.tree
    }

    /// Run a query.
    ///
    /// With `latest_only` the result holds one record per
    /// `(kind, secondary id)`: the one with the greatest timestamp, ties
    /// going to the record inserted last. The reduced list is ordered by
    /// timestamp, then insertion sequence.
    pub fn execute(
        &self,
        descriptor: &QueryDescriptor,
        latest_only: bool,
    ) -> Result<Vec<IndexedRecord>> {
        let records = self.tree.query(descriptor)?;
        if !latest_only {
            return Ok(records);
        }

        let scanned = records.len();
        let latest = reduce_to_latest(records);
        debug!(scanned, kept = latest.len(), "Reduced to latest per key");
        Ok(latest)
    }

    /// Latest record per secondary id from the epoch until now.
    pub fn overview(&self, template: &MonitoringRecord) -> Result<Vec<IndexedRecord>> {
        let window = TimeWindow::new(DateTime::<Utc>::from(UNIX_EPOCH), Utc::now());
        let descriptor = QueryDescriptor::from_template(template, window)?;
        self.execute(&descriptor, true)
    }

    /// Latest record per secondary id within `[from, to)`.
    ///
    /// `from` after `to` yields an empty result without querying the tree.
    pub fn range(
        &self,
        template: &MonitoringRecord,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<IndexedRecord>> {
        if from > to {
            return Ok(Vec::new());
        }

        let descriptor = QueryDescriptor::from_template(template, TimeWindow::new(from, to))?;
        self.execute(&descriptor, true)
    }
}

/// Keep the greatest `(timestamp, sequence)` per `(kind, secondary id)`.
pub fn reduce_to_latest(records: Vec<IndexedRecord>) -> Vec<IndexedRecord> {
    let mut latest: HashMap<(RecordKind, u64), IndexedRecord> = HashMap::new();

    for record in records {
        let key = (record.kind(), record.secondary_id());
        match latest.get(&key) {
            Some(current) if current.order_key() >= record.order_key() => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut reduced: Vec<IndexedRecord> = latest.into_values().collect();
    reduced.sort_by_key(IndexedRecord::order_key);
    reduced
}
