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

//! Query descriptors
//!
//! A descriptor names the record kinds to search, optional agent and
//! sensor-type filters, a time window and a conjunction of restrictions.
//! It is validated once by [`QueryDescriptorBuilder::build`] and is
//! immutable afterwards.

use crate::restriction::{ResolvedRestriction, Restriction};
use apmindex_core::{IndexError, MonitoringRecord, RecordKind, Result};
use chrono::{DateTime, Utc};

/// Time window: `from` inclusive, `to` exclusive, either end optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Unbounded on both ends.
    pub fn all() -> Self {
        Self::default()
    }

    /// True when no instant can satisfy the window (`from >= to`).
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from >= to)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts < to)
    }
}

/// Validated query template.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    kinds: Vec<RecordKind>,
    agent_id: Option<u64>,
    sensor_type_id: Option<u64>,
    window: TimeWindow,
    restrictions: Vec<ResolvedRestriction>,
}

impl QueryDescriptor {
    pub fn builder() -> QueryDescriptorBuilder {
        QueryDescriptorBuilder::default()
    }

    /// Build a descriptor from a partially filled record.
    ///
    /// Non-zero agent, sensor-type and secondary ids narrow the query;
    /// zero-valued ids are wildcards. Payload fields are ignored.
    pub fn from_template(template: &MonitoringRecord, window: TimeWindow) -> Result<Self> {
        Self::template_builder(template).window(window).build()
    }

    /// Builder pre-filled from a template, for callers that add restrictions.
    pub fn template_builder(template: &MonitoringRecord) -> QueryDescriptorBuilder {
        let kind = template.kind();
        let mut builder = Self::builder().kind(kind);

        if template.agent_id > 0 {
            builder = builder.agent(template.agent_id);
        }
        if template.sensor_type_id > 0 {
            builder = builder.sensor_type(template.sensor_type_id);
        }
        if template.secondary_id() > 0 {
            builder = builder.restrict(Restriction::equals(
                kind.secondary_field().name(),
                template.secondary_id(),
            ));
        }

        builder
    }

    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    pub fn agent_id(&self) -> Option<u64> {
        self.agent_id
    }

    pub fn sensor_type_id(&self) -> Option<u64> {
        self.sensor_type_id
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn restrictions(&self) -> &[ResolvedRestriction] {
        &self.restrictions
    }

    /// Filters applied after the bucket has been pruned to the window.
    pub fn matches(&self, record: &MonitoringRecord) -> bool {
        if let Some(sensor_type_id) = self.sensor_type_id {
            if record.sensor_type_id != sensor_type_id {
                return false;
            }
        }

        self.restrictions.iter().all(|r| r.matches(record))
    }
}

/// Builder for [`QueryDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct QueryDescriptorBuilder {
    kinds: Vec<RecordKind>,
    agent_id: Option<u64>,
    sensor_type_id: Option<u64>,
    window: TimeWindow,
    restrictions: Vec<Restriction>,
}

impl QueryDescriptorBuilder {
    pub fn kind(mut self, kind: RecordKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        for kind in kinds {
            self = self.kind(kind);
        }
        self
    }

    pub fn agent(mut self, agent_id: u64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn sensor_type(mut self, sensor_type_id: u64) -> Self {
        self.sensor_type_id = Some(sensor_type_id);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.window.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.window.to = Some(to);
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn restrict(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn build(self) -> Result<QueryDescriptor> {
        if self.kinds.is_empty() {
            return Err(IndexError::EmptyKindSet);
        }
        if self.agent_id == Some(0) {
            return Err(IndexError::InvalidIdentifier {
                field: "agent_id".to_string(),
            });
        }
        if self.sensor_type_id == Some(0) {
            return Err(IndexError::InvalidIdentifier {
                field: "sensor_type_id".to_string(),
            });
        }

        let restrictions = self
            .restrictions
            .iter()
            .map(|r| r.resolve(&self.kinds))
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryDescriptor {
            kinds: self.kinds,
            agent_id: self.agent_id,
            sensor_type_id: self.sensor_type_id,
            window: self.window,
            restrictions,
        })
    }
}
