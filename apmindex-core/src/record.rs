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

//! Monitoring records and their queryable fields.
//!
//! Every record kind exposes a fixed set of fields that restrictions can
//! refer to. The catalogue is resolved once when a query is built, so the
//! scan path never deals with field names.
//!
//! | kind             | secondary id        | kind-specific fields                 |
//! |------------------|---------------------|--------------------------------------|
//! | `JmxSensorValue` | `jmx_definition_id` | `value`                              |
//! | `Timer`          | `method_id`         | `duration`, `count`, `min`, `max`    |
//!
//! `agent_id`, `sensor_type_id` and `timestamp` exist on every kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Discriminant of a monitoring record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    JmxSensorValue,
    Timer,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::JmxSensorValue, RecordKind::Timer];

    /// Field holding the kind-specific secondary id.
    pub fn secondary_field(self) -> Field {
        match self {
            RecordKind::JmxSensorValue => Field::JmxDefinitionId,
            RecordKind::Timer => Field::MethodId,
        }
    }

    /// Fields a restriction may reference for this kind.
    pub fn fields(self) -> &'static [Field] {
        match self {
            RecordKind::JmxSensorValue => &[
                Field::AgentId,
                Field::SensorTypeId,
                Field::Timestamp,
                Field::JmxDefinitionId,
                Field::Value,
            ],
            RecordKind::Timer => &[
                Field::AgentId,
                Field::SensorTypeId,
                Field::Timestamp,
                Field::MethodId,
                Field::Duration,
                Field::Count,
                Field::Min,
                Field::Max,
            ],
        }
    }

    pub fn has_field(self, field: Field) -> bool {
        self.fields().contains(&field)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::JmxSensorValue => write!(f, "JmxSensorValue"),
            RecordKind::Timer => write!(f, "Timer"),
        }
    }
}

/// A queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AgentId,
    SensorTypeId,
    Timestamp,
    JmxDefinitionId,
    Value,
    MethodId,
    Duration,
    Count,
    Min,
    Max,
}

impl Field {
    /// Resolve a field by its wire name.
    pub fn from_name(name: &str) -> Option<Field> {
        let field = match name {
            "agent_id" => Field::AgentId,
            "sensor_type_id" => Field::SensorTypeId,
            "timestamp" => Field::Timestamp,
            "jmx_definition_id" => Field::JmxDefinitionId,
            "value" => Field::Value,
            "method_id" => Field::MethodId,
            "duration" => Field::Duration,
            "count" => Field::Count,
            "min" => Field::Min,
            "max" => Field::Max,
            _ => return None,
        };
        Some(field)
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::AgentId => "agent_id",
            Field::SensorTypeId => "sensor_type_id",
            Field::Timestamp => "timestamp",
            Field::JmxDefinitionId => "jmx_definition_id",
            Field::Value => "value",
            Field::MethodId => "method_id",
            Field::Duration => "duration",
            Field::Count => "count",
            Field::Min => "min",
            Field::Max => "max",
        }
    }

    pub fn field_type(self) -> FieldType {
        match self {
            Field::AgentId | Field::SensorTypeId | Field::JmxDefinitionId | Field::MethodId => {
                FieldType::Id
            }
            Field::Timestamp => FieldType::Timestamp,
            Field::Value => FieldType::Text,
            Field::Count => FieldType::Unsigned,
            Field::Duration | Field::Min | Field::Max => FieldType::Number,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Entity id; 0 is the wildcard and never a valid operand.
    Id,
    Unsigned,
    Number,
    Text,
    Timestamp,
}

impl FieldType {
    /// Whether `value` can be compared against a field of this type.
    pub fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldType::Id | FieldType::Unsigned, FieldValue::Unsigned(_))
                | (FieldType::Number, FieldValue::Number(_))
                | (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Timestamp, FieldValue::Timestamp(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Id => "id",
            FieldType::Unsigned => "unsigned",
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A field value read from a record or supplied as a restriction operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Unsigned(u64),
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Ordering between two values of the same variant.
    ///
    /// Values of different variants, and NaN numbers, are incomparable.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Unsigned(a), FieldValue::Unsigned(b)) => Some(a.cmp(b)),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Unsigned(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

/// Aggregated timer measurement for one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerData {
    pub method_id: u64,
    /// Total duration in milliseconds.
    pub duration: f64,
    pub count: u64,
    pub min: f64,
    pub max: f64,
}

/// Kind-specific part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordPayload {
    JmxSensorValue {
        jmx_definition_id: u64,
        /// Attribute value as reported by the MBean server.
        value: String,
    },
    Timer(TimerData),
}

/// One observed data point.
///
/// Records are immutable once created; the indexing tree shares them
/// behind `Arc` and tells them apart by insertion sequence, not by content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRecord {
    pub agent_id: u64,
    pub sensor_type_id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl MonitoringRecord {
    pub fn jmx(
        agent_id: u64,
        sensor_type_id: u64,
        jmx_definition_id: u64,
        timestamp: DateTime<Utc>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            sensor_type_id,
            timestamp,
            payload: RecordPayload::JmxSensorValue {
                jmx_definition_id,
                value: value.into(),
            },
        }
    }

    pub fn timer(
        agent_id: u64,
        sensor_type_id: u64,
        timestamp: DateTime<Utc>,
        data: TimerData,
    ) -> Self {
        Self {
            agent_id,
            sensor_type_id,
            timestamp,
            payload: RecordPayload::Timer(data),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self.payload {
            RecordPayload::JmxSensorValue { .. } => RecordKind::JmxSensorValue,
            RecordPayload::Timer(_) => RecordKind::Timer,
        }
    }

    /// Kind-specific secondary id (JMX definition id, method id).
    pub fn secondary_id(&self) -> u64 {
        match &self.payload {
            RecordPayload::JmxSensorValue {
                jmx_definition_id, ..
            } => *jmx_definition_id,
            RecordPayload::Timer(timer) => timer.method_id,
        }
    }

    /// Read a field. `None` when the field does not exist on this kind.
    pub fn field_value(&self, field: Field) -> Option<FieldValue> {
        let value = match (field, &self.payload) {
            (Field::AgentId, _) => FieldValue::Unsigned(self.agent_id),
            (Field::SensorTypeId, _) => FieldValue::Unsigned(self.sensor_type_id),
            (Field::Timestamp, _) => FieldValue::Timestamp(self.timestamp),
            (
                Field::JmxDefinitionId,
                RecordPayload::JmxSensorValue {
                    jmx_definition_id, ..
                },
            ) => FieldValue::Unsigned(*jmx_definition_id),
            (Field::Value, RecordPayload::JmxSensorValue { value, .. }) => {
                FieldValue::Text(value.clone())
            }
            (Field::MethodId, RecordPayload::Timer(t)) => FieldValue::Unsigned(t.method_id),
            (Field::Duration, RecordPayload::Timer(t)) => FieldValue::Number(t.duration),
            (Field::Count, RecordPayload::Timer(t)) => FieldValue::Unsigned(t.count),
            (Field::Min, RecordPayload::Timer(t)) => FieldValue::Number(t.min),
            (Field::Max, RecordPayload::Timer(t)) => FieldValue::Number(t.max),
            _ => return None,
        };
        Some(value)
    }
}
