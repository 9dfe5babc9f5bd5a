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

//! Apmindex Core
//!
//! Record, field and identity types shared by the indexing tree, the query
//! executor and the identity cache.

pub mod config;
pub mod error;
pub mod ident;
pub mod logging;
pub mod record;

pub use config::{ApmIndexConfig, CacheSettings, StorageSettings};
pub use error::{IndexError, Result};
pub use ident::{
    AgentConnection, AgentDescriptor, AgentOverview, AgentStatus, IdentKind,
    JmxDefinitionDescriptor, MethodDescriptor, SensorTypeDescriptor,
};
pub use record::{
    Field, FieldType, FieldValue, MonitoringRecord, RecordKind, RecordPayload, TimerData,
};
