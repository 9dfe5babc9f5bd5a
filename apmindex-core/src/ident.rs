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

//! Identity descriptors for agents and the metadata they register.
//!
//! The authoritative metadata source owns these objects; the index crates
//! only hold copies keyed by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four disjoint id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentKind {
    Agent,
    SensorType,
    Method,
    JmxDefinition,
}

impl fmt::Display for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentKind::Agent => "agent",
            IdentKind::SensorType => "sensor type",
            IdentKind::Method => "method",
            IdentKind::JmxDefinition => "JMX definition",
        };
        f.write_str(name)
    }
}

/// A sensor type registered by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorTypeDescriptor {
    pub id: u64,
    pub agent_id: u64,
    pub fully_qualified_class_name: String,
}

/// An instrumented method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub id: u64,
    pub agent_id: u64,
    pub package_name: String,
    pub class_name: String,
    pub method_name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub return_type: String,
}

impl MethodDescriptor {
    /// `package.Class.method(params)` signature for display.
    pub fn signature(&self) -> String {
        let owner = if self.package_name.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.class_name)
        };
        format!("{}.{}({})", owner, self.method_name, self.parameters.join(", "))
    }
}

/// A monitored MBean attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JmxDefinitionDescriptor {
    pub id: u64,
    pub agent_id: u64,
    pub mbean_object_name: String,
    pub mbean_attribute_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl JmxDefinitionDescriptor {
    /// `ObjectName:attribute`
    pub fn derived_full_name(&self) -> String {
        format!("{}:{}", self.mbean_object_name, self.mbean_attribute_name)
    }
}

/// Full descriptor graph of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub defined_ips: Vec<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub sensor_types: Vec<SensorTypeDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub jmx_definitions: Vec<JmxDefinitionDescriptor>,
}

impl AgentDescriptor {
    /// Summary form without nested collections, as returned by an overview.
    pub fn summary(&self) -> AgentDescriptor {
        AgentDescriptor {
            sensor_types: Vec::new(),
            methods: Vec::new(),
            jmx_definitions: Vec::new(),
            ..self.clone()
        }
    }

    pub fn display_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{} [{}]", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// Connection state of an agent as seen by the metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentConnection {
    Connected,
    NoKeepAlive,
    Disconnected,
    NeverConnected,
}

/// Status info attached to an agent in the overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub connection: AgentConnection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_data_sent: Option<DateTime<Utc>>,
}

/// One entry of the agents overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOverview {
    pub agent: AgentDescriptor,
    pub status: AgentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentDescriptor {
        AgentDescriptor {
            id: 7,
            name: "checkout-service".to_string(),
            version: Some("2.4.1".to_string()),
            defined_ips: vec!["10.0.0.4".to_string()],
            registered_at: Utc::now(),
            sensor_types: vec![SensorTypeDescriptor {
                id: 3,
                agent_id: 7,
                fully_qualified_class_name: "rocks.sensor.TimerSensor".to_string(),
            }],
            methods: vec![MethodDescriptor {
                id: 11,
                agent_id: 7,
                package_name: "shop.cart".to_string(),
                class_name: "CartService".to_string(),
                method_name: "add".to_string(),
                parameters: vec!["long".to_string(), "int".to_string()],
                return_type: "void".to_string(),
            }],
            jmx_definitions: vec![],
        }
    }

    #[test]
    fn test_summary_drops_nested_collections() {
        let summary = agent().summary();
        assert_eq!(summary.id, 7);
        assert!(summary.sensor_types.is_empty());
        assert!(summary.methods.is_empty());
    }

    #[test]
    fn test_method_signature() {
        assert_eq!(
            agent().methods[0].signature(),
            "shop.cart.CartService.add(long, int)"
        );
    }

    #[test]
    fn test_descriptor_json_defaults() {
        let json = r#"{"id":1,"name":"a","registered_at":"2024-01-01T00:00:00Z"}"#;
        let parsed: AgentDescriptor = serde_json::from_str(json).unwrap();
        assert!(parsed.methods.is_empty());
        assert_eq!(parsed.display_name(), "a");
    }
}
