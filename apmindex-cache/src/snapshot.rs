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

//! Immutable identity snapshot
//!
//! Readers hold an `Arc<IdentitySnapshot>` and always see the four maps of
//! one generation together. Writers build a new snapshot and swap it in.

use apmindex_core::{
    AgentDescriptor, IdentKind, JmxDefinitionDescriptor, MethodDescriptor, SensorTypeDescriptor,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptor returned by the kind-generic lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ident {
    Agent(Arc<AgentDescriptor>),
    SensorType(Arc<SensorTypeDescriptor>),
    Method(Arc<MethodDescriptor>),
    JmxDefinition(Arc<JmxDefinitionDescriptor>),
}

impl Ident {
    pub fn kind(&self) -> IdentKind {
        match self {
            Ident::Agent(_) => IdentKind::Agent,
            Ident::SensorType(_) => IdentKind::SensorType,
            Ident::Method(_) => IdentKind::Method,
            Ident::JmxDefinition(_) => IdentKind::JmxDefinition,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Ident::Agent(d) => d.id,
            Ident::SensorType(d) => d.id,
            Ident::Method(d) => d.id,
            Ident::JmxDefinition(d) => d.id,
        }
    }
}

/// Entry counts per id space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityCounts {
    pub agents: usize,
    pub sensor_types: usize,
    pub methods: usize,
    pub jmx_definitions: usize,
}

/// The four id maps of one refresh generation.
#[derive(Debug, Clone, Default)]
pub struct IdentitySnapshot {
    generation: u64,
    agents: HashMap<u64, Arc<AgentDescriptor>>,
    sensor_types: HashMap<u64, Arc<SensorTypeDescriptor>>,
    methods: HashMap<u64, Arc<MethodDescriptor>>,
    jmx_definitions: HashMap<u64, Arc<JmxDefinitionDescriptor>>,
}

impl IdentitySnapshot {
    /// Empty snapshot for the given generation.
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Number of completed full refreshes this snapshot descends from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agent(&self, id: u64) -> Option<Arc<AgentDescriptor>> {
        self.agents.get(&id).cloned()
    }

    pub fn sensor_type(&self, id: u64) -> Option<Arc<SensorTypeDescriptor>> {
        self.sensor_types.get(&id).cloned()
    }

    pub fn method(&self, id: u64) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(&id).cloned()
    }

    pub fn jmx_definition(&self, id: u64) -> Option<Arc<JmxDefinitionDescriptor>> {
        self.jmx_definitions.get(&id).cloned()
    }

    pub fn get(&self, kind: IdentKind, id: u64) -> Option<Ident> {
        match kind {
            IdentKind::Agent => self.agent(id).map(Ident::Agent),
            IdentKind::SensorType => self.sensor_type(id).map(Ident::SensorType),
            IdentKind::Method => self.method(id).map(Ident::Method),
            IdentKind::JmxDefinition => self.jmx_definition(id).map(Ident::JmxDefinition),
        }
    }

    pub fn agent_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn counts(&self) -> IdentityCounts {
        IdentityCounts {
            agents: self.agents.len(),
            sensor_types: self.sensor_types.len(),
            methods: self.methods.len(),
            jmx_definitions: self.jmx_definitions.len(),
        }
    }

    /// Insert an agent and every descriptor nested in it.
    pub(crate) fn insert_agent(&mut self, agent: AgentDescriptor) {
        for sensor_type in &agent.sensor_types {
            self.sensor_types
                .insert(sensor_type.id, Arc::new(sensor_type.clone()));
        }
        for method in &agent.methods {
            self.methods.insert(method.id, Arc::new(method.clone()));
        }
        for definition in &agent.jmx_definitions {
            self.jmx_definitions
                .insert(definition.id, Arc::new(definition.clone()));
        }
        self.agents.insert(agent.id, Arc::new(agent));
    }

    /// Remove an agent and the descriptors its cached version carried.
    pub(crate) fn remove_agent(&mut self, agent_id: u64) {
        let Some(agent) = self.agents.remove(&agent_id) else {
            return;
        };
        for sensor_type in &agent.sensor_types {
            self.sensor_types.remove(&sensor_type.id);
        }
        for method in &agent.methods {
            self.methods.remove(&method.id);
        }
        for definition in &agent.jmx_definitions {
            self.jmx_definitions.remove(&definition.id);
        }
    }
}
