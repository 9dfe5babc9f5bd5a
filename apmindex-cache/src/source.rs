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

//! Contract of the authoritative metadata source.

use apmindex_core::{AgentDescriptor, AgentOverview, AgentStatus};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached or did not answer.
    #[error("metadata source unavailable: {0}")]
    Unavailable(String),

    #[error("unknown agent {0}")]
    UnknownAgent(u64),

    /// Any other business-rule rejection.
    #[error("business error: {0}")]
    Business(String),
}

impl SourceError {
    pub fn is_business(&self) -> bool {
        !matches!(self, SourceError::Unavailable(_))
    }
}

/// Bulk provider of agent descriptor graphs.
pub trait MetadataSource: Send + Sync {
    /// Summaries of every known agent with their status.
    fn agents_overview(&self) -> Result<Vec<AgentOverview>, SourceError>;

    /// Complete descriptor graph of one agent.
    fn complete_agent(&self, agent_id: u64) -> Result<AgentDescriptor, SourceError>;
}

/// In-process metadata source backed by a map.
///
/// Serves embedded deployments that register agents locally; counts calls
/// so callers can observe refresh traffic.
#[derive(Default)]
pub struct StaticMetadataSource {
    agents: RwLock<BTreeMap<u64, (AgentDescriptor, AgentStatus)>>,
    failing_agents: RwLock<HashSet<u64>>,
    unavailable: AtomicBool,
    overview_calls: AtomicU64,
    agent_calls: AtomicU64,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: AgentDescriptor, status: AgentStatus) {
        self.agents.write().insert(agent.id, (agent, status));
    }

    pub fn unregister(&self, agent_id: u64) {
        self.agents.write().remove(&agent_id);
    }

    /// Make `complete_agent` reject this agent while it stays in the overview.
    pub fn reject_agent(&self, agent_id: u64) {
        self.failing_agents.write().insert(agent_id);
    }

    pub fn accept_agent(&self, agent_id: u64) {
        self.failing_agents.write().remove(&agent_id);
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn overview_calls(&self) -> u64 {
        self.overview_calls.load(Ordering::SeqCst)
    }

    pub fn agent_calls(&self) -> u64 {
        self.agent_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("source marked offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl MetadataSource for StaticMetadataSource {
    fn agents_overview(&self) -> Result<Vec<AgentOverview>, SourceError> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self
            .agents
            .read()
            .values()
            .map(|(agent, status)| AgentOverview {
                agent: agent.summary(),
                status: status.clone(),
            })
            .collect())
    }

    fn complete_agent(&self, agent_id: u64) -> Result<AgentDescriptor, SourceError> {
        self.agent_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if self.failing_agents.read().contains(&agent_id) {
            return Err(SourceError::Business(format!(
                "agent {} could not be loaded",
                agent_id
            )));
        }

        self.agents
            .read()
            .get(&agent_id)
            .map(|(agent, _)| agent.clone())
            .ok_or(SourceError::UnknownAgent(agent_id))
    }
}
