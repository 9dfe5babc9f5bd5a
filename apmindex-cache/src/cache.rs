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

//! Identity Cache
//!
//! Resolves agent, sensor-type, method and JMX-definition ids to their
//! descriptors. A miss on a non-zero id triggers one full refresh from the
//! [`MetadataSource`] and the lookup is retried against the new snapshot.
//!
//! ## Consistency
//! - Readers load the current [`IdentitySnapshot`] through `ArcSwap` and
//!   never block on a refresh in progress.
//! - Refreshes and deltas are serialised by the writer lock and publish a
//!   whole new snapshot at once.
//! - A miss remembers the generation it observed; if another caller
//!   finished a refresh meanwhile, the miss re-reads instead of refreshing
//!   again.

use crate::snapshot::{Ident, IdentityCounts, IdentitySnapshot};
use crate::source::{MetadataSource, SourceError};
use apmindex_core::{
    AgentDescriptor, CacheSettings, IdentKind, JmxDefinitionDescriptor, MethodDescriptor,
    SensorTypeDescriptor,
};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The overview could not be fetched; the previous snapshot is kept.
    #[error("identity refresh failed: {0}")]
    SourceUnavailable(#[source] SourceError),
}

/// Outcome of one full refresh, passed to refresh listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub generation: u64,
    pub agents_loaded: usize,
    /// Agents listed in the overview whose descriptor could not be fetched.
    pub skipped_agents: Vec<u64>,
    pub counts: IdentityCounts,
}

type RefreshListener = Arc<dyn Fn(&RefreshSummary) + Send + Sync>;

/// Lazily refreshed id -> descriptor cache.
pub struct IdentityCache {
    source: Arc<dyn MetadataSource>,
    snapshot: ArcSwap<IdentitySnapshot>,
    writer: Mutex<()>,
    listeners: RwLock<Vec<RefreshListener>>,
    settings: CacheSettings,
}

impl IdentityCache {
    /// Empty cache; the first miss populates it.
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            snapshot: ArcSwap::from_pointee(IdentitySnapshot::new(0)),
            writer: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            settings: CacheSettings::default(),
        }
    }

    /// Cache populated by an initial refresh.
    ///
    /// A failing source is logged and leaves the cache empty; lookups will
    /// retry.
    pub fn warm(source: Arc<dyn MetadataSource>) -> Self {
        let cache = Self::new(source);
        cache.warm_up();
        cache
    }

    pub fn with_settings(source: Arc<dyn MetadataSource>, settings: CacheSettings) -> Self {
        let cache = Self {
            settings,
            ..Self::new(source)
        };
        if cache.settings.warm_on_start {
            cache.warm_up();
        }
        cache
    }

    fn warm_up(&self) {
        if let Err(e) = self.refresh_all() {
            warn!(error = %e, "Initial identity refresh failed, starting empty");
        }
    }

    pub fn agent(&self, id: u64) -> Result<Option<Arc<AgentDescriptor>>, CacheError> {
        self.resolve(id, |s| s.agent(id))
    }

    pub fn sensor_type(&self, id: u64) -> Result<Option<Arc<SensorTypeDescriptor>>, CacheError> {
        self.resolve(id, |s| s.sensor_type(id))
    }

    pub fn method(&self, id: u64) -> Result<Option<Arc<MethodDescriptor>>, CacheError> {
        self.resolve(id, |s| s.method(id))
    }

    pub fn jmx_definition(
        &self,
        id: u64,
    ) -> Result<Option<Arc<JmxDefinitionDescriptor>>, CacheError> {
        self.resolve(id, |s| s.jmx_definition(id))
    }

    /// Kind-generic lookup.
    ///
    /// Id 0 is never looked up and never triggers a refresh. An unknown
    /// non-zero id refreshes everything once, then reads again.
    pub fn lookup(&self, kind: IdentKind, id: u64) -> Result<Option<Ident>, CacheError> {
        self.resolve(id, |s| s.get(kind, id))
    }

    /// Discard all four maps and rebuild them from the source.
    pub fn refresh_all(&self) -> Result<RefreshSummary, CacheError> {
        let summary = {
            let _writer = self.writer.lock();
            self.refresh_locked()?
        };
        self.notify(&summary);
        Ok(summary)
    }

    /// Replace one agent's entries without a full refresh.
    ///
    /// Entries of the previously cached version of the agent are removed
    /// before the new descriptor and its nested descriptors are inserted.
    pub fn apply_delta(&self, agent: AgentDescriptor) {
        let _writer = self.writer.lock();
        let mut next = IdentitySnapshot::clone(&**self.snapshot.load());
        let agent_id = agent.id;
        next.remove_agent(agent_id);
        next.insert_agent(agent);
        self.snapshot.store(Arc::new(next));
        debug!(agent_id, "Applied identity delta");
    }

    /// Register a listener invoked after every completed full refresh.
    pub fn on_refresh<F>(&self, listener: F)
    where
        F: Fn(&RefreshSummary) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Current snapshot; stays valid (and unchanged) while held.
    pub fn snapshot(&self) -> Arc<IdentitySnapshot> {
        self.snapshot.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation()
    }

    pub fn counts(&self) -> IdentityCounts {
        self.snapshot.load().counts()
    }

    fn resolve<T>(
        &self,
        id: u64,
        pick: impl Fn(&IdentitySnapshot) -> Option<T>,
    ) -> Result<Option<T>, CacheError> {
        if id == 0 {
            return Ok(None);
        }

        let observed = {
            let snapshot = self.snapshot.load();
            if let Some(found) = pick(&**snapshot) {
                return Ok(Some(found));
            }
            snapshot.generation()
        };

        if !self.settings.refresh_on_miss {
            return Ok(None);
        }

        self.refresh_after_miss(observed)?;
        Ok(pick(&**self.snapshot.load()))
    }

    /// Refresh unless another caller already did since `observed`.
    fn refresh_after_miss(&self, observed: u64) -> Result<(), CacheError> {
        let summary = {
            let _writer = self.writer.lock();
            if self.snapshot.load().generation() != observed {
                debug!(observed, "Refresh already completed by another caller");
                return Ok(());
            }
            self.refresh_locked()?
        };
        self.notify(&summary);
        Ok(())
    }

    /// Caller must hold the writer lock.
    fn refresh_locked(&self) -> Result<RefreshSummary, CacheError> {
        let mut overview = self
            .source
            .agents_overview()
            .map_err(CacheError::SourceUnavailable)?;
        overview.sort_by_key(|entry| entry.agent.id);

        let generation = self.snapshot.load().generation() + 1;
        let mut next = IdentitySnapshot::new(generation);
        let mut skipped_agents = Vec::new();

        for entry in &overview {
            match self.source.complete_agent(entry.agent.id) {
                Ok(agent) => next.insert_agent(agent),
                Err(e) => {
                    warn!(
                        agent_id = entry.agent.id,
                        agent = %entry.agent.name,
                        error = %e,
                        "Skipping agent during identity refresh"
                    );
                    skipped_agents.push(entry.agent.id);
                }
            }
        }

        let counts = next.counts();
        self.snapshot.store(Arc::new(next));

        let summary = RefreshSummary {
            generation,
            agents_loaded: counts.agents,
            skipped_agents,
            counts,
        };
        info!(
            generation,
            agents = counts.agents,
            skipped = summary.skipped_agents.len(),
            "Identity cache refreshed"
        );
        Ok(summary)
    }

    /// Listeners run on a copy of the list, so they may register more.
    fn notify(&self, summary: &RefreshSummary) {
        let listeners: Vec<RefreshListener> = self.listeners.read().clone();
        for listener in &listeners {
            listener(summary);
        }
    }
}
