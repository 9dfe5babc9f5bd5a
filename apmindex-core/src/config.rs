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

//! Configuration for the index and the identity cache
//!
//! Loaded from TOML, with environment overrides for deployments that do not
//! ship a config file.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApmIndexConfig {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding per-agent segment files.
    /// None = records live in memory only.
    #[serde(default)]
    pub segment_dir: Option<PathBuf>,

    /// fsync every appended frame.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Run a full refresh when a lookup misses.
    #[serde(default = "default_refresh_on_miss")]
    pub refresh_on_miss: bool,

    /// Populate the cache when it is created.
    #[serde(default = "default_warm_on_start")]
    pub warm_on_start: bool,
}

fn default_sync_writes() -> bool {
    false
}

fn default_refresh_on_miss() -> bool {
    true
}

fn default_warm_on_start() -> bool {
    true
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            segment_dir: None,
            sync_writes: default_sync_writes(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            refresh_on_miss: default_refresh_on_miss(),
            warm_on_start: default_warm_on_start(),
        }
    }
}

impl ApmIndexConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - APMINDEX_SEGMENT_DIR: segment directory (default: unset, in-memory)
    /// - APMINDEX_SYNC_WRITES: fsync each append (default: false)
    /// - APMINDEX_REFRESH_ON_MISS: refresh identities on a lookup miss (default: true)
    /// - APMINDEX_WARM_ON_START: refresh identities at construction (default: true)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let flag = |key: &str, default: bool| {
            var(key).map(|raw| {
                raw.parse().unwrap_or_else(|_| {
                    warn!(key, value = %raw, "Ignoring non-boolean override");
                    default
                })
            })
        };

        if let Some(dir) = var("APMINDEX_SEGMENT_DIR") {
            if !dir.is_empty() {
                self.storage.segment_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(sync) = flag("APMINDEX_SYNC_WRITES", default_sync_writes()) {
            self.storage.sync_writes = sync;
        }

        if let Some(refresh) = flag("APMINDEX_REFRESH_ON_MISS", default_refresh_on_miss()) {
            self.cache.refresh_on_miss = refresh;
        }

        if let Some(warm) = flag("APMINDEX_WARM_ON_START", default_warm_on_start()) {
            self.cache.warm_on_start = warm;
        }
    }
}
