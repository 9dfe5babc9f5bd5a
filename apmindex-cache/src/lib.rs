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

//! Apmindex Identity Cache
//!
//! Concurrent id -> descriptor cache over agent metadata, refreshed in full
//! from an authoritative [`MetadataSource`] whenever a lookup misses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apmindex_cache::{IdentityCache, StaticMetadataSource};
//! use std::sync::Arc;
//!
//! let source = Arc::new(StaticMetadataSource::new());
//! let cache = IdentityCache::warm(source);
//! let agent = cache.agent(record.agent_id)?;
//! ```

pub mod cache;
pub mod snapshot;
pub mod source;

pub use cache::{CacheError, IdentityCache, RefreshSummary};
pub use snapshot::{Ident, IdentityCounts, IdentitySnapshot};
pub use source::{MetadataSource, SourceError, StaticMetadataSource};
