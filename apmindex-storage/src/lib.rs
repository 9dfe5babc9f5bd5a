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

//! Apmindex Storage Layer
//!
//! Indexing tree over monitoring records plus the query model it answers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apmindex_storage::{IndexingTree, QueryDescriptor, Restriction, TimeWindow};
//! use apmindex_core::RecordKind;
//!
//! let tree = IndexingTree::new();
//! let query = QueryDescriptor::builder()
//!     .kind(RecordKind::JmxSensorValue)
//!     .agent(7)
//!     .restrict(Restriction::equals("jmx_definition_id", 42u64))
//!     .build()?;
//! let records = tree.query(&query)?;
//! ```

pub mod backing;
pub mod descriptor;
pub mod restriction;
pub mod segment;
pub mod tree;

pub use backing::{BackingStore, MemoryBackingStore};
pub use descriptor::{QueryDescriptor, QueryDescriptorBuilder, TimeWindow};
pub use restriction::{Operator, ResolvedRestriction, Restriction};
pub use segment::SegmentFileStore;
pub use tree::{BucketKey, IndexedRecord, IndexingTree, TreeStats};
