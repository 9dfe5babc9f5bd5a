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

//! Error types shared by the index crates.

use crate::record::{FieldType, RecordKind};
use thiserror::Error;

/// Errors raised while building queries or touching persisted records.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("query must target at least one record kind")]
    EmptyKindSet,

    #[error("unknown field '{field}' for record kind {kind}")]
    UnknownField { field: String, kind: RecordKind },

    #[error("field '{field}' expects a {expected} operand")]
    TypeMismatch { field: String, expected: FieldType },

    /// Id 0 is the wildcard id and never names a real entity.
    #[error("'{field}' must not be 0")]
    InvalidIdentifier { field: String },

    #[error("range on '{field}' has lower bound above upper bound")]
    InvalidRange { field: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// True for the errors a caller can fix by changing the query.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            IndexError::EmptyKindSet
                | IndexError::UnknownField { .. }
                | IndexError::TypeMismatch { .. }
                | IndexError::InvalidIdentifier { .. }
                | IndexError::InvalidRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
