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

//! Field-level restrictions evaluated against monitoring records.
//!
//! A [`Restriction`] is built from a field name so callers can express it
//! without knowing the catalogue. It is resolved into a
//! [`ResolvedRestriction`] when the query is built; resolution is where
//! unknown fields and mistyped operands are rejected.

use apmindex_core::{Field, FieldType, FieldValue, IndexError, MonitoringRecord, RecordKind, Result};
use std::cmp::Ordering;

/// Comparison applied to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Equals(FieldValue),
    /// Half-open interval `[lower, upper)`.
    Range { lower: FieldValue, upper: FieldValue },
}

/// Unresolved `(field, operator, operand)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Restriction {
    field: String,
    operator: Operator,
}

impl Restriction {
    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Equals(value.into()),
        }
    }

    pub fn range(
        field: impl Into<String>,
        lower: impl Into<FieldValue>,
        upper: impl Into<FieldValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Range {
                lower: lower.into(),
                upper: upper.into(),
            },
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Check the restriction against every targeted kind.
    pub fn resolve(&self, kinds: &[RecordKind]) -> Result<ResolvedRestriction> {
        if kinds.is_empty() {
            return Err(IndexError::EmptyKindSet);
        }

        let field = Field::from_name(&self.field);
        let field = match kinds.iter().find(|kind| !field.is_some_and(|f| kind.has_field(f))) {
            Some(kind) => {
                return Err(IndexError::UnknownField {
                    field: self.field.clone(),
                    kind: *kind,
                })
            }
            None => field.ok_or(IndexError::EmptyKindSet)?,
        };

        let field_type = field.field_type();
        let operands: Vec<&FieldValue> = match &self.operator {
            Operator::Equals(value) => vec![value],
            Operator::Range { lower, upper } => vec![lower, upper],
        };

        for operand in &operands {
            if !field_type.accepts(operand) {
                return Err(IndexError::TypeMismatch {
                    field: self.field.clone(),
                    expected: field_type,
                });
            }
            if field_type == FieldType::Id && **operand == FieldValue::Unsigned(0) {
                return Err(IndexError::InvalidIdentifier {
                    field: self.field.clone(),
                });
            }
        }

        if let Operator::Range { lower, upper } = &self.operator {
            if !matches!(lower.compare(upper), Some(Ordering::Less | Ordering::Equal)) {
                return Err(IndexError::InvalidRange {
                    field: self.field.clone(),
                });
            }
        }

        Ok(ResolvedRestriction {
            field,
            operator: self.operator.clone(),
        })
    }
}

/// A restriction bound to a catalogue field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRestriction {
    field: Field,
    operator: Operator,
}

impl ResolvedRestriction {
    pub fn field(&self) -> Field {
        self.field
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Evaluate against a record. Total: a missing field or an
    /// incomparable value simply does not match.
    pub fn matches(&self, record: &MonitoringRecord) -> bool {
        let Some(value) = record.field_value(self.field) else {
            return false;
        };

        match &self.operator {
            Operator::Equals(expected) => value.compare(expected) == Some(Ordering::Equal),
            Operator::Range { lower, upper } => {
                matches!(
                    value.compare(lower),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && value.compare(upper) == Some(Ordering::Less)
            }
        }
    }
}
