//! Named members of a record type.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use tessera_error::{TesseraResult, tessera_bail};

use crate::ScalarKind;

/// A named member of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Field {
    name: Arc<str>,
    kind: ScalarKind,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<Arc<str>>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's scalar kind.
    pub fn kind(&self) -> &ScalarKind {
        &self.kind
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)
    }
}

/// An ordered sequence of uniquely named fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordType {
    fields: Arc<[Field]>,
}

impl RecordType {
    /// Create a record type, rejecting duplicate field names.
    pub fn try_new(fields: impl IntoIterator<Item = Field>) -> TesseraResult<Self> {
        let fields: Arc<[Field]> = fields.into_iter().collect();
        if let Some(dup) = fields.iter().map(Field::name).duplicates().next() {
            tessera_bail!("duplicate field name '{}' in record type", dup);
        }
        Ok(Self { fields })
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position and field with the given name.
    pub fn find(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields.iter().find_position(|f| f.name() == name)
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(Field::name)
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.fields.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_rejected() {
        let err = RecordType::try_new([
            Field::new("a", ScalarKind::INT32),
            Field::new("a", ScalarKind::FLOAT64),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn find_by_name() {
        let record = RecordType::try_new([
            Field::new("id", ScalarKind::INT32),
            Field::new("label", ScalarKind::UTF8),
        ])
        .unwrap();
        let (pos, field) = record.find("label").unwrap();
        assert_eq!(pos, 1);
        assert_eq!(field.kind(), &ScalarKind::UTF8);
        assert!(record.find("missing").is_none());
        assert_eq!(record.to_string(), "{id: int32, label: utf8}");
    }
}
