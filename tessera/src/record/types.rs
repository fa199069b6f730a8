use std::collections::BTreeMap;

use tessera_dtype::{FloatWidth, IntWidth, TypeName};

use crate::host::{Column, NA_INTEGER, NA_INTEGER64};

/// The wire type string chosen for each column of a table, by column name.
///
/// Columns without an entry are stored as [`default_type_name`] picks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ColumnTypes {
    by_name: BTreeMap<String, String>,
}

impl ColumnTypes {
    /// No explicit types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store column `name` as `type_string`.
    pub fn with(mut self, name: impl Into<String>, type_string: impl Into<String>) -> Self {
        self.by_name.insert(name.into(), type_string.into());
        self
    }

    /// The type string chosen for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// True if no column has an explicit type.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnTypes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            by_name: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The wire type a column is stored as when the caller does not choose one.
///
/// Integer-like columns get the narrowest integer holding every value, unsigned when none is
/// negative. A 32-bit column with missing values is stored as `float64` so the missing values
/// survive as NaN; a 64-bit column keeps its marker in an `int64`.
pub fn default_type_name(column: &Column) -> TypeName {
    match column {
        Column::Logical(values) | Column::Integer(values) => {
            if values.contains(&NA_INTEGER) {
                TypeName::Float(FloatWidth::F64)
            } else {
                narrowest_integer(values.iter().map(|v| i64::from(*v)))
            }
        }
        Column::Integer64(values) => {
            if values.contains(&NA_INTEGER64) {
                TypeName::Int(IntWidth::W64)
            } else {
                narrowest_integer(values.iter().copied())
            }
        }
        Column::Double(_) => TypeName::Float(FloatWidth::F64),
        Column::Complex(_) => TypeName::Complex,
        Column::Text(_) => TypeName::Character,
        Column::Raw(_) => TypeName::Raw,
        Column::Factor { .. } => TypeName::Factor,
    }
}

fn narrowest_integer(values: impl Iterator<Item = i64>) -> TypeName {
    let Some((min, max)) = values.fold(None, |acc: Option<(i64, i64)>, v| {
        Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
    }) else {
        return TypeName::Int(IntWidth::W32);
    };

    if min >= 0 {
        let width = if max <= i64::from(u8::MAX) {
            IntWidth::W8
        } else if max <= i64::from(u16::MAX) {
            IntWidth::W16
        } else if max <= i64::from(u32::MAX) {
            IntWidth::W32
        } else {
            IntWidth::W64
        };
        return TypeName::UInt(width);
    }

    let fits = |lo: i64, hi: i64| min >= lo && max <= hi;
    let width = if fits(i64::from(i8::MIN), i64::from(i8::MAX)) {
        IntWidth::W8
    } else if fits(i64::from(i16::MIN), i64::from(i16::MAX)) {
        IntWidth::W16
    } else if fits(i64::from(i32::MIN), i64::from(i32::MAX)) {
        IntWidth::W32
    } else {
        IntWidth::W64
    };
    TypeName::Int(width)
}
