use std::borrow::Cow;
use std::sync::Arc;

use itertools::Itertools;
use tessera_dtype::{Field, Realization, RecordLayout, RecordType, ScalarKind};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_store::RecordDescriptor;

use crate::host::{Column, NA_INTEGER, NA_INTEGER64, Table};
use crate::record::types::{ColumnTypes, default_type_name};
use crate::resolve::{TargetType, TypePolicy, resolve};

/// One field as it is marshalled: the kind it is stored as and the kind the host handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    /// Field name
    pub name: Arc<str>,
    /// The persisted kind
    pub wire: ScalarKind,
    /// The kind values pass through in memory
    pub native: ScalarKind,
    /// The resolved target, [`TargetType::Auto`] for writes
    pub target: TargetType,
}

/// The fields of one record and the native layout they are packed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPlan {
    fields: Vec<FieldPlan>,
    native: RecordLayout,
}

impl RecordPlan {
    fn try_new(fields: Vec<FieldPlan>) -> TesseraResult<Self> {
        let native = RecordType::try_new(
            fields
                .iter()
                .map(|f| Field::new(f.name.clone(), f.native.clone())),
        )?;
        Ok(Self {
            native: RecordLayout::new(&native, Realization::Native),
            fields,
        })
    }

    /// Fields in record order.
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// The native layout.
    pub fn native(&self) -> &RecordLayout {
        &self.native
    }

    /// The wire layout: the same fields at running offsets of their wire sizes.
    pub fn wire(&self) -> TesseraResult<RecordLayout> {
        let wire = RecordType::try_new(
            self.fields
                .iter()
                .map(|f| Field::new(f.name.clone(), f.wire.clone())),
        )?;
        Ok(RecordLayout::new(&wire, Realization::Wire))
    }
}

fn factor_levels(column: &Column) -> Option<&[String]> {
    match column {
        Column::Factor { levels, .. } => Some(levels),
        _ => None,
    }
}

/// Whether a signed wire integer of at least `bits` bits holds the host's missing marker unchanged.
fn keeps_missing(wire: &ScalarKind, bits: usize) -> bool {
    matches!(wire, ScalarKind::Integer { width, signed: true } if width.bit_width() >= bits)
}

/// Choose the wire and native kinds for writing `column` as `name`.
///
/// Integer-like columns headed for an integer wire kind keep their native width, so the missing
/// marker reaches storage as the most negative value. A column with missing values is refused when
/// the wire integer cannot hold that marker. Integer-like columns headed for a float wire kind
/// are promoted to doubles. The promoted copy is returned alongside; the caller's column is never
/// modified.
pub(crate) fn plan_write_field<'a>(
    name: &str,
    column: &'a Column,
    type_string: Option<&str>,
) -> TesseraResult<(FieldPlan, Cow<'a, Column>)> {
    let levels = factor_levels(column);
    let wire = match type_string {
        Some(type_string) => ScalarKind::from_type_string(name, type_string, levels)?,
        None => default_type_name(column)
            .wire_kind(levels)
            .map_err(|_| tessera_err!(UnsupportedFieldType: name, column.type_name()))?,
    };

    let unsupported = || {
        tessera_err!(
            UnsupportedFieldType: name,
            format!("{} from a {} column", wire, column.type_name())
        )
    };
    let loses_missing = || {
        tessera_err!(
            UnsupportedFieldType: name,
            format!("{} cannot hold the missing values of a {} column", wire, column.type_name())
        )
    };
    let (native, staged) = match (&wire, column) {
        (ScalarKind::Integer { .. }, Column::Logical(values) | Column::Integer(values)) => {
            if !keeps_missing(&wire, 32) && values.contains(&NA_INTEGER) {
                return Err(loses_missing());
            }
            (ScalarKind::INT32, Cow::Borrowed(column))
        }
        (ScalarKind::Integer { .. }, Column::Integer64(values)) => {
            if !keeps_missing(&wire, 64) && values.contains(&NA_INTEGER64) {
                return Err(loses_missing());
            }
            (ScalarKind::INT64, Cow::Borrowed(column))
        }
        (ScalarKind::Integer { .. }, Column::Double(values)) => {
            if values.iter().any(|v| v.is_nan()) {
                return Err(loses_missing());
            }
            (ScalarKind::FLOAT64, Cow::Borrowed(column))
        }
        (ScalarKind::Float(_), Column::Double(_)) => (ScalarKind::FLOAT64, Cow::Borrowed(column)),
        (
            ScalarKind::Float(_),
            Column::Logical(_) | Column::Integer(_) | Column::Integer64(_),
        ) => {
            let promoted = column.promote_to_double().ok_or_else(unsupported)?;
            (ScalarKind::FLOAT64, Cow::Owned(promoted))
        }
        (ScalarKind::Complex(_), Column::Complex(_)) => {
            (ScalarKind::COMPLEX128, Cow::Borrowed(column))
        }
        (ScalarKind::Text { .. }, Column::Text(_)) => (ScalarKind::UTF8, Cow::Borrowed(column)),
        (ScalarKind::Binary(1), Column::Raw(_)) => (ScalarKind::Binary(1), Cow::Borrowed(column)),
        (ScalarKind::Categorical(_), Column::Factor { .. }) => {
            (wire.clone(), Cow::Borrowed(column))
        }
        _ => return Err(unsupported()),
    };
    log::trace!("field '{}': {} column as {} via {}", name, column.type_name(), wire, native);

    Ok((
        FieldPlan {
            name: name.into(),
            wire,
            native,
            target: TargetType::Auto,
        },
        staged,
    ))
}

/// Plan the record type of `table`, staging every column for packing.
pub(crate) fn plan_write<'a>(
    table: &'a Table,
    types: &ColumnTypes,
) -> TesseraResult<(RecordPlan, Vec<Cow<'a, Column>>)> {
    let (fields, staged): (Vec<_>, Vec<_>) = table
        .iter()
        .map(|(name, column)| plan_write_field(name, column, types.get(name)))
        .process_results(|planned| planned.unzip())?;
    Ok((RecordPlan::try_new(fields)?, staged))
}

/// The native kind a stored `wire` kind is read through for `target`.
pub(crate) fn read_native(name: &str, wire: &ScalarKind, target: TargetType) -> TesseraResult<ScalarKind> {
    Ok(match wire {
        ScalarKind::Integer { .. } | ScalarKind::Float(_) if target == TargetType::WideInt64 => {
            ScalarKind::INT64
        }
        ScalarKind::Integer { .. } | ScalarKind::Float(_) => ScalarKind::FLOAT64,
        ScalarKind::Complex(_) => ScalarKind::COMPLEX128,
        ScalarKind::Text { .. } => ScalarKind::UTF8,
        ScalarKind::Binary(1) => ScalarKind::Binary(1),
        ScalarKind::Categorical(_) => wire.clone(),
        ScalarKind::Binary(_) => tessera_bail!(UnsupportedFieldType: name, wire),
    })
}

/// Plan how the stored record `record` is read under `policy`. Dropped fields are left out.
pub(crate) fn plan_read(record: &RecordDescriptor, policy: &TypePolicy) -> TesseraResult<RecordPlan> {
    let mut fields = Vec::with_capacity(record.members.len());
    for member in &record.members {
        let target = resolve(&member.kind, policy, &member.name)?;
        if target == TargetType::Drop {
            log::debug!("skipping field '{}'", member.name);
            continue;
        }
        fields.push(FieldPlan {
            name: member.name.clone(),
            native: read_native(&member.name, &member.kind, target)?,
            wire: member.kind.clone(),
            target,
        });
    }
    RecordPlan::try_new(fields)
}
