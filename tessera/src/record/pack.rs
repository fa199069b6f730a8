use std::borrow::Cow;

use tessera_dtype::{
    CategoricalType, FloatWidth, IntWidth, Realization, RecordLayout, ScalarKind, TextLength,
};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_store::NativeBuffer;

use crate::host::{Column, NA_INTEGER};

/// Fail unless `n` cells of `size` bytes at `offset + i * stride` fit in `len` bytes.
pub(crate) fn check_span(
    len: usize,
    n: usize,
    offset: usize,
    stride: usize,
    size: usize,
) -> TesseraResult<()> {
    if n == 0 {
        return Ok(());
    }
    let end = (n - 1)
        .checked_mul(stride)
        .and_then(|last| last.checked_add(offset))
        .and_then(|last| last.checked_add(size));
    match end {
        Some(end) if end <= len => Ok(()),
        _ => Err(tessera_err!(
            "{} cells of {} bytes with stride {} at offset {} overrun a {}-byte buffer",
            n,
            size,
            stride,
            offset,
            len
        )),
    }
}

/// The native bytes of a factor code, with [`NA_INTEGER`] stored as the type's missing code.
#[allow(clippy::host_endian_bytes, clippy::cast_possible_truncation)]
fn code_bytes(code: i32, cat: &CategoricalType) -> Vec<u8> {
    let code = if code == NA_INTEGER {
        cat.missing_code()
    } else {
        i64::from(code)
    };
    match cat.base() {
        IntWidth::W8 => (code as i8).to_ne_bytes().to_vec(),
        IntWidth::W16 => (code as i16).to_ne_bytes().to_vec(),
        IntWidth::W32 => (code as i32).to_ne_bytes().to_vec(),
        IntWidth::W64 => code.to_ne_bytes().to_vec(),
    }
}

fn put_cells<T>(
    buffer: &mut NativeBuffer,
    values: &[T],
    offset: usize,
    stride: usize,
    encode: impl Fn(&T) -> Vec<u8>,
) {
    let bytes = buffer.as_mut_slice();
    for (i, value) in values.iter().enumerate() {
        let encoded = encode(value);
        let at = offset + i * stride;
        bytes[at..at + encoded.len()].copy_from_slice(&encoded);
    }
}

/// Write every value of `column`, as the native `kind`, to `offset + i * stride` in `buffer`.
#[allow(clippy::host_endian_bytes)]
pub(crate) fn pack_column(
    column: &Column,
    kind: &ScalarKind,
    buffer: &mut NativeBuffer,
    offset: usize,
    stride: usize,
) -> TesseraResult<()> {
    check_span(
        buffer.len(),
        column.len(),
        offset,
        stride,
        kind.byte_size(Realization::Native),
    )?;
    match (column, kind) {
        (Column::Double(values), ScalarKind::Float(FloatWidth::F64)) => {
            put_cells(buffer, values, offset, stride, |v| v.to_ne_bytes().to_vec());
        }
        (
            Column::Logical(values) | Column::Integer(values),
            ScalarKind::Integer {
                width: IntWidth::W32,
                signed: true,
            },
        ) => {
            put_cells(buffer, values, offset, stride, |v| v.to_ne_bytes().to_vec());
        }
        (
            Column::Integer64(values),
            ScalarKind::Integer {
                width: IntWidth::W64,
                signed: true,
            },
        ) => {
            put_cells(buffer, values, offset, stride, |v| v.to_ne_bytes().to_vec());
        }
        (Column::Complex(values), ScalarKind::Complex(FloatWidth::F64)) => {
            put_cells(buffer, values, offset, stride, |v| {
                let mut cell = v.re.to_ne_bytes().to_vec();
                cell.extend_from_slice(&v.im.to_ne_bytes());
                cell
            });
        }
        (Column::Raw(values), ScalarKind::Binary(1)) => {
            put_cells(buffer, values, offset, stride, |v| vec![*v]);
        }
        (Column::Factor { codes, .. }, ScalarKind::Categorical(cat)) => {
            put_cells(buffer, codes, offset, stride, |c| code_bytes(*c, cat));
        }
        (
            Column::Text(values),
            ScalarKind::Text {
                length: TextLength::Variable,
                ..
            },
        ) => {
            for (i, value) in values.iter().enumerate() {
                buffer.put_text(offset + i * stride, value.as_deref())?;
            }
        }
        _ => tessera_bail!("cannot pack a {} column as {}", column.type_name(), kind),
    }
    Ok(())
}

/// Interleave staged columns into a buffer of `n_rows` records laid out by `layout`.
pub(crate) fn pack_rows(
    columns: &[Cow<'_, Column>],
    layout: &RecordLayout,
    n_rows: usize,
) -> TesseraResult<NativeBuffer> {
    if columns.len() != layout.members().len() {
        tessera_bail!(
            DimensionMismatch: "{} columns for a record of {} members",
            columns.len(),
            layout.members().len()
        );
    }
    let len = n_rows
        .checked_mul(layout.size())
        .ok_or_else(|| tessera_err!(OutOfMemory: "{} records of {} bytes", n_rows, layout.size()))?;
    let mut buffer = NativeBuffer::try_zeroed(len)?;
    for (column, member) in columns.iter().zip(layout.members()) {
        if column.len() != n_rows {
            tessera_bail!(
                DimensionMismatch: "column '{}' has {} values for {} rows",
                member.name,
                column.len(),
                n_rows
            );
        }
        pack_column(column, &member.kind, &mut buffer, member.offset, layout.size())?;
    }
    Ok(buffer)
}

/// Pack a flat column of `kind` elements, one after another.
pub(crate) fn pack_elements(column: &Column, kind: &ScalarKind) -> TesseraResult<NativeBuffer> {
    let size = kind.byte_size(Realization::Native);
    let len = column
        .len()
        .checked_mul(size)
        .ok_or_else(|| tessera_err!(OutOfMemory: "{} elements of {} bytes", column.len(), size))?;
    let mut buffer = NativeBuffer::try_zeroed(len)?;
    pack_column(column, kind, &mut buffer, 0, size)?;
    Ok(buffer)
}
