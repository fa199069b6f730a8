use tessera_dtype::{FloatWidth, IntWidth, Realization, ScalarKind, TextLength};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};
use tessera_store::NativeBuffer;

use crate::host::{Column, Complex64, NA_INTEGER};
use crate::record::build::{FieldPlan, RecordPlan};
use crate::record::pack::check_span;
use crate::resolve::{coerce, narrow};

fn cell<const N: usize>(bytes: &[u8], at: usize) -> TesseraResult<[u8; N]> {
    bytes
        .get(at..at + N)
        .and_then(|b| <[u8; N]>::try_from(b).ok())
        .ok_or_else(|| tessera_err!("cell at {} is out of bounds", at))
}

fn take_cells<T, const N: usize>(
    bytes: &[u8],
    n: usize,
    offset: usize,
    stride: usize,
    decode: impl Fn([u8; N]) -> T,
) -> TesseraResult<Vec<T>> {
    (0..n)
        .map(|i| cell::<N>(bytes, offset + i * stride).map(&decode))
        .collect()
}

#[allow(clippy::host_endian_bytes)]
fn code_at(bytes: &[u8], at: usize, width: IntWidth) -> TesseraResult<i64> {
    Ok(match width {
        IntWidth::W8 => i64::from(i8::from_ne_bytes(cell(bytes, at)?)),
        IntWidth::W16 => i64::from(i16::from_ne_bytes(cell(bytes, at)?)),
        IntWidth::W32 => i64::from(i32::from_ne_bytes(cell(bytes, at)?)),
        IntWidth::W64 => i64::from_ne_bytes(cell(bytes, at)?),
    })
}

/// Read `n` values of the native kind in `field` from `offset + i * stride` in `buffer` into a
/// host column.
///
/// Numeric values arrive as doubles and are narrowed for the field's target; wide integers arrive
/// as 64-bit integers. Categorical codes keep the stored kind's levels, and a code that names no
/// level reads as [`NA_INTEGER`].
#[allow(clippy::host_endian_bytes)]
pub(crate) fn unpack_column(
    buffer: &NativeBuffer,
    field: &FieldPlan,
    n: usize,
    offset: usize,
    stride: usize,
) -> TesseraResult<Column> {
    check_span(
        buffer.len(),
        n,
        offset,
        stride,
        field.native.byte_size(Realization::Native),
    )?;
    let bytes = buffer.as_slice();
    Ok(match &field.native {
        ScalarKind::Float(FloatWidth::F64) => {
            let values = take_cells(bytes, n, offset, stride, f64::from_ne_bytes)?;
            let target = narrow(&values, &field.wire, field.target);
            coerce(values, target)
        }
        ScalarKind::Integer {
            width: IntWidth::W64,
            signed: true,
        } => {
            Column::Integer64(take_cells(bytes, n, offset, stride, i64::from_ne_bytes)?)
        }
        ScalarKind::Complex(FloatWidth::F64) => {
            Column::Complex(take_cells(bytes, n, offset, stride, |c: [u8; 16]| {
                let (re, im) = c.split_at(8);
                let mut re_bytes = [0u8; 8];
                let mut im_bytes = [0u8; 8];
                re_bytes.copy_from_slice(re);
                im_bytes.copy_from_slice(im);
                Complex64::new(f64::from_ne_bytes(re_bytes), f64::from_ne_bytes(im_bytes))
            })?)
        }
        ScalarKind::Text {
            length: TextLength::Variable,
            ..
        } => Column::Text(
            (0..n)
                .map(|i| {
                    buffer
                        .text_at(offset + i * stride)
                        .map(|t| t.map(str::to_string))
                })
                .collect::<TesseraResult<_>>()?,
        ),
        ScalarKind::Binary(1) => {
            Column::Raw(take_cells(bytes, n, offset, stride, |c: [u8; 1]| c[0])?)
        }
        ScalarKind::Categorical(cat) => {
            let codes = (0..n)
                .map(|i| {
                    code_at(bytes, offset + i * stride, cat.base()).map(|code| {
                        cat.level(code)
                            .and_then(|_| i32::try_from(code).ok())
                            .unwrap_or(NA_INTEGER)
                    })
                })
                .collect::<TesseraResult<_>>()?;
            Column::Factor {
                codes,
                levels: cat.levels().iter().map(|l| l.to_string()).collect(),
            }
        }
        other => tessera_bail!("cannot unpack field '{}' read as {}", field.name, other),
    })
}

/// Split a buffer of `n_rows` records laid out by `plan` into one column per field.
pub(crate) fn unpack_rows(
    buffer: &NativeBuffer,
    plan: &RecordPlan,
    n_rows: usize,
) -> TesseraResult<Vec<Column>> {
    let stride = plan.native().size();
    plan.fields()
        .iter()
        .zip(plan.native().members())
        .map(|(field, member)| unpack_column(buffer, field, n_rows, member.offset, stride))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::Arc;

    use tessera_dtype::CategoricalType;

    use super::*;
    use crate::host::{NA_REAL, Table, is_na_real};
    use crate::record::build::plan_write;
    use crate::record::pack::{pack_elements, pack_rows};
    use crate::record::types::ColumnTypes;
    use crate::resolve::TargetType;

    fn field(wire: ScalarKind, native: ScalarKind, target: TargetType) -> FieldPlan {
        FieldPlan {
            name: Arc::from("f"),
            wire,
            native,
            target,
        }
    }

    #[test]
    fn doubles_narrow_to_integers() {
        let col = Column::Double(vec![1.0, 2.0, NA_REAL]);
        let buffer = pack_elements(&col, &ScalarKind::FLOAT64).unwrap();
        let plan = field(ScalarKind::INT32, ScalarKind::FLOAT64, TargetType::Auto);
        assert_eq!(
            unpack_column(&buffer, &plan, 3, 0, 8).unwrap(),
            Column::Integer(vec![1, 2, NA_INTEGER])
        );
        let plan = field(ScalarKind::FLOAT64, ScalarKind::FLOAT64, TargetType::Float64);
        let Column::Double(values) = unpack_column(&buffer, &plan, 3, 0, 8).unwrap() else {
            panic!("expected doubles");
        };
        assert!(is_na_real(values[2]));
    }

    #[test]
    fn categorical_codes_keep_levels() {
        let kind = ScalarKind::Categorical(
            CategoricalType::try_new(IntWidth::W8, ["lo", "hi"]).unwrap(),
        );
        let col = Column::Factor {
            codes: vec![2, NA_INTEGER, 1],
            levels: vec!["lo".into(), "hi".into()],
        };
        let buffer = pack_elements(&col, &kind).unwrap();
        let plan = field(kind.clone(), kind, TargetType::Auto);
        assert_eq!(unpack_column(&buffer, &plan, 3, 0, 1).unwrap(), col);
    }

    #[test]
    fn unknown_codes_read_as_missing() {
        let kind = ScalarKind::Categorical(
            CategoricalType::try_new(IntWidth::W8, ["lo", "hi"]).unwrap(),
        );
        let buffer = pack_elements(&Column::Raw(vec![1, 0, 3]), &ScalarKind::Binary(1)).unwrap();
        let plan = field(kind.clone(), kind, TargetType::Auto);
        assert_eq!(
            unpack_column(&buffer, &plan, 3, 0, 1).unwrap(),
            Column::Factor {
                codes: vec![1, NA_INTEGER, NA_INTEGER],
                levels: vec!["lo".into(), "hi".into()],
            }
        );
    }

    #[test]
    fn rows_round_trip() {
        let table = Table::try_new(
            ["n", "s", "z"],
            vec![
                Column::Integer64(vec![1 << 40, -5]),
                Column::Text(vec![Some("α".into()), None]),
                Column::Complex(vec![Complex64::new(1.0, -1.0), Complex64::default()]),
            ],
        )
        .unwrap();
        let types = ColumnTypes::new().with("n", "int64");
        let (plan, staged) = plan_write(&table, &types).unwrap();
        let buffer = pack_rows(&staged, plan.native(), 2).unwrap();

        let columns = unpack_rows(&buffer, &plan, 2).unwrap();
        assert_eq!(columns, table.columns().to_vec());
        assert!(matches!(staged[0], Cow::Borrowed(_)));
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let buffer = NativeBuffer::try_zeroed(8).unwrap();
        let plan = field(ScalarKind::FLOAT64, ScalarKind::FLOAT64, TargetType::Auto);
        assert!(unpack_column(&buffer, &plan, 2, 0, 8).is_err());
    }
}
