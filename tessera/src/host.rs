//! The host's value model: NA-aware columns, tables of named columns, and N-dimensional views.

use std::fmt::{Display, Formatter};

use itertools::Itertools;
use static_assertions::assert_eq_size;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use crate::transpose::AxisOrder;

/// Missing marker for integer columns.
pub const NA_INTEGER: i32 = i32::MIN;
/// Missing marker for logical columns.
pub const NA_LOGICAL: i32 = i32::MIN;
/// Missing marker for 64-bit integer columns.
pub const NA_INTEGER64: i64 = i64::MIN;
/// Bit pattern of the missing double: a NaN whose low word is 1954.
pub const NA_REAL_BITS: u64 = 0x7FF0_0000_0000_07A2;
/// Missing marker for double columns.
pub const NA_REAL: f64 = f64::from_bits(NA_REAL_BITS);

/// True if `value` is the missing double rather than an arbitrary NaN.
pub fn is_na_real(value: f64) -> bool {
    value.is_nan() && (value.to_bits() & 0xFFFF_FFFF) == 1954
}

/// A double precision complex number laid out as `(re, im)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Complex64 {
    /// Real part
    pub re: f64,
    /// Imaginary part
    pub im: f64,
}

assert_eq_size!(Complex64, [u8; 16]);

impl Complex64 {
    /// Create a complex number.
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// A homogeneous host column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Booleans as 0/1, [`NA_LOGICAL`] for missing
    Logical(Vec<i32>),
    /// 32-bit integers, [`NA_INTEGER`] for missing
    Integer(Vec<i32>),
    /// Doubles, [`NA_REAL`] for missing
    Double(Vec<f64>),
    /// 64-bit integers, [`NA_INTEGER64`] for missing
    Integer64(Vec<i64>),
    /// Complex numbers
    Complex(Vec<Complex64>),
    /// Text, `None` for missing
    Text(Vec<Option<String>>),
    /// Raw bytes
    Raw(Vec<u8>),
    /// 1-based codes into `levels`, [`NA_INTEGER`] for missing
    Factor {
        /// The level codes
        codes: Vec<i32>,
        /// The ordered level names
        levels: Vec<String>,
    },
}

impl Column {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            Self::Logical(v) | Self::Integer(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Integer64(v) => v.len(),
            Self::Complex(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Raw(v) => v.len(),
            Self::Factor { codes, .. } => codes.len(),
        }
    }

    /// True if the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The host's name for this column's representation.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Logical(_) => "logical",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Integer64(_) => "integer64",
            Self::Complex(_) => "complex",
            Self::Text(_) => "character",
            Self::Raw(_) => "raw",
            Self::Factor { .. } => "factor",
        }
    }

    /// A new double column holding the same values, missing values mapped to [`NA_REAL`].
    ///
    /// `None` for columns that are not integer-like.
    #[allow(clippy::cast_precision_loss)]
    pub fn promote_to_double(&self) -> Option<Column> {
        let promoted = match self {
            Self::Logical(v) | Self::Integer(v) => v
                .iter()
                .map(|&x| if x == NA_INTEGER { NA_REAL } else { f64::from(x) })
                .collect(),
            Self::Integer64(v) => v
                .iter()
                .map(|&x| if x == NA_INTEGER64 { NA_REAL } else { x as f64 })
                .collect(),
            _ => return None,
        };
        Some(Self::Double(promoted))
    }
}

/// An ordered sequence of equally long, uniquely named columns, with optional row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    row_labels: Option<Vec<String>>,
}

impl Table {
    /// Create a table, validating column lengths and name uniqueness.
    pub fn try_new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        columns: Vec<Column>,
    ) -> TesseraResult<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != columns.len() {
            tessera_bail!(
                DimensionMismatch: "{} names given for {} columns",
                names.len(),
                columns.len()
            );
        }
        if let Some(dup) = names.iter().duplicates().next() {
            tessera_bail!("duplicate column name '{}'", dup);
        }
        if let Some((first, rest)) = columns.split_first() {
            if let Some((idx, col)) = rest.iter().find_position(|c| c.len() != first.len()) {
                tessera_bail!(
                    DimensionMismatch: "column '{}' has {} rows, expected {}",
                    names[idx + 1],
                    col.len(),
                    first.len()
                );
            }
        }
        Ok(Self {
            names,
            columns,
            row_labels: None,
        })
    }

    /// Attach row labels, one per row.
    pub fn with_row_labels(mut self, labels: Vec<String>) -> TesseraResult<Self> {
        if labels.len() != self.n_rows() {
            tessera_bail!(
                DimensionMismatch: "{} row labels given for {} rows",
                labels.len(),
                self.n_rows()
            );
        }
        self.row_labels = Some(labels);
        Ok(self)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The column called `name`.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
    }

    /// Row labels, if any.
    pub fn row_labels(&self) -> Option<&[String]> {
        self.row_labels.as_deref()
    }

    /// `(name, column)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> + '_ {
        self.names.iter().map(String::as_str).zip(&self.columns)
    }
}

/// Labels attached to the axes of an array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DimLabels {
    /// No labels
    #[default]
    None,
    /// Element names of a one-dimensional array
    Names(Vec<String>),
    /// Optional labels for each axis
    PerAxis(Vec<Option<Vec<String>>>),
}

impl DimLabels {
    /// The labels of `axis`, if any.
    pub fn axis(&self, axis: usize) -> Option<&[String]> {
        match self {
            Self::None => None,
            Self::Names(names) => (axis == 0).then_some(names.as_slice()),
            Self::PerAxis(axes) => axes.get(axis).and_then(|a| a.as_deref()),
        }
    }
}

/// An N-dimensional array: a flat column tagged with its dimensions and axis order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayView {
    dims: Vec<usize>,
    order: AxisOrder,
    data: Column,
    labels: DimLabels,
}

impl ArrayView {
    /// Create a view, checking that `data` holds `product(dims)` values. No dims is a scalar.
    pub fn try_new(dims: Vec<usize>, order: AxisOrder, data: Column) -> TesseraResult<Self> {
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            tessera_bail!(
                DimensionMismatch: "dims [{}] describe {} values, data has {}",
                dims.iter().join(", "),
                expected,
                data.len()
            );
        }
        Ok(Self {
            dims,
            order,
            data,
            labels: DimLabels::None,
        })
    }

    /// A one-dimensional view of `data`.
    pub fn vector(data: Column) -> Self {
        Self {
            dims: vec![data.len()],
            order: AxisOrder::FirstFast,
            data,
            labels: DimLabels::None,
        }
    }

    /// Attach labels, checking that every labelled axis has one label per position.
    pub fn with_labels(mut self, labels: DimLabels) -> TesseraResult<Self> {
        match &labels {
            DimLabels::None => {}
            DimLabels::Names(names) => {
                if self.dims.len() != 1 {
                    tessera_bail!("element names need a one-dimensional array");
                }
                if names.len() != self.dims[0] {
                    tessera_bail!(
                        DimensionMismatch: "{} names for {} elements",
                        names.len(),
                        self.dims[0]
                    );
                }
            }
            DimLabels::PerAxis(axes) => {
                if axes.len() != self.dims.len() {
                    tessera_bail!(
                        DimensionMismatch: "labels for {} axes on a rank {} array",
                        axes.len(),
                        self.dims.len()
                    );
                }
                for (axis, (labels, extent)) in axes.iter().zip(&self.dims).enumerate() {
                    if let Some(labels) = labels {
                        if labels.len() != *extent {
                            return Err(tessera_err!(
                                DimensionMismatch: "{} labels for axis {} of extent {}",
                                labels.len(),
                                axis,
                                extent
                            ));
                        }
                    }
                }
            }
        }
        self.labels = labels;
        Ok(self)
    }

    /// Dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The order `data` is laid out in.
    pub fn order(&self) -> AxisOrder {
        self.order
    }

    /// The flat values.
    pub fn data(&self) -> &Column {
        &self.data
    }

    /// Consume the view, returning its values.
    pub fn into_data(self) -> Column {
        self.data
    }

    /// Axis labels.
    pub fn labels(&self) -> &DimLabels {
        &self.labels
    }
}

impl Display for ArrayView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}]",
            self.data.type_name(),
            self.dims.iter().join(" x ")
        )
    }
}

#[cfg(test)]
mod tests {
    use tessera_error::TesseraError;

    use super::*;

    #[test]
    fn na_real_is_distinguishable() {
        assert!(is_na_real(NA_REAL));
        assert!(!is_na_real(f64::NAN));
        assert!(!is_na_real(1954.0));
    }

    #[test]
    fn promotion_keeps_missing() {
        let col = Column::Integer(vec![1, NA_INTEGER, -3]);
        let Some(Column::Double(v)) = col.promote_to_double() else {
            panic!("expected doubles");
        };
        assert_eq!(v[0], 1.0);
        assert!(is_na_real(v[1]));
        assert_eq!(v[2], -3.0);
        // the source column is untouched
        assert_eq!(col, Column::Integer(vec![1, NA_INTEGER, -3]));
        assert!(Column::Text(vec![]).promote_to_double().is_none());
    }

    #[test]
    fn table_validates_shape() {
        assert!(matches!(
            Table::try_new(["a", "b"], vec![Column::Integer(vec![1]), Column::Raw(vec![1, 2])]),
            Err(TesseraError::DimensionMismatch(..))
        ));
        assert!(matches!(
            Table::try_new(["a", "a"], vec![Column::Integer(vec![1]), Column::Raw(vec![1])]),
            Err(TesseraError::InvalidArgument(..))
        ));
        let table = Table::try_new(["a"], vec![Column::Integer(vec![1, 2])]).unwrap();
        assert!(table.clone().with_row_labels(vec!["r1".into()]).is_err());
        let table = table
            .with_row_labels(vec!["r1".into(), "r2".into()])
            .unwrap();
        assert_eq!(table.row_labels().unwrap().len(), 2);
        assert_eq!(table.column("a"), Some(&Column::Integer(vec![1, 2])));
    }

    #[test]
    fn view_validates_element_count() {
        assert!(ArrayView::try_new(vec![2, 3], AxisOrder::FirstFast, Column::Raw(vec![0; 5])).is_err());
        let scalar = ArrayView::try_new(vec![], AxisOrder::FirstFast, Column::Double(vec![1.0])).unwrap();
        assert_eq!(scalar.rank(), 0);
        assert_eq!(scalar.to_string(), "double[]");
    }

    #[test]
    fn view_validates_labels() {
        let view = ArrayView::try_new(vec![2, 3], AxisOrder::FirstFast, Column::Raw(vec![0; 6])).unwrap();
        assert!(view
            .clone()
            .with_labels(DimLabels::Names(vec!["a".into(), "b".into()]))
            .is_err());
        assert!(view
            .clone()
            .with_labels(DimLabels::PerAxis(vec![None, Some(vec!["x".into()])]))
            .is_err());
        let view = view
            .with_labels(DimLabels::PerAxis(vec![
                Some(vec!["r1".into(), "r2".into()]),
                None,
            ]))
            .unwrap();
        assert_eq!(view.labels().axis(0).unwrap().len(), 2);
        assert!(view.labels().axis(1).is_none());
    }
}
