//! Type resolution: which host representation a stored value is read into.
//!
//! A [`TypePolicy`] holds up to six kinds of rules, consulted in a fixed order for every numeric
//! field:
//!
//! 1. a global override, applying to every numeric field,
//! 2. a rule for the exact field name,
//! 3. a rule for the specific wire type (`int32`, `uint64`, `float32`, ...),
//! 4. a rule for the wire category (`int`, `uint`, `float`),
//! 5. a default rule,
//! 6. otherwise [`TargetType::Auto`].
//!
//! Float fields resolved to `Auto` read as doubles. Integer fields resolved to `Auto` are
//! narrowed to 32-bit integers by [`narrow`] when every value fits.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use num_traits::ToPrimitive;
use tessera_dtype::ScalarKind;
use tessera_error::{TesseraError, TesseraResult, tessera_bail};

use crate::host::{Column, NA_INTEGER, NA_INTEGER64, NA_LOGICAL};

/// The representation a policy rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum TargetType {
    /// Pick the narrowest lossless representation
    Auto,
    /// Logical
    Bool,
    /// 32-bit integer
    Int32,
    /// Double
    Float64,
    /// 64-bit integer
    WideInt64,
    /// Skip the field entirely
    Drop,
}

impl FromStr for TargetType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" => Self::Auto,
            "logical" => Self::Bool,
            "integer" => Self::Int32,
            "double" => Self::Float64,
            "bit64" => Self::WideInt64,
            "null" => Self::Drop,
            other => tessera_bail!("unknown target type '{}'", other),
        })
    }
}

impl TryFrom<String> for TargetType {
    type Error = TesseraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetType> for String {
    fn from(value: TargetType) -> Self {
        value.to_string()
    }
}

impl Display for TargetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Bool => "logical",
            Self::Int32 => "integer",
            Self::Float64 => "double",
            Self::WideInt64 => "bit64",
            Self::Drop => "null",
        })
    }
}

/// The width-agnostic class of a numeric wire kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumericCategory {
    /// Signed integers
    Int,
    /// Unsigned integers
    UInt,
    /// Floats
    Float,
}

impl NumericCategory {
    /// The category and bit width of a numeric kind.
    pub fn of(kind: &ScalarKind) -> Option<(Self, usize)> {
        match kind {
            ScalarKind::Integer { width, signed } => Some((
                if *signed { Self::Int } else { Self::UInt },
                width.bit_width(),
            )),
            ScalarKind::Float(width) => Some((Self::Float, width.bit_width())),
            _ => None,
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "uint" => Some(Self::UInt),
            "float" => Some(Self::Float),
            _ => None,
        }
    }

    fn valid_width(self, bits: usize) -> bool {
        match self {
            Self::Int | Self::UInt => matches!(bits, 8 | 16 | 32 | 64),
            Self::Float => matches!(bits, 16 | 32 | 64),
        }
    }
}

impl Display for NumericCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
        })
    }
}

/// The rules deciding how stored numeric values are read back.
///
/// Build one with the `with_*` methods, or from the host's loose `(name, value)` form with
/// [`TypePolicy::from_entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypePolicy {
    global: Option<TargetType>,
    by_name: BTreeMap<String, TargetType>,
    by_specific: BTreeMap<(NumericCategory, usize), TargetType>,
    by_category: BTreeMap<NumericCategory, TargetType>,
    default: Option<TargetType>,
    strict: bool,
}

impl TypePolicy {
    /// A policy with no rules: everything resolves to [`TargetType::Auto`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy applying `target` to every numeric field.
    pub fn global(target: TargetType) -> Self {
        Self {
            global: Some(target),
            ..Self::default()
        }
    }

    /// Add a rule for the field called `name`.
    pub fn with_field(mut self, name: impl Into<String>, target: TargetType) -> Self {
        self.by_name.insert(name.into(), target);
        self
    }

    /// Add a rule for one specific wire type.
    pub fn with_specific(
        mut self,
        category: NumericCategory,
        bits: usize,
        target: TargetType,
    ) -> TesseraResult<Self> {
        if !category.valid_width(bits) {
            tessera_bail!("there is no {}-bit {} type", bits, category);
        }
        self.by_specific.insert((category, bits), target);
        Ok(self)
    }

    /// Add a rule for a whole wire category.
    pub fn with_category(mut self, category: NumericCategory, target: TargetType) -> Self {
        self.by_category.insert(category, target);
        self
    }

    /// Add the default rule.
    pub fn with_default(mut self, target: TargetType) -> Self {
        self.default = Some(target);
        self
    }

    /// Fail with [`TesseraError::TypeResolutionAmbiguous`] instead of falling back to `Auto`.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// True if the policy has no rules.
    pub fn is_empty(&self) -> bool {
        self.global.is_none()
            && self.by_name.is_empty()
            && self.by_specific.is_empty()
            && self.by_category.is_empty()
            && self.default.is_none()
    }

    /// Build a policy from the host's loose form: ordered `(name, value)` entries.
    ///
    /// A single unnamed entry is a global override. Otherwise every entry must be named: `.` is
    /// the default rule, `.int`/`.uint`/`.float` are category rules, keys such as `.int32` are
    /// specific-type rules and any other key names a field. When a key repeats, the first entry
    /// wins.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (Option<K>, V)>) -> TesseraResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entries: Vec<(Option<K>, V)> = entries.into_iter().collect();
        if let [(None, value)] = entries.as_slice() {
            return Ok(Self::global(value.as_ref().parse()?));
        }

        let mut policy = Self::default();
        for (key, value) in &entries {
            let Some(key) = key else {
                tessera_bail!("only a single type policy entry may be unnamed");
            };
            let key = key.as_ref();
            let target: TargetType = value.as_ref().parse()?;
            policy.insert_key(key, target)?;
        }
        Ok(policy)
    }

    fn insert_key(&mut self, key: &str, target: TargetType) -> TesseraResult<()> {
        if key == "." {
            self.default.get_or_insert(target);
            return Ok(());
        }
        if let Some(type_key) = key.strip_prefix('.') {
            if let Some(category) = NumericCategory::parse(type_key) {
                self.by_category.entry(category).or_insert(target);
                return Ok(());
            }
            let split = type_key
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(type_key.len());
            let (prefix, digits) = type_key.split_at(split);
            if let (Some(category), Ok(bits)) = (NumericCategory::parse(prefix), digits.parse()) {
                if !category.valid_width(bits) {
                    tessera_bail!("there is no {}-bit {} type in key '{}'", bits, category, key);
                }
                self.by_specific.entry((category, bits)).or_insert(target);
                return Ok(());
            }
        }
        self.by_name.entry(key.to_string()).or_insert(target);
        Ok(())
    }

    fn lookup(&self, kind: &ScalarKind, field: &str) -> Option<TargetType> {
        if let Some(target) = self.global {
            return Some(target);
        }
        if let Some(target) = self.by_name.get(field) {
            return Some(*target);
        }
        let (category, bits) = NumericCategory::of(kind)?;
        self.by_specific
            .get(&(category, bits))
            .or_else(|| self.by_category.get(&category))
            .copied()
            .or(self.default)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::collections::BTreeMap;

    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{TargetType, TypePolicy};

    impl<'de> Deserialize<'de> for TypePolicy {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct PolicyVisitor;

            impl<'de> Visitor<'de> for PolicyVisitor {
                type Value = TypePolicy;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    f.write_str("a target type name or a map of keys to target type names")
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    TypePolicy::from_entries([(None::<&str>, v)]).map_err(E::custom)
                }

                fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                    let mut entries: Vec<(Option<String>, String)> = Vec::new();
                    while let Some((k, v)) = map.next_entry::<String, String>()? {
                        entries.push((Some(k), v));
                    }
                    TypePolicy::from_entries(entries).map_err(de::Error::custom)
                }
            }

            deserializer.deserialize_any(PolicyVisitor)
        }
    }

    impl Serialize for TypePolicy {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if let Some(global) = self.global {
                return serializer.serialize_str(&global.to_string());
            }
            let mut entries: BTreeMap<String, TargetType> = BTreeMap::new();
            for (name, target) in &self.by_name {
                entries.insert(name.clone(), *target);
            }
            for ((category, bits), target) in &self.by_specific {
                entries.insert(format!(".{category}{bits}"), *target);
            }
            for (category, target) in &self.by_category {
                entries.insert(format!(".{category}"), *target);
            }
            if let Some(target) = self.default {
                entries.insert(".".to_string(), target);
            }
            let mut map = serializer.serialize_map(Some(entries.len()))?;
            for (k, v) in &entries {
                map.serialize_entry(k, &v.to_string())?;
            }
            map.end()
        }
    }
}

/// Decide the target representation of `field`, stored as `kind`, under `policy`.
///
/// Only a [`TargetType::Drop`] from the global or field-name rule applies to non-numeric kinds;
/// they otherwise always resolve to `Auto`.
pub fn resolve(kind: &ScalarKind, policy: &TypePolicy, field: &str) -> TesseraResult<TargetType> {
    if !kind.is_numeric() {
        let direct = policy.global.or_else(|| policy.by_name.get(field).copied());
        return Ok(match direct {
            Some(TargetType::Drop) => TargetType::Drop,
            _ => TargetType::Auto,
        });
    }

    let target = match policy.lookup(kind, field) {
        Some(target) => target,
        None if policy.strict => {
            tessera_bail!(
                TypeResolutionAmbiguous: "no rule in the type policy matches field '{}' of type {}",
                field,
                kind
            )
        }
        None => TargetType::Auto,
    };
    log::trace!("field '{}' ({}) resolves to {}", field, kind, target);

    Ok(match target {
        TargetType::Auto if kind.is_float() => TargetType::Float64,
        other => other,
    })
}

/// The host representation values are finally materialized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalType {
    /// Logical column
    Logical,
    /// 32-bit integer column
    Integer,
    /// Double column
    Double,
    /// 64-bit integer column
    Integer64,
}

/// True if every non-missing value is an integer in `(i32::MIN, i32::MAX]`.
///
/// `i32::MIN` itself is excluded: it is the host's missing-integer marker.
pub fn fits_int32(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| v.is_nan() || (*v > f64::from(i32::MIN) && *v <= f64::from(i32::MAX)))
}

/// Pick the final representation of values read as doubles from `wire` for `target`.
///
/// `Auto` on an integer kind narrows to [`FinalType::Integer`] when every value fits; kinds
/// narrower than 32 bits always fit and are not scanned. [`TargetType::Drop`] has no
/// representation: callers skip dropped fields before reading them.
pub fn narrow(values: &[f64], wire: &ScalarKind, target: TargetType) -> FinalType {
    match target {
        TargetType::Auto => match wire {
            ScalarKind::Integer { width, .. } if width.byte_width() < 4 => FinalType::Integer,
            ScalarKind::Integer { .. } if fits_int32(values) => FinalType::Integer,
            _ => FinalType::Double,
        },
        TargetType::Bool => FinalType::Logical,
        TargetType::Int32 => FinalType::Integer,
        TargetType::WideInt64 => FinalType::Integer64,
        TargetType::Float64 | TargetType::Drop => FinalType::Double,
    }
}

/// Materialize `values` as a column of `target`.
///
/// NaN and out-of-range values become the missing marker of integer columns; fractional values
/// are truncated toward zero. Logical columns map zero to false and anything else to true.
pub fn coerce(values: Vec<f64>, target: FinalType) -> Column {
    match target {
        FinalType::Double => Column::Double(values),
        FinalType::Integer => Column::Integer(
            values
                .iter()
                .map(|v| v.to_i32().unwrap_or(NA_INTEGER))
                .collect(),
        ),
        FinalType::Logical => Column::Logical(
            values
                .iter()
                .map(|v| {
                    if v.is_nan() {
                        NA_LOGICAL
                    } else {
                        i32::from(*v != 0.0)
                    }
                })
                .collect(),
        ),
        FinalType::Integer64 => Column::Integer64(
            values
                .iter()
                .map(|v| v.to_i64().unwrap_or(NA_INTEGER64))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tessera_dtype::{FloatWidth, IntWidth};

    use super::*;
    use crate::host::is_na_real;

    const FLOAT32: ScalarKind = ScalarKind::Float(FloatWidth::F32);
    const INT8: ScalarKind = ScalarKind::Integer {
        width: IntWidth::W8,
        signed: true,
    };
    const UINT64: ScalarKind = ScalarKind::Integer {
        width: IntWidth::W64,
        signed: false,
    };

    #[fixture]
    fn layered() -> TypePolicy {
        TypePolicy::from_entries([
            (Some("."), "integer"),
            (Some(".float"), "double"),
            (Some("x"), "bit64"),
        ])
        .unwrap()
    }

    #[rstest]
    #[case("x", FLOAT32, TargetType::WideInt64)]
    #[case("y", FLOAT32, TargetType::Float64)]
    #[case("z", INT8, TargetType::Int32)]
    fn precedence(
        layered: TypePolicy,
        #[case] field: &str,
        #[case] kind: ScalarKind,
        #[case] expected: TargetType,
    ) {
        assert_eq!(resolve(&kind, &layered, field).unwrap(), expected);
    }

    #[test]
    fn specific_beats_category_beats_default() {
        let policy = TypePolicy::from_entries([
            (Some("."), "logical"),
            (Some(".uint"), "double"),
            (Some(".uint64"), "bit64"),
        ])
        .unwrap();
        assert_eq!(resolve(&UINT64, &policy, "a").unwrap(), TargetType::WideInt64);
        let uint8 = ScalarKind::Integer {
            width: IntWidth::W8,
            signed: false,
        };
        assert_eq!(resolve(&uint8, &policy, "a").unwrap(), TargetType::Float64);
        assert_eq!(resolve(&INT8, &policy, "a").unwrap(), TargetType::Bool);
    }

    #[test]
    fn global_ignores_names() {
        let policy = TypePolicy::from_entries([(None::<&str>, "integer")]).unwrap();
        assert_eq!(resolve(&FLOAT32, &policy, "anything").unwrap(), TargetType::Int32);
    }

    #[rstest]
    #[case(FLOAT32, TargetType::Float64)]
    #[case(ScalarKind::INT32, TargetType::Auto)]
    fn fallback(#[case] kind: ScalarKind, #[case] expected: TargetType) {
        assert_eq!(resolve(&kind, &TypePolicy::new(), "f").unwrap(), expected);
    }

    #[test]
    fn strict_refuses_fallback() {
        let policy = TypePolicy::new().with_field("a", TargetType::Int32).strict();
        assert_eq!(resolve(&INT8, &policy, "a").unwrap(), TargetType::Int32);
        assert!(matches!(
            resolve(&INT8, &policy, "b"),
            Err(TesseraError::TypeResolutionAmbiguous(..))
        ));
    }

    #[test]
    fn non_numeric_only_drops() {
        let policy = TypePolicy::new()
            .with_field("s", TargetType::Drop)
            .with_default(TargetType::Int32);
        assert_eq!(resolve(&ScalarKind::UTF8, &policy, "s").unwrap(), TargetType::Drop);
        assert_eq!(resolve(&ScalarKind::UTF8, &policy, "t").unwrap(), TargetType::Auto);
    }

    #[rstest]
    #[case(vec![(None, "integer"), (None, "double")])]
    #[case(vec![(Some("x"), "int")])]
    #[case(vec![(Some(".int12"), "double")])]
    fn bad_entries(#[case] entries: Vec<(Option<&str>, &str)>) {
        assert!(TypePolicy::from_entries(entries).is_err());
    }

    #[test]
    fn first_entry_wins() {
        let policy =
            TypePolicy::from_entries([(Some("a"), "integer"), (Some("a"), "double")]).unwrap();
        assert_eq!(resolve(&INT8, &policy, "a").unwrap(), TargetType::Int32);
    }

    #[test]
    fn narrowing_boundaries() {
        let max = f64::from(i32::MAX);
        let min = f64::from(i32::MIN);
        assert_eq!(narrow(&[0.0, max], &ScalarKind::INT64, TargetType::Auto), FinalType::Integer);
        assert_eq!(narrow(&[min, 0.0], &ScalarKind::INT64, TargetType::Auto), FinalType::Double);
        assert_eq!(narrow(&[max + 1.0], &ScalarKind::INT32, TargetType::Auto), FinalType::Double);
        assert_eq!(narrow(&[min + 1.0], &ScalarKind::INT32, TargetType::Auto), FinalType::Integer);
        assert_eq!(narrow(&[1.0], &FLOAT32, TargetType::Auto), FinalType::Double);
        assert_eq!(narrow(&[1e12], &INT8, TargetType::Auto), FinalType::Integer);
        assert_eq!(narrow(&[1e12], &UINT64, TargetType::Float64), FinalType::Double);
    }

    #[test]
    fn coercions() {
        assert_eq!(
            coerce(vec![1.9, -1.9, f64::NAN, 3e10], FinalType::Integer),
            Column::Integer(vec![1, -1, NA_INTEGER, NA_INTEGER])
        );
        assert_eq!(
            coerce(vec![0.0, 2.5, f64::NAN], FinalType::Logical),
            Column::Logical(vec![0, 1, NA_LOGICAL])
        );
        let Column::Double(v) = coerce(vec![crate::host::NA_REAL], FinalType::Double) else {
            panic!("expected doubles");
        };
        assert!(is_na_real(v[0]));
    }
}
