//! Parsing of the type strings callers use to choose a wire kind.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tessera_error::{TesseraError, TesseraResult, tessera_err};

use crate::{CategoricalType, FloatWidth, IntWidth, ScalarKind};

/// A parsed type string.
///
/// Integer and float names always denote portable standard widths. The C-style aliases
/// (`int`, `long`, ...) are accepted but never resolve to platform widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    /// A signed integer of the given width
    Int(IntWidth),
    /// An unsigned integer of the given width
    UInt(IntWidth),
    /// A float of the given width
    Float(FloatWidth),
    /// Double precision complex
    Complex,
    /// Variable-length UTF-8 text
    Character,
    /// A single opaque byte
    Raw,
    /// A categorical whose levels come from the column being written
    Factor,
}

impl FromStr for TypeName {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int8" | "char" => Self::Int(IntWidth::W8),
            "int16" | "short" => Self::Int(IntWidth::W16),
            "int32" | "int" => Self::Int(IntWidth::W32),
            "int64" | "long" | "llong" => Self::Int(IntWidth::W64),
            "uint8" | "uchar" => Self::UInt(IntWidth::W8),
            "uint16" | "ushort" => Self::UInt(IntWidth::W16),
            "uint32" | "uint" => Self::UInt(IntWidth::W32),
            "uint64" | "ulong" | "ullong" => Self::UInt(IntWidth::W64),
            "float16" => Self::Float(FloatWidth::F16),
            "float32" | "float" => Self::Float(FloatWidth::F32),
            "float64" | "double" => Self::Float(FloatWidth::F64),
            "complex" => Self::Complex,
            "character" => Self::Character,
            "raw" => Self::Raw,
            "factor" => Self::Factor,
            _ => return Err(tessera_err!("unknown type name '{}'", s)),
        })
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(w) => write!(f, "int{}", w.bit_width()),
            Self::UInt(w) => write!(f, "uint{}", w.bit_width()),
            Self::Float(w) => write!(f, "float{}", w.bit_width()),
            Self::Complex => write!(f, "complex"),
            Self::Character => write!(f, "character"),
            Self::Raw => write!(f, "raw"),
            Self::Factor => write!(f, "factor"),
        }
    }
}

impl TypeName {
    /// The wire kind this name denotes. `levels` supplies the categorical levels for `factor`.
    pub fn wire_kind<S: AsRef<str>>(self, levels: Option<&[S]>) -> TesseraResult<ScalarKind> {
        Ok(match self {
            Self::Int(width) => ScalarKind::Integer {
                width,
                signed: true,
            },
            Self::UInt(width) => ScalarKind::Integer {
                width,
                signed: false,
            },
            Self::Float(width) => ScalarKind::Float(width),
            Self::Complex => ScalarKind::COMPLEX128,
            Self::Character => ScalarKind::UTF8,
            Self::Raw => ScalarKind::Binary(1),
            Self::Factor => {
                let levels = levels.ok_or_else(|| tessera_err!("factor type requires levels"))?;
                ScalarKind::Categorical(CategoricalType::try_new(
                    IntWidth::W32,
                    levels.iter().map(AsRef::as_ref),
                )?)
            }
        })
    }
}

impl ScalarKind {
    /// Resolve a caller's type string for `field` into a wire kind.
    ///
    /// Unknown names, and `factor` without levels, fail with
    /// [`TesseraError::UnsupportedFieldType`] naming the field.
    pub fn from_type_string<S: AsRef<str>>(
        field: &str,
        type_string: &str,
        levels: Option<&[S]>,
    ) -> TesseraResult<Self> {
        type_string
            .parse::<TypeName>()
            .and_then(|name| name.wire_kind(levels))
            .map_err(|_| tessera_err!(UnsupportedFieldType: field, type_string))
    }
}
