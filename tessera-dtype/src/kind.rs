use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use tessera_error::{TesseraResult, tessera_bail};

use crate::Realization;

/// Size in bytes of a variable-length text reference in the wire layout.
pub const VARIABLE_TEXT_WIRE_SIZE: usize = 16;

/// Size in bytes of a variable-length text handle in the native layout.
pub const TEXT_HANDLE_SIZE: usize = 8;

/// The width of an integer scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntWidth {
    /// 8 bits
    W8,
    /// 16 bits
    W16,
    /// 32 bits
    W32,
    /// 64 bits
    W64,
}

impl IntWidth {
    /// Width in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    /// Width in bits.
    pub const fn bit_width(self) -> usize {
        self.byte_width() * 8
    }

    /// The width with the given number of bytes, if there is one.
    pub const fn from_byte_width(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::W8),
            2 => Some(Self::W16),
            4 => Some(Self::W32),
            8 => Some(Self::W64),
            _ => None,
        }
    }
}

/// The width of an IEEE 754 floating point scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloatWidth {
    /// half precision
    F16,
    /// single precision
    F32,
    /// double precision
    F64,
}

impl FloatWidth {
    /// Width in bytes.
    pub const fn byte_width(self) -> usize {
        match self {
            Self::F16 => 2,
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Width in bits.
    pub const fn bit_width(self) -> usize {
        self.byte_width() * 8
    }
}

/// Character set of a text scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    /// 7-bit ASCII
    Ascii,
    /// UTF-8
    Utf8,
}

/// Whether text is stored inline with a fixed byte width or by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextLength {
    /// Each value is a reference to separately stored bytes.
    Variable,
    /// Each value occupies exactly this many bytes, NUL padded.
    Fixed(usize),
}

/// An integer-coded scalar with an ordered list of level names.
///
/// Level `i` (0-based position in [`CategoricalType::levels`]) is stored as the code `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoricalType {
    base: IntWidth,
    levels: Arc<[Arc<str>]>,
}

impl CategoricalType {
    /// Create a categorical type, rejecting duplicate level names.
    pub fn try_new<I, S>(base: IntWidth, levels: I) -> TesseraResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let levels: Arc<[Arc<str>]> = levels.into_iter().map(Into::into).collect();
        if let Some(dup) = levels.iter().duplicates().next() {
            tessera_bail!("duplicate categorical level '{}'", dup);
        }
        Ok(Self { base, levels })
    }

    /// The integer width codes are stored with.
    pub fn base(&self) -> IntWidth {
        self.base
    }

    /// The ordered level names.
    pub fn levels(&self) -> &[Arc<str>] {
        &self.levels
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if there are no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The level name for a 1-based code.
    pub fn level(&self, code: i64) -> Option<&str> {
        let idx = usize::try_from(code.checked_sub(1)?).ok()?;
        self.levels.get(idx).map(AsRef::as_ref)
    }

    /// The code a missing value is stored as: the most negative value of the base width.
    ///
    /// It is never a level, so it passes conversions between categorical types unchanged.
    pub fn missing_code(&self) -> i64 {
        i64::MIN >> (64 - self.base.bit_width())
    }

    /// The 1-based code of a level name.
    pub fn code_of(&self, level: &str) -> Option<i64> {
        self.levels
            .iter()
            .position(|l| l.as_ref() == level)
            .and_then(|idx| i64::try_from(idx + 1).ok())
    }
}

/// What a value is at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarKind {
    /// A two's complement or unsigned integer.
    Integer {
        /// The integer width
        width: IntWidth,
        /// Whether the integer is signed
        signed: bool,
    },
    /// An IEEE 754 float.
    Float(FloatWidth),
    /// A (real, imaginary) pair of floats of the given width.
    Complex(FloatWidth),
    /// Text, inline or by reference.
    Text {
        /// The character set
        encoding: TextEncoding,
        /// Fixed width or variable length
        length: TextLength,
    },
    /// An opaque blob of the given byte width.
    Binary(usize),
    /// An integer-coded categorical.
    Categorical(CategoricalType),
}

impl ScalarKind {
    /// 64-bit float.
    pub const FLOAT64: Self = Self::Float(FloatWidth::F64);
    /// Signed 32-bit integer.
    pub const INT32: Self = Self::Integer {
        width: IntWidth::W32,
        signed: true,
    };
    /// Signed 64-bit integer.
    pub const INT64: Self = Self::Integer {
        width: IntWidth::W64,
        signed: true,
    };
    /// Variable-length UTF-8 text.
    pub const UTF8: Self = Self::Text {
        encoding: TextEncoding::Utf8,
        length: TextLength::Variable,
    };
    /// Double precision complex.
    pub const COMPLEX128: Self = Self::Complex(FloatWidth::F64);

    /// Number of bytes one value occupies in the given realization.
    pub fn byte_size(&self, realization: Realization) -> usize {
        match self {
            Self::Integer { width, .. } => width.byte_width(),
            Self::Float(width) => width.byte_width(),
            Self::Complex(width) => 2 * width.byte_width(),
            Self::Text {
                length: TextLength::Fixed(n),
                ..
            } => *n,
            Self::Text {
                length: TextLength::Variable,
                ..
            } => match realization {
                Realization::Wire => VARIABLE_TEXT_WIRE_SIZE,
                Realization::Native => TEXT_HANDLE_SIZE,
            },
            Self::Binary(n) => *n,
            Self::Categorical(cat) => cat.base().byte_width(),
        }
    }

    /// True for integer and float kinds.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::Float(_))
    }

    /// True for integer kinds.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer { .. })
    }

    /// True for float kinds.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// True for text kinds.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Bit width of a numeric kind.
    pub fn bit_width(&self) -> Option<usize> {
        match self {
            Self::Integer { width, .. } => Some(width.bit_width()),
            Self::Float(width) => Some(width.bit_width()),
            _ => None,
        }
    }

    /// The categorical type, if this is a categorical kind.
    pub fn as_categorical(&self) -> Option<&CategoricalType> {
        match self {
            Self::Categorical(cat) => Some(cat),
            _ => None,
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer {
                width,
                signed: true,
            } => write!(f, "int{}", width.bit_width()),
            Self::Integer {
                width,
                signed: false,
            } => write!(f, "uint{}", width.bit_width()),
            Self::Float(width) => write!(f, "float{}", width.bit_width()),
            Self::Complex(width) => write!(f, "complex{}", 2 * width.bit_width()),
            Self::Text { encoding, length } => {
                let enc = match encoding {
                    TextEncoding::Ascii => "ascii",
                    TextEncoding::Utf8 => "utf8",
                };
                match length {
                    TextLength::Variable => write!(f, "{enc}"),
                    TextLength::Fixed(n) => write!(f, "{enc}[{n}]"),
                }
            }
            Self::Binary(n) => write!(f, "opaque[{n}]"),
            Self::Categorical(cat) => write!(
                f,
                "enum(int{})[{}]",
                cat.base().bit_width(),
                cat.levels().iter().join(",")
            ),
        }
    }
}
