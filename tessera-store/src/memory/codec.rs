//! Element conversion between the wire and native realizations of a kind.
//!
//! Every scalar is decoded into a [`Value`], converted to the destination kind, then encoded.
//! Both realizations are handled through little-endian decoding: native bytes are reordered
//! first on big-endian hosts.

use half::f16;
use tessera_dtype::{FloatWidth, IntWidth, Realization, ScalarKind, TextLength};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use crate::TextHeap;

/// A decoded scalar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
    Text(Option<String>),
    Bytes(Vec<u8>),
    Code(i64),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Complex(..) => "complex",
            Self::Text(_) => "text",
            Self::Bytes(_) => "opaque",
            Self::Code(_) => "categorical",
        }
    }
}

/// Where variable-length text referenced from element bytes lives.
pub(crate) trait TextStore {
    fn load(&self, reference: u64) -> TesseraResult<Option<String>>;

    fn store(&mut self, value: Option<&str>) -> u64;
}

impl TextStore for TextHeap {
    fn load(&self, reference: u64) -> TesseraResult<Option<String>> {
        Ok(self.get(reference)?.map(str::to_string))
    }

    fn store(&mut self, value: Option<&str>) -> u64 {
        value.map_or(TextHeap::NULL, |s| self.insert(s))
    }
}

/// The per-object string table variable-length wire text points into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WireStrings(pub(crate) Vec<String>);

impl TextStore for WireStrings {
    fn load(&self, reference: u64) -> TesseraResult<Option<String>> {
        if reference == 0 {
            return Ok(None);
        }
        usize::try_from(reference - 1)
            .ok()
            .and_then(|idx| self.0.get(idx))
            .map(|s| Some(s.clone()))
            .ok_or_else(|| tessera_err!(Storage: "corrupt text reference {}", reference))
    }

    fn store(&mut self, value: Option<&str>) -> u64 {
        match value {
            Some(s) => {
                self.0.push(s.to_string());
                self.0.len() as u64
            }
            None => 0,
        }
    }
}

fn ordered(bytes: &[u8], realization: Realization) -> Vec<u8> {
    let mut owned = bytes.to_vec();
    if realization == Realization::Native && cfg!(target_endian = "big") {
        owned.reverse();
    }
    owned
}

fn store_ordered(out: &mut [u8], mut le: Vec<u8>, realization: Realization) {
    if realization == Realization::Native && cfg!(target_endian = "big") {
        le.reverse();
    }
    out.copy_from_slice(&le);
}

fn read_le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(raw)
}

fn read_int(bytes: &[u8], width: IntWidth, signed: bool) -> Value {
    let raw = read_le_u64(bytes);
    let bits = width.bit_width();
    if !signed {
        return Value::UInt(raw);
    }
    let shift = 64 - bits;
    #[allow(clippy::cast_possible_wrap)]
    let value = ((raw << shift) as i64) >> shift;
    Value::Int(value)
}

fn read_float(bytes: &[u8], width: FloatWidth) -> f64 {
    match width {
        FloatWidth::F16 => f16::from_le_bytes([bytes[0], bytes[1]]).to_f64(),
        FloatWidth::F32 => f64::from(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        FloatWidth::F64 => f64::from_bits(read_le_u64(bytes)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn write_float(value: f64, width: FloatWidth) -> Vec<u8> {
    match width {
        FloatWidth::F16 => f16::from_f64(value).to_le_bytes().to_vec(),
        FloatWidth::F32 => (value as f32).to_le_bytes().to_vec(),
        FloatWidth::F64 => value.to_le_bytes().to_vec(),
    }
}

/// Decode one element of `kind` from `bytes`.
pub(crate) fn decode<S: TextStore>(
    kind: &ScalarKind,
    realization: Realization,
    bytes: &[u8],
    text: &S,
) -> TesseraResult<Value> {
    let le = ordered(bytes, realization);
    Ok(match kind {
        ScalarKind::Integer { width, signed } => read_int(&le, *width, *signed),
        ScalarKind::Float(width) => Value::Float(read_float(&le, *width)),
        ScalarKind::Complex(width) => {
            // the pair is ordered (re, im) in both realizations; only each half is swapped
            let half = width.byte_width();
            let re = ordered(&bytes[..half], realization);
            let im = ordered(&bytes[half..], realization);
            Value::Complex(read_float(&re, *width), read_float(&im, *width))
        }
        ScalarKind::Text {
            length: TextLength::Fixed(_),
            ..
        } => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
            Value::Text(Some(String::from_utf8_lossy(&bytes[..end]).into_owned()))
        }
        ScalarKind::Text {
            length: TextLength::Variable,
            ..
        } => {
            let reference = match realization {
                Realization::Wire => read_le_u64(&bytes[..8]),
                Realization::Native => read_le_u64(&le),
            };
            Value::Text(text.load(reference)?)
        }
        ScalarKind::Binary(_) => Value::Bytes(bytes.to_vec()),
        ScalarKind::Categorical(cat) => match read_int(&le, cat.base(), true) {
            Value::Int(code) => Value::Code(code),
            other => other,
        },
    })
}

/// Convert a decoded value of `src` into something `dst` can encode.
///
/// Categorical codes are matched by level name. A missing code becomes the destination's missing
/// code, and any other code must name a level.
pub(crate) fn convert(value: Value, src: &ScalarKind, dst: &ScalarKind) -> TesseraResult<Value> {
    match (value, src, dst) {
        (Value::Code(code), ScalarKind::Categorical(from), ScalarKind::Categorical(to)) => {
            if code == from.missing_code() {
                return Ok(Value::Code(to.missing_code()));
            }
            let level = from
                .level(code)
                .ok_or_else(|| tessera_err!(Storage: "code {} is not a level of {}", code, src))?;
            to.code_of(level)
                .map(Value::Code)
                .ok_or_else(|| tessera_err!(Storage: "level '{}' is not a member of {}", level, dst))
        }
        (Value::Code(code) | Value::Int(code), _, ScalarKind::Categorical(to)) => {
            if code != to.missing_code() && to.level(code).is_none() {
                tessera_bail!(Storage: "code {} is not a level of {}", code, dst);
            }
            Ok(Value::Code(code))
        }
        (Value::Code(code), _, _) => Ok(Value::Int(code)),
        (value, _, _) => Ok(value),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_i128(value: &Value, dst: &ScalarKind) -> TesseraResult<i128> {
    Ok(match value {
        Value::Int(v) | Value::Code(v) => i128::from(*v),
        Value::UInt(v) => i128::from(*v),
        Value::Float(v) if v.is_nan() => tessera_bail!(Storage: "cannot store NaN as {}", dst),
        Value::Float(v) => *v as i128,
        other => tessera_bail!(Storage: "cannot convert {} value to {}", other.describe(), dst),
    })
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Value, dst: &ScalarKind) -> TesseraResult<f64> {
    Ok(match value {
        Value::Int(v) | Value::Code(v) => *v as f64,
        Value::UInt(v) => *v as f64,
        Value::Float(v) => *v,
        other => tessera_bail!(Storage: "cannot convert {} value to {}", other.describe(), dst),
    })
}

fn saturate(value: i128, width: IntWidth, signed: bool) -> i128 {
    let bits = width.bit_width();
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    value.clamp(min, max)
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn int_bytes(value: i128, width: IntWidth) -> Vec<u8> {
    (value as u128).to_le_bytes()[..width.byte_width()].to_vec()
}

/// Encode `value` as one element of `kind` into `out`.
pub(crate) fn encode<S: TextStore>(
    kind: &ScalarKind,
    realization: Realization,
    value: &Value,
    out: &mut [u8],
    text: &mut S,
) -> TesseraResult<()> {
    match kind {
        ScalarKind::Integer { width, signed } => {
            let v = saturate(as_i128(value, kind)?, *width, *signed);
            store_ordered(out, int_bytes(v, *width), realization);
        }
        ScalarKind::Categorical(cat) => {
            let v = saturate(as_i128(value, kind)?, cat.base(), true);
            store_ordered(out, int_bytes(v, cat.base()), realization);
        }
        ScalarKind::Float(width) => {
            store_ordered(out, write_float(as_f64(value, kind)?, *width), realization);
        }
        ScalarKind::Complex(width) => {
            let (re, im) = match value {
                Value::Complex(re, im) => (*re, *im),
                other => (as_f64(other, kind)?, 0.0),
            };
            let half = width.byte_width();
            store_ordered(&mut out[..half], write_float(re, *width), realization);
            store_ordered(&mut out[half..], write_float(im, *width), realization);
        }
        ScalarKind::Text { length, .. } => {
            let Value::Text(s) = value else {
                tessera_bail!(Storage: "cannot convert {} value to {}", value.describe(), kind);
            };
            match length {
                TextLength::Fixed(n) => {
                    out.fill(0);
                    if let Some(s) = s {
                        let take = s.len().min(*n);
                        out[..take].copy_from_slice(&s.as_bytes()[..take]);
                    }
                }
                TextLength::Variable => {
                    let len = s.as_ref().map_or(0, String::len) as u64;
                    let reference = text.store(s.as_deref());
                    match realization {
                        Realization::Wire => {
                            out[..8].copy_from_slice(&reference.to_le_bytes());
                            out[8..16].copy_from_slice(&len.to_le_bytes());
                        }
                        Realization::Native => {
                            store_ordered(out, reference.to_le_bytes().to_vec(), realization)
                        }
                    }
                }
            }
        }
        ScalarKind::Binary(n) => {
            let Value::Bytes(bytes) = value else {
                tessera_bail!(Storage: "cannot convert {} value to {}", value.describe(), kind);
            };
            if bytes.len() != *n {
                tessera_bail!(Storage: "cannot convert {}-byte opaque value to {}", bytes.len(), kind);
            }
            out.copy_from_slice(bytes);
        }
    }
    Ok(())
}
