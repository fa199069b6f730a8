#![deny(missing_docs)]

//! Error handling for Tessera.
//!
//! Every crate in the workspace reports failures through [`TesseraError`]. Errors are built with
//! the [`tessera_err!`] and [`tessera_bail!`] macros, which capture a backtrace at the point of
//! construction.

// Imported under another name so thiserror does not emit the nightly-only `provide` method.
use std::backtrace::Backtrace as CapturedBacktrace;
use std::borrow::Cow;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

pub use ext::*;

mod ext;

/// A string that can be used as an error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Tessera.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum TesseraError {
    /// A field whose scalar kind cannot be marshalled.
    #[error("unsupported type '{kind}' for field '{field}'\nBacktrace:\n{backtrace}")]
    UnsupportedFieldType {
        /// Name of the offending field or object.
        field: ErrString,
        /// The type that could not be handled.
        kind: ErrString,
        /// Where the error was raised.
        backtrace: CapturedBacktrace,
    },
    /// Declared dimensions disagree with the number of elements.
    #[error("dimension mismatch: {0}\nBacktrace:\n{1}")]
    DimensionMismatch(ErrString, CapturedBacktrace),
    /// A working buffer could not be allocated.
    #[error("out of memory: {0}\nBacktrace:\n{1}")]
    OutOfMemory(ErrString, CapturedBacktrace),
    /// The storage collaborator failed while operating on `path`.
    #[error("failed to persist '{path}': {source}")]
    Persist {
        /// Path of the object involved.
        path: ErrString,
        /// The underlying collaborator failure.
        source: Box<TesseraError>,
    },
    /// A strict type policy had no rule for a field.
    #[error("ambiguous type resolution: {0}\nBacktrace:\n{1}")]
    TypeResolutionAmbiguous(ErrString, CapturedBacktrace),
    /// An argument was invalid.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, CapturedBacktrace),
    /// A named object does not exist.
    #[error("not found: {0}\nBacktrace:\n{1}")]
    NotFound(ErrString, CapturedBacktrace),
    /// A storage collaborator call failed.
    #[error("storage error: {0}\nBacktrace:\n{1}")]
    Storage(ErrString, CapturedBacktrace),
}

impl TesseraError {
    /// Attributes the error to the object at `path`.
    ///
    /// An error that already names a path is returned unchanged, so the innermost path wins.
    pub fn with_path<T: Into<ErrString>>(self, path: T) -> Self {
        match self {
            err @ TesseraError::Persist { .. } => err,
            err => TesseraError::Persist {
                path: path.into(),
                source: Box::new(err),
            },
        }
    }

    /// The path this error was attributed to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            TesseraError::Persist { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl Debug for TesseraError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return TesseraErrors as their error type.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// A convenient macro for creating a TesseraError.
#[macro_export]
macro_rules! tessera_err {
    (UnsupportedFieldType: $field:expr, $kind:expr $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use($crate::TesseraError::UnsupportedFieldType {
            field: $field.to_string().into(),
            kind: $kind.to_string().into(),
            backtrace: Backtrace::capture(),
        })
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::TesseraError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::tessera_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a TesseraError.
#[macro_export]
macro_rules! tessera_bail {
    ($($tt:tt)+) => {
        return Err($crate::tessera_err!($($tt)+))
    };
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::TesseraError) -> crate::TesseraError {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bails(field: &str) -> TesseraResult<()> {
        tessera_bail!(UnsupportedFieldType: field, "vlen(int32)")
    }

    #[test]
    fn unsupported_field_names_the_field() {
        let err = bails("score").unwrap_err();
        assert!(matches!(
            &err,
            TesseraError::UnsupportedFieldType { field, .. } if field.as_ref() == "score"
        ));
        assert!(err.to_string().contains("'score'"));
    }

    #[test]
    fn bare_format_is_invalid_argument() {
        let err = tessera_err!("bad rank {}", 7);
        assert!(matches!(err, TesseraError::InvalidArgument(..)));
        assert!(err.to_string().starts_with("bad rank 7"));
    }

    #[test]
    fn innermost_path_wins() {
        let err = tessera_err!(Storage: "write refused")
            .with_path("grp/table")
            .with_path("grp");
        assert_eq!(err.path(), Some("grp/table"));
        assert!(err.to_string().starts_with("failed to persist 'grp/table'"));
    }

    #[test]
    fn persist_context_wraps_results() {
        let res: TesseraResult<()> = Err(tessera_err!(Storage: "boom"));
        let err = res.persist_context("a/b").unwrap_err();
        assert!(matches!(err, TesseraError::Persist { .. }));
        assert_eq!(err.path(), Some("a/b"));
    }

    #[test]
    fn persisted_errors_keep_their_source() {
        let err = tessera_err!(NotFound: "x").with_path("t");
        let TesseraError::Persist { source, .. } = &err else {
            panic!("unexpected error {err}");
        };
        assert!(matches!(**source, TesseraError::NotFound(..)));
    }
}
