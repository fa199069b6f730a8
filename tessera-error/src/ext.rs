use crate::TesseraResult;

/// Attributes collaborator failures to the object path they happened on.
pub trait PersistContext<T> {
    /// Wrap the error in [`crate::TesseraError::Persist`] naming `path`, unless it already names one.
    fn persist_context(self, path: &str) -> TesseraResult<T>;
}

impl<T> PersistContext<T> for TesseraResult<T> {
    fn persist_context(self, path: &str) -> TesseraResult<T> {
        self.map_err(|err| err.with_path(path.to_string()))
    }
}
