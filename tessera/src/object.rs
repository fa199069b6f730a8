//! Object-level plumbing shared by tables, arrays and labels.

use tessera_error::{TesseraResult, tessera_bail};
use tessera_store::{
    Container, CreateOptions, NativeBuffer, ObjectHandle, SpaceHandle, TypeHandle,
};

use crate::handle::Scoped;
use crate::labels::remove_labels;

/// A `parent/name` object path split at its last separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ObjectPath<'a> {
    pub(crate) parent: &'a str,
    pub(crate) name: &'a str,
}

impl<'a> ObjectPath<'a> {
    pub(crate) fn parse(path: &'a str) -> TesseraResult<Self> {
        let trimmed = path.trim_end_matches('/');
        let (parent, name) = match trimmed.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((parent, name)) => (parent, name),
            None => ("/", trimmed),
        };
        if name.is_empty() {
            tessera_bail!("'{}' does not name an object", path);
        }
        Ok(Self { parent, name })
    }

    /// A sibling of this object called `name`.
    pub(crate) fn sibling<'b>(&self, name: &'b str) -> ObjectPath<'b>
    where
        'a: 'b,
    {
        ObjectPath {
            parent: self.parent,
            name,
        }
    }
}

/// Make room for a new object: delete what is there when `overwrite` is set, fail otherwise.
///
/// Label arrays linked to a deleted object are deleted with it.
pub(crate) fn clear_target<C: Container + ?Sized>(
    container: &C,
    target: ObjectPath<'_>,
    overwrite: bool,
) -> TesseraResult<()> {
    if !container.exists(target.parent, target.name)? {
        return Ok(());
    }
    if !overwrite {
        tessera_bail!("'{}' already exists in '{}'", target.name, target.parent);
    }
    log::debug!("replacing '{}' in '{}'", target.name, target.parent);
    remove_labels(container, target)?;
    container.delete(target.parent, target.name)
}

/// Create an object and fill it from `buffer`.
///
/// When the write fails the partially written object is deleted before the error is returned.
pub(crate) fn create_and_write<'a, C: Container + ?Sized>(
    container: &'a C,
    target: ObjectPath<'_>,
    wire: TypeHandle,
    mem: TypeHandle,
    space: SpaceHandle,
    options: &CreateOptions,
    buffer: &NativeBuffer,
) -> TesseraResult<Scoped<'a, C, ObjectHandle>> {
    let object = Scoped::new(
        container,
        container.create_object(target.parent, target.name, wire, space, options)?,
    );
    if let Err(err) = container.write(object.get(), mem, buffer) {
        drop(object);
        if let Err(cleanup) = container.delete(target.parent, target.name) {
            log::warn!(
                "failed to remove partially written '{}' in '{}': {}",
                target.name,
                target.parent,
                cleanup
            );
        }
        return Err(err);
    }
    Ok(object)
}

/// Read a whole object into a fresh `len`-byte buffer and hand it to `unpack`.
///
/// `unpack` may reorder the buffer's bytes in place. Variable-length storage the read placed in
/// the buffer is reclaimed whether or not `unpack` succeeds.
pub(crate) fn read_with<C: Container + ?Sized, T>(
    container: &C,
    object: ObjectHandle,
    mem: TypeHandle,
    space: SpaceHandle,
    len: usize,
    unpack: impl FnOnce(&mut NativeBuffer) -> TesseraResult<T>,
) -> TesseraResult<T> {
    let mut buffer = NativeBuffer::try_zeroed(len)?;
    container.read(object, mem, &mut buffer)?;
    let unpacked = unpack(&mut buffer);
    let reclaimed = container.reclaim_variable_length(mem, space, &mut buffer);
    let value = unpacked?;
    reclaimed?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("a", "/", "a")]
    #[case("/a", "/", "a")]
    #[case("grp/a", "grp", "a")]
    #[case("/grp/sub/a/", "/grp/sub", "a")]
    fn paths(#[case] path: &str, #[case] parent: &str, #[case] name: &str) {
        let parsed = ObjectPath::parse(path).unwrap();
        assert_eq!((parsed.parent, parsed.name), (parent, name));
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    fn empty_names(#[case] path: &str) {
        assert!(ObjectPath::parse(path).is_err());
    }
}
