use std::fmt::{Debug, Formatter};

use tessera_dtype::{Realization, RecordLayout, ScalarKind};
use tessera_error::TesseraResult;
use tessera_store::{Container, Handle, TypeHandle};

/// A container handle released when the guard goes out of scope.
pub(crate) struct Scoped<'a, C: Container + ?Sized, H: Into<Handle> + Copy> {
    container: &'a C,
    handle: H,
}

impl<'a, C: Container + ?Sized, H: Into<Handle> + Copy> Scoped<'a, C, H> {
    pub(crate) fn new(container: &'a C, handle: H) -> Self {
        Self { container, handle }
    }

    pub(crate) fn get(&self) -> H {
        self.handle
    }
}

impl<C: Container + ?Sized, H: Into<Handle> + Copy> Drop for Scoped<'_, C, H> {
    fn drop(&mut self) {
        let handle: Handle = self.handle.into();
        if let Err(err) = self.container.release(handle) {
            log::warn!("failed to release {handle}: {err}");
        }
    }
}

impl<C: Container + ?Sized, H: Into<Handle> + Copy> Debug for Scoped<'_, C, H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scoped({})", self.handle.into())
    }
}

/// A scalar type for `kind`, released on drop.
pub(crate) fn scalar_type<'a, C: Container + ?Sized>(
    container: &'a C,
    kind: &ScalarKind,
    realization: Realization,
) -> TesseraResult<Scoped<'a, C, TypeHandle>> {
    Ok(Scoped::new(
        container,
        container.create_scalar_type(kind, realization)?,
    ))
}

/// A record type with the members and offsets of `layout`, released on drop.
pub(crate) fn record_type<'a, C: Container + ?Sized>(
    container: &'a C,
    layout: &RecordLayout,
) -> TesseraResult<Scoped<'a, C, TypeHandle>> {
    let record = Scoped::new(
        container,
        container.create_record_type(layout.size(), layout.realization())?,
    );
    for member in layout.members() {
        let member_type = scalar_type(container, &member.kind, layout.realization())?;
        container.insert_member(record.get(), &member.name, member.offset, member_type.get())?;
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use tessera_dtype::{Realization, ScalarKind};
    use tessera_store::MemoryContainer;

    use super::*;

    #[test]
    fn released_on_drop() {
        let store = MemoryContainer::new();
        {
            let ty = Scoped::new(
                &store,
                store
                    .create_scalar_type(&ScalarKind::INT32, Realization::Wire)
                    .unwrap(),
            );
            let _space = Scoped::new(&store, store.create_array_space(&[1]).unwrap());
            assert_eq!(store.open_handles(), 2);
            assert!(store.describe_type(ty.get()).is_ok());
        }
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn record_members_are_released() {
        let store = MemoryContainer::new();
        let record = tessera_dtype::RecordType::try_new([
            tessera_dtype::Field::new("a", ScalarKind::INT32),
            tessera_dtype::Field::new("b", ScalarKind::UTF8),
        ])
        .unwrap();
        let layout = RecordLayout::new(&record, Realization::Native);
        {
            let ty = record_type(&store, &layout).unwrap();
            let described = store.describe_type(ty.get()).unwrap();
            let members = &described.as_record().unwrap().members;
            assert_eq!(members[1].offset, 4);
            assert_eq!(store.open_handles(), 1);
        }
        assert_eq!(store.open_handles(), 0);
    }
}
