//! Writing and reading N-dimensional arrays of a single scalar kind.
//!
//! The container stores arrays with the last axis varying fastest. Host arrays are reordered on
//! the way in and out, and axis labels travel as linked label arrays.

use tessera_dtype::{Realization, ScalarKind};
use tessera_error::{PersistContext, TesseraResult, tessera_err};
use tessera_store::{Container, StoreType};

use crate::handle::{Scoped, scalar_type};
use crate::host::ArrayView;
use crate::labels::{AxisRole, attach_to, read_dims};
use crate::object::{ObjectPath, clear_target, create_and_write, read_with};
use crate::options::WriteOptions;
use crate::record::{FieldPlan, pack_elements, plan_write_field, read_native, unpack_column};
use crate::resolve::{TargetType, TypePolicy, resolve};
use crate::transpose::{AxisOrder, transpose};

/// Write `array` to `path`, stored as `type_string` or the default type for its data.
///
/// Labels on any axis are written as label arrays and linked to that axis.
pub fn write_array<C: Container + ?Sized>(
    container: &C,
    path: &str,
    array: &ArrayView,
    type_string: Option<&str>,
    options: &WriteOptions,
) -> TesseraResult<()> {
    let target = ObjectPath::parse(path)?;
    let (field, staged) = plan_write_field(target.name, array.data(), type_string)?;
    let mut buffer = pack_elements(&staged, &field.native)?;
    drop(staged);

    let element_size = field.native.byte_size(Realization::Native);
    if let Some(direction) = array.order().direction_to(AxisOrder::LastFast) {
        let reordered = transpose(buffer.as_slice(), array.dims(), element_size, direction);
        buffer.as_mut_slice().copy_from_slice(&reordered);
    }
    log::debug!("writing {} to '{}' as {}", array, path, field.wire);

    let persist = || -> TesseraResult<()> {
        let wire = scalar_type(container, &field.wire, Realization::Wire)?;
        let mem = scalar_type(container, &field.native, Realization::Native)?;
        let space = Scoped::new(container, container.create_array_space(array.dims())?);
        clear_target(container, target, options.overwrite)?;
        let object = create_and_write(
            container,
            target,
            wire.get(),
            mem.get(),
            space.get(),
            &options.create_options(array.dims(), field.wire.byte_size(Realization::Wire)),
            &buffer,
        )?;
        for axis in 0..array.rank() {
            if let Some(labels) = array.labels().axis(axis) {
                let role = AxisRole::of_array(array.rank(), axis);
                attach_to(container, target, object.get(), axis, role, labels)?;
            }
        }
        Ok(())
    };
    persist().persist_context(path)
}

/// Read the array at `path` in host order, resolving its kind through `policy`.
///
/// Returns `None` when the policy drops the array. Labels found on its axes are restored; a
/// one-dimensional array gets them as element names.
pub fn read_array<C: Container + ?Sized>(
    container: &C,
    path: &str,
    policy: &TypePolicy,
) -> TesseraResult<Option<ArrayView>> {
    let target = ObjectPath::parse(path)?;
    let object = Scoped::new(
        container,
        container
            .open_object(target.parent, target.name)
            .persist_context(path)?,
    );
    let ty = Scoped::new(
        container,
        container.object_type(object.get()).persist_context(path)?,
    );
    let kind = match container.describe_type(ty.get()).persist_context(path)? {
        StoreType::Scalar(kind) => kind,
        StoreType::Record(_) => {
            return Err(tessera_err!("'{}' holds a table, not an array", path));
        }
    };
    let resolved = resolve(&kind, policy, target.name)?;
    if resolved == TargetType::Drop {
        log::debug!("skipping '{}'", path);
        return Ok(None);
    }
    let field = FieldPlan {
        name: target.name.into(),
        native: read_native(target.name, &kind, resolved)?,
        wire: kind,
        target: resolved,
    };

    let space = Scoped::new(
        container,
        container.object_space(object.get()).persist_context(path)?,
    );
    let dims = container.space_dims(space.get()).persist_context(path)?;
    let count: usize = dims.iter().product();
    let size = field.native.byte_size(Realization::Native);
    let len = count
        .checked_mul(size)
        .ok_or_else(|| tessera_err!(OutOfMemory: "{} elements of {} bytes", count, size))?;
    let mem = scalar_type(container, &field.native, Realization::Native).persist_context(path)?;
    let data = read_with(container, object.get(), mem.get(), space.get(), len, |buffer| {
        if let Some(direction) = AxisOrder::LastFast.direction_to(AxisOrder::FirstFast) {
            let reordered = transpose(buffer.as_slice(), &dims, size, direction);
            buffer.as_mut_slice().copy_from_slice(&reordered);
        }
        unpack_column(buffer, &field, count, 0, size)
    })
    .persist_context(path)?;
    log::debug!("read {} {} values from '{}'", count, field.wire, path);

    let labels = read_dims(container, object.get(), &dims).persist_context(path)?;
    Ok(Some(
        ArrayView::try_new(dims, AxisOrder::FirstFast, data)?.with_labels(labels)?,
    ))
}

/// The kind stored at `path`, without reading its values.
pub fn stored_kind<C: Container + ?Sized>(container: &C, path: &str) -> TesseraResult<ScalarKind> {
    let target = ObjectPath::parse(path)?;
    let describe = || -> TesseraResult<ScalarKind> {
        let object = Scoped::new(container, container.open_object(target.parent, target.name)?);
        let ty = Scoped::new(container, container.object_type(object.get())?);
        match container.describe_type(ty.get())? {
            StoreType::Scalar(kind) => Ok(kind),
            StoreType::Record(_) => Err(tessera_err!("'{}' holds a table, not an array", path)),
        }
    };
    describe().persist_context(path)
}

#[cfg(test)]
mod tests {
    use tessera_error::TesseraError;
    use tessera_store::MemoryContainer;

    use super::*;
    use crate::host::{Column, DimLabels};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matrix_is_stored_last_axis_fastest() {
        let store = MemoryContainer::new();
        // 2 x 3, first axis fastest: [[1, 3, 5], [2, 4, 6]]
        let data = Column::Integer((1..=6).collect());
        let array = ArrayView::try_new(vec![2, 3], AxisOrder::FirstFast, data.clone()).unwrap();
        write_array(&store, "m", &array, Some("uint8"), &WriteOptions::default()).unwrap();
        assert_eq!(store.wire_bytes("/m").unwrap(), vec![1, 3, 5, 2, 4, 6]);

        let back = read_array(&store, "m", &TypePolicy::new()).unwrap().unwrap();
        assert_eq!(back.dims(), &[2, 3]);
        assert_eq!(back.order(), AxisOrder::FirstFast);
        assert_eq!(back.data(), &data);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn row_major_source_reads_in_host_order() {
        let store = MemoryContainer::new();
        let source = ArrayView::try_new(
            vec![2, 3],
            AxisOrder::LastFast,
            Column::Double(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        )
        .unwrap();
        write_array(&store, "m", &source, None, &WriteOptions::default()).unwrap();
        let back = read_array(&store, "m", &TypePolicy::new()).unwrap().unwrap();
        let Column::Double(values) = back.data() else {
            panic!("expected doubles");
        };
        assert_eq!(values[1 + 2 * 2], 6.0);
        assert_eq!(values, &vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn text_arrays_transpose_handles() {
        let store = MemoryContainer::new();
        let data = Column::Text(vec![
            Some("a".into()),
            Some("b".into()),
            None,
            Some("d".into()),
        ]);
        let array = ArrayView::try_new(vec![2, 2], AxisOrder::FirstFast, data.clone()).unwrap();
        write_array(&store, "t", &array, None, &WriteOptions::default()).unwrap();
        let back = read_array(&store, "t", &TypePolicy::new()).unwrap().unwrap();
        assert_eq!(back.data(), &data);
    }

    #[test]
    fn labels_round_trip() {
        let store = MemoryContainer::new();
        let array = ArrayView::try_new(vec![2, 3], AxisOrder::FirstFast, Column::Raw(vec![0; 6]))
            .unwrap()
            .with_labels(DimLabels::PerAxis(vec![
                None,
                Some(strings(&["x", "y", "z"])),
            ]))
            .unwrap();
        write_array(&store, "g/m", &array, None, &WriteOptions::default()).unwrap();
        assert!(store.paths().contains(&"/g/m_colnames".to_string()));
        let back = read_array(&store, "g/m", &TypePolicy::new()).unwrap().unwrap();
        assert_eq!(back.labels(), array.labels());

        let named = ArrayView::vector(Column::Integer(vec![1, 2]))
            .with_labels(DimLabels::Names(strings(&["p", "q"])))
            .unwrap();
        write_array(&store, "v", &named, None, &WriteOptions::default()).unwrap();
        let back = read_array(&store, "v", &TypePolicy::new()).unwrap().unwrap();
        assert_eq!(back.labels(), &DimLabels::Names(strings(&["p", "q"])));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn scalars_have_no_dims() {
        let store = MemoryContainer::new();
        let scalar =
            ArrayView::try_new(vec![], AxisOrder::FirstFast, Column::Integer(vec![7])).unwrap();
        write_array(&store, "s", &scalar, Some("int16"), &WriteOptions::default()).unwrap();
        let back = read_array(&store, "s", &TypePolicy::new()).unwrap().unwrap();
        assert_eq!(back.rank(), 0);
        assert_eq!(back.data(), &Column::Integer(vec![7]));
    }

    #[test]
    fn policy_can_drop_or_widen() {
        let store = MemoryContainer::new();
        let array = ArrayView::vector(Column::Integer(vec![1, -2]));
        write_array(&store, "v", &array, Some("int32"), &WriteOptions::default()).unwrap();
        assert!(read_array(&store, "v", &TypePolicy::global(TargetType::Drop)).unwrap().is_none());
        let back = read_array(&store, "v", &TypePolicy::global(TargetType::Float64))
            .unwrap()
            .unwrap();
        assert_eq!(back.data(), &Column::Double(vec![1.0, -2.0]));
        assert_eq!(stored_kind(&store, "v").unwrap(), ScalarKind::INT32);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let store = MemoryContainer::new();
        store.fail_writes_to("/v");
        let array = ArrayView::vector(Column::Double(vec![1.0]));
        let err = write_array(&store, "v", &array, None, &WriteOptions::default()).unwrap_err();
        assert_eq!(err.path(), Some("v"));
        assert!(matches!(err, TesseraError::Persist { .. }));
        assert!(store.paths().is_empty());
        assert_eq!(store.open_handles(), 0);
    }
}
