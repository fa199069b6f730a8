//! Axis labels: one-dimensional text arrays linked to an axis of another object.
//!
//! A label array lives next to the object it labels, under a name derived from the object's name
//! and the role of the axis. Replacing an object removes the label arrays linked to it under those
//! names. Reading labels never fails because of the labels themselves: a label array that is not
//! text, has the wrong length or has a missing entry reads as no labels, since a label set holds
//! text only.

use std::sync::Arc;

use tessera_dtype::{Realization, ScalarKind};
use tessera_error::{PersistContext, TesseraError, TesseraResult, tessera_err};
use tessera_store::{Container, CreateOptions, ObjectHandle, StoreType};

use crate::handle::{Scoped, scalar_type};
use crate::host::{Column, DimLabels};
use crate::object::{ObjectPath, clear_target, create_and_write, read_with};
use crate::record::{FieldPlan, pack_elements, unpack_column};
use crate::resolve::TargetType;

/// What an axis means to the object it belongs to, which decides its label array's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisRole {
    /// The only axis of a vector
    Names,
    /// The first axis of a matrix
    Rows,
    /// The second axis of a matrix
    Columns,
    /// Axis `n` of an array of rank 3 or more
    Dimension(usize),
    /// The rows of a table
    TableRows,
}

impl AxisRole {
    /// The role of `axis` in an array of `rank` dimensions.
    pub fn of_array(rank: usize, axis: usize) -> Self {
        match (rank, axis) {
            (0 | 1, _) => Self::Names,
            (2, 0) => Self::Rows,
            (2, _) => Self::Columns,
            (_, axis) => Self::Dimension(axis),
        }
    }

    /// The name of the label array for this axis of `object`.
    pub fn label_name(self, object: &str) -> String {
        match self {
            Self::Names => format!("{object}_names"),
            Self::Rows => format!("{object}_rownames"),
            Self::Columns => format!("{object}_colnames"),
            Self::Dimension(axis) => format!("{object}_dimnames_{}", axis + 1),
            Self::TableRows => format!(".{object}_rownames"),
        }
    }
}

/// The role of `axis` in an object of type `ty` with `rank` dimensions. Tables only have rows.
fn role_of(ty: &StoreType, rank: usize, axis: usize) -> Option<AxisRole> {
    match ty {
        StoreType::Record(_) if axis == 0 => Some(AxisRole::TableRows),
        StoreType::Record(_) => None,
        StoreType::Scalar(_) => Some(AxisRole::of_array(rank, axis)),
    }
}

/// Delete the label arrays linked to the object at `target` that carry its derived names.
///
/// Nothing is removed for a path that is not an object.
pub(crate) fn remove_labels<C: Container + ?Sized>(
    container: &C,
    target: ObjectPath<'_>,
) -> TesseraResult<()> {
    let stale = {
        let object = match container.open_object(target.parent, target.name) {
            Ok(object) => Scoped::new(container, object),
            Err(TesseraError::NotFound(..)) => return Ok(()),
            Err(err) => return Err(err),
        };
        let ty_handle = Scoped::new(container, container.object_type(object.get())?);
        let ty = container.describe_type(ty_handle.get())?;
        let space = Scoped::new(container, container.object_space(object.get())?);
        let rank = container.space_dims(space.get())?.len();
        let mut stale = Vec::new();
        for axis in 0..rank.max(1) {
            let Some(role) = role_of(&ty, rank, axis) else {
                continue;
            };
            if let Some(label) = container.find_first_label(object.get(), axis)? {
                drop(Scoped::new(container, label));
                stale.push(role.label_name(target.name));
            }
        }
        stale
    };
    for name in stale {
        if container.exists(target.parent, &name)? {
            log::debug!("removing '{}' with '{}'", name, target.name);
            container.delete(target.parent, &name)?;
        }
    }
    Ok(())
}

/// Write `labels` as the label array of `axis` of `object`, which lives at `target`.
///
/// An existing label array of the same name is replaced. Empty label sets are not written.
pub(crate) fn attach_to<C: Container + ?Sized>(
    container: &C,
    target: ObjectPath<'_>,
    object: ObjectHandle,
    axis: usize,
    role: AxisRole,
    labels: &[String],
) -> TesseraResult<()> {
    if labels.is_empty() {
        return Ok(());
    }
    let name = role.label_name(target.name);
    let label_path = target.sibling(&name);
    clear_target(container, label_path, true)?;

    let column = Column::Text(labels.iter().cloned().map(Some).collect());
    let buffer = pack_elements(&column, &ScalarKind::UTF8)?;
    let wire = scalar_type(container, &ScalarKind::UTF8, Realization::Wire)?;
    let mem = scalar_type(container, &ScalarKind::UTF8, Realization::Native)?;
    let space = Scoped::new(container, container.create_array_space(&[labels.len()])?);
    let label = create_and_write(
        container,
        label_path,
        wire.get(),
        mem.get(),
        space.get(),
        &CreateOptions::default(),
        &buffer,
    )?;
    container.mark_label(label.get(), &name)?;
    container.link_label(object, axis, label.get())?;
    log::debug!("attached '{}' to axis {} of '{}'", name, axis, target.name);
    Ok(())
}

/// The labels linked to `axis` of `object`, if they are usable for an axis of `extent`.
///
/// Labels that are not text, do not match `extent` or have a missing entry are logged and read as
/// `None`.
pub(crate) fn read_axis<C: Container + ?Sized>(
    container: &C,
    object: ObjectHandle,
    axis: usize,
    extent: usize,
) -> TesseraResult<Option<Vec<String>>> {
    let Some(label) = container.find_first_label(object, axis)? else {
        return Ok(None);
    };
    let label = Scoped::new(container, label);
    let ty = Scoped::new(container, container.object_type(label.get())?);
    let kind = match container.describe_type(ty.get())? {
        StoreType::Scalar(kind) if kind.is_text() => kind,
        other => {
            log::warn!("ignoring {} labels on axis {}", other, axis);
            return Ok(None);
        }
    };
    let space = Scoped::new(container, container.object_space(label.get())?);
    let count: usize = container.space_dims(space.get())?.iter().product();
    if count != extent {
        log::warn!(
            "ignoring {} labels on axis {} of extent {}",
            count,
            axis,
            extent
        );
        return Ok(None);
    }

    let mem = scalar_type(container, &ScalarKind::UTF8, Realization::Native)?;
    let field = FieldPlan {
        name: Arc::from("labels"),
        wire: kind,
        native: ScalarKind::UTF8,
        target: TargetType::Auto,
    };
    let size = ScalarKind::UTF8.byte_size(Realization::Native);
    let column = read_with(container, label.get(), mem.get(), space.get(), count * size, |buffer| {
        unpack_column(buffer, &field, count, 0, size)
    })?;
    let Column::Text(values) = column else {
        return Ok(None);
    };
    let labels: Option<Vec<String>> = values.into_iter().collect();
    if labels.is_none() {
        log::warn!("ignoring labels with missing entries on axis {}", axis);
    }
    Ok(labels)
}

/// The labels of every axis of an array `object` with `dims`.
pub(crate) fn read_dims<C: Container + ?Sized>(
    container: &C,
    object: ObjectHandle,
    dims: &[usize],
) -> TesseraResult<DimLabels> {
    let per_axis = dims
        .iter()
        .enumerate()
        .map(|(axis, extent)| read_axis(container, object, axis, *extent))
        .collect::<TesseraResult<Vec<_>>>()?;
    if per_axis.iter().all(Option::is_none) {
        return Ok(DimLabels::None);
    }
    Ok(match <[_; 1]>::try_from(per_axis) {
        Ok([Some(names)]) => DimLabels::Names(names),
        Ok([None]) => DimLabels::None,
        Err(per_axis) => DimLabels::PerAxis(per_axis),
    })
}

/// Attach `labels` to `axis` of the table or array at `path`.
///
/// The label array is named after the object and the axis: `{name}_names` for a vector,
/// `{name}_rownames` and `{name}_colnames` for a matrix, `{name}_dimnames_{axis + 1}` for higher
/// ranks and `.{name}_rownames` for the rows of a table. Labels are not checked against the
/// axis extent here; labels of the wrong length are ignored when read back.
pub fn attach_labels<C: Container + ?Sized>(
    container: &C,
    path: &str,
    axis: usize,
    labels: &[String],
) -> TesseraResult<()> {
    let target = ObjectPath::parse(path)?;
    let attach = || -> TesseraResult<()> {
        let object = Scoped::new(container, container.open_object(target.parent, target.name)?);
        let ty = Scoped::new(container, container.object_type(object.get())?);
        let space = Scoped::new(container, container.object_space(object.get())?);
        let rank = container.space_dims(space.get())?.len();
        let role = role_of(&container.describe_type(ty.get())?, rank, axis)
            .ok_or_else(|| tessera_err!("a table only has row labels, not axis {}", axis))?;
        attach_to(container, target, object.get(), axis, role, labels)
    };
    attach().persist_context(path)
}

/// The labels of `axis` of the table or array at `path`, if it has usable ones.
///
/// A label array that is not text, does not match the axis extent or has a missing entry is
/// ignored with a warning, and the axis reads as unlabelled.
pub fn read_labels<C: Container + ?Sized>(
    container: &C,
    path: &str,
    axis: usize,
) -> TesseraResult<Option<Vec<String>>> {
    let target = ObjectPath::parse(path)?;
    let read = || -> TesseraResult<Option<Vec<String>>> {
        let object = Scoped::new(container, container.open_object(target.parent, target.name)?);
        let space = Scoped::new(container, container.object_space(object.get())?);
        let dims = container.space_dims(space.get())?;
        // a scalar has no axes, but a table's rows are its axis 0
        let Some(extent) = dims.get(axis).copied() else {
            return Ok(None);
        };
        read_axis(container, object.get(), axis, extent)
    };
    read().persist_context(path)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tessera_store::{Handle, MemoryContainer};

    use super::*;
    use crate::array::write_array;
    use crate::host::ArrayView;
    use crate::options::WriteOptions;

    #[rstest]
    #[case(1, 0, "v_names")]
    #[case(2, 0, "v_rownames")]
    #[case(2, 1, "v_colnames")]
    #[case(3, 0, "v_dimnames_1")]
    #[case(4, 3, "v_dimnames_4")]
    fn derived_names(#[case] rank: usize, #[case] axis: usize, #[case] expected: &str) {
        assert_eq!(AxisRole::of_array(rank, axis).label_name("v"), expected);
    }

    #[test]
    fn table_rows_are_hidden() {
        assert_eq!(AxisRole::TableRows.label_name("df"), ".df_rownames");
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn vector(store: &MemoryContainer, name: &str, len: usize) {
        let wire = store
            .create_scalar_type(&ScalarKind::FLOAT64, Realization::Wire)
            .unwrap();
        let space = store.create_array_space(&[len]).unwrap();
        let obj = store
            .create_object("/g", name, wire, space, &CreateOptions::default())
            .unwrap();
        for handle in [Handle::from(wire), space.into(), obj.into()] {
            store.release(handle).unwrap();
        }
    }

    #[test]
    fn attach_then_read() {
        let store = MemoryContainer::new();
        vector(&store, "v", 3);
        attach_labels(&store, "g/v", 0, &strings(&["a", "b", "c"])).unwrap();
        assert_eq!(
            store.label_name("/g/v_names").unwrap().as_deref(),
            Some("v_names")
        );
        assert_eq!(
            read_labels(&store, "g/v", 0).unwrap(),
            Some(strings(&["a", "b", "c"]))
        );
        assert_eq!(read_labels(&store, "g/v", 1).unwrap(), None);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn wrong_length_reads_as_none() {
        let store = MemoryContainer::new();
        vector(&store, "v", 3);
        attach_labels(&store, "g/v", 0, &strings(&["a", "b"])).unwrap();
        assert_eq!(read_labels(&store, "g/v", 0).unwrap(), None);
    }

    #[test]
    fn reattaching_replaces() {
        let store = MemoryContainer::new();
        vector(&store, "v", 2);
        attach_labels(&store, "g/v", 0, &strings(&["a", "b"])).unwrap();
        attach_labels(&store, "g/v", 0, &strings(&["x", "y"])).unwrap();
        assert_eq!(read_labels(&store, "g/v", 0).unwrap(), Some(strings(&["x", "y"])));
        assert_eq!(
            store.paths().iter().filter(|p| p.ends_with("_names")).count(),
            1
        );
    }

    #[test]
    fn labels_with_missing_entries_read_as_none() {
        let store = MemoryContainer::new();
        vector(&store, "v", 3);
        let names = ArrayView::vector(Column::Text(vec![Some("a".into()), None, Some("c".into())]));
        write_array(&store, "g/v_names", &names, None, &WriteOptions::default()).unwrap();
        let object = store.open_object("/g", "v").unwrap();
        let label = store.open_object("/g", "v_names").unwrap();
        store.mark_label(label, "v_names").unwrap();
        store.link_label(object, 0, label).unwrap();
        for handle in [Handle::from(object), label.into()] {
            store.release(handle).unwrap();
        }

        assert_eq!(read_labels(&store, "g/v", 0).unwrap(), None);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn removing_follows_links() {
        let store = MemoryContainer::new();
        vector(&store, "v", 2);
        vector(&store, "w", 2);
        attach_labels(&store, "g/v", 0, &strings(&["a", "b"])).unwrap();
        let target = ObjectPath::parse("g/v").unwrap();
        remove_labels(&store, target).unwrap();
        assert!(!store.paths().contains(&"/g/v_names".to_string()));

        // an unlinked array under a derived name belongs to nobody
        vector(&store, "w_names", 2);
        remove_labels(&store, ObjectPath::parse("g/w").unwrap()).unwrap();
        remove_labels(&store, ObjectPath::parse("g/absent").unwrap()).unwrap();
        assert!(store.paths().contains(&"/g/w_names".to_string()));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn empty_labels_are_skipped() {
        let store = MemoryContainer::new();
        vector(&store, "v", 0);
        attach_labels(&store, "g/v", 0, &[]).unwrap();
        assert_eq!(store.paths(), vec!["/g/v".to_string()]);
    }

    #[test]
    fn missing_object_names_the_path() {
        let store = MemoryContainer::new();
        let err = attach_labels(&store, "g/nothing", 0, &strings(&["a"])).unwrap_err();
        assert_eq!(err.path(), Some("g/nothing"));
        assert_eq!(store.open_handles(), 0);
    }
}
