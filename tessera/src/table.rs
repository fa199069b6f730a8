//! Writing and reading tables as one-dimensional arrays of records.

use tessera_error::{PersistContext, TesseraResult, tessera_err};
use tessera_store::{Container, StoreType};

use crate::handle::{Scoped, record_type};
use crate::host::Table;
use crate::labels::{AxisRole, attach_to, read_axis};
use crate::object::{ObjectPath, clear_target, create_and_write, read_with};
use crate::options::WriteOptions;
use crate::record::{ColumnTypes, pack_rows, plan_read, plan_write, unpack_rows};
use crate::resolve::TypePolicy;

/// Write `table` to `path` as one record per row.
///
/// Columns are stored as `types` names them, or as [`crate::record::default_type_name`] picks.
/// Row labels, if the table has any, are attached to the row axis. The record type is planned
/// and the rows are packed before the container is touched, so type and allocation errors leave
/// the container unchanged. A failed write removes the partially written object.
pub fn write_table<C: Container + ?Sized>(
    container: &C,
    path: &str,
    table: &Table,
    types: &ColumnTypes,
    options: &WriteOptions,
) -> TesseraResult<()> {
    let target = ObjectPath::parse(path)?;
    if table.names().is_empty() {
        log::warn!("'{}' has no columns, nothing written", path);
        return Ok(());
    }
    let (plan, staged) = plan_write(table, types)?;
    let n_rows = table.n_rows();
    let buffer = pack_rows(&staged, plan.native(), n_rows)?;
    drop(staged);
    let wire_layout = plan.wire()?;
    log::debug!(
        "writing {} rows of {} fields to '{}'",
        n_rows,
        plan.fields().len(),
        path
    );

    let persist = || -> TesseraResult<()> {
        let wire = record_type(container, &wire_layout)?;
        let mem = record_type(container, plan.native())?;
        let space = Scoped::new(container, container.create_array_space(&[n_rows])?);
        clear_target(container, target, options.overwrite)?;
        let object = create_and_write(
            container,
            target,
            wire.get(),
            mem.get(),
            space.get(),
            &options.create_options(&[n_rows], wire_layout.size()),
            &buffer,
        )?;
        if let Some(labels) = table.row_labels() {
            attach_to(container, target, object.get(), 0, AxisRole::TableRows, labels)?;
        }
        Ok(())
    };
    persist().persist_context(path)
}

/// Read the table at `path`, resolving every numeric field through `policy`.
///
/// Fields the policy drops are left out of the result. Row labels are restored when a usable
/// label array is linked to the row axis.
pub fn read_table<C: Container + ?Sized>(
    container: &C,
    path: &str,
    policy: &TypePolicy,
) -> TesseraResult<Table> {
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
    let record = match container.describe_type(ty.get()).persist_context(path)? {
        StoreType::Record(record) => record,
        StoreType::Scalar(kind) => {
            return Err(tessera_err!("'{}' holds {} values, not a table", path, kind));
        }
    };
    let plan = plan_read(&record, policy)?;
    log::debug!(
        "reading {} of {} fields from '{}'",
        plan.fields().len(),
        record.members.len(),
        path
    );

    let columns = {
        let space = Scoped::new(
            container,
            container.object_space(object.get()).persist_context(path)?,
        );
        let n_rows: usize = container
            .space_dims(space.get())
            .persist_context(path)?
            .iter()
            .product();
        let mem = record_type(container, plan.native()).persist_context(path)?;
        let size = plan.native().size();
        let len = n_rows
            .checked_mul(size)
            .ok_or_else(|| tessera_err!(OutOfMemory: "{} rows of {} bytes", n_rows, size))?;
        read_with(container, object.get(), mem.get(), space.get(), len, |buffer| {
            unpack_rows(buffer, &plan, n_rows)
        })
        .persist_context(path)?
    };

    let names: Vec<&str> = plan.fields().iter().map(|f| f.name.as_ref()).collect();
    let table = Table::try_new(names, columns)?;
    if table.names().is_empty() {
        return Ok(table);
    }
    match read_axis(container, object.get(), 0, table.n_rows()).persist_context(path)? {
        Some(labels) => table.with_row_labels(labels),
        None => Ok(table),
    }
}
