//! Row-wise marshalling between tables and record buffers.
//!
//! A write first plans the record type from the table's columns, then packs the columns into a
//! native buffer. Both steps finish before the container is touched. A read plans the native
//! record from the stored one and unpacks the buffer the container filled.

pub use build::{FieldPlan, RecordPlan};
pub use types::{ColumnTypes, default_type_name};

pub(crate) use build::{plan_read, plan_write, plan_write_field, read_native};
pub(crate) use pack::{pack_elements, pack_rows};
pub(crate) use unpack::{unpack_column, unpack_rows};

mod build;
mod pack;
mod types;
mod unpack;
