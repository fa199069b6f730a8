//! Tessera moves a dynamically typed host's data in and out of a hierarchical container.
//!
//! Tables become one-dimensional arrays of records, one field per column, and N-dimensional
//! arrays are stored with their axes reordered into the container's convention. On the way back a
//! [`TypePolicy`] decides, field by field, which host representation numeric values are read into.
//! Axis labels are stored as text arrays linked to the axis they label.
//!
//! Everything goes through a [`tessera_store::Container`]; [`tessera_store::MemoryContainer`]
//! implements one in memory.
//!
//! ```
//! use tessera::{Column, ColumnTypes, Table, TypePolicy, WriteOptions, read_table, write_table};
//! use tessera_store::MemoryContainer;
//!
//! let store = MemoryContainer::new();
//! let table = Table::try_new(
//!     ["id", "score"],
//!     vec![Column::Integer(vec![1, 2]), Column::Double(vec![0.5, 1.5])],
//! )?;
//! write_table(&store, "/runs", &table, &ColumnTypes::new(), &WriteOptions::default())?;
//! assert_eq!(read_table(&store, "/runs", &TypePolicy::new())?, table);
//! # Ok::<(), tessera_error::TesseraError>(())
//! ```

pub use array::*;
pub use host::*;
pub use labels::{AxisRole, attach_labels, read_labels};
pub use options::*;
pub use record::{ColumnTypes, FieldPlan, RecordPlan, default_type_name};
pub use resolve::*;
pub use table::*;
pub use transpose::*;

mod array;
mod handle;
mod host;
mod labels;
mod object;
mod options;
mod record;
mod resolve;
mod table;
mod transpose;
