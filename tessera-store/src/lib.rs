//! The storage collaborator Tessera marshals into.
//!
//! [`Container`] is the minimal object-store surface the marshalling core speaks: typed handles,
//! array spaces, objects addressed by `(parent, name)`, buffer I/O in a caller-described native
//! layout, and axis-label links. [`MemoryContainer`] is a complete in-process implementation that
//! keeps every object in its portable wire layout.

pub use buffer::*;
pub use container::*;
pub use handle::*;
pub use memory::*;

mod buffer;
mod container;
mod handle;
mod memory;
