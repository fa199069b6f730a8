#![deny(missing_docs)]

//! A type system for Tessera
//!
//! This crate describes what a value *is* at the storage boundary: the closed set of scalar
//! kinds, the record (row) types built from them, and the two byte layouts every record type
//! can be realized in.

pub use field::*;
pub use kind::*;
pub use layout::*;
pub use type_name::*;

mod field;
mod kind;
mod layout;
mod type_name;
