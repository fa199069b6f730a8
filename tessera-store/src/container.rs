use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use tessera_dtype::{Realization, ScalarKind};
use tessera_error::TesseraResult;

use crate::{Handle, NativeBuffer, ObjectHandle, SpaceHandle, TypeHandle};

/// One member of a record type as the container sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    /// Member name
    pub name: Arc<str>,
    /// Byte offset inside the record
    pub offset: usize,
    /// Member kind
    pub kind: ScalarKind,
}

/// A record type as the container sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    /// Total byte size of one record
    pub size: usize,
    /// Members in insertion order
    pub members: Vec<MemberDescriptor>,
}

impl RecordDescriptor {
    /// The member called `name`.
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name.as_ref() == name)
    }
}

/// The description of a type handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreType {
    /// A single scalar
    Scalar(ScalarKind),
    /// A record of named scalars
    Record(RecordDescriptor),
}

impl StoreType {
    /// The scalar kind, if this is a scalar type.
    pub fn as_scalar(&self) -> Option<&ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(kind),
            Self::Record(_) => None,
        }
    }

    /// The record descriptor, if this is a record type.
    pub fn as_record(&self) -> Option<&RecordDescriptor> {
        match self {
            Self::Scalar(_) => None,
            Self::Record(record) => Some(record),
        }
    }
}

impl Display for StoreType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Record(record) => write!(
                f,
                "record[{}]",
                record
                    .members
                    .iter()
                    .map(|m| format!("{}@{}: {}", m.name, m.offset, m.kind))
                    .join(", ")
            ),
        }
    }
}

/// Storage settings fixed when an object is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Chunk extents, one per axis, when the object is chunked
    pub chunk_dims: Option<Vec<usize>>,
    /// Deflate level, 0 for none
    pub deflate_level: u8,
    /// Whether a byte shuffle precedes compression
    pub shuffle: bool,
}

/// The object store the marshalling core reads from and writes to.
///
/// Objects are addressed by a `parent` group path and a `name` inside it. Every handle returned
/// by a container must be given back through [`Container::release`].
pub trait Container {
    /// Create a scalar type in the given realization.
    fn create_scalar_type(
        &self,
        kind: &ScalarKind,
        realization: Realization,
    ) -> TesseraResult<TypeHandle>;

    /// Create an empty record type of `size` bytes.
    fn create_record_type(&self, size: usize, realization: Realization)
    -> TesseraResult<TypeHandle>;

    /// Add a scalar member to a record type at `offset`.
    fn insert_member(
        &self,
        record: TypeHandle,
        name: &str,
        offset: usize,
        member: TypeHandle,
    ) -> TesseraResult<()>;

    /// Create a space with the given dimensions. No dimensions describes a scalar.
    fn create_array_space(&self, dims: &[usize]) -> TesseraResult<SpaceHandle>;

    /// Create a new object. The type must be a wire type.
    fn create_object(
        &self,
        parent: &str,
        name: &str,
        ty: TypeHandle,
        space: SpaceHandle,
        options: &CreateOptions,
    ) -> TesseraResult<ObjectHandle>;

    /// Open an existing object.
    fn open_object(&self, parent: &str, name: &str) -> TesseraResult<ObjectHandle>;

    /// A new handle to the object's wire type.
    fn object_type(&self, object: ObjectHandle) -> TesseraResult<TypeHandle>;

    /// A new handle to the object's space.
    fn object_space(&self, object: ObjectHandle) -> TesseraResult<SpaceHandle>;

    /// Describe a type handle.
    fn describe_type(&self, ty: TypeHandle) -> TesseraResult<StoreType>;

    /// The dimensions of a space.
    fn space_dims(&self, space: SpaceHandle) -> TesseraResult<Vec<usize>>;

    /// Read the whole object into `buffer`, converted to the native `mem_type`.
    fn read(
        &self,
        object: ObjectHandle,
        mem_type: TypeHandle,
        buffer: &mut NativeBuffer,
    ) -> TesseraResult<()>;

    /// Replace the object's contents with `buffer`, converted from the native `mem_type`.
    fn write(
        &self,
        object: ObjectHandle,
        mem_type: TypeHandle,
        buffer: &NativeBuffer,
    ) -> TesseraResult<()>;

    /// Mark an object as a label array with a display name.
    fn mark_label(&self, object: ObjectHandle, name: &str) -> TesseraResult<()>;

    /// Link a label array to one axis of `parent`.
    fn link_label(&self, parent: ObjectHandle, axis: usize, label: ObjectHandle)
    -> TesseraResult<()>;

    /// The first label array linked to `axis` of `parent`, opened.
    fn find_first_label(
        &self,
        parent: ObjectHandle,
        axis: usize,
    ) -> TesseraResult<Option<ObjectHandle>>;

    /// Release the variable-length storage a read placed in `buffer`.
    fn reclaim_variable_length(
        &self,
        ty: TypeHandle,
        space: SpaceHandle,
        buffer: &mut NativeBuffer,
    ) -> TesseraResult<()>;

    /// Whether `name` exists inside `parent`.
    fn exists(&self, parent: &str, name: &str) -> TesseraResult<bool>;

    /// Delete `name` from `parent`.
    fn delete(&self, parent: &str, name: &str) -> TesseraResult<()>;

    /// Give back a handle.
    fn release(&self, handle: Handle) -> TesseraResult<()>;
}
