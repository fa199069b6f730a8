use std::sync::Arc;

use crate::{RecordType, ScalarKind};

/// Which byte layout a type describes.
///
/// The wire realization is what is persisted: little-endian, variable-length text stored as a
/// reference into the container. The native realization is what the host process reads and
/// writes: host-endian, variable-length text stored as an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Realization {
    /// As persisted
    Wire,
    /// As seen by the host process
    Native,
}

/// The placement of one member inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLayout {
    /// Member name
    pub name: Arc<str>,
    /// Member kind
    pub kind: ScalarKind,
    /// Byte offset from the start of the record
    pub offset: usize,
    /// Byte size of the member
    pub size: usize,
}

/// A record type placed into bytes: members at running offsets with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    realization: Realization,
    members: Vec<MemberLayout>,
    size: usize,
}

impl RecordLayout {
    /// Lay out the record in declaration order.
    pub fn new(record: &RecordType, realization: Realization) -> Self {
        let mut offset = 0;
        let members = record
            .fields()
            .iter()
            .map(|field| {
                let size = field.kind().byte_size(realization);
                let member = MemberLayout {
                    name: field.name().into(),
                    kind: field.kind().clone(),
                    offset,
                    size,
                };
                offset += size;
                member
            })
            .collect();
        Self {
            realization,
            members,
            size: offset,
        }
    }

    /// The realization this layout describes.
    pub fn realization(&self) -> Realization {
        self.realization
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[MemberLayout] {
        &self.members
    }

    /// Byte size of one record.
    pub fn size(&self) -> usize {
        self.size
    }
}
