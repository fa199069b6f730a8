use std::fmt::{Display, Formatter};

/// A type created by or obtained from a [`Container`](crate::Container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub u64);

/// The shape of an object: its dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceHandle(pub u64);

/// An open object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Any handle a container hands out; every one must eventually be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// A type handle
    Type(TypeHandle),
    /// A space handle
    Space(SpaceHandle),
    /// An object handle
    Object(ObjectHandle),
}

impl From<TypeHandle> for Handle {
    fn from(value: TypeHandle) -> Self {
        Self::Type(value)
    }
}

impl From<SpaceHandle> for Handle {
    fn from(value: SpaceHandle) -> Self {
        Self::Space(value)
    }
}

impl From<ObjectHandle> for Handle {
    fn from(value: ObjectHandle) -> Self {
        Self::Object(value)
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type(h) => write!(f, "type#{}", h.0),
            Self::Space(h) => write!(f, "space#{}", h.0),
            Self::Object(h) => write!(f, "object#{}", h.0),
        }
    }
}
