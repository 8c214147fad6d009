//! Member descriptors
//!
//! A [`MemberDescriptor`] identifies one field or property by the type that
//! physically declares it, together with the type it was obtained through
//! and the read path the declaring type registered for it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReflectError, Result};
use crate::types::{type_of, Reflect, TypeHandle};

/// Typed read from an erased declaring-type instance
pub(crate) type TypedGetter<V> = Arc<dyn Fn(&dyn Any) -> Option<V> + Send + Sync>;

/// Boxed read from an erased declaring-type instance
pub(crate) type BoxedGetter =
    Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// A [`TypedGetter`] with its value type erased
pub(crate) type ErasedGetter = Arc<dyn Any + Send + Sync>;

/// How the declaring type lets a member be read
#[derive(Clone)]
pub(crate) enum ReadPath {
    /// Ordinary typed read, plus a boxed form of the same getter
    Public {
        typed: ErasedGetter,
        boxed: BoxedGetter,
    },
    /// Only the privileged, boxed read is available
    Restricted { boxed: BoxedGetter },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
}

/// Readability of a member from ordinary calling code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Restricted,
}

/// Which members a lookup may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    Public,
    IncludeRestricted,
}

impl Lookup {
    pub(crate) fn admits(self, access: Access) -> bool {
        match self {
            Lookup::Public => access == Access::Public,
            Lookup::IncludeRestricted => true,
        }
    }
}

/// One field or property on a declaring type
#[derive(Clone)]
pub struct MemberDescriptor {
    name: String,
    kind: MemberKind,
    declaring_type: TypeHandle,
    reflected_type: TypeHandle,
    value_type: TypeHandle,
    access: Access,
    read: ReadPath,
}

impl MemberDescriptor {
    /// Look up a member of `T` by name
    ///
    /// This is the explicit construction API; the descriptor is reflected
    /// through `T` even when the member is declared on one of its bases.
    pub fn of<T: Reflect>(name: &str, lookup: Lookup) -> Result<Self> {
        let owner = type_of::<T>();
        owner
            .member(name, lookup)
            .ok_or_else(|| ReflectError::MemberNotFound {
                owner: crate::type_names::get(owner),
                member: name.to_string(),
            })
    }

    pub(crate) fn public<T, V, F>(name: &str, kind: MemberKind, read: F) -> Self
    where
        T: Reflect,
        V: Reflect,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let read = Arc::new(read);
        let typed_read = Arc::clone(&read);
        let typed: TypedGetter<V> =
            Arc::new(move |owner: &dyn Any| owner.downcast_ref::<T>().map(|o| typed_read(o)));

        Self::new::<T, V>(
            name,
            kind,
            Access::Public,
            ReadPath::Public {
                typed: Arc::new(typed),
                boxed: boxed_getter::<T, V, F>(read),
            },
        )
    }

    pub(crate) fn restricted<T, V, F>(name: &str, kind: MemberKind, read: F) -> Self
    where
        T: Reflect,
        V: Reflect,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self::new::<T, V>(
            name,
            kind,
            Access::Restricted,
            ReadPath::Restricted {
                boxed: boxed_getter::<T, V, F>(Arc::new(read)),
            },
        )
    }

    fn new<T: Reflect, V: Reflect>(name: &str, kind: MemberKind, access: Access, read: ReadPath) -> Self {
        Self {
            name: name.to_string(),
            kind,
            declaring_type: TypeHandle::of::<T>(),
            reflected_type: TypeHandle::of::<T>(),
            value_type: TypeHandle::of::<V>(),
            access,
            read,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Type that physically declares the member
    pub fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    /// Type the descriptor was obtained through
    pub fn reflected_type(&self) -> TypeHandle {
        self.reflected_type
    }

    /// Declared type of the member's value
    pub fn value_type(&self) -> TypeHandle {
        self.value_type
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_restricted(&self) -> bool {
        self.access == Access::Restricted
    }

    pub(crate) fn read_path(&self) -> &ReadPath {
        &self.read
    }

    pub(crate) fn reflected_through(mut self, ty: TypeHandle) -> Self {
        self.reflected_type = ty;
        self
    }
}

fn boxed_getter<T, V, F>(read: Arc<F>) -> BoxedGetter
where
    T: Reflect,
    V: Reflect,
    F: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |owner: &dyn Any| {
        owner
            .downcast_ref::<T>()
            .map(|o| Box::new(read(o)) as Box<dyn Any + Send + Sync>)
    })
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("declaring_type", &self.declaring_type)
            .field("reflected_type", &self.reflected_type)
            .field("value_type", &self.value_type)
            .field("access", &self.access)
            .finish()
    }
}
