//! Runtime type metadata
//!
//! Rust carries no reflection data at runtime, so types that take part in
//! member location and accessor compilation describe themselves through the
//! [`Reflect`] trait. Descriptions are built once per type with a
//! [`TypeBuilder`], registered in a process-wide table keyed by
//! [`TypeId`], and handed out as `&'static TypeInfo`.
//!
//! Single inheritance is modelled explicitly: a derived type names its base
//! and a projection from a derived instance to the embedded base instance.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::member::{BoxedGetter, Lookup, MemberDescriptor, MemberKind};

/// A type that can describe its own metadata
pub trait Reflect: Any + Send + Sync {
    /// Describe this type
    ///
    /// Called at most once per type; use [`type_of`] to obtain the
    /// registered description. The builder is tied to `Self`, so a type
    /// can only ever register metadata for itself.
    fn describe() -> TypeBuilder<Self>
    where
        Self: Sized;
}

/// Projection from a derived instance to its embedded base instance
pub(crate) type Upcast = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

static REGISTRY: OnceLock<RwLock<HashMap<TypeId, &'static TypeInfo>>> = OnceLock::new();

/// Get the registered metadata for `T`, describing it on first use
pub fn type_of<T: Reflect>() -> &'static TypeInfo {
    let registry = REGISTRY.get_or_init(Default::default);
    let id = TypeId::of::<T>();

    let cached = registry.read().get(&id).copied();
    if let Some(info) = cached {
        return info;
    }

    // Describe outside the lock; descriptions may resolve other types
    let described = T::describe().build();
    *registry
        .write()
        .entry(id)
        .or_insert_with(|| Box::leak(Box::new(described)))
}

/// Cheap, copyable reference to a registered type
///
/// Resolution is lazy, which lets a type refer to itself (or to types
/// that are not registered yet) while it is being described.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    resolve: fn() -> &'static TypeInfo,
}

impl TypeHandle {
    /// Handle for `T`
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            resolve: type_of::<T>,
        }
    }

    /// Resolve the handle to its metadata
    pub fn get(&self) -> &'static TypeInfo {
        (self.resolve)()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short name of the referenced type
    pub fn name(&self) -> &'static str {
        self.get().name()
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::type_names::of_handle(*self))
    }
}

/// Owned copy of a base instance, taken from a reference to it
type CloneBase = fn(&dyn Any) -> Option<Box<dyn Any + Send + Sync>>;

fn clone_any<B: Any + Clone + Send + Sync>(value: &dyn Any) -> Option<Box<dyn Any + Send + Sync>> {
    value
        .downcast_ref::<B>()
        .map(|base| Box::new(base.clone()) as Box<dyn Any + Send + Sync>)
}

/// Link from a derived type to its base type
#[derive(Clone)]
pub(crate) struct BaseLink {
    pub(crate) ty: TypeHandle,
    pub(crate) upcast: Upcast,
    clone_base: CloneBase,
}

/// Metadata describing one type
pub struct TypeInfo {
    name: String,
    handle: TypeHandle,
    generic_params: Vec<String>,
    generic_args: Vec<TypeHandle>,
    base: Option<BaseLink>,
    members: Vec<MemberDescriptor>,
    canonical_name: OnceLock<String>,
    definition_name: OnceLock<String>,
}

impl TypeInfo {
    /// Start describing `T` under the given short name
    pub fn builder<T: Reflect>(name: impl Into<String>) -> TypeBuilder<T> {
        TypeBuilder {
            info: TypeInfo {
                name: name.into(),
                handle: TypeHandle::of::<T>(),
                generic_params: Vec::new(),
                generic_args: Vec::new(),
                base: None,
                members: Vec::new(),
                canonical_name: OnceLock::new(),
                definition_name: OnceLock::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Short name without generic arguments (e.g. `Vec`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> TypeId {
        self.handle.id()
    }

    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    /// Names of the generic parameters of the type's definition
    pub fn generic_params(&self) -> &[String] {
        &self.generic_params
    }

    /// Bound generic arguments, empty for non-generic types
    pub fn generic_args(&self) -> &[TypeHandle] {
        &self.generic_args
    }

    /// Direct base type, if any
    pub fn base(&self) -> Option<TypeHandle> {
        self.base.as_ref().map(|link| link.ty)
    }

    /// This type followed by its base chain, nearest base first
    pub fn lineage(&self) -> impl Iterator<Item = &TypeInfo> + '_ {
        std::iter::successors(Some(self), |info| info.base().map(|b| b.get()))
    }

    /// Iterate over the base chain, nearest base first
    pub fn bases(&self) -> impl Iterator<Item = &TypeInfo> + '_ {
        self.lineage().skip(1)
    }

    /// Members physically declared on this type
    pub fn declared_members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Whether a value of this type can be used where `target` is expected
    ///
    /// True for the type itself and for every type on its base chain.
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        self.lineage().any(|ty| ty.id() == target.id())
    }

    /// Find a member on this type or its bases
    ///
    /// The returned descriptor is reflected through this type: it keeps the
    /// physical declaring type but remembers that it was obtained here.
    pub fn member(&self, name: &str, lookup: Lookup) -> Option<MemberDescriptor> {
        self.lineage()
            .flat_map(|info| info.members.iter())
            .find(|member| member.name() == name && lookup.admits(member.access()))
            .map(|member| member.clone().reflected_through(self.handle))
    }

    /// Chain of projections from an instance of this type to an instance of
    /// `target`, or `None` when `target` is not on the base chain
    pub(crate) fn upcast_path(&self, target: &TypeInfo) -> Option<Vec<Upcast>> {
        let mut path = Vec::new();
        let mut current = self;
        loop {
            if current.id() == target.id() {
                return Some(path);
            }
            let link = current.base.as_ref()?;
            path.push(Arc::clone(&link.upcast));
            current = link.ty.get();
        }
    }

    /// Read an owned `target` out of an instance of this type
    ///
    /// Projects to the embedded base instance and clones it. `None` when
    /// `target` is this type itself or not one of its bases.
    pub(crate) fn base_value(&self, target: &TypeInfo) -> Option<BoxedGetter> {
        let clone_base = self
            .lineage()
            .filter_map(|info| info.base.as_ref())
            .find(|link| link.ty.id() == target.id())?
            .clone_base;
        let steps = self.upcast_path(target)?;

        Some(Arc::new(move |value: &dyn Any| {
            let base = steps.iter().try_fold(value, |current, step| step(current))?;
            clone_base(base)
        }))
    }

    pub(crate) fn canonical_name_cell(&self) -> &OnceLock<String> {
        &self.canonical_name
    }

    pub(crate) fn definition_name_cell(&self) -> &OnceLock<String> {
        &self.definition_name
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("generic_params", &self.generic_params)
            .field("generic_args", &self.generic_args)
            .field("base", &self.base())
            .field("members", &self.members)
            .finish()
    }
}

/// Constrain a closure to the higher-ranked upcast signature
fn upcast_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any>,
{
    f
}

/// Builder for [`TypeInfo`]
pub struct TypeBuilder<T> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> TypeBuilder<T> {
    /// Declare `B` as the base type, reachable through `upcast`
    ///
    /// `B` must be `Clone` so that a `T` value can be read as an owned `B`.
    pub fn extends<B: Reflect + Clone>(mut self, upcast: fn(&T) -> &B) -> Self {
        let project = upcast_fn(move |value: &dyn Any| {
            value.downcast_ref::<T>().map(|derived| upcast(derived) as &dyn Any)
        });
        self.info.base = Some(BaseLink {
            ty: TypeHandle::of::<B>(),
            upcast: Arc::new(project),
            clone_base: clone_any::<B>,
        });
        self
    }

    /// Add a generic parameter name to the type's definition
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.info.generic_params.push(name.into());
        self
    }

    /// Add a bound generic argument
    pub fn generic_arg<A: Reflect>(mut self) -> Self {
        self.info.generic_args.push(TypeHandle::of::<A>());
        self
    }

    /// Declare a publicly readable field
    pub fn field<V: Reflect + Clone>(self, name: &str, read: fn(&T) -> &V) -> Self {
        self.push(MemberDescriptor::public::<T, V, _>(
            name,
            MemberKind::Field,
            move |owner: &T| read(owner).clone(),
        ))
    }

    /// Declare a publicly readable computed property
    pub fn property<V, F>(self, name: &str, read: F) -> Self
    where
        V: Reflect,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push(MemberDescriptor::public::<T, V, _>(name, MemberKind::Property, read))
    }

    /// Declare a field that can only be read through the privileged path
    pub fn restricted_field<V: Reflect + Clone>(self, name: &str, read: fn(&T) -> &V) -> Self {
        self.push(MemberDescriptor::restricted::<T, V, _>(
            name,
            MemberKind::Field,
            move |owner: &T| read(owner).clone(),
        ))
    }

    /// Declare a property that can only be read through the privileged path
    pub fn restricted_property<V, F>(self, name: &str, read: F) -> Self
    where
        V: Reflect,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push(MemberDescriptor::restricted::<T, V, _>(
            name,
            MemberKind::Property,
            read,
        ))
    }

    pub(crate) fn build(self) -> TypeInfo {
        self.info
    }

    fn push(mut self, member: MemberDescriptor) -> Self {
        self.info.members.push(member);
        self
    }
}

/// Universal boxed supertype
///
/// Every reflected value converts to `Object` by boxing; the original value
/// is recovered with [`Object::downcast_ref`].
#[derive(Clone)]
pub struct Object {
    value: Arc<dyn Any + Send + Sync>,
    ty: TypeHandle,
}

impl Object {
    pub fn new<T: Reflect>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            ty: TypeHandle::of::<T>(),
        }
    }

    pub(crate) fn from_boxed(value: Box<dyn Any + Send + Sync>, ty: TypeHandle) -> Self {
        Self {
            value: Arc::from(value),
            ty,
        }
    }

    /// Type of the boxed value
    pub fn value_type(&self) -> TypeHandle {
        self.ty
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:?})", self.ty)
    }
}

impl Reflect for Object {
    fn describe() -> TypeBuilder<Self> {
        TypeInfo::builder::<Object>("Object")
    }
}

macro_rules! reflect_primitives {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn describe() -> TypeBuilder<Self> {
                    TypeInfo::builder::<$ty>($name)
                }
            }
        )*
    };
}

reflect_primitives!(
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    isize => "isize",
    f32 => "f32",
    f64 => "f64",
    String => "String",
);

impl<T: Reflect> Reflect for Vec<T> {
    fn describe() -> TypeBuilder<Self> {
        TypeInfo::builder::<Self>("Vec")
            .generic_param("T")
            .generic_arg::<T>()
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn describe() -> TypeBuilder<Self> {
        TypeInfo::builder::<Self>("Option")
            .generic_param("T")
            .generic_arg::<T>()
    }
}

impl<K: Reflect, V: Reflect> Reflect for HashMap<K, V> {
    fn describe() -> TypeBuilder<Self> {
        TypeInfo::builder::<Self>("HashMap")
            .generic_param("K")
            .generic_param("V")
            .generic_arg::<K>()
            .generic_arg::<V>()
    }
}
