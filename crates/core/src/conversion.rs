//! Value conversions applied by compiled accessors
//!
//! A [`Conversion`] turns a member's declared value type into the value
//! type an accessor was requested with. Each conversion is usable on both
//! read paths: composed onto a typed getter for ordinary members, or
//! applied to a boxed value for restricted members.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::member::{ErasedGetter, TypedGetter};
use crate::types::{Reflect, TypeHandle};

type Compose = Arc<dyn Fn(&ErasedGetter) -> Option<ErasedGetter> + Send + Sync>;
type ApplyBoxed =
    Arc<dyn Fn(Box<dyn Any + Send + Sync>) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// A conversion from one reflected type to another
#[derive(Clone)]
pub struct Conversion {
    from: TypeHandle,
    to: TypeHandle,
    compose: Compose,
    apply: ApplyBoxed,
}

impl Conversion {
    /// Conversion through an arbitrary function
    pub fn new<S: Reflect, D: Reflect>(convert: fn(S) -> D) -> Self {
        let compose: Compose = Arc::new(move |erased: &ErasedGetter| {
            let source = erased.downcast_ref::<TypedGetter<S>>()?.clone();
            let target: TypedGetter<D> = Arc::new(move |owner: &dyn Any| source(owner).map(convert));
            Some(Arc::new(target) as ErasedGetter)
        });

        let apply: ApplyBoxed = Arc::new(move |value: Box<dyn Any + Send + Sync>| {
            value
                .downcast::<S>()
                .ok()
                .map(|source| Box::new(convert(*source)) as Box<dyn Any + Send + Sync>)
        });

        Self {
            from: TypeHandle::of::<S>(),
            to: TypeHandle::of::<D>(),
            compose,
            apply,
        }
    }

    /// Lossless conversion provided by `From`
    pub fn widening<S: Reflect, D: Reflect + From<S>>() -> Self {
        Self::new::<S, D>(D::from)
    }

    pub fn from_type(&self) -> TypeHandle {
        self.from
    }

    pub fn to_type(&self) -> TypeHandle {
        self.to
    }

    /// Wrap a typed getter for the source type into one for the target type
    pub(crate) fn compose(&self, getter: &ErasedGetter) -> Option<ErasedGetter> {
        (self.compose)(getter)
    }

    /// Boxed form of the conversion, for the privileged read path
    pub(crate) fn boxed(&self) -> ApplyBoxed {
        Arc::clone(&self.apply)
    }
}

/// Set of conversions an accessor compiler may insert
#[derive(Clone, Default)]
pub struct ConversionTable {
    conversions: HashMap<(TypeId, TypeId), Conversion>,
}

macro_rules! widenings {
    ($table:ident; $($from:ty => [$($to:ty),+]);+ $(;)?) => {
        $($( $table.register_widening::<$from, $to>(); )+)+
    };
}

impl ConversionTable {
    /// Empty table: only identity reads and boxing to `Object` compile
    pub fn new() -> Self {
        Self::default()
    }

    /// Lossless numeric widenings and `char` promotions
    pub fn standard() -> Self {
        let mut table = Self::new();
        widenings!(table;
            i8 => [i16, i32, i64, f32, f64];
            u8 => [u16, u32, u64, i16, i32, i64, f32, f64];
            i16 => [i32, i64, f32, f64];
            u16 => [u32, u64, i32, i64, f32, f64];
            i32 => [i64, f64];
            u32 => [u64, i64, f64];
            f32 => [f64];
            char => [u32, u64, String];
        );
        table
    }

    /// Add or replace a conversion
    pub fn register<S: Reflect, D: Reflect>(&mut self, convert: fn(S) -> D) -> &mut Self {
        self.insert(Conversion::new::<S, D>(convert))
    }

    pub fn register_widening<S: Reflect, D: Reflect + From<S>>(&mut self) -> &mut Self {
        self.insert(Conversion::widening::<S, D>())
    }

    pub fn insert(&mut self, conversion: Conversion) -> &mut Self {
        let key = (conversion.from.id(), conversion.to.id());
        self.conversions.insert(key, conversion);
        self
    }

    pub fn find(&self, from: TypeHandle, to: TypeHandle) -> Option<&Conversion> {
        self.conversions.get(&(from.id(), to.id()))
    }

    pub fn contains(&self, from: TypeHandle, to: TypeHandle) -> bool {
        self.find(from, to).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }
}
