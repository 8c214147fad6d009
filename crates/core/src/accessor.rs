//! Accessor compilation
//!
//! Turns a [`MemberDescriptor`] into a typed, reusable `Owner -> Value`
//! function. The read strategy is chosen once, when the accessor is
//! compiled:
//!
//! - [`AccessStrategy::Direct`]: the member's value type is the requested
//!   type, or derives from it; no conversion is inserted. A derived value
//!   is read as its embedded base instance.
//! - [`AccessStrategy::Converting`]: the typed getter is wrapped in a
//!   boxing conversion to [`Object`] or in a registered widening.
//! - [`AccessStrategy::Reflective`]: the member is access-restricted, so
//!   the read goes through the privileged boxed getter, followed by the
//!   same identity/boxing/widening selection on the boxed value.
//!
//! Every check happens at compile time. A compiled accessor cannot fail.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::conversion::ConversionTable;
use crate::error::{ReflectError, Result};
use crate::member::{BoxedGetter, ErasedGetter, MemberDescriptor, ReadPath, TypedGetter};
use crate::type_names;
use crate::types::{type_of, Object, Reflect, TypeHandle, Upcast};

/// How a compiled accessor reads its member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStrategy {
    /// Read of the member's own value, or of its base instance
    Direct,
    /// Typed read followed by a conversion
    Converting(ConversionKind),
    /// Privileged boxed read for an access-restricted member
    Reflective,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// Boxing into [`Object`]
    Boxing,
    /// A conversion from the compiler's [`ConversionTable`]
    Widening,
}

/// Projection from an owner instance to the member's declaring instance
#[derive(Clone)]
struct Projection {
    steps: Vec<Upcast>,
}

impl Projection {
    fn apply<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        self.steps.iter().try_fold(owner, |current, step| step(current))
    }
}

type ReadFn<O, V> = Arc<dyn Fn(&O) -> Option<V> + Send + Sync>;

/// A compiled member accessor
///
/// Cheap to clone and safe to share between threads.
pub struct Accessor<O, V> {
    member: String,
    strategy: AccessStrategy,
    read: ReadFn<O, V>,
}

impl<O: Reflect, V: Reflect> Accessor<O, V> {
    /// Read the member from `owner`
    pub fn get(&self, owner: &O) -> V {
        match (self.read)(owner) {
            Some(value) => value,
            // Registered metadata always describes its own type, so the
            // projection and downcasts checked at compile time hold here
            None => unreachable!("accessor for '{}' read a value of the wrong type", self.member),
        }
    }

    pub fn strategy(&self) -> AccessStrategy {
        self.strategy
    }

    pub fn member_name(&self) -> &str {
        &self.member
    }

    /// Turn the accessor into a plain closure
    pub fn into_fn(self) -> impl Fn(&O) -> V + Send + Sync + Clone {
        move |owner: &O| self.get(owner)
    }
}

impl<O, V> Clone for Accessor<O, V> {
    fn clone(&self) -> Self {
        Self {
            member: self.member.clone(),
            strategy: self.strategy,
            read: Arc::clone(&self.read),
        }
    }
}

impl<O, V> fmt::Debug for Accessor<O, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("member", &self.member)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Builds accessors, inserting conversions from its table
#[derive(Clone)]
pub struct AccessorCompiler {
    conversions: ConversionTable,
}

impl AccessorCompiler {
    /// Compiler using [`ConversionTable::standard`]
    pub fn new() -> Self {
        Self::with_conversions(ConversionTable::standard())
    }

    pub fn with_conversions(conversions: ConversionTable) -> Self {
        Self { conversions }
    }

    /// Shared compiler with the standard conversions
    pub fn standard() -> &'static AccessorCompiler {
        static STANDARD: OnceLock<AccessorCompiler> = OnceLock::new();
        STANDARD.get_or_init(AccessorCompiler::new)
    }

    pub fn conversions(&self) -> &ConversionTable {
        &self.conversions
    }

    /// Compile an accessor reading `member` from an `O` as a `V`
    ///
    /// # Errors
    ///
    /// - [`ReflectError::TypeMismatch`] if `O` is not the type the member
    ///   was obtained through, or a type derived from it
    /// - [`ReflectError::UnsupportedConversion`] if the member's value type
    ///   cannot be converted to `V`
    pub fn compile<O: Reflect, V: Reflect>(&self, member: &MemberDescriptor) -> Result<Accessor<O, V>> {
        let owner = type_of::<O>();
        let mismatch = || ReflectError::TypeMismatch {
            member: member.name().to_string(),
            reflected: type_names::of_handle(member.reflected_type()).to_string(),
            owner: type_names::get(owner),
        };

        if !owner.is_assignable_to(member.reflected_type().get()) {
            return Err(mismatch());
        }
        let projection = owner
            .upcast_path(member.declaring_type().get())
            .map(|steps| Projection { steps })
            .ok_or_else(mismatch)?;

        let (strategy, read) = match member.read_path() {
            ReadPath::Public { typed, boxed } => self.typed_read::<V>(member, typed, boxed)?,
            ReadPath::Restricted { boxed } => {
                (AccessStrategy::Reflective, self.reflective_read::<V>(member, boxed)?)
            }
        };

        debug!(
            member = member.name(),
            owner = type_names::get(owner),
            value = type_names::of::<V>(),
            ?strategy,
            "compiled accessor"
        );

        let read: ReadFn<O, V> =
            Arc::new(move |owner: &O| projection.apply(owner).and_then(|declaring| read(declaring)));

        Ok(Accessor {
            member: member.name().to_string(),
            strategy,
            read,
        })
    }

    fn typed_read<V: Reflect>(
        &self,
        member: &MemberDescriptor,
        typed: &ErasedGetter,
        boxed: &BoxedGetter,
    ) -> Result<(AccessStrategy, TypedGetter<V>)> {
        if let Some(direct) = typed.downcast_ref::<TypedGetter<V>>() {
            return Ok((AccessStrategy::Direct, Arc::clone(direct)));
        }

        if let Some(boxing) = boxing_read::<V>(member.value_type(), boxed) {
            return Ok((AccessStrategy::Converting(ConversionKind::Boxing), boxing));
        }

        if let Some(upcast) = upcast_read::<V>(member.value_type(), boxed) {
            return Ok((AccessStrategy::Direct, upcast));
        }

        let widened = self
            .conversions
            .find(member.value_type(), TypeHandle::of::<V>())
            .and_then(|conversion| conversion.compose(typed))
            .and_then(|erased| erased.downcast_ref::<TypedGetter<V>>().cloned())
            .ok_or_else(|| unsupported::<V>(member))?;

        Ok((AccessStrategy::Converting(ConversionKind::Widening), widened))
    }

    fn reflective_read<V: Reflect>(
        &self,
        member: &MemberDescriptor,
        boxed: &BoxedGetter,
    ) -> Result<TypedGetter<V>> {
        let read = Arc::clone(boxed);

        if member.value_type() == TypeHandle::of::<V>() {
            return Ok(Arc::new(move |owner: &dyn Any| {
                read(owner)
                    .and_then(|value| value.downcast::<V>().ok())
                    .map(|value| *value)
            }));
        }

        if let Some(boxing) = boxing_read::<V>(member.value_type(), boxed) {
            return Ok(boxing);
        }

        if let Some(upcast) = upcast_read::<V>(member.value_type(), boxed) {
            return Ok(upcast);
        }

        let convert = self
            .conversions
            .find(member.value_type(), TypeHandle::of::<V>())
            .map(|conversion| conversion.boxed())
            .ok_or_else(|| unsupported::<V>(member))?;

        Ok(Arc::new(move |owner: &dyn Any| {
            read(owner)
                .and_then(|value| convert(value))
                .and_then(|value| value.downcast::<V>().ok())
                .map(|value| *value)
        }))
    }
}

impl Default for AccessorCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile an accessor with the shared standard compiler
pub fn compile<O: Reflect, V: Reflect>(member: &MemberDescriptor) -> Result<Accessor<O, V>> {
    AccessorCompiler::standard().compile(member)
}

/// Boxing read into [`Object`], or `None` when `V` is not `Object`
fn boxing_read<V: Reflect>(value_type: TypeHandle, boxed: &BoxedGetter) -> Option<TypedGetter<V>> {
    if TypeId::of::<V>() != TypeId::of::<Object>() {
        return None;
    }

    let read = Arc::clone(boxed);
    let getter: TypedGetter<Object> = Arc::new(move |owner: &dyn Any| {
        read(owner).map(|value| Object::from_boxed(value, value_type))
    });
    let erased: ErasedGetter = Arc::new(getter);
    erased.downcast_ref::<TypedGetter<V>>().cloned()
}

/// Read of a derived value as its base `V`, or `None` when `V` is not a
/// base of `value_type`
fn upcast_read<V: Reflect>(value_type: TypeHandle, boxed: &BoxedGetter) -> Option<TypedGetter<V>> {
    let base = value_type.get().base_value(type_of::<V>())?;
    let read = Arc::clone(boxed);
    Some(Arc::new(move |owner: &dyn Any| {
        let value = read(owner)?;
        base(&*value)?.downcast::<V>().ok().map(|value| *value)
    }))
}

fn unsupported<V: Reflect>(member: &MemberDescriptor) -> ReflectError {
    ReflectError::UnsupportedConversion {
        member: member.name().to_string(),
        from: type_names::of_handle(member.value_type()).to_string(),
        to: type_names::of::<V>().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Lookup;
    use crate::types::{TypeBuilder, TypeInfo};

    #[derive(Clone)]
    struct Sensor {
        reading: i32,
        label: String,
        calibration: u8,
    }

    impl Reflect for Sensor {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<Sensor>("Sensor")
                .field("reading", |s: &Sensor| &s.reading)
                .field("label", |s: &Sensor| &s.label)
                .restricted_field("calibration", |s: &Sensor| &s.calibration)
        }
    }

    fn sensor() -> Sensor {
        Sensor {
            reading: -12,
            label: "north".to_string(),
            calibration: 3,
        }
    }

    fn member(name: &str) -> MemberDescriptor {
        MemberDescriptor::of::<Sensor>(name, Lookup::IncludeRestricted).unwrap()
    }

    #[test]
    fn test_direct_strategy() {
        let accessor = compile::<Sensor, i32>(&member("reading")).unwrap();
        assert_eq!(accessor.strategy(), AccessStrategy::Direct);
        assert_eq!(accessor.get(&sensor()), -12);
        assert_eq!(accessor.member_name(), "reading");
    }

    #[test]
    fn test_widening_strategy() {
        let accessor = compile::<Sensor, i64>(&member("reading")).unwrap();
        assert_eq!(
            accessor.strategy(),
            AccessStrategy::Converting(ConversionKind::Widening)
        );
        assert_eq!(accessor.get(&sensor()), -12i64);
    }

    #[test]
    fn test_boxing_strategy() {
        let accessor = compile::<Sensor, Object>(&member("label")).unwrap();
        assert_eq!(
            accessor.strategy(),
            AccessStrategy::Converting(ConversionKind::Boxing)
        );
        let value = accessor.get(&sensor());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("north"));
        assert_eq!(value.value_type(), TypeHandle::of::<String>());
    }

    #[test]
    fn test_reflective_strategy_with_and_without_conversion() {
        let exact = compile::<Sensor, u8>(&member("calibration")).unwrap();
        assert_eq!(exact.strategy(), AccessStrategy::Reflective);
        assert_eq!(exact.get(&sensor()), 3);

        let widened = compile::<Sensor, u64>(&member("calibration")).unwrap();
        assert_eq!(widened.strategy(), AccessStrategy::Reflective);
        assert_eq!(widened.get(&sensor()), 3u64);

        let boxed = compile::<Sensor, Object>(&member("calibration")).unwrap();
        assert_eq!(boxed.get(&sensor()).downcast_ref::<u8>(), Some(&3));
    }

    #[derive(Clone)]
    struct Reading {
        value: i32,
    }

    #[derive(Clone)]
    struct CalibratedReading {
        reading: Reading,
        offset: i32,
    }

    struct Station {
        latest: CalibratedReading,
        previous: CalibratedReading,
        baseline: Reading,
    }

    impl Reflect for Reading {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<Reading>("Reading").field("value", |r: &Reading| &r.value)
        }
    }

    impl Reflect for CalibratedReading {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<CalibratedReading>("CalibratedReading")
                .extends::<Reading>(|c: &CalibratedReading| &c.reading)
                .field("offset", |c: &CalibratedReading| &c.offset)
        }
    }

    impl Reflect for Station {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<Station>("Station")
                .field("latest", |s: &Station| &s.latest)
                .restricted_field("previous", |s: &Station| &s.previous)
                .field("baseline", |s: &Station| &s.baseline)
        }
    }

    fn station() -> Station {
        let calibrated = |value, offset| CalibratedReading {
            reading: Reading { value },
            offset,
        };
        Station {
            latest: calibrated(40, 2),
            previous: calibrated(38, 1),
            baseline: Reading { value: 35 },
        }
    }

    #[test]
    fn test_derived_value_read_as_base_without_conversion() {
        let latest = MemberDescriptor::of::<Station>("latest", Lookup::Public).unwrap();
        let accessor = compile::<Station, Reading>(&latest).unwrap();
        assert_eq!(accessor.strategy(), AccessStrategy::Direct);
        assert_eq!(accessor.get(&station()).value, 40);

        let exact = compile::<Station, CalibratedReading>(&latest).unwrap();
        assert_eq!(exact.get(&station()).offset, 2);
    }

    #[test]
    fn test_restricted_derived_value_read_as_base() {
        let previous = MemberDescriptor::of::<Station>("previous", Lookup::IncludeRestricted).unwrap();
        let accessor = compile::<Station, Reading>(&previous).unwrap();
        assert_eq!(accessor.strategy(), AccessStrategy::Reflective);
        assert_eq!(accessor.get(&station()).value, 38);
    }

    #[test]
    fn test_base_value_is_not_read_as_derived() {
        let baseline = MemberDescriptor::of::<Station>("baseline", Lookup::Public).unwrap();
        assert_eq!(compile::<Station, Reading>(&baseline).unwrap().get(&station()).value, 35);

        let err = compile::<Station, CalibratedReading>(&baseline).unwrap_err();
        assert_eq!(
            err,
            ReflectError::UnsupportedConversion {
                member: "baseline".to_string(),
                from: "Reading".to_string(),
                to: "CalibratedReading".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_conversion_fails_at_compile_time() {
        let err = compile::<Sensor, i16>(&member("reading")).unwrap_err();
        assert_eq!(
            err,
            ReflectError::UnsupportedConversion {
                member: "reading".to_string(),
                from: "i32".to_string(),
                to: "i16".to_string(),
            }
        );

        let err = compile::<Sensor, String>(&member("calibration")).unwrap_err();
        assert!(matches!(err, ReflectError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_empty_conversion_table_only_allows_identity_and_boxing() {
        let compiler = AccessorCompiler::with_conversions(ConversionTable::new());
        assert!(compiler.compile::<Sensor, i64>(&member("reading")).is_err());
        assert!(compiler.compile::<Sensor, i32>(&member("reading")).is_ok());
        assert!(compiler.compile::<Sensor, Object>(&member("reading")).is_ok());
    }

    #[test]
    fn test_unrelated_owner_is_a_type_mismatch() {
        let err = compile::<String, i32>(&member("reading")).unwrap_err();
        assert_eq!(
            err,
            ReflectError::TypeMismatch {
                member: "reading".to_string(),
                reflected: "Sensor".to_string(),
                owner: "String".to_string(),
            }
        );
    }

    #[test]
    fn test_into_fn_and_clone_agree() {
        let accessor = compile::<Sensor, i32>(&member("reading")).unwrap();
        let copy = accessor.clone();
        let read = accessor.into_fn();
        let value = sensor();
        assert_eq!(read(&value), copy.get(&value));
    }
}
