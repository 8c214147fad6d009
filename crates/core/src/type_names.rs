//! Canonical type names
//!
//! Names are short (no module path) and spell out generic arguments
//! recursively: `Vec<Option<Person>>`. A type with generic parameters but
//! no bound arguments is an open definition and shows its parameter names:
//! `HashMap<K, V>`.

use crate::types::{type_of, Reflect, TypeHandle, TypeInfo};

/// Canonical name of a type
pub fn get(info: &TypeInfo) -> String {
    if !info.generic_args().is_empty() {
        let args: Vec<&str> = info.generic_args().iter().map(|arg| of_handle(*arg)).collect();
        return format!("{}<{}>", info.name(), args.join(", "));
    }
    definition(info)
}

/// Name of the type's generic definition, e.g. `Vec<T>` for `Vec<i32>`
pub fn definition(info: &TypeInfo) -> String {
    if info.generic_params().is_empty() {
        info.name().to_string()
    } else {
        format!("{}<{}>", info.name(), info.generic_params().join(", "))
    }
}

/// Cached canonical name of `T`
pub fn of<T: Reflect>() -> &'static str {
    of_handle(TypeHandle::of::<T>())
}

/// Cached canonical name of a registered type
pub fn of_handle(handle: TypeHandle) -> &'static str {
    let info = handle.get();
    info.canonical_name_cell().get_or_init(|| get(info))
}

/// Cached definition name of `T`
pub fn definition_of<T: Reflect>() -> &'static str {
    let info = type_of::<T>();
    info.definition_name_cell().get_or_init(|| definition(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::types::TypeBuilder;

    #[derive(Clone)]
    struct Person;
    struct Student;

    impl Reflect for Person {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<Person>("Person")
        }
    }

    impl Reflect for Student {
        fn describe() -> TypeBuilder<Self> {
            TypeInfo::builder::<Student>("Student")
                .extends::<Person>(|_: &Student| &Person)
        }
    }

    #[test]
    fn test_simple_names() {
        assert_eq!(of::<Person>(), "Person");
        assert_eq!(of::<Student>(), "Student");
        assert_eq!(of::<i32>(), "i32");
        assert_eq!(of::<String>(), "String");
    }

    #[test]
    fn test_closed_generic_names() {
        assert_eq!(of::<Vec<i32>>(), "Vec<i32>");
        assert_eq!(of::<Vec<Option<Person>>>(), "Vec<Option<Person>>");
        assert_eq!(of::<HashMap<String, Vec<u8>>>(), "HashMap<String, Vec<u8>>");
    }

    #[test]
    fn test_definition_names() {
        assert_eq!(definition_of::<Vec<Person>>(), "Vec<T>");
        assert_eq!(definition_of::<Option<i64>>(), "Option<T>");
        assert_eq!(definition_of::<HashMap<u8, u8>>(), "HashMap<K, V>");
        assert_eq!(definition_of::<Person>(), "Person");
    }

    #[test]
    fn test_uncached_and_cached_names_agree() {
        let info = type_of::<Vec<Option<Person>>>();
        assert_eq!(get(info), of::<Vec<Option<Person>>>());
        assert_eq!(definition(info), definition_of::<Vec<Option<Person>>>());
    }
}
