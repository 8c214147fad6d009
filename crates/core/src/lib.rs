//! reflect-kit core library
//!
//! Two independent pieces of runtime-metadata tooling:
//!
//! - Member accessors: a selector such as `|p: Person| p.first_name` is
//!   turned into a [`MemberDescriptor`] with [`locate`], and the descriptor
//!   is compiled once into a reusable [`Accessor`] whose strategy (direct,
//!   converting or reflective) is chosen at compile time.
//! - Reference closure loading: [`load_referenced_modules`] loads every
//!   module transitively referenced by a root module exactly once, through
//!   a caller-supplied [`ModuleLoader`].

pub mod accessor;
pub mod conversion;
pub mod discovery;
pub mod error;
pub mod expression;
pub mod graph;
pub mod loader;
pub mod locate;
pub mod manifest;
pub mod member;
pub mod module;
pub mod services;
pub mod type_names;
pub mod types;

// Re-export commonly used types
pub use accessor::{compile, AccessStrategy, Accessor, AccessorCompiler, ConversionKind};
pub use conversion::{Conversion, ConversionTable};
pub use error::{ReflectError, Result};
pub use expression::{Expr, Lambda, Selector};
pub use graph::{GraphSnapshot, ModuleGraph, NodeState, ReferenceKind};
pub use loader::{load_referenced_modules, LoadOptions};
pub use locate::locate;
pub use manifest::{ManifestLoader, ModuleManifest};
pub use member::{Access, Lookup, MemberDescriptor, MemberKind};
pub use module::{Module, ModuleIdentity, ModuleLoader};
pub use services::{ServiceConfiguration, ServiceLifetime, ServiceRegistry};
pub use types::{type_of, Object, Reflect, TypeBuilder, TypeHandle, TypeInfo};
