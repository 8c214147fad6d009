//! Error types for member location, accessor compilation and registration
//!
//! Module loading uses `anyhow::Result` so that loader errors reach the
//! caller untouched; everything validated by this crate itself is reported
//! through [`ReflectError`].

use thiserror::Error;

/// Errors raised while locating members, compiling accessors or
/// registering metadata
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReflectError {
    /// A required input was not supplied
    #[error("Required argument '{0}' was not provided")]
    NullArgument(&'static str),

    /// The selector is not a single member access on its parameter
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// Selector source text
        selector: String,
        /// Why the selector was rejected
        reason: String,
    },

    /// The selected member does not exist on the owner or its bases
    #[error("Type '{owner}' has no member named '{member}'")]
    MemberNotFound {
        /// Owner type name
        owner: String,
        /// Requested member name
        member: String,
    },

    /// The requested owner type cannot be used to read the member
    #[error("Member '{member}' was obtained through '{reflected}', which is not assignable from '{owner}'")]
    TypeMismatch {
        /// Member name
        member: String,
        /// Type the descriptor was obtained through
        reflected: String,
        /// Requested owner type
        owner: String,
    },

    /// No conversion exists from the member's value type to the requested one
    #[error("Member '{member}' of type '{from}' cannot be converted to '{to}'")]
    UnsupportedConversion {
        /// Member name
        member: String,
        /// Declared value type
        from: String,
        /// Requested value type
        to: String,
    },

    /// A type was given a second service configuration
    #[error("Type '{0}' already has a service configuration")]
    DuplicateServiceConfiguration(String),
}

/// Result alias for operations validated by this crate
pub type Result<T> = std::result::Result<T, ReflectError>;
