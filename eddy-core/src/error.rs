//! Configuration-validation faults.
//!
//! These are raised eagerly at registration time, never deferred to the
//! serialization path.

use core::fmt::{self, Display};

/// Error raised while building type metadata or mutating sealed options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The specific kind of configuration fault.
    pub kind: ConfigErrorKind,
}

impl ConfigError {
    /// Create a new configuration error.
    pub const fn new(kind: ConfigErrorKind) -> Self {
        ConfigError { kind }
    }
}

/// Specific configuration fault kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A type with this name is already registered.
    DuplicateTypeName {
        /// The conflicting name.
        name: String,
    },
    /// A known type was registered twice under the same base.
    DuplicateKnownType {
        /// The polymorphic base type.
        base: String,
        /// The known type registered more than once.
        known: String,
    },
    /// Two known types share a discriminator id.
    DuplicateDiscriminatorId {
        /// The polymorphic base type.
        base: String,
        /// The duplicated discriminator id.
        id: String,
    },
    /// A known type is not a strict, assignable descendant of its base.
    NotASubtype {
        /// The polymorphic base type.
        base: String,
        /// The offending known type.
        known: String,
    },
    /// A discriminator property name was configured but the known type
    /// carries no id (or the reverse).
    DiscriminatorIdMismatch {
        /// The polymorphic base type.
        base: String,
        /// The known type whose id configuration is inconsistent.
        known: String,
    },
    /// Polymorphism was attached to a type that already has a resolver.
    AlreadyPolymorphic {
        /// The base type.
        base: String,
    },
    /// The tag does not name an object type, or the operation requires a
    /// concrete (non-abstract, non-interface) object type.
    NotAnObjectType {
        /// The offending type name.
        name: String,
    },
    /// Attempted to construct an instance of an abstract or interface type.
    AbstractInstance {
        /// The abstract/interface type name.
        name: String,
    },
    /// A constructor parameter does not match any property name.
    UnknownCtorParam {
        /// The type being registered.
        name: String,
        /// The unmatched parameter name.
        param: String,
    },
    /// A base or interface tag refers to a type of the wrong kind.
    InvalidBase {
        /// The derived type being registered.
        name: String,
        /// The offending base/interface name.
        base: String,
    },
    /// Options were mutated after first use sealed them.
    Sealed,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::DuplicateTypeName { name } => {
                write!(f, "type `{name}` is already registered")
            }
            ConfigErrorKind::DuplicateKnownType { base, known } => {
                write!(f, "known type `{known}` registered twice under `{base}`")
            }
            ConfigErrorKind::DuplicateDiscriminatorId { base, id } => {
                write!(f, "duplicate discriminator id `{id}` under `{base}`")
            }
            ConfigErrorKind::NotASubtype { base, known } => {
                write!(
                    f,
                    "known type `{known}` is not a strict descendant of `{base}`"
                )
            }
            ConfigErrorKind::DiscriminatorIdMismatch { base, known } => {
                write!(
                    f,
                    "known type `{known}` under `{base}`: discriminator id must be \
                     present exactly when a discriminator property name is configured"
                )
            }
            ConfigErrorKind::AlreadyPolymorphic { base } => {
                write!(f, "type `{base}` already has a polymorphic resolver")
            }
            ConfigErrorKind::NotAnObjectType { name } => {
                write!(f, "type `{name}` is not an object type")
            }
            ConfigErrorKind::AbstractInstance { name } => {
                write!(f, "cannot instantiate abstract/interface type `{name}`")
            }
            ConfigErrorKind::UnknownCtorParam { name, param } => {
                write!(
                    f,
                    "constructor parameter `{param}` of `{name}` matches no property"
                )
            }
            ConfigErrorKind::InvalidBase { name, base } => {
                write!(f, "type `{name}` has invalid base/interface `{base}`")
            }
            ConfigErrorKind::Sealed => {
                write!(f, "options are sealed; they were already used for an operation")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
