//! Polymorphic type resolution.
//!
//! A [`PolymorphicResolver`] is attached to one base type and maps a
//! concrete runtime type to the known type that should serialize it (plus
//! that known type's discriminator id), by walking the ancestor chain and,
//! for interface bases, the implemented-interface set. Resolutions are
//! memoized, including negative and conflicting ones; a conflict becomes
//! fatal only when an instance of the ambiguous type is actually
//! serialized.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::error::{ConfigError, ConfigErrorKind};
use crate::registry::TypeRegistry;
use crate::ty::TypeTag;

/// One known subtype registration.
#[derive(Debug, Clone)]
pub struct KnownType {
    /// The known subtype.
    pub ty: TypeTag,
    /// Its discriminator id. Must be present exactly when the owning
    /// [`Polymorphism`] configures a discriminator property name.
    pub id: Option<String>,
}

impl KnownType {
    /// A known type with a discriminator id.
    pub fn with_id(ty: TypeTag, id: impl Into<String>) -> Self {
        KnownType {
            ty,
            id: Some(id.into()),
        }
    }

    /// A known type without an id (serialize-only polymorphism).
    pub fn plain(ty: TypeTag) -> Self {
        KnownType { ty, id: None }
    }
}

/// Static polymorphism configuration for one base type.
#[derive(Debug, Clone, Default)]
pub struct Polymorphism {
    /// Wire name of the discriminator property. Absence means serialize-only
    /// polymorphism: no discriminator is emitted and subtypes cannot be
    /// recovered on deserialization.
    pub discriminator: Option<String>,
    /// The known subtypes.
    pub known_types: Vec<KnownType>,
}

impl Polymorphism {
    /// Configuration with a discriminator property name.
    pub fn with_discriminator(name: impl Into<String>) -> Self {
        Polymorphism {
            discriminator: Some(name.into()),
            known_types: Vec::new(),
        }
    }

    /// Serialize-only configuration (no discriminator property).
    pub fn serialize_only() -> Self {
        Polymorphism::default()
    }

    /// Add a known subtype.
    pub fn known(mut self, known: KnownType) -> Self {
        self.known_types.push(known);
        self
    }
}

/// Outcome of resolving a concrete runtime type against a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No registered known type matches: the value serializes under its
    /// declared converter and no discriminator is emitted.
    None,
    /// A unique known type matched.
    Match {
        /// The resolved known type (the runtime type itself or the nearest
        /// known ancestor/interface).
        ty: TypeTag,
        /// The resolved type's discriminator id, when one is configured.
        id: Option<String>,
    },
    /// Two independent interface branches resolved to distinct known
    /// types. Fatal when an instance of this exact type is serialized.
    Conflict {
        /// First known type found.
        first: TypeTag,
        /// The disagreeing known type.
        second: TypeTag,
    },
}

/// Immutable per-base-type resolver with a memoized resolution cache.
pub struct PolymorphicResolver {
    base: TypeTag,
    discriminator: Option<String>,
    by_type: HashMap<TypeTag, Option<String>>,
    by_id: IndexMap<String, TypeTag>,
    cache: RwLock<HashMap<TypeTag, Resolution>>,
    walks: AtomicUsize,
}

impl std::fmt::Debug for PolymorphicResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolymorphicResolver")
            .field("base", &self.base)
            .field("discriminator", &self.discriminator)
            .field("known", &self.by_type.len())
            .finish_non_exhaustive()
    }
}

impl PolymorphicResolver {
    /// Validate a configuration against the registry and build the
    /// resolver. All configuration faults are raised here, eagerly.
    pub(crate) fn build(
        base: TypeTag,
        config: Polymorphism,
        registry: &TypeRegistry,
    ) -> Result<Self, ConfigError> {
        let base_name = registry.get(base).name.clone();
        let mut by_type = HashMap::new();
        let mut by_id = IndexMap::new();

        for known in &config.known_types {
            let known_name = registry.get(known.ty).name.clone();
            if known.ty == base || !registry.is_assignable(base, known.ty) {
                return Err(ConfigError::new(ConfigErrorKind::NotASubtype {
                    base: base_name,
                    known: known_name,
                }));
            }
            if known.id.is_some() != config.discriminator.is_some() {
                return Err(ConfigError::new(ConfigErrorKind::DiscriminatorIdMismatch {
                    base: base_name,
                    known: known_name,
                }));
            }
            if by_type.insert(known.ty, known.id.clone()).is_some() {
                return Err(ConfigError::new(ConfigErrorKind::DuplicateKnownType {
                    base: base_name,
                    known: known_name,
                }));
            }
            if let Some(id) = &known.id {
                if by_id.insert(id.clone(), known.ty).is_some() {
                    return Err(ConfigError::new(ConfigErrorKind::DuplicateDiscriminatorId {
                        base: base_name,
                        id: id.clone(),
                    }));
                }
            }
        }

        Ok(PolymorphicResolver {
            base,
            discriminator: config.discriminator,
            by_type,
            by_id,
            cache: RwLock::new(HashMap::new()),
            walks: AtomicUsize::new(0),
        })
    }

    /// The base type this resolver is attached to.
    pub fn base(&self) -> TypeTag {
        self.base
    }

    /// Configured discriminator property name, if any.
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// Resolve a concrete runtime type to its known type and discriminator
    /// id. Memoized; the second resolution of the same runtime type is a
    /// cache hit and performs no walk.
    pub fn try_resolve_subtype(&self, runtime: TypeTag, registry: &TypeRegistry) -> Resolution {
        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(hit) = cache.get(&runtime) {
                return hit.clone();
            }
        }
        self.walks.fetch_add(1, Ordering::Relaxed);
        let resolution = self.walk(runtime, registry);
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(runtime, resolution.clone());
        resolution
    }

    /// Look up the subtype for a discriminator id read off the wire.
    /// Unknown ids are a hard deserialization failure at the caller.
    pub fn resolve_type_by_id(&self, id: &str) -> Option<TypeTag> {
        self.by_id.get(id).copied()
    }

    /// Number of ancestor/interface walks performed so far. Diagnostic:
    /// lets callers observe that memoized resolutions do not re-walk.
    pub fn walk_count(&self) -> usize {
        self.walks.load(Ordering::Relaxed)
    }

    fn walk(&self, runtime: TypeTag, registry: &TypeRegistry) -> Resolution {
        // Ancestor chain, runtime type inclusive, stopping at the base.
        let mut cursor = Some(runtime);
        while let Some(ty) = cursor {
            if ty == self.base {
                break;
            }
            if let Some(id) = self.by_type.get(&ty) {
                return Resolution::Match {
                    ty,
                    id: id.clone(),
                };
            }
            cursor = registry.get(ty).base;
        }

        if registry.get(self.base).is_interface {
            let mut found: Option<TypeTag> = None;
            for iface in registry.all_interfaces_of(runtime) {
                if iface == self.base || !self.by_type.contains_key(&iface) {
                    continue;
                }
                match found {
                    None => found = Some(iface),
                    Some(first) if first != iface => {
                        return Resolution::Conflict {
                            first,
                            second: iface,
                        };
                    }
                    Some(_) => {}
                }
            }
            if let Some(ty) = found {
                return Resolution::Match {
                    ty,
                    id: self.by_type.get(&ty).cloned().flatten(),
                };
            }
        }

        Resolution::None
    }
}
