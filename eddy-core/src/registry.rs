//! The type registry: the engine's metadata provider.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ConfigError, ConfigErrorKind};
use crate::polymorphism::{PolymorphicResolver, Polymorphism};
use crate::ty::{
    Ctor, CtorParam, ObjectLayout, PropertyDef, ScalarKind, TypeInfo, TypeKind, TypeTag,
    BUILTIN_COUNT,
};
use crate::value::Instance;

/// Arena of registered types. Builtin scalar tags, `any` and `any[]` are
/// preregistered; everything else is added through the `register_*`
/// builders, which validate eagerly.
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_name: IndexMap<String, TypeTag>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry with the builtin types preregistered.
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            types: Vec::with_capacity(BUILTIN_COUNT),
            by_name: IndexMap::new(),
        };
        registry.insert_builtin("bool", TypeKind::Scalar(ScalarKind::Bool));
        registry.insert_builtin("i64", TypeKind::Scalar(ScalarKind::I64));
        registry.insert_builtin("u64", TypeKind::Scalar(ScalarKind::U64));
        registry.insert_builtin("f64", TypeKind::Scalar(ScalarKind::F64));
        registry.insert_builtin("string", TypeKind::Scalar(ScalarKind::String));
        registry.insert_builtin("any", TypeKind::Any);
        registry.insert_builtin(
            "any[]",
            TypeKind::Array {
                element: crate::ty::ANY,
            },
        );
        debug_assert_eq!(registry.types.len(), BUILTIN_COUNT);
        registry
    }

    fn insert_builtin(&mut self, name: &str, kind: TypeKind) {
        let tag = TypeTag::from_index(self.types.len());
        self.types.push(TypeInfo::new(name.to_owned(), kind));
        self.by_name.insert(name.to_owned(), tag);
    }

    /// Metadata for a tag. Tags are only minted by this registry, so the
    /// lookup is infallible by construction.
    pub fn get(&self, tag: TypeTag) -> &TypeInfo {
        &self.types[tag.index()]
    }

    /// Look up a type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    /// Start registering an object type.
    pub fn object(&mut self, name: impl Into<String>) -> ObjectBuilder<'_> {
        ObjectBuilder {
            registry: self,
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_interface: false,
            properties: Vec::new(),
            ctor: Ctor::Slots,
        }
    }

    /// Register an array type with the given element type.
    pub fn array(
        &mut self,
        name: impl Into<String>,
        element: TypeTag,
    ) -> Result<TypeTag, ConfigError> {
        self.insert(name.into(), TypeKind::Array { element })
    }

    /// Register a write-only stream type with the given element type.
    pub fn stream(
        &mut self,
        name: impl Into<String>,
        element: TypeTag,
    ) -> Result<TypeTag, ConfigError> {
        self.insert(name.into(), TypeKind::Stream { element })
    }

    fn insert(&mut self, name: String, kind: TypeKind) -> Result<TypeTag, ConfigError> {
        if self.by_name.contains_key(&name) {
            return Err(ConfigError::new(ConfigErrorKind::DuplicateTypeName { name }));
        }
        let tag = TypeTag::from_index(self.types.len());
        self.types.push(TypeInfo::new(name.clone(), kind));
        self.by_name.insert(name, tag);
        Ok(tag)
    }

    /// Attach a polymorphic resolver to a base object type. The resolver
    /// is built and validated here, once, and is immutable afterwards.
    pub fn attach_polymorphism(
        &mut self,
        base: TypeTag,
        config: Polymorphism,
    ) -> Result<(), ConfigError> {
        let info = self.get(base);
        if !matches!(info.kind, TypeKind::Object(_)) {
            return Err(ConfigError::new(ConfigErrorKind::NotAnObjectType {
                name: info.name.clone(),
            }));
        }
        if info.polymorphism.is_some() {
            return Err(ConfigError::new(ConfigErrorKind::AlreadyPolymorphic {
                base: info.name.clone(),
            }));
        }
        let resolver = PolymorphicResolver::build(base, config, self)?;
        self.types[base.index()].polymorphism = Some(Arc::new(resolver));
        Ok(())
    }

    /// Whether `derived` is `base` or an assignable descendant of it
    /// (through the base chain or transitively implemented interfaces).
    pub fn is_assignable(&self, base: TypeTag, derived: TypeTag) -> bool {
        if base == derived {
            return true;
        }
        let mut cursor = self.get(derived).base;
        while let Some(ty) = cursor {
            if ty == base {
                return true;
            }
            cursor = self.get(ty).base;
        }
        self.all_interfaces_of(derived).contains(&base)
    }

    /// All interfaces implemented by a type: its own, its ancestors', and
    /// interfaces extended by those interfaces. Deterministic order.
    pub fn all_interfaces_of(&self, ty: TypeTag) -> Vec<TypeTag> {
        let mut out = Vec::new();
        let mut pending = Vec::new();
        let mut cursor = Some(ty);
        while let Some(t) = cursor {
            pending.extend(self.get(t).interfaces.iter().copied());
            cursor = self.get(t).base;
        }
        while let Some(iface) = pending.pop() {
            if out.contains(&iface) {
                continue;
            }
            out.push(iface);
            pending.extend(self.get(iface).interfaces.iter().copied());
        }
        out
    }

    /// Construct an instance of a concrete object type with all-`Null`
    /// slots.
    pub fn instantiate(&self, ty: TypeTag) -> Result<Instance, ConfigError> {
        let info = self.get(ty);
        let Some(layout) = info.layout() else {
            return Err(ConfigError::new(ConfigErrorKind::NotAnObjectType {
                name: info.name.clone(),
            }));
        };
        if !info.is_concrete_object() {
            return Err(ConfigError::new(ConfigErrorKind::AbstractInstance {
                name: info.name.clone(),
            }));
        }
        Ok(Instance::new(ty, layout.properties.len()))
    }
}

/// Builder for object types. Properties of the base type are inherited
/// (prepended) automatically.
pub struct ObjectBuilder<'r> {
    registry: &'r mut TypeRegistry,
    name: String,
    base: Option<TypeTag>,
    interfaces: Vec<TypeTag>,
    is_abstract: bool,
    is_interface: bool,
    properties: Vec<PendingProperty>,
    ctor: Ctor,
}

enum PendingProperty {
    Slot(String, TypeTag),
    Custom(PropertyDef),
}

impl ObjectBuilder<'_> {
    /// Set the base type.
    pub fn base(mut self, base: TypeTag) -> Self {
        self.base = Some(base);
        self
    }

    /// Add an implemented interface.
    pub fn implements(mut self, iface: TypeTag) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// Mark the type abstract (cannot be instantiated).
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the type as an interface.
    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self.is_abstract = true;
        self
    }

    /// Add a slot-backed property. The slot index is the property's
    /// position in the final (inherited + own) property list.
    pub fn property(mut self, name: impl Into<String>, declared: TypeTag) -> Self {
        self.properties
            .push(PendingProperty::Slot(name.into(), declared));
        self
    }

    /// Add a property with explicit delegates.
    pub fn property_with(mut self, property: PropertyDef) -> Self {
        self.properties.push(PendingProperty::Custom(property));
        self
    }

    /// Use a parameterized constructor binding the named properties as
    /// arguments.
    pub fn ctor_params(mut self, names: &[&str]) -> Self {
        self.ctor = Ctor::Parameterized {
            params: names
                .iter()
                .map(|n| CtorParam {
                    name: (*n).to_owned(),
                    declared: crate::ty::ANY,
                    slot: 0,
                })
                .collect(),
        };
        self
    }

    /// Validate and register the type.
    pub fn build(self) -> Result<TypeTag, ConfigError> {
        let ObjectBuilder {
            registry,
            name,
            base,
            interfaces,
            is_abstract,
            is_interface,
            properties,
            ctor,
        } = self;

        let mut all = Vec::new();
        if let Some(base) = base {
            let info = registry.get(base);
            let Some(layout) = info.layout() else {
                return Err(ConfigError::new(ConfigErrorKind::InvalidBase {
                    name,
                    base: info.name.clone(),
                }));
            };
            if info.is_interface {
                return Err(ConfigError::new(ConfigErrorKind::InvalidBase {
                    name,
                    base: info.name.clone(),
                }));
            }
            all.extend(layout.properties.iter().cloned());
        }
        for iface in &interfaces {
            if !registry.get(*iface).is_interface {
                return Err(ConfigError::new(ConfigErrorKind::InvalidBase {
                    name,
                    base: registry.get(*iface).name.clone(),
                }));
            }
        }
        // Slot-backed properties land after the inherited ones.
        for p in properties {
            match p {
                PendingProperty::Slot(name, declared) => {
                    let slot = all.len();
                    all.push(PropertyDef::slot(name, declared, slot));
                }
                PendingProperty::Custom(def) => all.push(def),
            }
        }

        let ctor = match ctor {
            Ctor::Slots => Ctor::Slots,
            Ctor::Parameterized { params } => {
                let mut bound = Vec::with_capacity(params.len());
                for param in params {
                    let Some((slot, def)) =
                        all.iter().enumerate().find(|(_, d)| d.name == param.name)
                    else {
                        return Err(ConfigError::new(ConfigErrorKind::UnknownCtorParam {
                            name: name.clone(),
                            param: param.name,
                        }));
                    };
                    bound.push(CtorParam {
                        name: param.name,
                        declared: def.declared,
                        slot,
                    });
                }
                Ctor::Parameterized { params: bound }
            }
        };

        let tag = registry.insert(
            name,
            TypeKind::Object(ObjectLayout {
                properties: all,
                ctor,
            }),
        )?;
        let info = &mut registry.types[tag.index()];
        info.base = base;
        info.interfaces = interfaces;
        info.is_abstract = is_abstract;
        info.is_interface = is_interface;
        Ok(tag)
    }
}
