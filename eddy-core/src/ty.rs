//! Type tags, shapes and property descriptors.

use std::fmt;
use std::sync::Arc;

use crate::polymorphism::PolymorphicResolver;
use crate::value::{Instance, Value};

/// Index of a registered type in its [`crate::TypeRegistry`].
///
/// Tags are arena indices: cheap to copy, hash and compare, and every
/// per-type side table in the engine is keyed by them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(pub(crate) u32);

impl TypeTag {
    pub(crate) const fn from_index(index: usize) -> Self {
        TypeTag(index as u32)
    }

    /// Arena index of this tag.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

/// Builtin: JSON boolean.
pub const BOOL: TypeTag = TypeTag(0);
/// Builtin: signed 64-bit integer.
pub const I64: TypeTag = TypeTag(1);
/// Builtin: unsigned 64-bit integer.
pub const U64: TypeTag = TypeTag(2);
/// Builtin: 64-bit float.
pub const F64: TypeTag = TypeTag(3);
/// Builtin: UTF-8 string.
pub const STRING: TypeTag = TypeTag(4);
/// Builtin: dynamic type; serialized by runtime value kind.
pub const ANY: TypeTag = TypeTag(5);
/// Builtin: array with dynamic element type.
pub const ANY_ARRAY: TypeTag = TypeTag(6);

pub(crate) const BUILTIN_COUNT: usize = 7;

/// Scalar categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    I64,
    /// Unsigned integer.
    U64,
    /// Float.
    F64,
    /// String.
    String,
}

/// Getter delegate: reads a property value out of an instance.
pub type Getter = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

/// Setter delegate: writes a property value into an instance.
pub type Setter = Arc<dyn Fn(&mut Instance, Value) + Send + Sync>;

/// One serializable property of an object type.
#[derive(Clone)]
pub struct PropertyDef {
    /// Wire name of the property.
    pub name: String,
    /// Declared type of the property value.
    pub declared: TypeTag,
    /// Getter delegate.
    pub get: Getter,
    /// Setter delegate.
    pub set: Setter,
}

impl PropertyDef {
    /// A property backed by instance slot `slot`, with default slot-access
    /// delegates.
    pub fn slot(name: impl Into<String>, declared: TypeTag, slot: usize) -> Self {
        PropertyDef {
            name: name.into(),
            declared,
            get: Arc::new(move |inst| inst.slot(slot).clone()),
            set: Arc::new(move |inst, value| inst.set_slot(slot, value)),
        }
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}

/// One parameter of a parameterized constructor. The argument read off the
/// wire is stored into `slot` when the instance is built.
#[derive(Debug, Clone)]
pub struct CtorParam {
    /// Wire name the parameter binds to (matched against property names).
    pub name: String,
    /// Declared type of the argument.
    pub declared: TypeTag,
    /// Target instance slot.
    pub slot: usize,
}

/// How instances of an object type are constructed during deserialization.
#[derive(Debug, Clone, Default)]
pub enum Ctor {
    /// Construct with all-`Null` slots up front, then apply setters as
    /// property values arrive. Required for `$id` pre-registration.
    #[default]
    Slots,
    /// Buffer property values until the object ends, then construct with
    /// the bound arguments. Incompatible with `$id` metadata.
    Parameterized {
        /// The constructor parameters in declaration order.
        params: Vec<CtorParam>,
    },
}

/// Shape of an object type.
#[derive(Debug, Clone, Default)]
pub struct ObjectLayout {
    /// Ordered property descriptors. Slot indices refer to this order for
    /// slot-backed properties.
    pub properties: Vec<PropertyDef>,
    /// Construction strategy.
    pub ctor: Ctor,
}

impl ObjectLayout {
    /// Find a property by wire name.
    pub fn property(&self, name: &str) -> Option<(usize, &PropertyDef)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }
}

/// The kind of a registered type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Scalar leaf.
    Scalar(ScalarKind),
    /// Object with properties.
    Object(ObjectLayout),
    /// Array with a declared element type.
    Array {
        /// Declared element type.
        element: TypeTag,
    },
    /// Write-only stream with a declared element type.
    Stream {
        /// Declared element type.
        element: TypeTag,
    },
    /// Dynamic: shape follows the runtime value.
    Any,
}

/// Everything the engine knows about one registered type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Unique type name.
    pub name: String,
    /// Shape of the type.
    pub kind: TypeKind,
    /// Base type, for object types participating in a hierarchy.
    pub base: Option<TypeTag>,
    /// Directly implemented interfaces.
    pub interfaces: Vec<TypeTag>,
    /// Whether the type is abstract (object types only).
    pub is_abstract: bool,
    /// Whether the type is an interface (object types only).
    pub is_interface: bool,
    /// Attached polymorphic resolver, if this type is a polymorphic base.
    pub polymorphism: Option<Arc<PolymorphicResolver>>,
}

impl TypeInfo {
    pub(crate) fn new(name: String, kind: TypeKind) -> Self {
        TypeInfo {
            name,
            kind,
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_interface: false,
            polymorphism: None,
        }
    }

    /// The object layout, if this is an object type.
    pub fn layout(&self) -> Option<&ObjectLayout> {
        match &self.kind {
            TypeKind::Object(layout) => Some(layout),
            _ => None,
        }
    }

    /// Whether instances of this type can be constructed.
    pub fn is_concrete_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object(_)) && !self.is_abstract && !self.is_interface
    }
}
