#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

//! Runtime type metadata and the dynamic value graph.
//!
//! This crate is the metadata provider for the eddy serialization engine:
//! given a [`TypeTag`], the [`TypeRegistry`] returns the effective shape of
//! that type (scalar kind, property descriptors with getter/setter
//! delegates, element types) and, for polymorphic base types, the attached
//! [`PolymorphicResolver`].
//!
//! Values travel through the engine as [`Value`] graphs. Objects, arrays
//! and streams are reference-counted so that object identity is observable,
//! which is what reference preservation and cycle breaking key off of.

mod error;
mod polymorphism;
mod registry;
mod stream;
mod ty;
mod value;

pub use error::{ConfigError, ConfigErrorKind};
pub use polymorphism::{KnownType, PolymorphicResolver, Polymorphism, Resolution};
pub use registry::{ObjectBuilder, TypeRegistry};
pub use stream::{CancelToken, DisposeError, StreamPoll, ValueStream, VecStream};
pub use ty::{
    Ctor, CtorParam, Getter, ObjectLayout, PropertyDef, ScalarKind, Setter, TypeInfo, TypeKind,
    TypeTag, ANY, ANY_ARRAY, BOOL, F64, I64, STRING, U64,
};
pub use value::{ArrayRef, Instance, ObjectRef, StreamRef, Value};
