#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

//! The resumable serialization engine.
//!
//! This crate owns everything between a type registry and a concrete wire
//! format: the suspension-aware frame stacks, the converter dispatch
//! protocol, reference tracking (cycle breaking and `$id`/`$ref`
//! preservation), polymorphic retargeting and path-carrying errors.
//!
//! A format plugs in by implementing [`TokenRead`] and [`TokenWrite`];
//! the driving loop creates a [`WriteOperation`] or [`ReadOperation`] and
//! steps it, moving bytes between steps. [`Step::Suspended`] is the
//! protocol-level "not enough data yet" outcome; it is never an error.

mod cache;
mod converters;
mod cursor;
mod dispatch;
mod error;
mod options;
mod path;
mod refs;
mod stack;

pub use converters::{Converter, ReadContext, Strategy, WriteContext};
pub use cursor::{Checkpoint, Step, Token, TokenKind, TokenRead, TokenWrite};
pub use dispatch::{ReadOperation, WriteOperation};
pub use error::{Error, ErrorKind, Result};
pub use options::Options;
pub use refs::RefMode;
