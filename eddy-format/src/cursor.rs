//! Format cursor contracts.
//!
//! The engine is format-agnostic: deserialization pulls [`Token`]s from a
//! [`TokenRead`] and serialization pushes tokens into a [`TokenWrite`].
//! Both sides are resumable. A reader that runs out of buffered input
//! reports [`Step::Suspended`] *without* consuming a partial token, so the
//! same `next` call can be replayed once more bytes arrive. A writer is
//! infallible (it appends to memory) but exposes [`TokenWrite::should_flush`]
//! so the driver can suspend and drain output between values.

use std::any::Any;

use crate::error::Result;

/// One structural token of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// An object property name.
    PropertyName(String),
    /// `null`
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    I64(i64),
    /// An unsigned integer.
    U64(u64),
    /// A float.
    F64(f64),
    /// A string.
    Str(String),
}

impl Token {
    /// Short name of the token kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::StartObject => "start of object",
            Token::EndObject => "end of object",
            Token::StartArray => "start of array",
            Token::EndArray => "end of array",
            Token::PropertyName(_) => "property name",
            Token::Null => "null",
            Token::Bool(_) => "boolean",
            Token::I64(_) | Token::U64(_) | Token::F64(_) => "number",
            Token::Str(_) => "string",
        }
    }

    /// The token's kind without its payload.
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::StartObject => TokenKind::StartObject,
            Token::EndObject => TokenKind::EndObject,
            Token::StartArray => TokenKind::StartArray,
            Token::EndArray => TokenKind::EndArray,
            Token::PropertyName(_) => TokenKind::PropertyName,
            Token::Null => TokenKind::Null,
            Token::Bool(_) => TokenKind::Bool,
            Token::I64(_) | Token::U64(_) | Token::F64(_) => TokenKind::Number,
            Token::Str(_) => TokenKind::Str,
        }
    }
}

/// A token's kind without its payload.
///
/// Both cursors report the kind of the token they last moved past, which
/// is what the dispatch layer's post-call validation matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `{`
    StartObject,
    /// `}`
    EndObject,
    /// `[`
    StartArray,
    /// `]`
    EndArray,
    /// An object property name.
    PropertyName,
    /// `null`
    Null,
    /// A boolean.
    Bool,
    /// A number.
    Number,
    /// A string.
    Str,
}

impl TokenKind {
    /// Whether this kind is a scalar leaf.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TokenKind::Null | TokenKind::Bool | TokenKind::Number | TokenKind::Str
        )
    }
}

/// Outcome of one resumable step.
///
/// `Suspended` is not an error: it means the operation ran out of input
/// (read side) or filled its output budget (write side) and must be
/// re-driven after the caller moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// The step completed with a value.
    Done(T),
    /// The step could not complete yet; re-drive after transferring bytes.
    Suspended,
}

impl<T> Step<T> {
    /// Map the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Done(v) => Step::Done(f(v)),
            Step::Suspended => Step::Suspended,
        }
    }

    /// Whether this step completed.
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }
}

/// Opaque saved reader position.
///
/// Taken with [`TokenRead::checkpoint`] before a read-ahead and restored
/// with [`TokenRead::rewind`] when the read-ahead must be replayed later
/// (metadata peeks, the central null check, suspensions mid-peek). The
/// payload is format-private state; the engine never inspects it.
pub struct Checkpoint(Box<dyn Any>);

impl Checkpoint {
    /// Wrap format-private saved state.
    pub fn new<T: Any>(state: T) -> Self {
        Checkpoint(Box::new(state))
    }

    /// Recover the saved state. Returns `None` if the checkpoint belongs
    /// to a different reader implementation, which is a driver bug.
    pub fn into_state<T: Any>(self) -> Option<T> {
        self.0.downcast::<T>().ok().map(|b| *b)
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Checkpoint(..)")
    }
}

/// Pull side of a format: a resumable token reader.
pub trait TokenRead {
    /// Read the next token.
    ///
    /// Returns `Ok(Step::Suspended)` when the buffered input ends inside a
    /// token or between tokens; the reader must not have consumed anything
    /// in that case, so the call can be replayed verbatim after more input
    /// is fed.
    fn next(&mut self) -> Result<Step<Token>>;

    /// Current container nesting depth (containers opened and not yet
    /// closed).
    fn depth(&self) -> usize;

    /// Kind of the most recently consumed token, `None` before the first.
    /// [`TokenRead::rewind`] restores the kind observed at the checkpoint.
    fn token_type(&self) -> Option<TokenKind>;

    /// Total bytes consumed so far. Only whole tokens count: a `next`
    /// that suspends leaves the counter unchanged.
    fn bytes_consumed(&self) -> usize;

    /// Whether no further input will arrive. When final, running out of
    /// buffered bytes is end-of-document, not a suspension.
    fn is_final(&self) -> bool;

    /// Save the current position for a possible [`TokenRead::rewind`].
    fn checkpoint(&self) -> Checkpoint;

    /// Restore a position previously saved on this reader.
    fn rewind(&mut self, checkpoint: Checkpoint);
}

/// Push side of a format: an infallible token writer over an in-memory
/// buffer. Flushing to the real sink is the driver's job.
pub trait TokenWrite {
    /// Begin an object.
    fn start_object(&mut self);
    /// End the current object.
    fn end_object(&mut self);
    /// Begin an array.
    fn start_array(&mut self);
    /// End the current array.
    fn end_array(&mut self);
    /// Write a property name within an object.
    fn property_name(&mut self, name: &str);
    /// Write `null`.
    fn null(&mut self);
    /// Write a boolean.
    fn bool(&mut self, value: bool);
    /// Write a signed integer.
    fn i64(&mut self, value: i64);
    /// Write an unsigned integer.
    fn u64(&mut self, value: u64);
    /// Write a float.
    fn f64(&mut self, value: f64);
    /// Write a string.
    fn str(&mut self, value: &str);

    /// Current container nesting depth.
    fn depth(&self) -> usize;
    /// Kind of the most recently emitted token, `None` before the first.
    fn token_type(&self) -> Option<TokenKind>;
    /// Bytes buffered and not yet taken by the driver.
    fn bytes_pending(&self) -> usize;
    /// Whether the pending buffer has reached the flush threshold.
    fn should_flush(&self) -> bool;
}
