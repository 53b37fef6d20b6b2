//! The converter protocol.
//!
//! Every value kind is handled by a [`Converter`]. Converters are
//! re-entrant: when `try_write`/`try_read` returns [`Step::Suspended`]
//! because an inner conversion could not finish, a later call with the
//! same frame resumes exactly at the unfinished child instead of
//! restarting the value. Scalar-strategy converters are exempt from the
//! re-entrancy contract and are asserted never to carry partial state,
//! because a single scalar token is always fully buffered by the cursor.
//!
//! Null handling, reference tracking, polymorphic retargeting, depth
//! guards and post-call depth validation all live in the dispatch layer,
//! not in converter bodies.

mod array;
mod dynamic;
mod object;
mod scalar;
mod stream;

pub(crate) use array::ArrayConverter;
pub(crate) use dynamic::DynamicConverter;
pub(crate) use object::ObjectConverter;
pub(crate) use scalar::ScalarConverter;
pub(crate) use stream::StreamConverter;

use eddy_core::{CancelToken, StreamRef, TypeRegistry, TypeTag, Value};

use crate::cursor::{Step, TokenRead, TokenWrite};
use crate::dispatch::{self, ReadEnv, WriteEnv};
use crate::error::Result;
use crate::refs::{RefMode, ReferenceTracker};
use crate::stack::{ReadFrame, WriteFrame};

/// How a converter interacts with the token cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Exactly one token in or out; never suspends with partial state.
    Scalar,
    /// A balanced start/end token pair with members in between; must
    /// honor the re-entrancy contract.
    Container,
}

/// A per-type conversion implementation.
///
/// Converters registered from outside the crate are treated as untrusted:
/// the dispatch layer validates cursor depth around every call instead of
/// only debug-asserting it.
pub trait Converter: Send + Sync {
    /// The cursor interaction strategy.
    fn strategy(&self) -> Strategy {
        Strategy::Container
    }

    /// Whether the dispatch layer's depth validation may be reduced to a
    /// debug assertion. Only the built-in converters return `true`.
    fn trusted(&self) -> bool {
        false
    }

    /// Whether this converter wants to see `null` itself instead of the
    /// dispatch layer handling it centrally.
    fn handles_null(&self) -> bool {
        false
    }

    /// Write `value`, possibly across several calls.
    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>>;

    /// Read one value, possibly across several calls.
    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>>;
}

/// Converter-facing view of one write frame.
pub struct WriteContext<'e, 'a> {
    pub(crate) env: &'e mut WriteEnv<'a>,
    pub(crate) frame: usize,
}

impl<'e, 'a> WriteContext<'e, 'a> {
    /// The token writer.
    pub fn out(&mut self) -> &mut dyn TokenWrite {
        &mut *self.env.out
    }

    /// The type registry.
    pub fn registry(&self) -> &'a TypeRegistry {
        self.env.registry
    }

    /// The tag this frame converts under.
    pub fn tag(&self) -> TypeTag {
        self.frame().ty
    }

    /// Whether this frame already emitted its container start token.
    pub fn opened(&self) -> bool {
        self.frame().phase == crate::stack::WritePhase::Members
    }

    /// Record that the container start token (and metadata) are out.
    pub fn mark_opened(&mut self) {
        self.frame_mut().phase = crate::stack::WritePhase::Members;
    }

    /// Generic member cursor, preserved across suspensions.
    pub fn index(&self) -> usize {
        self.frame().prop_index
    }

    /// Update the member cursor.
    pub fn set_index(&mut self, index: usize) {
        self.frame_mut().prop_index = index;
    }

    /// Whether the output buffer wants draining; converters suspend at
    /// the next member boundary when it does.
    pub fn should_flush(&self) -> bool {
        self.env.out.should_flush()
    }

    /// The operation's cancellation token.
    pub fn cancel(&self) -> CancelToken {
        self.env.stack.cancel.clone()
    }

    /// Write a child value under its declared type, through the full
    /// dispatch layer.
    pub fn write_child(&mut self, declared: TypeTag, value: &Value) -> Result<Step<()>> {
        dispatch::write_value(self.env, declared, value)
    }

    pub(crate) fn frame(&self) -> &WriteFrame {
        self.env.stack.frame(self.frame)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut WriteFrame {
        self.env.stack.frame_mut(self.frame)
    }

    /// Emit any `$id` and discriminator owed by this frame. Must run
    /// right after the container start token.
    pub(crate) fn emit_metadata(&mut self) {
        if let Some(id) = self.frame_mut().pending_ref_id.take() {
            self.env.out.property_name("$id");
            self.env.out.str(&id);
        }
        if let Some((name, id)) = self.frame_mut().discriminator.take() {
            self.env.out.property_name(&name);
            self.env.out.str(&id);
        }
    }

    pub(crate) fn schedule_disposal(&mut self, stream: StreamRef) {
        self.env.stack.pending_disposals.push(stream);
    }

    /// Retarget this frame to another tag and run that tag's converter in
    /// place, without pushing a frame.
    pub(crate) fn delegate(&mut self, ty: TypeTag, value: &Value) -> Result<Step<()>> {
        self.frame_mut().ty = ty;
        let converter = self.env.options.converter_for(ty, self.env.registry);
        converter.try_write(self, value)
    }
}

/// Converter-facing view of one read frame.
pub struct ReadContext<'e, 'a> {
    pub(crate) env: &'e mut ReadEnv<'a>,
    pub(crate) frame: usize,
}

impl<'e, 'a> ReadContext<'e, 'a> {
    /// The token reader.
    pub fn input(&mut self) -> &mut dyn TokenRead {
        &mut *self.env.input
    }

    /// The type registry.
    pub fn registry(&self) -> &'a TypeRegistry {
        self.env.registry
    }

    /// The tag this frame converts under.
    pub fn tag(&self) -> TypeTag {
        self.frame().ty
    }

    /// The configured reference handling mode.
    pub fn ref_mode(&self) -> RefMode {
        self.env.stack.refs.mode()
    }

    /// Read a child value under its declared type, through the full
    /// dispatch layer.
    pub fn read_child(&mut self, declared: TypeTag) -> Result<Step<Value>> {
        dispatch::read_value(self.env, declared)
    }

    pub(crate) fn frame(&self) -> &ReadFrame {
        self.env.stack.frame(self.frame)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut ReadFrame {
        self.env.stack.frame_mut(self.frame)
    }

    pub(crate) fn refs_mut(&mut self) -> &mut ReferenceTracker {
        &mut self.env.stack.refs
    }

    /// Retarget this frame to another tag and run that tag's converter in
    /// place, without pushing a frame.
    pub(crate) fn delegate(&mut self, ty: TypeTag) -> Result<Step<Value>> {
        self.frame_mut().ty = ty;
        let converter = self.env.options.converter_for(ty, self.env.registry);
        converter.try_read(self)
    }
}
