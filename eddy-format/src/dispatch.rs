//! The generic dispatch layer.
//!
//! Everything a converter must not have to think about happens here, once
//! per value: depth guards, central null handling, reference tracking,
//! polymorphic retargeting, frame push/pop, post-call depth validation and
//! error-path attachment. Converter bodies only move tokens.

use eddy_core::{CancelToken, Resolution, TypeRegistry, TypeTag, Value};

use crate::converters::{ReadContext, Strategy, WriteContext};
use crate::cursor::{Step, Token, TokenKind, TokenRead, TokenWrite};
use crate::error::{Error, ErrorKind, Result};
use crate::options::Options;
use crate::refs::RefMode;
use crate::stack::{PushAction, ReadPhase, ReadStack, WritePhase, WriteStack};

pub(crate) struct WriteEnv<'a> {
    pub options: &'a Options,
    pub registry: &'a TypeRegistry,
    pub out: &'a mut dyn TokenWrite,
    pub stack: &'a mut WriteStack,
}

pub(crate) struct ReadEnv<'a> {
    pub options: &'a Options,
    pub registry: &'a TypeRegistry,
    pub input: &'a mut dyn TokenRead,
    pub stack: &'a mut ReadStack,
}

/// One resumable top-level serialization.
///
/// Owns the frame stack, reference tracker and pending-disposal list for
/// the operation. Drive it with [`WriteOperation::step`] until it reports
/// [`Step::Done`]; drain output between steps. Disposal of accumulated
/// stream sources happens exactly once, on completion, on error, or via
/// [`WriteOperation::abandon`].
pub struct WriteOperation {
    stack: WriteStack,
    ty: TypeTag,
    value: Value,
    finished: bool,
}

impl WriteOperation {
    /// Start a write of `value` under declared type `ty`. Seals the
    /// options.
    pub fn new(options: &Options, ty: TypeTag, value: Value, cancel: CancelToken) -> Self {
        options.seal();
        WriteOperation {
            stack: WriteStack::new(options.reference_mode(), cancel),
            ty,
            value,
            finished: false,
        }
    }

    /// Drive the walk until it completes or suspends. A suspension means
    /// the output wants draining or a stream fetch is pending; call again
    /// after making progress. Errors are terminal.
    pub fn step(&mut self, options: &Options, out: &mut dyn TokenWrite) -> Result<Step<()>> {
        debug_assert!(!self.finished, "write operation driven after completion");
        let value = self.value.clone();
        let mut env = WriteEnv {
            options,
            registry: options.registry(),
            out,
            stack: &mut self.stack,
        };
        match write_value(&mut env, self.ty, &value) {
            Ok(Step::Done(())) => {
                self.finished = true;
                debug_assert_eq!(self.stack.depth(), 0);
                self.stack.drain_disposals()?;
                Ok(Step::Done(()))
            }
            Ok(Step::Suspended) => Ok(Step::Suspended),
            Err(err) => {
                self.finished = true;
                // The operation is dead; disposal failures on this path
                // must not mask the original error.
                if let Err(disposal) = self.stack.drain_disposals() {
                    log::warn!("disposal after failed write: {disposal}");
                }
                Err(err)
            }
        }
    }

    /// Give up on a suspended operation, releasing every stream source it
    /// accumulated. Idempotent.
    pub fn abandon(&mut self) -> Result<()> {
        self.finished = true;
        self.stack.drain_disposals()
    }

    /// Whether the operation has completed, failed, or been abandoned.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// One resumable top-level deserialization.
pub struct ReadOperation {
    stack: ReadStack,
    ty: TypeTag,
    finished: bool,
}

impl ReadOperation {
    /// Start a read of declared type `ty`. Seals the options.
    pub fn new(options: &Options, ty: TypeTag) -> Self {
        options.seal();
        ReadOperation {
            stack: ReadStack::new(options.reference_mode()),
            ty,
            finished: false,
        }
    }

    /// Drive the walk until a value is produced or the input runs dry.
    pub fn step(&mut self, options: &Options, input: &mut dyn TokenRead) -> Result<Step<Value>> {
        debug_assert!(!self.finished, "read operation driven after completion");
        let mut env = ReadEnv {
            options,
            registry: options.registry(),
            input,
            stack: &mut self.stack,
        };
        let result = read_value(&mut env, self.ty);
        if matches!(result, Ok(Step::Done(_)) | Err(_)) {
            self.finished = true;
        }
        result
    }

    /// Whether the operation has produced its value or failed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

pub(crate) fn write_value(
    env: &mut WriteEnv<'_>,
    declared: TypeTag,
    value: &Value,
) -> Result<Step<()>> {
    if env.stack.depth() >= env.options.max_depth() {
        let path = env.stack.render_path(env.registry);
        return Err(Error::new(ErrorKind::DepthLimitExceeded {
            limit: env.options.max_depth(),
        })
        .with_path(path));
    }
    let (index, action) = env.stack.push(declared);
    if action == PushAction::Fresh {
        match prepare_write(env, index, declared, value) {
            Ok(Some(short_circuit)) => {
                env.stack.pop(true);
                return Ok(short_circuit);
            }
            Ok(None) => {}
            Err(err) => {
                let path = env.stack.render_path(env.registry);
                return Err(err.with_path(path));
            }
        }
        env.stack.frame_mut(index).entry_depth = env.out.depth();
    }
    let ty = env.stack.frame(index).ty;
    let converter = env.options.converter_for(ty, env.registry);
    if converter.strategy() == Strategy::Scalar {
        debug_assert_eq!(
            env.stack.frame(index).phase,
            WritePhase::Start,
            "scalar converter resumed with partial state"
        );
    }
    let outcome = converter.try_write(
        &mut WriteContext {
            env: &mut *env,
            frame: index,
        },
        value,
    );
    match outcome {
        Ok(Step::Done(())) => {
            let entry = env.stack.frame(index).entry_depth;
            let contract = env.out.depth() == entry
                && env.out.token_type() != Some(TokenKind::PropertyName)
                && (converter.strategy() != Strategy::Scalar
                    || env.out.token_type().is_some_and(TokenKind::is_scalar));
            if !contract {
                debug_assert!(!converter.trusted(), "built-in converter cursor mismatch");
                let ty_name = env.registry.get(env.stack.frame(index).ty).name.clone();
                let path = env.stack.render_path(env.registry);
                return Err(
                    Error::new(ErrorKind::ConverterDepthMismatch { ty: ty_name }).with_path(path)
                );
            }
            if let Some(identity) = env.stack.frame(index).identity {
                env.stack.refs.exit(identity);
            }
            env.stack.pop(true);
            Ok(Step::Done(()))
        }
        Ok(Step::Suspended) => {
            env.stack.pop(false);
            Ok(Step::Suspended)
        }
        Err(err) => {
            let path = env.stack.render_path(env.registry);
            Err(err.with_path(path))
        }
    }
}

/// Fresh-frame pre-steps, in fixed order: central null, reference
/// handling, polymorphic retargeting. Returns a short-circuit step when
/// the value was fully handled without running a converter (nulls, broken
/// cycles, `$ref` emission).
fn prepare_write(
    env: &mut WriteEnv<'_>,
    index: usize,
    declared: TypeTag,
    value: &Value,
) -> Result<Option<Step<()>>> {
    if matches!(value, Value::Null) {
        let converter = env.options.converter_for(declared, env.registry);
        if !converter.handles_null() {
            env.out.null();
            return Ok(Some(Step::Done(())));
        }
    }
    if let Some(identity) = value.identity() {
        match env.stack.refs.mode() {
            RefMode::Ignore => {}
            RefMode::CycleBreak => {
                if env.stack.refs.enter(identity) {
                    // Cycle: silently severed, never an error.
                    env.out.null();
                    return Ok(Some(Step::Done(())));
                }
                env.stack.frame_mut(index).identity = Some(identity);
            }
            RefMode::Preserve => {
                let (id, first) = env.stack.refs.id_for(identity);
                if !first {
                    env.out.start_object();
                    env.out.property_name("$ref");
                    env.out.str(&id);
                    env.out.end_object();
                    return Ok(Some(Step::Done(())));
                }
                env.stack.frame_mut(index).pending_ref_id = Some(id);
            }
        }
    }
    if let Value::Object(obj) = value {
        let runtime = obj.borrow().ty();
        if let Some(resolver) = env.registry.get(declared).polymorphism.clone() {
            let memo = if index > 0 {
                env.stack
                    .frame(index - 1)
                    .sibling
                    .clone()
                    .filter(|(base, rt, _, _)| *base == declared && *rt == runtime)
                    .map(|(_, _, ty, id)| Resolution::Match { ty, id })
            } else {
                None
            };
            let resolution = match memo {
                Some(hit) => hit,
                None => {
                    let resolution = resolver.try_resolve_subtype(runtime, env.registry);
                    if index > 0 {
                        if let Resolution::Match { ty, id } = &resolution {
                            env.stack.frame_mut(index - 1).sibling =
                                Some((declared, runtime, *ty, id.clone()));
                        }
                    }
                    resolution
                }
            };
            match resolution {
                Resolution::None => {}
                Resolution::Match { ty, id } => {
                    log::trace!("retarget {declared:?} -> {ty:?} (runtime {runtime:?})");
                    let frame = env.stack.frame_mut(index);
                    frame.ty = ty;
                    if let (Some(name), Some(id)) = (resolver.discriminator(), id) {
                        frame.discriminator = Some((name.to_owned(), id));
                    }
                }
                Resolution::Conflict { first, second } => {
                    return Err(Error::new(ErrorKind::ConflictingDiscriminator {
                        runtime: env.registry.get(runtime).name.clone(),
                        first: env.registry.get(first).name.clone(),
                        second: env.registry.get(second).name.clone(),
                    }));
                }
            }
        }
    }
    Ok(None)
}

pub(crate) fn read_value(env: &mut ReadEnv<'_>, declared: TypeTag) -> Result<Step<Value>> {
    if env.stack.depth() >= env.options.max_depth() {
        let path = env.stack.render_path(env.registry);
        return Err(Error::new(ErrorKind::DepthLimitExceeded {
            limit: env.options.max_depth(),
        })
        .with_path(path));
    }
    let (index, _) = env.stack.push(declared);
    if env.stack.frame(index).phase == ReadPhase::Start {
        // No tokens consumed for this value yet (fresh, or resumed before
        // its first token was available): record entry depth and handle
        // null centrally.
        env.stack.frame_mut(index).entry_depth = env.input.depth();
        env.stack.frame_mut(index).entry_bytes = env.input.bytes_consumed();
        let converter = env
            .options
            .converter_for(env.stack.frame(index).ty, env.registry);
        if !converter.handles_null() {
            let checkpoint = env.input.checkpoint();
            match env.input.next() {
                Ok(Step::Done(Token::Null)) => {
                    env.stack.pop(true);
                    return Ok(Step::Done(Value::Null));
                }
                Ok(Step::Done(_)) => env.input.rewind(checkpoint),
                Ok(Step::Suspended) => {
                    env.stack.pop(false);
                    return Ok(Step::Suspended);
                }
                Err(err) => {
                    let path = env.stack.render_path(env.registry);
                    return Err(err.with_path(path));
                }
            }
        }
    }
    let ty = env.stack.frame(index).ty;
    let converter = env.options.converter_for(ty, env.registry);
    if converter.strategy() == Strategy::Scalar {
        debug_assert_eq!(
            env.stack.frame(index).phase,
            ReadPhase::Start,
            "scalar converter resumed with partial state"
        );
    }
    let outcome = converter.try_read(&mut ReadContext {
        env: &mut *env,
        frame: index,
    });
    match outcome {
        Ok(Step::Done(value)) => {
            let entry_depth = env.stack.frame(index).entry_depth;
            let entry_bytes = env.stack.frame(index).entry_bytes;
            let balanced = env.input.depth() == entry_depth
                && env.input.token_type() != Some(TokenKind::PropertyName);
            let contract = balanced
                && (converter.strategy() != Strategy::Scalar
                    || (env.input.bytes_consumed() > entry_bytes
                        && env.input.token_type().is_some_and(TokenKind::is_scalar)));
            if !contract {
                debug_assert!(!converter.trusted(), "built-in converter cursor mismatch");
                let ty_name = env.registry.get(env.stack.frame(index).ty).name.clone();
                let path = env.stack.render_path(env.registry);
                return Err(
                    Error::new(ErrorKind::ConverterDepthMismatch { ty: ty_name }).with_path(path)
                );
            }
            env.stack.pop(true);
            Ok(Step::Done(value))
        }
        Ok(Step::Suspended) => {
            // A scalar converter has no partial state to replay, so it
            // must not have consumed anything before suspending.
            if converter.strategy() == Strategy::Scalar
                && env.input.bytes_consumed() != env.stack.frame(index).entry_bytes
            {
                debug_assert!(!converter.trusted(), "built-in converter cursor mismatch");
                let ty_name = env.registry.get(env.stack.frame(index).ty).name.clone();
                let path = env.stack.render_path(env.registry);
                return Err(
                    Error::new(ErrorKind::ConverterDepthMismatch { ty: ty_name }).with_path(path)
                );
            }
            env.stack.pop(false);
            Ok(Step::Suspended)
        }
        Err(err) => {
            let path = env.stack.render_path(env.registry);
            Err(err.with_path(path))
        }
    }
}
