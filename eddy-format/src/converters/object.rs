//! Object conversion: typed instances with property lists, metadata
//! properties and both construction strategies.

use eddy_core::{Ctor, Value};

use crate::converters::{Converter, ReadContext, WriteContext};
use crate::cursor::{Step, Token};
use crate::error::{Error, ErrorKind, Result};
use crate::refs::RefMode;
use crate::stack::ReadPhase;

/// Converter for object types. Resumable on both sides: suspension leaves
/// the member cursor on the unfinished property and a later call picks it
/// back up without re-emitting or re-consuming anything.
pub(crate) struct ObjectConverter;

impl Converter for ObjectConverter {
    fn trusted(&self) -> bool {
        true
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>> {
        let Value::Object(obj) = value else {
            return Err(Error::new(ErrorKind::TypeMismatch {
                expected: "object",
                got: value.kind_name(),
            }));
        };
        if !cx.opened() {
            cx.out().start_object();
            cx.emit_metadata();
            cx.mark_opened();
        }
        let layout = match cx.registry().get(cx.tag()).layout() {
            Some(layout) => layout,
            None => {
                return Err(Error::new(ErrorKind::TypeMismatch {
                    expected: "object type",
                    got: value.kind_name(),
                }));
            }
        };
        while cx.index() < layout.properties.len() {
            let i = cx.index();
            let prop = &layout.properties[i];
            if !cx.frame().name_emitted {
                if cx.should_flush() {
                    return Ok(Step::Suspended);
                }
                cx.out().property_name(&prop.name);
                cx.frame_mut().name_emitted = true;
            }
            let child = (prop.get)(&obj.borrow());
            match cx.write_child(prop.declared, &child)? {
                Step::Done(()) => {
                    cx.frame_mut().name_emitted = false;
                    cx.set_index(i + 1);
                }
                Step::Suspended => return Ok(Step::Suspended),
            }
        }
        cx.out().end_object();
        Ok(Step::Done(()))
    }

    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        loop {
            match cx.frame().phase {
                ReadPhase::Start => {
                    let token = match cx.input().next()? {
                        Step::Done(token) => token,
                        Step::Suspended => return Ok(Step::Suspended),
                    };
                    if token != Token::StartObject {
                        return Err(Error::new(ErrorKind::UnexpectedToken {
                            got: token.kind_name(),
                            expected: "start of object",
                        }));
                    }
                    cx.frame_mut().phase = ReadPhase::Meta;
                }
                ReadPhase::Meta => {
                    if let Some(resolved) = self.read_metadata(cx)? {
                        return Ok(resolved);
                    }
                    self.begin_members(cx)?;
                }
                ReadPhase::Members => return self.read_members(cx),
            }
        }
    }
}

impl ObjectConverter {
    /// Probe the metadata properties after `{`. Each probe is atomic: a
    /// suspension rewinds to the last committed token so the resumed call
    /// retries the whole probe. Returns `Some` when the object collapses
    /// to an already-known value (`$ref`).
    fn read_metadata(&self, cx: &mut ReadContext<'_, '_>) -> Result<Option<Step<Value>>> {
        let preserve = cx.ref_mode() == RefMode::Preserve;
        loop {
            let checkpoint = cx.input().checkpoint();
            let token = match cx.input().next()? {
                Step::Done(token) => token,
                Step::Suspended => return Ok(Some(Step::Suspended)),
            };
            match token {
                Token::PropertyName(name) if preserve && name == "$ref" => {
                    let id = match cx.input().next()? {
                        Step::Done(Token::Str(id)) => id,
                        Step::Done(_) => {
                            return Err(Error::new(ErrorKind::RefMetadata {
                                message: "$ref must be a string".to_owned(),
                            }));
                        }
                        Step::Suspended => {
                            cx.input().rewind(checkpoint);
                            return Ok(Some(Step::Suspended));
                        }
                    };
                    match cx.input().next()? {
                        Step::Done(Token::EndObject) => {}
                        Step::Done(_) => {
                            return Err(Error::new(ErrorKind::RefMetadata {
                                message: "$ref must be the only member of its object".to_owned(),
                            }));
                        }
                        Step::Suspended => {
                            cx.input().rewind(checkpoint);
                            return Ok(Some(Step::Suspended));
                        }
                    }
                    let value = cx.refs_mut().resolve(&id)?;
                    match &value {
                        Value::Object(obj)
                            if cx.registry().is_assignable(cx.tag(), obj.borrow().ty()) => {}
                        _ => {
                            return Err(Error::new(ErrorKind::RefMetadata {
                                message: format!("$ref `{id}` resolves to an incompatible value"),
                            }));
                        }
                    }
                    return Ok(Some(Step::Done(value)));
                }
                Token::PropertyName(name) if preserve && name == "$id" => {
                    let id = match cx.input().next()? {
                        Step::Done(Token::Str(id)) => id,
                        Step::Done(_) => {
                            return Err(Error::new(ErrorKind::RefMetadata {
                                message: "$id must be a string".to_owned(),
                            }));
                        }
                        Step::Suspended => {
                            cx.input().rewind(checkpoint);
                            return Ok(Some(Step::Suspended));
                        }
                    };
                    if cx.frame().pending_id.is_some() {
                        return Err(Error::new(ErrorKind::RefMetadata {
                            message: "duplicate $id member".to_owned(),
                        }));
                    }
                    cx.frame_mut().pending_id = Some(id);
                }
                Token::PropertyName(name) if self.is_discriminator(cx, &name) => {
                    let id = match cx.input().next()? {
                        Step::Done(Token::Str(id)) => id,
                        Step::Done(other) => {
                            return Err(Error::new(ErrorKind::InvalidDiscriminator {
                                got: other.kind_name(),
                            }));
                        }
                        Step::Suspended => {
                            cx.input().rewind(checkpoint);
                            return Ok(Some(Step::Suspended));
                        }
                    };
                    // is_discriminator established the resolver exists.
                    let resolver = cx
                        .registry()
                        .get(cx.tag())
                        .polymorphism
                        .clone()
                        .unwrap_or_else(|| unreachable!("discriminator without resolver"));
                    match resolver.resolve_type_by_id(&id) {
                        Some(ty) => {
                            log::trace!("retarget by discriminator `{id}` -> {ty:?}");
                            cx.frame_mut().ty = ty;
                        }
                        None => {
                            return Err(Error::new(ErrorKind::UnknownDiscriminator { id }));
                        }
                    }
                }
                _ => {
                    cx.input().rewind(checkpoint);
                    return Ok(None);
                }
            }
        }
    }

    fn is_discriminator(&self, cx: &ReadContext<'_, '_>, name: &str) -> bool {
        cx.registry()
            .get(cx.frame().ty)
            .polymorphism
            .as_ref()
            .and_then(|r| r.discriminator())
            .is_some_and(|d| d == name)
    }

    /// Metadata is settled: allocate the instance (slot construction) and
    /// bind any `$id` before the first property is read, so forward and
    /// cyclic `$ref`s inside the subtree resolve to this allocation.
    fn begin_members(&self, cx: &mut ReadContext<'_, '_>) -> Result<()> {
        let layout = cx
            .registry()
            .get(cx.tag())
            .layout()
            .unwrap_or_else(|| unreachable!("object converter on non-object tag"));
        match layout.ctor {
            Ctor::Slots => {
                let instance = cx.registry().instantiate(cx.tag())?;
                let value = Value::object(instance);
                if let Some(id) = cx.frame_mut().pending_id.take() {
                    cx.refs_mut().register(&id, value.clone())?;
                }
                cx.frame_mut().instance = Some(value);
            }
            Ctor::Parameterized { .. } => {
                if cx.frame().pending_id.is_some() {
                    return Err(Error::new(ErrorKind::RefMetadata {
                        message:
                            "cannot preserve a reference to a type with a parameterized constructor"
                                .to_owned(),
                    }));
                }
            }
        }
        cx.frame_mut().phase = ReadPhase::Members;
        Ok(())
    }

    fn read_members(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        let layout = cx
            .registry()
            .get(cx.tag())
            .layout()
            .unwrap_or_else(|| unreachable!("object converter on non-object tag"));
        let slot_constructed = matches!(layout.ctor, Ctor::Slots);
        loop {
            // Finish skipping an unknown property's subtree first.
            if cx.frame().skipping {
                let target = cx.frame().skip_depth;
                loop {
                    let token = match cx.input().next()? {
                        Step::Done(token) => token,
                        Step::Suspended => return Ok(Step::Suspended),
                    };
                    if cx.input().depth() == target && !matches!(token, Token::PropertyName(_)) {
                        break;
                    }
                }
                cx.frame_mut().skipping = false;
                cx.frame_mut().current_name = None;
            }
            // A member value in progress resumes before anything else.
            if let Some(slot) = cx.frame().pending_slot {
                let prop = &layout.properties[slot];
                match cx.read_child(prop.declared)? {
                    Step::Done(value) => {
                        if slot_constructed {
                            let instance = cx.frame().instance.clone();
                            match instance {
                                Some(Value::Object(obj)) => {
                                    (prop.set)(&mut obj.borrow_mut(), value);
                                }
                                _ => unreachable!("slot-constructed frame missing instance"),
                            }
                        } else {
                            cx.frame_mut().ctor_args.push((slot, value));
                        }
                        cx.frame_mut().pending_slot = None;
                        cx.frame_mut().current_name = None;
                    }
                    Step::Suspended => return Ok(Step::Suspended),
                }
                continue;
            }
            let token = match cx.input().next()? {
                Step::Done(token) => token,
                Step::Suspended => return Ok(Step::Suspended),
            };
            match token {
                Token::EndObject => {
                    if slot_constructed {
                        match cx.frame_mut().instance.take() {
                            Some(value) => return Ok(Step::Done(value)),
                            None => unreachable!("slot-constructed frame missing instance"),
                        }
                    }
                    let mut instance = cx.registry().instantiate(cx.tag())?;
                    for (slot, value) in cx.frame_mut().ctor_args.drain(..) {
                        instance.set_slot(slot, value);
                    }
                    return Ok(Step::Done(Value::object(instance)));
                }
                Token::PropertyName(name) => {
                    if cx.ref_mode() == RefMode::Preserve && (name == "$id" || name == "$ref") {
                        return Err(Error::new(ErrorKind::RefMetadata {
                            message: format!("{name} must precede all regular members"),
                        }));
                    }
                    match layout.property(&name) {
                        Some((slot, _)) => {
                            cx.frame_mut().pending_slot = Some(slot);
                            cx.frame_mut().current_name = Some(name);
                        }
                        None => {
                            // Unknown properties are skipped, resumably.
                            let depth = cx.input().depth();
                            let frame = cx.frame_mut();
                            frame.current_name = Some(name);
                            frame.skipping = true;
                            frame.skip_depth = depth;
                        }
                    }
                }
                other => {
                    return Err(Error::new(ErrorKind::UnexpectedToken {
                        got: other.kind_name(),
                        expected: "property name or end of object",
                    }));
                }
            }
        }
    }
}
