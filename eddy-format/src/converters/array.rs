//! Array conversion, including the preserve-mode `$values` envelope.

use eddy_core::{TypeKind, TypeTag, Value};

use crate::converters::{Converter, ReadContext, WriteContext};
use crate::cursor::{Step, Token};
use crate::error::{Error, ErrorKind, Result};
use crate::refs::RefMode;
use crate::stack::ReadPhase;

/// Converter for array types. In preserve mode a shared array cannot
/// carry `$id` directly (JSON arrays have no members), so the payload is
/// wrapped: `{"$id": "1", "$values": [..]}` and later occurrences become
/// `{"$ref": "1"}`.
pub(crate) struct ArrayConverter;

fn element_of(cx_tag: TypeTag, registry: &eddy_core::TypeRegistry) -> TypeTag {
    match registry.get(cx_tag).kind {
        TypeKind::Array { element } => element,
        _ => unreachable!("array converter on non-array tag"),
    }
}

impl Converter for ArrayConverter {
    fn trusted(&self) -> bool {
        true
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>> {
        let Value::Array(arr) = value else {
            return Err(Error::new(ErrorKind::TypeMismatch {
                expected: "array",
                got: value.kind_name(),
            }));
        };
        if !cx.opened() {
            if cx.frame().pending_ref_id.is_some() {
                cx.out().start_object();
                cx.emit_metadata();
                cx.out().property_name("$values");
                cx.out().start_array();
                cx.frame_mut().wrapped = true;
            } else {
                cx.out().start_array();
            }
            cx.mark_opened();
        }
        let element = element_of(cx.tag(), cx.registry());
        loop {
            let i = cx.frame().elem_index;
            let child = match arr.borrow().get(i) {
                Some(child) => child.clone(),
                None => break,
            };
            if cx.should_flush() {
                return Ok(Step::Suspended);
            }
            match cx.write_child(element, &child)? {
                Step::Done(()) => cx.frame_mut().elem_index = i + 1,
                Step::Suspended => return Ok(Step::Suspended),
            }
        }
        cx.out().end_array();
        if cx.frame().wrapped {
            cx.out().end_object();
        }
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
                    match token {
                        Token::StartArray => {
                            cx.frame_mut().instance = Some(Value::array(Vec::new()));
                            cx.frame_mut().phase = ReadPhase::Members;
                        }
                        Token::StartObject if cx.ref_mode() == RefMode::Preserve => {
                            cx.frame_mut().phase = ReadPhase::Meta;
                        }
                        other => {
                            return Err(Error::new(ErrorKind::UnexpectedToken {
                                got: other.kind_name(),
                                expected: "start of array",
                            }));
                        }
                    }
                }
                ReadPhase::Meta => {
                    if let Some(resolved) = self.read_envelope(cx)? {
                        return Ok(resolved);
                    }
                }
                ReadPhase::Members => return self.read_elements(cx),
            }
        }
    }
}

impl ArrayConverter {
    /// Inside a preserve-mode envelope object: either `$ref` (the whole
    /// value collapses to a known array) or `$id` followed by `$values`.
    /// Probes are atomic, as in the object converter.
    fn read_envelope(&self, cx: &mut ReadContext<'_, '_>) -> Result<Option<Step<Value>>> {
        loop {
            let checkpoint = cx.input().checkpoint();
            let token = match cx.input().next()? {
                Step::Done(token) => token,
                Step::Suspended => return Ok(Some(Step::Suspended)),
            };
            match token {
                Token::PropertyName(name) if name == "$ref" => {
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
                    if !matches!(value, Value::Array(_)) {
                        return Err(Error::new(ErrorKind::RefMetadata {
                            message: format!("$ref `{id}` does not resolve to an array"),
                        }));
                    }
                    return Ok(Some(Step::Done(value)));
                }
                Token::PropertyName(name) if name == "$id" => {
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
                Token::PropertyName(name) if name == "$values" => {
                    match cx.input().next()? {
                        Step::Done(Token::StartArray) => {}
                        Step::Done(other) => {
                            return Err(Error::new(ErrorKind::UnexpectedToken {
                                got: other.kind_name(),
                                expected: "start of array after $values",
                            }));
                        }
                        Step::Suspended => {
                            cx.input().rewind(checkpoint);
                            return Ok(Some(Step::Suspended));
                        }
                    }
                    let value = Value::array(Vec::new());
                    if let Some(id) = cx.frame_mut().pending_id.take() {
                        cx.refs_mut().register(&id, value.clone())?;
                    }
                    let frame = cx.frame_mut();
                    frame.instance = Some(value);
                    frame.values_wrapper = true;
                    frame.phase = ReadPhase::Members;
                    return Ok(None);
                }
                other => {
                    return Err(Error::new(ErrorKind::RefMetadata {
                        message: format!(
                            "expected $values in a preserved array envelope, found {}",
                            other.kind_name()
                        ),
                    }));
                }
            }
        }
    }

    fn read_elements(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        let element = element_of(cx.tag(), cx.registry());
        loop {
            if cx.frame().elem_pending {
                match cx.read_child(element)? {
                    Step::Done(value) => {
                        let frame = cx.frame();
                        match &frame.instance {
                            Some(Value::Array(arr)) => arr.borrow_mut().push(value),
                            _ => unreachable!("array frame missing allocation"),
                        }
                        let frame = cx.frame_mut();
                        frame.elem_index += 1;
                        frame.elem_pending = false;
                    }
                    Step::Suspended => return Ok(Step::Suspended),
                }
                continue;
            }
            let checkpoint = cx.input().checkpoint();
            let token = match cx.input().next()? {
                Step::Done(token) => token,
                Step::Suspended => return Ok(Step::Suspended),
            };
            match token {
                Token::EndArray => {
                    if cx.frame().values_wrapper {
                        match cx.input().next()? {
                            Step::Done(Token::EndObject) => {}
                            Step::Done(other) => {
                                return Err(Error::new(ErrorKind::UnexpectedToken {
                                    got: other.kind_name(),
                                    expected: "end of object after $values array",
                                }));
                            }
                            Step::Suspended => {
                                cx.input().rewind(checkpoint);
                                return Ok(Step::Suspended);
                            }
                        }
                    }
                    match cx.frame_mut().instance.take() {
                        Some(value) => return Ok(Step::Done(value)),
                        None => unreachable!("array frame missing allocation"),
                    }
                }
                _ => {
                    // An element follows: rewind so its converter sees its
                    // own first token.
                    cx.input().rewind(checkpoint);
                    cx.frame_mut().elem_pending = true;
                }
            }
        }
    }
}
