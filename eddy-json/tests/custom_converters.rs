//! User-registered converters and the validation applied around them.

use std::sync::Arc;

use eddy_core::{TypeRegistry, TypeTag, Value, I64};
use eddy_format::{
    Converter, Error, ErrorKind, Options, ReadContext, Step, Strategy, Token, WriteContext,
};
use eddy_json::{from_str, to_string};

fn point_registry() -> (TypeRegistry, TypeTag) {
    let mut reg = TypeRegistry::new();
    let point = reg
        .object("Point")
        .property("x", I64)
        .property("y", I64)
        .build()
        .unwrap();
    (reg, point)
}

fn point(reg: &TypeRegistry, ty: TypeTag, x: i64, y: i64) -> Value {
    let mut inst = reg.instantiate(ty).unwrap();
    inst.set_slot(0, Value::I64(x));
    inst.set_slot(1, Value::I64(y));
    Value::object(inst)
}

/// Writes a point as a compact `"x,y"` string.
struct CompactPointConverter;

impl Converter for CompactPointConverter {
    fn strategy(&self) -> Strategy {
        Strategy::Scalar
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> eddy_format::Result<Step<()>> {
        let obj = value.as_object().ok_or_else(|| {
            Error::new(ErrorKind::TypeMismatch {
                expected: "object",
                got: value.kind_name(),
            })
        })?;
        let (x, y) = {
            let inst = obj.borrow();
            (inst.slot(0).as_i64(), inst.slot(1).as_i64())
        };
        let (Some(x), Some(y)) = (x, y) else {
            return Err(Error::new(ErrorKind::TypeMismatch {
                expected: "number",
                got: "null",
            }));
        };
        cx.out().str(&format!("{x},{y}"));
        Ok(Step::Done(()))
    }

    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> eddy_format::Result<Step<Value>> {
        let text = match cx.input().next()? {
            Step::Done(Token::Str(text)) => text,
            Step::Done(other) => {
                return Err(Error::new(ErrorKind::UnexpectedToken {
                    got: other.kind_name(),
                    expected: "string",
                }));
            }
            Step::Suspended => return Ok(Step::Suspended),
        };
        let mut parts = text.splitn(2, ',');
        let parse = |part: Option<&str>| {
            part.and_then(|p| p.parse::<i64>().ok()).ok_or_else(|| {
                Error::new(ErrorKind::Syntax {
                    message: format!("malformed point `{text}`"),
                })
            })
        };
        let x = parse(parts.next())?;
        let y = parse(parts.next())?;
        let mut inst = cx.registry().instantiate(cx.tag())?;
        inst.set_slot(0, Value::I64(x));
        inst.set_slot(1, Value::I64(y));
        Ok(Step::Done(Value::object(inst)))
    }
}

/// Opens an object and never closes it.
struct UnbalancedConverter;

impl Converter for UnbalancedConverter {
    fn try_write(&self, cx: &mut WriteContext<'_, '_>, _value: &Value) -> eddy_format::Result<Step<()>> {
        cx.out().start_object();
        Ok(Step::Done(()))
    }

    fn try_read(&self, _cx: &mut ReadContext<'_, '_>) -> eddy_format::Result<Step<Value>> {
        Ok(Step::Done(Value::Null))
    }
}

#[test]
fn custom_converter_overrides_the_builtin() {
    let (reg, ty) = point_registry();
    let value = point(&reg, ty, 3, -4);
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(CompactPointConverter))
        .unwrap();

    let text = to_string(&options, ty, value.clone()).unwrap();
    assert_eq!(text, r#""3,-4""#);
    let back = from_str(&options, ty, &text).unwrap();
    assert!(back.deep_eq(&value));
}

#[test]
fn custom_converters_see_members_not_nulls() {
    let (reg, ty) = point_registry();
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(CompactPointConverter))
        .unwrap();

    // Null is handled centrally; the converter is never called for it.
    assert_eq!(to_string(&options, ty, Value::Null).unwrap(), "null");
    assert!(from_str(&options, ty, "null").unwrap().deep_eq(&Value::Null));
}

/// Reads its own string, then greedily consumes the sibling value too.
struct GreedyPointConverter;

impl Converter for GreedyPointConverter {
    fn strategy(&self) -> Strategy {
        Strategy::Scalar
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, _value: &Value) -> eddy_format::Result<Step<()>> {
        cx.out().str("0,0");
        Ok(Step::Done(()))
    }

    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> eddy_format::Result<Step<Value>> {
        let text = match cx.input().next()? {
            Step::Done(Token::Str(text)) => text,
            _ => {
                return Err(Error::new(ErrorKind::UnexpectedToken {
                    got: "token",
                    expected: "string",
                }));
            }
        };
        // Overreach: swallow the next whole value as well.
        cx.input().next()?;
        cx.input().next()?;
        let mut parts = text.splitn(2, ',');
        let x = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let y = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let mut inst = cx.registry().instantiate(cx.tag())?;
        inst.set_slot(0, Value::I64(x));
        inst.set_slot(1, Value::I64(y));
        Ok(Step::Done(Value::object(inst)))
    }
}

/// Declares itself scalar but emits a whole (balanced) object.
struct ObjectPosingAsScalar;

impl Converter for ObjectPosingAsScalar {
    fn strategy(&self) -> Strategy {
        Strategy::Scalar
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, _value: &Value) -> eddy_format::Result<Step<()>> {
        cx.out().start_object();
        cx.out().end_object();
        Ok(Step::Done(()))
    }

    fn try_read(&self, _cx: &mut ReadContext<'_, '_>) -> eddy_format::Result<Step<Value>> {
        Ok(Step::Done(Value::Null))
    }
}

#[test]
fn unbalanced_custom_output_is_rejected() {
    let (reg, ty) = point_registry();
    let value = point(&reg, ty, 1, 2);
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(UnbalancedConverter))
        .unwrap();

    let err = to_string(&options, ty, value).unwrap_err();
    assert_eq!(err.code(), "converter_depth_mismatch");
}

#[test]
fn scalar_converter_consuming_a_sibling_is_rejected() {
    let (mut reg, ty) = point_registry();
    let points = reg.array("Point[]", ty).unwrap();
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(GreedyPointConverter))
        .unwrap();

    // The sibling value swallowed by the converter is a balanced array,
    // so the cursor depth alone looks right; the token-kind check is what
    // rejects it.
    let err = from_str(&options, points, r#"["1,1",[]]"#).unwrap_err();
    assert_eq!(err.code(), "converter_depth_mismatch");
}

#[test]
fn scalar_converter_emitting_a_container_is_rejected() {
    let (reg, ty) = point_registry();
    let value = point(&reg, ty, 1, 2);
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(ObjectPosingAsScalar))
        .unwrap();

    let err = to_string(&options, ty, value).unwrap_err();
    assert_eq!(err.code(), "converter_depth_mismatch");
}

#[test]
fn converter_registration_is_rejected_after_sealing() {
    let (reg, ty) = point_registry();
    let value = point(&reg, ty, 1, 2);
    let mut options = Options::new(reg);
    to_string(&options, ty, value).unwrap();
    assert!(options
        .set_converter(ty, Arc::new(CompactPointConverter))
        .is_err());
}

#[test]
fn custom_converters_apply_to_nested_members() {
    let (mut reg, ty) = point_registry();
    let holder = reg.object("Segment").property("a", ty).property("b", ty).build().unwrap();
    let mut inst = reg.instantiate(holder).unwrap();
    inst.set_slot(0, point(&reg, ty, 0, 0));
    inst.set_slot(1, point(&reg, ty, 2, 2));
    let value = Value::object(inst);
    let mut options = Options::new(reg);
    options
        .set_converter(ty, Arc::new(CompactPointConverter))
        .unwrap();

    let text = to_string(&options, holder, value.clone()).unwrap();
    assert_eq!(text, r#"{"a":"0,0","b":"2,2"}"#);
    let back = from_str(&options, holder, &text).unwrap();
    assert!(back.deep_eq(&value));
}
