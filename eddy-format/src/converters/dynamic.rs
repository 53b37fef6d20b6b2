//! Dynamic (`any`) conversion: shape follows the runtime value.

use eddy_core::{Value, ANY_ARRAY};

use crate::converters::{Converter, ReadContext, WriteContext};
use crate::cursor::{Step, Token};
use crate::error::{Error, ErrorKind, Result};

/// Converter for the dynamic type. Scalars are handled in place; arrays
/// and objects retarget the frame to the runtime tag and delegate, so a
/// resumed call dispatches straight to the delegated converter.
pub(crate) struct DynamicConverter;

impl Converter for DynamicConverter {
    fn trusted(&self) -> bool {
        true
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>> {
        match value {
            Value::Null => cx.out().null(),
            Value::Bool(v) => cx.out().bool(*v),
            Value::I64(v) => cx.out().i64(*v),
            Value::U64(v) => cx.out().u64(*v),
            Value::F64(v) => cx.out().f64(*v),
            Value::Str(v) => cx.out().str(v),
            Value::Array(_) => return cx.delegate(ANY_ARRAY, value),
            Value::Object(obj) => {
                let ty = obj.borrow().ty();
                return cx.delegate(ty, value);
            }
            Value::Stream(_) => {
                return Err(Error::new(ErrorKind::TypeMismatch {
                    expected: "a statically declared stream type",
                    got: "stream",
                }));
            }
        }
        Ok(Step::Done(()))
    }

    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        let checkpoint = cx.input().checkpoint();
        let token = match cx.input().next()? {
            Step::Done(token) => token,
            Step::Suspended => return Ok(Step::Suspended),
        };
        let value = match token {
            Token::Null => Value::Null,
            Token::Bool(v) => Value::Bool(v),
            Token::I64(v) => Value::I64(v),
            Token::U64(v) => Value::U64(v),
            Token::F64(v) => Value::F64(v),
            Token::Str(v) => Value::Str(v),
            Token::StartArray => {
                cx.input().rewind(checkpoint);
                return cx.delegate(ANY_ARRAY);
            }
            Token::StartObject => {
                // Objects carry no type information of their own on the
                // wire unless a declared polymorphic base provides it, so
                // a dynamic slot cannot reconstruct them.
                return Err(Error::new(ErrorKind::TypeMismatch {
                    expected: "scalar or array",
                    got: "start of object",
                }));
            }
            other => {
                return Err(Error::new(ErrorKind::UnexpectedToken {
                    got: other.kind_name(),
                    expected: "a value",
                }));
            }
        };
        Ok(Step::Done(value))
    }
}
