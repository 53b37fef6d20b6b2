//! Leaf value conversion.

use eddy_core::{ScalarKind, Value};

use crate::converters::{Converter, ReadContext, Strategy, WriteContext};
use crate::cursor::{Step, Token};
use crate::error::{Error, ErrorKind, Result};

/// Converter for the scalar leaf types. One token in, one token out;
/// numeric tokens are widened where the widening is lossless.
pub(crate) struct ScalarConverter(pub ScalarKind);

fn mismatch(expected: &'static str, got: &'static str) -> Error {
    Error::new(ErrorKind::TypeMismatch { expected, got })
}

impl Converter for ScalarConverter {
    fn strategy(&self) -> Strategy {
        Strategy::Scalar
    }

    fn trusted(&self) -> bool {
        true
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>> {
        let out = cx.out();
        match (self.0, value) {
            (ScalarKind::Bool, Value::Bool(v)) => out.bool(*v),
            (ScalarKind::I64, Value::I64(v)) => out.i64(*v),
            (ScalarKind::I64, Value::U64(v)) => match i64::try_from(*v) {
                Ok(v) => out.i64(v),
                Err(_) => return Err(mismatch("i64", "u64 out of range")),
            },
            (ScalarKind::U64, Value::U64(v)) => out.u64(*v),
            (ScalarKind::U64, Value::I64(v)) => match u64::try_from(*v) {
                Ok(v) => out.u64(v),
                Err(_) => return Err(mismatch("u64", "negative integer")),
            },
            (ScalarKind::F64, Value::F64(v)) => out.f64(*v),
            (ScalarKind::F64, Value::I64(v)) => out.f64(*v as f64),
            (ScalarKind::F64, Value::U64(v)) => out.f64(*v as f64),
            (ScalarKind::String, Value::Str(v)) => out.str(v),
            (kind, other) => return Err(mismatch(kind_name(kind), other.kind_name())),
        }
        Ok(Step::Done(()))
    }

    fn try_read(&self, cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        let token = match cx.input().next()? {
            Step::Done(token) => token,
            Step::Suspended => return Ok(Step::Suspended),
        };
        let value = match (self.0, token) {
            (ScalarKind::Bool, Token::Bool(v)) => Value::Bool(v),
            (ScalarKind::I64, Token::I64(v)) => Value::I64(v),
            (ScalarKind::I64, Token::U64(v)) => match i64::try_from(v) {
                Ok(v) => Value::I64(v),
                Err(_) => return Err(mismatch("i64", "number out of range")),
            },
            (ScalarKind::U64, Token::U64(v)) => Value::U64(v),
            (ScalarKind::U64, Token::I64(v)) => match u64::try_from(v) {
                Ok(v) => Value::U64(v),
                Err(_) => return Err(mismatch("u64", "negative number")),
            },
            (ScalarKind::F64, Token::F64(v)) => Value::F64(v),
            (ScalarKind::F64, Token::I64(v)) => Value::F64(v as f64),
            (ScalarKind::F64, Token::U64(v)) => Value::F64(v as f64),
            (ScalarKind::String, Token::Str(v)) => Value::Str(v),
            (kind, other) => return Err(mismatch(kind_name(kind), other.kind_name())),
        };
        Ok(Step::Done(value))
    }
}

fn kind_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Bool => "bool",
        ScalarKind::I64 => "i64",
        ScalarKind::U64 => "u64",
        ScalarKind::F64 => "f64",
        ScalarKind::String => "string",
    }
}
