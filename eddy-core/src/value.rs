//! The dynamic value graph.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::stream::ValueStream;
use crate::ty::TypeTag;

/// Shared handle to an object instance. Identity-bearing.
pub type ObjectRef = Rc<RefCell<Instance>>;

/// Shared handle to an array. Identity-bearing.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to an externally driven value stream. Identity-bearing,
/// write-only (streams cannot be deserialized).
pub type StreamRef = Rc<RefCell<dyn ValueStream>>;

/// A value flowing through the engine.
#[derive(Clone)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Signed integer.
    I64(i64),
    /// Unsigned integer.
    U64(u64),
    /// Floating-point number.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Array of values.
    Array(ArrayRef),
    /// Typed object instance.
    Object(ObjectRef),
    /// Externally driven asynchronous-enumerable source.
    Stream(StreamRef),
}

impl Value {
    /// Wrap an instance into a shared object value.
    pub fn object(instance: Instance) -> Self {
        Value::Object(Rc::new(RefCell::new(instance)))
    }

    /// Wrap a vector into a shared array value.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Wrap a stream source into a shared stream value.
    pub fn stream<S: ValueStream + 'static>(stream: S) -> Self {
        Value::Stream(Rc::new(RefCell::new(stream)))
    }

    /// Stable identity of this value for reference tracking, or `None` for
    /// scalars. Identity is the shared allocation's address, so two clones
    /// of the same `Rc` report the same identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(Rc::as_ptr(a) as usize),
            Value::Object(o) => Some(Rc::as_ptr(o) as usize),
            Value::Stream(s) => Some(Rc::as_ptr(s) as *const () as usize),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Stream(_) => "stream",
        }
    }

    /// Borrow the object instance, if this is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow the array, if this is an array.
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload widened to i64, if this is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            Value::U64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Structural deep equality. Objects compare by type tag and slots,
    /// arrays element-wise; streams compare by identity only.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.ty() == b.ty()
                    && a.slots.len() == b.slots.len()
                    && a.slots.iter().zip(b.slots.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Stream(a), Value::Stream(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::U64(v) => write!(f, "U64({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Array(v) => f.debug_tuple("Array").field(&v.borrow()).finish(),
            Value::Object(v) => f.debug_tuple("Object").field(&v.borrow()).finish(),
            Value::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A typed object instance: a type tag plus one slot per declared property
/// of the concrete type.
#[derive(Debug, Clone)]
pub struct Instance {
    ty: TypeTag,
    pub(crate) slots: Vec<Value>,
}

impl Instance {
    /// Create an instance with all slots `Null`.
    pub fn new(ty: TypeTag, slot_count: usize) -> Self {
        Instance {
            ty,
            slots: vec![Value::Null; slot_count],
        }
    }

    /// The concrete runtime type of this instance.
    pub fn ty(&self) -> TypeTag {
        self.ty
    }

    /// Read a slot by index. Panics on out-of-range, which indicates
    /// metadata/instance disagreement (a registration bug, not bad input).
    pub fn slot(&self, index: usize) -> &Value {
        &self.slots[index]
    }

    /// Overwrite a slot by index.
    pub fn set_slot(&mut self, index: usize, value: Value) {
        self.slots[index] = value;
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
