//! The Value type - the leaves and nodes of a store model.
//!
//! A store model is an explicit tagged union rather than duck-typed data, so
//! the walker's leaf/interior decision is a `match`:
//!
//! - `Map` with at least one key is an interior node and is walked.
//! - `Detached`, `Array`, an empty `Map` and every primitive are leaves.
//! - `Function`, `Object` and `Undefined` are only legal inside `Detached`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Error as _, Serialize, Serializer};

use super::model::Model;
use crate::reactive::CellValue;

/// Type-erased function stored in a model.
pub type CallableFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A shared, callable value.
///
/// Equality is identity: two callables are equal only if they are clones of
/// the same allocation.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    /// Whether two handles point at the same function.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// An opaque instance of some concrete Rust type ("class instance").
#[derive(Clone)]
pub struct Instance {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wrap a value of any `Send + Sync` type.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// The concrete type's name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the instance as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two handles point at the same instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance<{}>", self.type_name)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Marks a value as non-decomposable.
///
/// The walker never looks inside a `DetachedValue`; the cell builder unwraps
/// it and stores the inner value as a single cell. Use it for functions,
/// class instances, `undefined`, or a map that should stay one value.
///
/// Equality is reference-based. Compare `value()` explicitly to compare the
/// wrapped contents.
pub struct DetachedValue<T> {
    value: Arc<T>,
}

impl<T> DetachedValue<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// Borrow the wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether two wrappers are the same wrapper.
    pub fn ptr_eq(&self, other: &DetachedValue<T>) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T: Clone> DetachedValue<T> {
    /// Take the wrapped value, cloning only if the wrapper is shared.
    pub fn into_inner(self) -> T {
        Arc::try_unwrap(self.value).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T> Clone for DetachedValue<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> PartialEq for DetachedValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for DetachedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DetachedValue").field(&*self.value).finish()
    }
}

/// A node of a store model.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// No value. Only legal inside `Detached`.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Integer too wide for `Int`.
    BigInt(i128),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered sequence; always a leaf.
    Array(Vec<Value>),
    /// Plain nested aggregate.
    Map(Model),
    /// A function. Only legal inside `Detached`.
    Function(Callable),
    /// A class instance. Only legal inside `Detached`.
    Object(Instance),
    /// A value opted out of decomposition.
    Detached(DetachedValue<Value>),
}

impl Value {
    /// Wrap a closure as a bare function value.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Function(Callable::new(f))
    }

    /// Wrap a Rust value as a bare class instance.
    pub fn object<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Value::Object(Instance::new(value))
    }

    /// Wrap anything convertible to a value in `DetachedValue`.
    pub fn detached(value: impl Into<Value>) -> Self {
        Value::Detached(DetachedValue::new(value.into()))
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Object(_) => "class instance",
            Value::Detached(_) => "detached value",
        }
    }

    /// The kind name if this value may not appear unwrapped in a model.
    pub fn requires_detaching(&self) -> Option<&'static str> {
        match self {
            Value::Undefined | Value::Function(_) | Value::Object(_) => Some(self.kind()),
            _ => None,
        }
    }

    /// Whether the walker descends into this value.
    pub fn is_interior(&self) -> bool {
        matches!(self, Value::Map(map) if !map.is_empty())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::BigInt(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(i128::from(*i)),
            Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Model> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Call the value if it is a function.
    pub fn call(&self, args: &[Value]) -> Option<Value> {
        self.as_callable().map(|f| f.call(args))
    }
}

impl CellValue for Value {
    fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    fn unwrap_detached(self) -> Self {
        match self {
            Value::Detached(inner) => inner.into_inner(),
            other => other,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::BigInt(i) => serializer.serialize_i128(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
            Value::Detached(inner) => inner.value().serialize(serializer),
            Value::Function(_) | Value::Object(_) => Err(S::Error::custom(format!(
                "a {} cannot be serialized",
                self.kind()
            ))),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::BigInt(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Model> for Value {
    fn from(map: Model) -> Self {
        Value::Map(map)
    }
}

impl From<Callable> for Value {
    fn from(f: Callable) -> Self {
        Value::Function(f)
    }
}

impl From<Instance> for Value {
    fn from(o: Instance) -> Self {
        Value::Object(o)
    }
}

impl From<DetachedValue<Value>> for Value {
    fn from(d: DetachedValue<Value>) -> Self {
        Value::Detached(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInt(i128::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
