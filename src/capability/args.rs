use serde::de::DeserializeOwned;

use crate::{Error, Function, Promise, Value};

/// Positional arguments of a dynamic capability call. Missing positions
/// read as `Undefined`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn value(&self, index: usize) -> Value {
        self.0.get(index).cloned().unwrap_or_default()
    }

    /// Everything from `index` on.
    pub fn rest(&self, index: usize) -> Vec<Value> {
        self.0.iter().skip(index).cloned().collect()
    }

    /// A copy with `first` in front, the shape of a forwarded method call.
    pub fn prepend(&self, first: impl Into<Value>) -> Self {
        Self(std::iter::once(first.into()).chain(self.0.iter().cloned()).collect())
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }

    /// A duration in milliseconds, `default` when absent.
    pub fn millis(&self, operation: &'static str, index: usize, default: u64) -> Result<u64, Error> {
        match self.value(index) {
            Value::Undefined => Ok(default),
            value => value.as_millis().ok_or_else(|| {
                Error::invalid_argument(
                    operation,
                    format!("argument {index} must be a duration, got {}", value.type_name()),
                )
            }),
        }
    }

    pub fn flag(&self, index: usize) -> bool {
        self.value(index).is_truthy()
    }

    pub fn function(&self, operation: &'static str, index: usize) -> Result<Function, Error> {
        match self.value(index) {
            Value::Function(function) => Ok(function),
            value => Err(Error::invalid_argument(
                operation,
                format!("argument {index} must be a function, got {}", value.type_name()),
            )),
        }
    }

    pub fn optional_function(&self, index: usize) -> Option<Function> {
        self.value(index).as_function().cloned()
    }

    /// Reads an options object at `index` with serde; absent or `Undefined`
    /// yields the defaults.
    pub fn options<T>(&self, operation: &'static str, index: usize) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        match self.value(index) {
            Value::Undefined | Value::Null => Ok(T::default()),
            value @ Value::Object(_) => serde_json::from_value(value.to_json())
                .map_err(|err| Error::invalid_argument(operation, format!("invalid options: {err}"))),
            value => Err(Error::invalid_argument(
                operation,
                format!("argument {index} must be an options object, got {}", value.type_name()),
            )),
        }
    }

    /// The argument at `index` as a promise.
    pub fn promise(&self, index: usize) -> Promise {
        Promise::resolve(self.value(index))
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[Value; N]> for Args {
    fn from(values: [Value; N]) -> Self {
        Self(values.into())
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
