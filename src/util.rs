//! Small, order-sensitive helpers reused by the combinators: thunk
//! resolution, key access, invocation of resolved functions, settlement
//! observation and polling.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::options::{PollOptions, RetryOptions};
use crate::timing::attach_timers;
use crate::{Error, Function, Promise, Value};

/// Resolves `value`; when it resolves to a function, invokes it with no
/// arguments and resolves its result instead.
pub fn resolve_promise(value: impl Into<Value>) -> Promise {
    Promise::resolve(value).then(|value| async move {
        match value {
            Value::Function(function) => function.call(Vec::new()).await,
            value => Ok(value),
        }
    })
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn lookup(result: &Value, key: &Value) -> Option<Value> {
    match result {
        Value::Object(object) => object.get(&key_name(key)),
        Value::List(items) => {
            let index = match key {
                Value::Number(_) => key.as_index(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }?;
            items.get(index).cloned()
        }
        _ => None,
    }
}

/// Reads `key` from the awaited `value`. `key` may itself be a promise.
///
/// # Errors
/// [`Error::NotObject`] when `value` is neither an object nor a list,
/// [`Error::KeyNotFound`] when the key is absent.
pub async fn get(value: impl Into<Value>, key: impl Into<Value>) -> Result<Value, Error> {
    let result = Promise::resolve(value).await?;
    let key = Promise::resolve(key).await?;
    if !matches!(result, Value::Object(_) | Value::List(_)) {
        return Err(Error::NotObject { operation: "get", result });
    }
    match lookup(&result, &key) {
        Some(found) => Ok(found),
        None => Err(Error::KeyNotFound { key: key_name(&key), result }),
    }
}

/// Key names of the awaited object, in insertion order. Lists yield their
/// indices.
pub async fn keys(value: impl Into<Value>) -> Result<Vec<String>, Error> {
    match Promise::resolve(value).await? {
        Value::Object(object) => Ok(object.keys()),
        Value::List(items) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
        result => Err(Error::NotObject { operation: "keys", result }),
    }
}

fn callable(operation: &'static str, result: Value, args: &[Value]) -> Result<Function, Error> {
    match result {
        Value::Function(function) => Ok(function),
        result => Err(Error::Callable { operation, result, args: args.to_vec() }),
    }
}

/// Calls the awaited function with `this` and `args`.
pub async fn call(value: impl Into<Value>, this: Value, args: Vec<Value>) -> Result<Value, Error> {
    let result = Promise::resolve(value).await?;
    callable("call", result, &args)?.invoke(this, args).await
}

/// Like [`call`], with the arguments given as one list value.
pub async fn apply(value: impl Into<Value>, this: Value, args: Value) -> Result<Value, Error> {
    let args = match args {
        Value::List(items) => items,
        Value::Undefined => Vec::new(),
        other => {
            return Err(Error::invalid_argument(
                "apply",
                format!("arguments must be a list, got {}", other.type_name()),
            ))
        }
    };
    let result = Promise::resolve(value).await?;
    callable("apply", result, &args)?.invoke(this, args).await
}

/// Calls the awaited function with `args` and no `this`.
pub async fn exec(value: impl Into<Value>, args: Vec<Value>) -> Result<Value, Error> {
    let result = Promise::resolve(value).await?;
    callable("exec", result, &args)?.call(args).await
}

/// Calls the function stored under `attr` of the awaited object, with the
/// object as `this`.
pub async fn call_attr(
    value: impl Into<Value>,
    attr: impl Into<Value>,
    args: Vec<Value>,
) -> Result<Value, Error> {
    let object = Promise::resolve(value).await?;
    let member = get(object.clone(), attr).await?;
    callable("callAttr", member, &args)?.invoke(object, args).await
}

pub async fn apply_attr(
    value: impl Into<Value>,
    attr: impl Into<Value>,
    args: Value,
) -> Result<Value, Error> {
    let args = match args {
        Value::List(items) => items,
        Value::Undefined => Vec::new(),
        other => {
            return Err(Error::invalid_argument(
                "applyAttr",
                format!("arguments must be a list, got {}", other.type_name()),
            ))
        }
    };
    let object = Promise::resolve(value).await?;
    let member = get(object.clone(), attr).await?;
    callable("applyAttr", member, &args)?.invoke(object, args).await
}

/// Observes the settlement of `promise` without altering it. Callback results
/// are discarded, but a failing callback replaces the settlement.
pub fn tap(promise: Promise, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
    Promise::from_future(async move {
        match promise.await {
            Ok(value) => {
                if let Some(callback) = on_fulfilled {
                    callback.call(vec![value.clone()]).await?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Some(callback) = on_rejected {
                    callback.call(vec![err.clone().into()]).await?;
                }
                Err(err)
            }
        }
    })
}

/// Polls `obj` for `key`, waiting `interval` between polls. `obj` is resolved
/// once; only [`Error::KeyNotFound`] is retried.
///
/// # Errors
/// [`Error::MaxIterations`] after the initial check plus `max_iterations`
/// polls all miss.
pub async fn wait_for_key(
    obj: impl Into<Value>,
    key: impl Into<Value>,
    options: PollOptions,
) -> Result<Value, Error> {
    let target = resolve_promise(obj).await?;
    let key = Promise::resolve(key).await?;
    let mut remaining = options.max_iterations;
    loop {
        match get(target.clone(), key.clone()).await {
            Err(Error::KeyNotFound { .. }) => {
                if remaining == 0 {
                    debug!(key = %key, iterations = options.max_iterations, "waitForKey gave up");
                    return Err(Error::MaxIterations {
                        operation: "waitForKey",
                        iterations: options.max_iterations,
                    });
                }
                remaining -= 1;
                trace!(key = %key, remaining, "key not present yet");
                sleep(Duration::from_millis(options.interval)).await;
            }
            found => return found,
        }
    }
}

/// Invokes `function` with `args` until it produces a value other than
/// `Undefined`, waiting `interval` between attempts. Failed attempts count
/// against the same budget when `retry` is set and are returned otherwise.
///
/// `args` may be a list, a single value, or `Undefined` for no arguments;
/// promises among them are resolved once up front.
pub async fn wait_for_result(
    function: impl Into<Value>,
    options: RetryOptions,
    args: impl Into<Value>,
) -> Result<Value, Error> {
    options.timers.validate()?;
    let args = match args.into() {
        Value::List(items) => items,
        Value::Undefined => Vec::new(),
        single => vec![single],
    };
    let args = match Promise::all(args).await? {
        Value::List(items) => items,
        _ => Vec::new(),
    };
    let function = Promise::resolve(function).await?;
    let function = callable("waitForResult", function, &args)?;

    let mut remaining = options.poll.max_iterations;
    loop {
        match attach_timers(function.call(args.clone()), options.timers)?.await {
            Ok(value) if !value.is_undefined() => return Ok(value),
            Ok(_) => trace!(remaining, "no result yet"),
            Err(err) if !options.retry => return Err(err),
            Err(err) => debug!(error = %err, remaining, "attempt failed, retrying"),
        }
        if remaining == 0 {
            return Err(Error::MaxIterations {
                operation: "waitForResult",
                iterations: options.poll.max_iterations,
            });
        }
        remaining -= 1;
        sleep(Duration::from_millis(options.poll.interval)).await;
    }
}

impl Promise {
    pub fn get(self, key: impl Into<Value>) -> Promise {
        let key = key.into();
        Promise::from_future(get(self, key))
    }

    pub fn keys(self) -> Promise {
        Promise::from_future(async move {
            let keys = keys(self).await?;
            Ok(keys.into_iter().map(Value::from).collect())
        })
    }

    pub fn call(self, this: Value, args: Vec<Value>) -> Promise {
        Promise::from_future(call(self, this, args))
    }

    pub fn apply(self, this: Value, args: Value) -> Promise {
        Promise::from_future(apply(self, this, args))
    }

    pub fn exec(self, args: Vec<Value>) -> Promise {
        Promise::from_future(exec(self, args))
    }

    /// Runs `f` on the fulfilled value for its side effects. An error returned
    /// by `f` replaces the fulfilment.
    pub fn tap<F>(self, f: F) -> Promise
    where
        F: FnOnce(&Value) -> Result<(), Error> + Send + 'static,
    {
        self.then(|value| async move { f(&value).map(|()| value) })
    }

    /// Runs `f` on the rejection for its side effects. An error returned by
    /// `f` replaces the original rejection.
    pub fn tap_err<F>(self, f: F) -> Promise
    where
        F: FnOnce(&Error) -> Result<(), Error> + Send + 'static,
    {
        self.catch(|err| async move {
            f(&err)?;
            Err(err)
        })
    }
}
