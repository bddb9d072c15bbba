use std::future::Future;

use futures::future::{join_all, try_join_all};
use tracing::{debug, trace};

use super::elements;
use crate::options::{MapOptions, SerialOptions};
use crate::timing::attach_timers;
use crate::{Error, Promise, Value};

#[derive(Clone)]
enum Slot {
    Done(Value),
    Running(Promise),
}

impl Slot {
    /// What is known about the slot right now, `Undefined` while running.
    fn snapshot(&self) -> Value {
        match self {
            Slot::Done(value) => value.clone(),
            Slot::Running(promise) => match promise.peek() {
                Some(Ok(value)) => value,
                _ => Value::Undefined,
            },
        }
    }

    async fn settle(self) -> Result<Value, Error> {
        match self {
            Slot::Done(value) => Ok(value),
            Slot::Running(promise) => promise.await,
        }
    }
}

fn snapshot(slots: &[Slot]) -> Vec<Value> {
    slots.iter().map(Slot::snapshot).collect()
}

fn map_failure(iterable: Value, index: usize, partial: Vec<Value>, cause: Error) -> Error {
    debug!(index, error = %cause, "map aborted");
    Error::Map { iterable, index, partial, cause: Box::new(cause) }
}

/// Calls `callback(element, index, iterable)` for every element and collects
/// the timer-wrapped results by position.
///
/// In parallel mode every callback is started before any is awaited, so the
/// whole map takes about as long as its slowest element. Started callbacks
/// keep running when the map fails early. In sequential mode an element only
/// starts once the previous one has settled.
///
/// With `catch_error` the first failure aborts the map with [`Error::Map`],
/// carrying its index and the results known so far; without it the failure
/// is stored as that slot's value.
///
/// # Errors
/// [`Error::Iterable`] and [`Error::TimersCoherence`] are returned unwrapped.
pub async fn map<F, Fut>(
    iterable: impl Into<Value>,
    mut callback: F,
    options: MapOptions,
) -> Result<Vec<Value>, Error>
where
    F: FnMut(Value, usize, &Value) -> Fut,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    options.timers.validate()?;
    let (iterable, items) = elements("map", iterable).await?;
    let mut slots = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let started = match Promise::resolve(item).await {
            Ok(item) => {
                let result = Promise::from_future(callback(item, index, &iterable));
                attach_timers(result, options.timers)
            }
            Err(err) => Err(err),
        };
        let outcome = match started {
            Ok(running) if options.parallel => {
                slots.push(Slot::Running(Promise::spawn(running)));
                continue;
            }
            Ok(running) => running.await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(value) => slots.push(Slot::Done(value)),
            Err(err) if options.catch_error => {
                return Err(map_failure(iterable, index, snapshot(&slots), err));
            }
            Err(err) => slots.push(Slot::Done(err.into())),
        }
    }

    if !options.catch_error {
        let settled = slots.into_iter().map(|slot| async move {
            slot.settle().await.unwrap_or_else(Value::from)
        });
        return Ok(join_all(settled).await);
    }

    trace!(slots = slots.len(), "joining map slots");
    let joined = try_join_all(slots.iter().cloned().enumerate().map(|(index, slot)| async move {
        slot.settle().await.map_err(|err| (index, err))
    }))
    .await;
    match joined {
        Ok(values) => Ok(values),
        Err((index, err)) => Err(map_failure(iterable, index, snapshot(&slots), err)),
    }
}

/// Returns the first element whose predicate result is truthy, or
/// `Undefined` when none is. Elements are tested one at a time.
///
/// With `catch_error` a failing predicate aborts with [`Error::Find`];
/// without it the element is treated as no match.
pub async fn find<F, Fut>(
    iterable: impl Into<Value>,
    mut predicate: F,
    options: SerialOptions,
) -> Result<Value, Error>
where
    F: FnMut(Value, usize, &Value) -> Fut,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    options.timers.validate()?;
    let (iterable, items) = elements("find", iterable).await?;

    for (index, item) in items.into_iter().enumerate() {
        let tested = async {
            let item = Promise::resolve(item).await?;
            let verdict = Promise::from_future(predicate(item.clone(), index, &iterable));
            let verdict = attach_timers(verdict, options.timers)?.await?;
            Ok::<_, Error>((item, verdict))
        }
        .await;
        match tested {
            Ok((item, verdict)) if verdict.is_truthy() => return Ok(item),
            Ok(_) => {}
            Err(err) if options.catch_error => {
                debug!(index, error = %err, "find aborted");
                return Err(Error::Find { iterable, index, cause: Box::new(err) });
            }
            Err(err) => trace!(index, error = %err, "find skipped a failing element"),
        }
    }
    Ok(Value::Undefined)
}

/// `true` when [`find`] returns an element.
pub async fn some<F, Fut>(
    iterable: impl Into<Value>,
    predicate: F,
    options: SerialOptions,
) -> Result<bool, Error>
where
    F: FnMut(Value, usize, &Value) -> Fut,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    match find(iterable, predicate, options).await {
        Ok(found) => Ok(!found.is_undefined()),
        Err(Error::Find { iterable, index, cause }) => Err(Error::Some { iterable, index, cause }),
        Err(err) => Err(err),
    }
}

/// [`map`] for side effects only.
pub async fn for_each<F, Fut>(
    iterable: impl Into<Value>,
    callback: F,
    options: MapOptions,
) -> Result<(), Error>
where
    F: FnMut(Value, usize, &Value) -> Fut,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    match map(iterable, callback, options).await {
        Ok(_) => Ok(()),
        Err(Error::Map { iterable, index, cause, .. }) => {
            Err(Error::ForEach { iterable, index, cause })
        }
        Err(err) => Err(err),
    }
}
