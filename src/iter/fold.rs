use std::future::Future;

use tracing::debug;

use super::{elements, Step};
use crate::options::Timers;
use crate::timing::{attach_timers, delay};
use crate::{Error, Promise, Value};

/// Folds the elements left to right, one step at a time:
/// `acc = reducer(acc, element, index, iterable)`. `initial` may be a
/// promise. Each step's result goes through `timers`.
///
/// # Errors
/// [`Error::Reduce`] when the initial value or a step fails. It carries the
/// accumulator as it was before the failing step.
pub async fn reduce<F, Fut>(
    iterable: impl Into<Value>,
    mut reducer: F,
    initial: impl Into<Value>,
    timers: Timers,
) -> Result<Value, Error>
where
    F: FnMut(Value, Value, usize, &Value) -> Fut,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    timers.validate()?;
    let (iterable, items) = elements("reduce", iterable).await?;
    let mut acc = match Promise::resolve(initial).await {
        Ok(acc) => acc,
        Err(err) => return Err(reduce_failure(iterable, 0, Value::Undefined, err)),
    };

    for (index, item) in items.into_iter().enumerate() {
        let step = async {
            let item = Promise::resolve(item).await?;
            let next = Promise::from_future(reducer(acc.clone(), item, index, &iterable));
            attach_timers(next, timers)?.await
        }
        .await;
        match step {
            Ok(next) => acc = next,
            Err(err) => return Err(reduce_failure(iterable, index, acc, err)),
        }
    }
    Ok(acc)
}

fn reduce_failure(iterable: Value, index: usize, last_result: Value, cause: Error) -> Error {
    debug!(index, error = %cause, "reduce aborted");
    Error::Reduce { iterable, index, last_result, cause: Box::new(cause) }
}

/// Threads `initial` through the elements in order. A function element
/// receives the running value and returns the next; a number pauses and
/// passes the value through unchanged.
///
/// # Errors
/// [`Error::Waterfall`] with the last value that made it through.
pub async fn waterfall(
    iterable: impl Into<Value>,
    initial: impl Into<Value>,
    timers: Timers,
) -> Result<Value, Error> {
    let folded = reduce(
        iterable,
        |acc, element, _, _| match Step::from_value("waterfall", element) {
            Ok(Step::Pause(ms)) => delay(ms, acc),
            Ok(Step::Run(function)) => function.call(vec![acc]),
            Err(err) => Promise::reject(err),
        },
        initial,
        timers,
    )
    .await;
    match folded {
        Err(Error::Reduce { iterable, index, last_result, cause }) => {
            Err(Error::Waterfall { iterable, index, last_result, cause })
        }
        folded => folded,
    }
}
