//! Suspend/resume primitives: `delay`, `at_least`, `timeout`,
//! `timeout_default` and their composition, `attach_timers`.
//!
//! Floors and caps are measured from the moment the helper is invoked: the
//! deadline is fixed before the returned promise is first polled.

use std::borrow::Cow;
use std::time::Duration;

use futures::future::{self, Either};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use crate::options::Timers;
use crate::util::resolve_promise;
use crate::{Error, Promise, Value};

fn deadline(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

/// Resolves to `value` once it has settled and `time` more milliseconds
/// have passed. A rejected `value` rejects straight away.
pub fn delay(time: u64, value: impl Into<Value>) -> Promise {
    let value = resolve_promise(value);
    Promise::from_future(async move {
        let value = value.await?;
        sleep(Duration::from_millis(time)).await;
        Ok(value)
    })
}

/// Resolves to the settled `value`, but never before `time` milliseconds
/// after invocation. A rejection is reported as soon as it happens.
pub fn at_least(value: impl Into<Value>, time: u64) -> Promise {
    let floor = deadline(time);
    let value = resolve_promise(value);
    Promise::from_future(async move {
        let value = value.await?;
        sleep_until(floor).await;
        Ok(value)
    })
}

/// Races `value` against a `time` millisecond timer. When the timer wins the
/// promise rejects with [`Error::Timeout`] and `value`'s cancel operation,
/// if it has one, is invoked.
pub fn timeout(value: impl Into<Value>, time: u64) -> Promise {
    timeout_with_message(value, time, None)
}

pub fn timeout_with_message(
    value: impl Into<Value>,
    time: u64,
    message: Option<Cow<'static, str>>,
) -> Promise {
    let cap = deadline(time);
    let value = value.into();
    let cancel = match &value {
        Value::Promise(promise) => promise.canceller(),
        _ => None,
    };
    let settling = resolve_promise(value);
    Promise::from_future(async move {
        match future::select(settling, Box::pin(sleep_until(cap))).await {
            Either::Left((settled, _)) => settled,
            Either::Right(((), _)) => {
                debug!(time, cancellable = cancel.is_some(), "promise timed out");
                if let Some(cancel) = cancel {
                    cancel();
                }
                Err(Error::Timeout {
                    message: message.unwrap_or_else(|| format!("Promise timeout in {time}ms").into()),
                    time: Some(time),
                })
            }
        }
    })
}

/// Like [`timeout`], but settles with `fallback` when the timer wins. With
/// `force`, every rejection is replaced by `fallback`.
///
/// `fallback` must not be `Undefined`; otherwise the promise rejects with
/// [`Error::TimeoutDefault`].
pub fn timeout_default(
    value: impl Into<Value>,
    time: u64,
    fallback: impl Into<Value>,
    force: bool,
) -> Promise {
    let fallback = fallback.into();
    if fallback.is_undefined() {
        return Promise::reject(Error::TimeoutDefault);
    }
    let timed = timeout(value, time);
    Promise::from_future(async move {
        match timed.await {
            Err(Error::Timeout { .. }) => Ok(fallback),
            Err(err) if force => {
                debug!(error = %err, "timeoutDefault replaced a rejection");
                Ok(fallback)
            }
            settled => settled,
        }
    })
}

/// Applies `timers` in a fixed order: the floor first, then the cap, then the
/// trailing delay.
///
/// # Errors
/// Returns [`Error::TimersCoherence`] before any timer starts when the floor
/// is not strictly below the cap.
pub fn attach_timers(value: impl Into<Value>, timers: Timers) -> Result<Promise, Error> {
    timers.validate()?;
    let mut promise = resolve_promise(value);
    if let Some(ms) = timers.at_least.filter(|&ms| ms > 0) {
        promise = promise.at_least(ms);
    }
    if let Some(ms) = timers.timeout.filter(|&ms| ms > 0) {
        promise = promise.timeout(ms);
    }
    if let Some(ms) = timers.delay.filter(|&ms| ms > 0) {
        promise = promise.delay(ms);
    }
    Ok(promise)
}

impl Promise {
    /// Waits `time` milliseconds after this promise fulfils.
    pub fn delay(self, time: u64) -> Promise {
        self.then(move |value| delay(time, value))
    }

    pub fn at_least(self, time: u64) -> Promise {
        at_least(self, time)
    }

    pub fn timeout(self, time: u64) -> Promise {
        timeout(self, time)
    }

    pub fn timeout_default(self, time: u64, fallback: impl Into<Value>, force: bool) -> Promise {
        timeout_default(self, time, fallback, force)
    }

    pub fn attach_timers(self, timers: Timers) -> Result<Promise, Error> {
        attach_timers(self, timers)
    }
}
