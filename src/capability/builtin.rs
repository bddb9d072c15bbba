//! Builtin capabilities: argument adapters over the typed helpers.
//!
//! Argument positions follow the dynamic calling convention, e.g.
//! `map(iterable, callback, options)`. Defaults apply to `Undefined`
//! positions. Composite capabilities dispatch to their dependencies through
//! the target, so a forced replacement of `timeout` is what `timeoutDefault`
//! ends up calling.

use std::borrow::Cow;

use super::Capability;
use crate::iter::{self, Settlement, Step};
use crate::options::{MapOptions, PollOptions, RetryOptions, SerialOptions, Timers, DEFAULT_TIME_MS};
use crate::{timing, util};
use crate::{Error, Function, Promise, Value};

pub(super) fn capabilities() -> Vec<Capability> {
    vec![
        resolve_promise(),
        delay(),
        at_least(),
        timeout(),
        timeout_default(),
        attach_timers(),
        map(),
        find(),
        some(),
        for_each(),
        sequence(),
        sequence_all_settled(),
        reduce(),
        waterfall(),
        get(),
        keys(),
        call(),
        apply(),
        exec(),
        call_attr(),
        apply_attr(),
        tap(),
        wait_for_key(),
        wait_for_result(),
    ]
}

/// `callback(element, index, iterable)` through a dynamic function.
fn element_callback(callback: Function) -> impl FnMut(Value, usize, &Value) -> Promise {
    move |element, index, iterable| callback.call(vec![element, index.into(), iterable.clone()])
}

fn resolve_promise() -> Capability {
    Capability::with_static("resolvePromise", |_, args| Ok(util::resolve_promise(args.value(0)))).build()
}

fn delay() -> Capability {
    Capability::with_static("delay", |_, args| {
        let time = args.millis("delay", 0, DEFAULT_TIME_MS)?;
        Ok(timing::delay(time, args.value(1)))
    })
    .method(|target, receiver, args| {
        let time = args.millis("delay", 0, DEFAULT_TIME_MS)?;
        let target = target.clone();
        Ok(receiver.then(move |value| async move { target.call("delay", [Value::from(time), value])?.await }))
    })
    .depends_on(["resolvePromise"])
    .build()
}

fn at_least() -> Capability {
    Capability::with_static("atLeast", |_, args| {
        let time = args.millis("atLeast", 1, DEFAULT_TIME_MS)?;
        Ok(timing::at_least(args.value(0), time))
    })
    .depends_on(["get", "delay", "resolvePromise"])
    .build()
}

fn timeout() -> Capability {
    Capability::with_static("timeout", |_, args| {
        let time = args.value(1).as_millis().ok_or(Error::Timeout {
            message: Cow::Borrowed("time is not a number"),
            time: None,
        })?;
        let message = args.value(2).as_str().map(|message| Cow::Owned(message.to_string()));
        Ok(timing::timeout_with_message(args.value(0), time, message))
    })
    .depends_on(["delay", "resolvePromise"])
    .build()
}

fn timeout_default() -> Capability {
    Capability::with_static("timeoutDefault", |target, args| {
        let time = args.millis("timeoutDefault", 1, DEFAULT_TIME_MS)?;
        let fallback = args.value(2);
        let force = args.flag(3);
        if fallback.is_undefined() {
            return Ok(Promise::reject(Error::TimeoutDefault));
        }
        let timed = target.call("timeout", [args.value(0), Value::from(time)])?;
        Ok(timed.catch(move |err| async move {
            if err.is_timeout() || force {
                Ok(fallback)
            } else {
                Err(err)
            }
        }))
    })
    .depends_on(["timeout"])
    .build()
}

fn attach_timers() -> Capability {
    Capability::with_static("attachTimers", |_, args| {
        let timers: Timers = args.options("attachTimers", 1)?;
        timing::attach_timers(args.value(0), timers)
    })
    .depends_on(["delay", "atLeast", "timeout", "resolvePromise"])
    .build()
}

fn map() -> Capability {
    Capability::with_static("map", |_, args| {
        let callback = args.function("map", 1)?;
        let options: MapOptions = args.options("map", 2)?;
        options.timers.validate()?;
        let iterable = args.value(0);
        Ok(Promise::from_future(async move {
            iter::map(iterable, element_callback(callback), options).await.map(Value::List)
        }))
    })
    .depends_on(["attachTimers", "resolvePromise"])
    .build()
}

fn find() -> Capability {
    Capability::with_static("find", |_, args| {
        let predicate = args.function("find", 1)?;
        let options: SerialOptions = args.options("find", 2)?;
        options.timers.validate()?;
        let iterable = args.value(0);
        Ok(Promise::from_future(async move {
            iter::find(iterable, element_callback(predicate), options).await
        }))
    })
    .depends_on(["attachTimers", "resolvePromise"])
    .build()
}

fn some() -> Capability {
    Capability::with_static("some", |target, args| {
        let found = target.call("find", args)?;
        Ok(Promise::from_future(async move {
            match found.await {
                Ok(found) => Ok(Value::Bool(!found.is_undefined())),
                Err(Error::Find { iterable, index, cause }) => Err(Error::Some { iterable, index, cause }),
                Err(err) => Err(err),
            }
        }))
    })
    .depends_on(["find"])
    .build()
}

fn for_each() -> Capability {
    Capability::with_static("forEach", |target, args| {
        let mapped = target.call("map", args)?;
        Ok(Promise::from_future(async move {
            match mapped.await {
                Ok(_) => Ok(Value::Undefined),
                Err(Error::Map { iterable, index, cause, .. }) => {
                    Err(Error::ForEach { iterable, index, cause })
                }
                Err(err) => Err(err),
            }
        }))
    })
    .depends_on(["map"])
    .build()
}

fn sequence() -> Capability {
    Capability::with_static("sequence", |_, args| {
        let options: SerialOptions = args.options("sequence", 1)?;
        options.timers.validate()?;
        let iterable = args.value(0);
        Ok(Promise::from_future(async move {
            iter::sequence(iterable, options).await.map(Value::List)
        }))
    })
    .depends_on(["map", "delay"])
    .build()
}

fn sequence_all_settled() -> Capability {
    Capability::with_static("sequenceAllSettled", |_, args| {
        let options: SerialOptions = args.options("sequenceAllSettled", 1)?;
        options.timers.validate()?;
        let iterable = args.value(0);
        Ok(Promise::from_future(async move {
            let settled = iter::sequence_all_settled(iterable, options).await?;
            Ok::<_, Error>(settled.into_iter().map(Settlement::into_value).collect::<Value>())
        }))
    })
    .depends_on(["map", "delay"])
    .build()
}

fn reduce() -> Capability {
    Capability::with_static("reduce", |_, args| {
        let reducer = args.function("reduce", 1)?;
        let timers: Timers = args.options("reduce", 3)?;
        timers.validate()?;
        let (iterable, initial) = (args.value(0), args.value(2));
        Ok(Promise::from_future(async move {
            iter::reduce(
                iterable,
                move |acc, element, index, iterable: &Value| {
                    reducer.call(vec![acc, element, index.into(), iterable.clone()])
                },
                initial,
                timers,
            )
            .await
        }))
    })
    .depends_on(["attachTimers"])
    .build()
}

fn waterfall() -> Capability {
    Capability::with_static("waterfall", |target, args| {
        let step = Function::new(|args: Vec<Value>| async move {
            let mut args = args.into_iter();
            let acc = args.next().unwrap_or_default();
            match Step::from_value("waterfall", args.next().unwrap_or_default())? {
                Step::Pause(ms) => timing::delay(ms, acc).await,
                Step::Run(function) => function.call(vec![acc]).await,
            }
        });
        let folded = target.call(
            "reduce",
            [args.value(0), Value::from(step), args.value(1), args.value(2)],
        )?;
        Ok(folded.catch(|err| async move {
            match err {
                Error::Reduce { iterable, index, last_result, cause } => {
                    Err(Error::Waterfall { iterable, index, last_result, cause })
                }
                err => Err(err),
            }
        }))
    })
    .depends_on(["reduce"])
    .build()
}

fn get() -> Capability {
    Capability::with_static("get", |_, args| {
        Ok(Promise::from_future(util::get(args.value(0), args.value(1))))
    })
    .build()
}

fn keys() -> Capability {
    Capability::with_static("keys", |_, args| {
        let value = args.value(0);
        Ok(Promise::from_future(async move {
            let keys = util::keys(value).await?;
            Ok::<_, Error>(keys.into_iter().map(Value::from).collect::<Value>())
        }))
    })
    .build()
}

fn call() -> Capability {
    Capability::with_method("call", |_, receiver, args| {
        Ok(Promise::from_future(util::call(receiver, args.value(0), args.rest(1))))
    })
    .build()
}

fn apply() -> Capability {
    Capability::with_method("apply", |_, receiver, args| {
        Ok(Promise::from_future(util::apply(receiver, args.value(0), args.value(1))))
    })
    .build()
}

fn exec() -> Capability {
    Capability::with_static("exec", |_, args| {
        Ok(Promise::from_future(util::exec(args.value(0), args.rest(1))))
    })
    .build()
}

fn call_attr() -> Capability {
    Capability::with_static("callAttr", |_, args| {
        Ok(Promise::from_future(util::call_attr(args.value(0), args.value(1), args.rest(2))))
    })
    .build()
}

fn apply_attr() -> Capability {
    Capability::with_static("applyAttr", |_, args| {
        Ok(Promise::from_future(util::apply_attr(args.value(0), args.value(1), args.value(2))))
    })
    .build()
}

fn tap() -> Capability {
    Capability::with_method("tap", |_, receiver, args| {
        Ok(util::tap(receiver, args.optional_function(0), args.optional_function(1)))
    })
    .build()
}

fn wait_for_key() -> Capability {
    Capability::with_static("waitForKey", |_, args| {
        let options: PollOptions = args.options("waitForKey", 2)?;
        Ok(Promise::from_future(util::wait_for_key(args.value(0), args.value(1), options)))
    })
    .depends_on(["delay", "get", "resolvePromise"])
    .build()
}

fn wait_for_result() -> Capability {
    Capability::with_static("waitForResult", |_, args| {
        let options: RetryOptions = args.options("waitForResult", 1)?;
        options.timers.validate()?;
        Ok(Promise::from_future(util::wait_for_result(args.value(0), options, args.value(2))))
    })
    .depends_on(["delay", "attachTimers"])
    .build()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn names_are_unique_and_dependencies_known() {
        let capabilities = capabilities();
        let names: BTreeSet<&str> = capabilities.iter().map(Capability::name).collect();
        assert_eq!(names.len(), capabilities.len());
        for capability in &capabilities {
            for dependency in capability.dependencies() {
                assert!(names.contains(dependency.as_str()), "{} -> {dependency}", capability.name());
            }
        }
    }

    #[test]
    fn method_only_capabilities_have_no_static_form() {
        for capability in capabilities() {
            let method_only = matches!(capability.name(), "call" | "apply" | "tap");
            assert_eq!(capability.has_static(), !method_only, "{}", capability.name());
        }
    }
}
