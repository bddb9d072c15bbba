#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use promise_helpers::options::{PollOptions, RetryOptions};
    use promise_helpers::util::{apply, apply_attr, call, call_attr, exec};
    use promise_helpers::{
        get, keys, tap, wait_for_key, wait_for_result, Error, Function, Object, Promise, Timers, Value,
    };
    use tokio::time::{sleep, Instant};

    fn object(entries: &[(&str, i32)]) -> Object {
        entries.iter().map(|&(key, value)| (key, Value::from(value))).collect()
    }

    fn adder() -> Function {
        Function::new(|args| async move {
            Ok(Value::from(args.iter().filter_map(Value::as_f64).sum::<f64>()))
        })
    }

    #[tokio::test]
    async fn get_reads_objects_and_lists() {
        let value = get(Promise::resolve(object(&[("a", 1), ("b", 2)])), "b").await.unwrap();
        assert_eq!(value, Value::from(2));
        let list = Value::from(vec![Value::from("x"), Value::from("y")]);
        assert_eq!(get(list.clone(), 1).await.unwrap(), Value::from("y"));
        assert_eq!(get(list, "0").await.unwrap(), Value::from("x"));
    }

    #[tokio::test]
    async fn get_reports_missing_keys_and_non_objects() {
        let err = get(object(&[("a", 1)]), "z").await.unwrap_err();
        assert_eq!(err.code(), "KEY_NOT_FOUND");
        assert_eq!(err.to_string(), "key z not found");

        let err = get(Value::from(3), "a").await.unwrap_err();
        assert_eq!(err.code(), "NOT_OBJECT");
    }

    #[tokio::test]
    async fn keys_keep_insertion_order() {
        assert_eq!(keys(object(&[("z", 1), ("a", 2)])).await.unwrap(), ["z", "a"]);
        assert!(keys(Value::Null).await.is_err());
        let listed = Promise::resolve(object(&[("k", 1)])).keys().await.unwrap();
        assert_eq!(listed, Value::from(vec![Value::from("k")]));
    }

    #[tokio::test]
    async fn call_and_apply_pass_this_and_arguments() {
        let this_and_args = Function::method(|this, args| async move {
            Ok(Value::from(vec![this, Value::from(args)]))
        });
        let called = call(this_and_args.clone(), Value::from("me"), vec![Value::from(1)]).await.unwrap();
        assert_eq!(called, Value::from(vec![Value::from("me"), Value::from(vec![Value::from(1)])]));

        let applied = apply(this_and_args, Value::Null, Value::from(vec![Value::from(2)])).await.unwrap();
        assert_eq!(applied, Value::from(vec![Value::Null, Value::from(vec![Value::from(2)])]));
    }

    #[tokio::test]
    async fn apply_requires_an_argument_list() {
        let err = apply(adder(), Value::Undefined, Value::from(1)).await.unwrap_err();
        assert_eq!(err.code(), "ARGUMENT");
    }

    #[tokio::test]
    async fn exec_invokes_resolved_functions() {
        let sum = exec(Promise::resolve(adder()), vec![Value::from(1), Value::from(2)]).await.unwrap();
        assert_eq!(sum, Value::from(3));
        let err = exec(Value::from("nope"), vec![]).await.unwrap_err();
        assert_eq!(err.code(), "CALLABLE");
    }

    #[tokio::test]
    async fn call_attr_uses_the_object_as_this() {
        let counter = Object::new();
        counter.insert("count", 5);
        counter.insert(
            "plus",
            Function::method(|this, args| async move {
                let count = get(this, "count").await?;
                let step = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                Ok(Value::from(count.as_f64().unwrap_or(0.0) + step))
            }),
        );
        let value = call_attr(counter.clone(), "plus", vec![Value::from(2)]).await.unwrap();
        assert_eq!(value, Value::from(7));
        let value = apply_attr(counter.clone(), "plus", Value::from(vec![Value::from(3)])).await.unwrap();
        assert_eq!(value, Value::from(8));

        let err = call_attr(counter.clone(), "count", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "CALLABLE");
        let err = call_attr(counter, "missing", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "KEY_NOT_FOUND");
    }

    #[tokio::test]
    async fn tap_observes_without_changing_the_settlement() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let on_value = Function::unary(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::from("ignored")) }
        });
        let value = tap(Promise::resolve(1), Some(on_value.clone()), None).await.unwrap();
        assert_eq!(value, Value::from(1));

        let err = tap(Promise::reject(Error::rejected("no")), Some(on_value), None).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let failing = Function::unary(|_| async { Err(Error::rejected("tap failed")) });
        let err = tap(Promise::resolve(1), Some(failing), None).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref reason) if *reason == Value::from("tap failed")));
    }

    #[tokio::test]
    async fn tap_methods_run_side_effects() {
        let value = Promise::resolve(2).tap(|value| {
            assert_eq!(*value, Value::from(2));
            Ok(())
        });
        assert_eq!(value.await.unwrap(), Value::from(2));
        let err = Promise::reject(Error::TimeoutDefault)
            .tap_err(|err| Err(Error::rejected(err.code())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(ref reason) if *reason == Value::from("TIMEOUT_DEFAULT")));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_key_sees_keys_added_later() {
        let target = Object::new();
        let writer = target.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            writer.insert("ready", true);
        });
        let value = wait_for_key(target, "ready", PollOptions::default()).await.unwrap();
        assert_eq!(value, Value::from(true));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_key_gives_up_after_the_budget() {
        let start = Instant::now();
        let options = PollOptions::default().interval(10).max_iterations(3);
        let err = wait_for_key(Object::new(), "never", options).await.unwrap_err();
        assert_eq!(err.code(), "MAX_ITERATIONS");
        assert!(matches!(err, Error::MaxIterations { iterations: 3, .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(30));

        let err = wait_for_key(Value::from(1), "never", options).await.unwrap_err();
        assert_eq!(err.code(), "NOT_OBJECT");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_key_checks_once_then_polls_max_iterations_times() {
        for (max_iterations, found) in [(2, false), (3, true)] {
            let target = Object::new();
            let writer = target.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(25)).await;
                writer.insert("late", 1);
            });
            let options = PollOptions::default().interval(10).max_iterations(max_iterations);
            let start = Instant::now();
            let outcome = wait_for_key(target, "late", options).await;
            assert_eq!(outcome.is_ok(), found, "max_iterations = {max_iterations}");
            assert_eq!(start.elapsed(), Duration::from_millis(10 * u64::from(max_iterations)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_result_polls_until_a_value_appears() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let eventually = Function::new(move |args| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Ok(Value::Undefined)
                } else {
                    Ok(args.into_iter().next().unwrap_or_default())
                }
            }
        });
        let options = RetryOptions::default().interval(10);
        let value = wait_for_result(eventually, options, "payload").await.unwrap();
        assert_eq!(value, Value::from("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_result_retries_failures_unless_told_not_to() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = Function::thunk(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(Error::rejected("flaky"))
                } else {
                    Ok(Value::from(attempt))
                }
            }
        });
        let value = wait_for_result(flaky.clone(), RetryOptions::default().interval(5), Value::Undefined)
            .await
            .unwrap();
        assert_eq!(value, Value::from(1));

        calls.store(0, Ordering::SeqCst);
        let err = wait_for_result(flaky, RetryOptions::default().no_retry(), Value::Undefined)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_result_gives_up_and_applies_timers() {
        let nothing = Function::thunk(|| async { Ok(Value::Undefined) });
        let options = RetryOptions::default().interval(1).max_iterations(2);
        let err = wait_for_result(nothing, options, Value::Undefined).await.unwrap_err();
        assert!(matches!(err, Error::MaxIterations { operation: "waitForResult", iterations: 2 }));

        let slow = Function::thunk(|| async {
            sleep(Duration::from_millis(50)).await;
            Ok(Value::from(1))
        });
        let options = RetryOptions::default().no_retry().timers(Timers::default().timeout(10));
        let err = wait_for_result(slow, options, Value::Undefined).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
