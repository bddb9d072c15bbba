#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use promise_helpers::{
        at_least, attach_timers, delay, timeout, timeout_default, Error, Promise, Timers, Value,
    };
    use tokio::time::{sleep, Instant};

    fn later(ms: u64, value: impl Into<Value>) -> Promise {
        let value = value.into();
        Promise::from_future(async move {
            sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
    }

    fn failing(reason: &str) -> Value {
        Promise::reject(Error::rejected(reason)).into()
    }

    #[tokio::test(start_paused = true)]
    async fn delay_waits_before_resolving() {
        let start = Instant::now();
        let value = delay(50, "done").await.unwrap();
        assert_eq!(value, Value::from("done"));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn chained_delays_add_up() {
        let start = Instant::now();
        let value = Promise::resolve(7).delay(20).delay(20).delay(20).await.unwrap();
        assert_eq!(value, Value::from(7));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_rejects_without_waiting() {
        let start = Instant::now();
        let err = delay(100, failing("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_invokes_thunks() {
        let thunk = promise_helpers::Function::thunk(|| async { Ok(Value::from("from thunk")) });
        assert_eq!(delay(5, thunk).await.unwrap(), Value::from("from thunk"));
    }

    #[tokio::test(start_paused = true)]
    async fn at_least_holds_back_fast_values() {
        let start = Instant::now();
        let value = at_least(later(10, 1), 50).await.unwrap();
        assert_eq!(value, Value::from(1));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn at_least_does_not_slow_down_slow_values() {
        let start = Instant::now();
        at_least(later(80, 1), 50).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_millis(130));
    }

    #[tokio::test(start_paused = true)]
    async fn at_least_floor_starts_at_invocation() {
        let floor = at_least(Value::from(1), 50);
        sleep(Duration::from_millis(30)).await;
        let start = Instant::now();
        floor.await.unwrap();
        assert!(start.elapsed() <= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn at_least_rejects_immediately() {
        let start = Instant::now();
        let err = at_least(failing("early"), 50).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_slow_values() {
        let start = Instant::now();
        let err = timeout(later(100, 1), 30).await.unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(err.name(), "TimeoutError");
        assert_eq!(err.time(), Some(30));
        assert_eq!(err.to_string(), "Promise timeout in 30ms");
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_passes_fast_values_and_rejections() {
        assert_eq!(timeout(later(10, "ok"), 50).await.unwrap(), Value::from("ok"));
        let err = timeout(failing("boom"), 50).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref reason) if *reason == Value::from("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_cancellable_values() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let slow = later(100, 1).with_cancel(move || flag.store(true, Ordering::SeqCst));
        assert!(timeout(slow, 10).await.unwrap_err().is_timeout());
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_with_custom_message() {
        let err = promise_helpers::timing::timeout_with_message(later(100, 1), 5, Some("too slow".into()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "too slow");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_default_substitutes_the_fallback() {
        let value = timeout_default(later(100, 1), 20, "fallback", false).await.unwrap();
        assert_eq!(value, Value::from("fallback"));
        let value = timeout_default(later(5, 1), 20, "fallback", false).await.unwrap();
        assert_eq!(value, Value::from(1));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_default_replaces_rejections_only_when_forced() {
        let err = timeout_default(failing("boom"), 20, 0, false).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        let value = timeout_default(failing("boom"), 20, 0, true).await.unwrap();
        assert_eq!(value, Value::from(0));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_default_requires_a_fallback() {
        let err = timeout_default(later(5, 1), 20, Value::Undefined, false).await.unwrap_err();
        assert_eq!(err.code(), "TIMEOUT_DEFAULT");
    }

    #[test]
    fn attach_timers_rejects_incoherent_timers_before_starting() {
        let err = attach_timers(Value::from(1), Timers::default().at_least(50).timeout(50)).unwrap_err();
        assert_eq!(err.code(), "ATTACH_TIMERS");
        assert!(matches!(err, Error::TimersCoherence { at_least: 50, timeout: 50, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn attach_timers_applies_floor_cap_and_delay() {
        let start = Instant::now();
        let timers = Timers::default().at_least(30).timeout(100).delay(10);
        let value = attach_timers(later(5, "v"), timers).unwrap().await.unwrap();
        assert_eq!(value, Value::from("v"));
        assert!(start.elapsed() >= Duration::from_millis(40));

        let err = later(200, "v").attach_timers(Timers::default().timeout(20)).unwrap().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timers_are_ignored() {
        let start = Instant::now();
        let timers = Timers::default().at_least(0).timeout(0).delay(0);
        attach_timers(Value::from(1), timers).unwrap().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
