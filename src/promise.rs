//! The future-value primitive every helper builds on.
//!
//! A [`Promise`] is a cloneable handle to a shared, boxed future settling
//! with `Result<Value, Error>`. Promises are lazy: work starts when a handle
//! is first polled, except for [`Promise::spawn`], which hands the work to the
//! ambient tokio runtime right away.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;

use crate::pair::{self, Resolver};
use crate::{Error, Value};

type Settled = Result<Value, Error>;
type CancelHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Promise {
    future: Shared<BoxFuture<'static, Settled>>,
    cancel: Option<CancelHook>,
}

impl Promise {
    /// Builds a promise from a settle pair: `executor` receives the
    /// [`Resolver`] and may settle it now or hand it elsewhere.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_helpers::{Promise, Value};
    /// use futures::executor::block_on;
    /// use std::thread;
    /// let promise = Promise::new(|resolver| {
    ///     thread::spawn(move || resolver.resolve(Value::from("🍓")));
    /// });
    /// assert_eq!(block_on(promise).ok(), Some(Value::from("🍓")));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver),
    {
        let (resolver, waiter) = pair::pair();
        executor(resolver);
        Self::from_future(waiter)
    }

    /// Wraps a future. A future settling with another promise is flattened.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Settled> + Send + 'static,
    {
        Self::from_boxed(async move { flatten(future.await).await }.boxed())
    }

    /// Starts `future` on the current tokio runtime immediately. Outside a
    /// runtime the promise stays lazy.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Settled> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(future);
                Self::from_future(async move {
                    task.await
                        .unwrap_or_else(|err| Err(Error::rejected(format!("task failed: {err}"))))
                })
            }
            Err(_) => Self::from_future(future),
        }
    }

    fn from_boxed(future: BoxFuture<'static, Settled>) -> Self {
        Self { future: future.shared(), cancel: None }
    }

    /// A promise already fulfilled with `value`. Passing a promise returns it.
    pub fn resolve(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Promise(promise) => promise,
            value => Self::from_boxed(future::ready(Ok(value)).boxed()),
        }
    }

    pub fn reject(err: Error) -> Self {
        Self::from_boxed(future::ready(Err(err)).boxed())
    }

    /// Fulfils with every value in input order, or rejects with the first
    /// rejection to happen.
    pub fn all<I>(promises: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let promises: Vec<Promise> = promises.into_iter().map(Promise::resolve).collect();
        Self::from_future(async move { future::try_join_all(promises).await.map(Value::List) })
    }

    /// Settles like the first input to settle. An empty input never settles.
    pub fn race<I>(promises: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let promises: Vec<Promise> = promises.into_iter().map(Promise::resolve).collect();
        if promises.is_empty() {
            return Self::from_future(future::pending());
        }
        Self::from_future(async move { future::select_all(promises).await.0 })
    }

    /// Chains `f` onto the fulfilled value; rejections pass through.
    pub fn then<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = Settled> + Send + 'static,
    {
        Self::from_future(async move { f(self.await?).await })
    }

    /// Recovers from a rejection; fulfilled values pass through.
    pub fn catch<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Error) -> Fut + Send + 'static,
        Fut: Future<Output = Settled> + Send + 'static,
    {
        Self::from_future(async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(err) => f(err).await,
            }
        })
    }

    /// Attaches a cancel operation, invoked by `timeout` when it expires.
    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    pub fn is_cancellable(&self) -> bool {
        self.cancel.is_some()
    }

    /// Runs the cancel operation if there is one.
    pub fn cancel(&self) -> bool {
        match &self.cancel {
            Some(cancel) => {
                cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn canceller(&self) -> Option<CancelHook> {
        self.cancel.clone()
    }

    /// The settlement, if this promise has already been driven to completion.
    pub fn peek(&self) -> Option<Settled> {
        self.future.peek().cloned()
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        self.future.ptr_eq(&other.future)
    }
}

async fn flatten(mut settled: Settled) -> Settled {
    while let Ok(Value::Promise(inner)) = settled {
        settled = inner.await;
    }
    settled
}

impl Future for Promise {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.future).poll(cx)
    }
}

impl From<Value> for Promise {
    fn from(value: Value) -> Self {
        Promise::resolve(value)
    }
}

impl From<Result<Value, Error>> for Promise {
    fn from(settled: Settled) -> Self {
        match settled {
            Ok(value) => Promise::resolve(value),
            Err(err) => Promise::reject(err),
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.future.peek() {
            None => "pending",
            Some(Ok(_)) => "fulfilled",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Promise")
            .field("state", &state)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}
