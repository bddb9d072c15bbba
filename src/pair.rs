use std::sync::Arc;
use std::{future::Future, task::{Poll, Waker}};

use parking_lot::Mutex;

use crate::{Error, Value};

/// The settling half of a settle pair. A `Resolver` settles exactly once:
/// `resolve` and `reject` consume it, and dropping it unsettled rejects every
/// waiter with [`Error::ResolverDropped`].
///
/// # Examples
///
/// ```
/// use promise_helpers::pair;
/// use futures::executor::block_on;
/// use std::thread;
/// let (resolver, waiter) = pair::pair();
/// let waiter2 = waiter.clone();
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received on task 1 {:?}",  waiter.await);
/// }));
/// let task2 = thread::spawn(move || block_on(async {
///     println!("Received on task 2 {:?}",  waiter2.await);
/// }));
/// resolver.resolve("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// task2.join().expect("The task2 thread has panicked.");
/// ```
#[derive(Debug)]
pub struct Resolver {
    promise: Arc<Mutex<Inner>>,
}

/// The waiting half of a settle pair. Waiters may be cloned; each one yields
/// the same settlement.
#[derive(Debug, Clone)]
pub struct Waiter {
    promise: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    value: Option<Result<Value, Error>>,
    wakers: Vec<Waker>, // every pending waiter keeps its own waker
}

/// Creates a connected resolver and waiter.
pub fn pair() -> (Resolver, Waiter) {
    let resolver = Resolver {
        promise: Arc::new(Mutex::new(Inner { value: None, wakers: vec![] })),
    };
    let waiter = Waiter { promise: resolver.promise.clone() };
    (resolver, waiter)
}

impl Resolver {
    pub fn resolve(self, value: Value) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: Error) {
        self.settle(Err(err));
    }

    pub fn settle(self, outcome: Result<Value, Error>) {
        settle(&self.promise, outcome);
    }
}

fn settle(promise: &Mutex<Inner>, outcome: Result<Value, Error>) {
    let mut promise = promise.lock();
    if promise.value.is_some() {
        return;
    }
    promise.value = Some(outcome);
    for waker in promise.wakers.drain(..) {
        waker.wake()
    }
}

impl Drop for Resolver {
    /// If this is an unsettled resolver, wake with error.
    fn drop(&mut self) {
        settle(&self.promise, Err(Error::ResolverDropped));
    }
}

impl Future for Waiter {
    type Output = Result<Value, Error>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let mut promise = self.promise.lock();
        match promise.value {
            Some(ref value) => Poll::Ready(value.clone()),
            None => {
                if !promise.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    promise.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
use futures::executor::block_on;
use std::thread;
use super::pair;
use crate::{Error, Value};

#[test]
fn test_pair_resolve() {
    let (resolver, waiter) = pair();
    let task1 = thread::spawn(move || {
        block_on(async { waiter.await })
    });
    let task2 = thread::spawn(move || {
        resolver.resolve(Value::from("🍓"));
    });
    task2.join().expect("The task2 thread has panicked");
    let received = task1.join().expect("The task1 thread has panicked");
    assert_eq!(received.ok(), Some(Value::from("🍓")));
}

#[test]
fn test_two_waiters_resolve() {
    let (resolver, waiter) = pair();
    let waiter2 = waiter.clone();
    let task1 = thread::spawn(move || block_on(waiter));
    let task2 = thread::spawn(move || block_on(waiter2));
    let task3 = thread::spawn(move || resolver.resolve(Value::from(7)));
    task3.join().expect("The task3 thread has panicked");
    assert_eq!(task1.join().expect("The task1 thread has panicked").ok(), Some(Value::from(7)));
    assert_eq!(task2.join().expect("The task2 thread has panicked").ok(), Some(Value::from(7)));
}

#[test]
fn test_pair_reject() {
    let (resolver, waiter) = pair();
    let task1 = thread::spawn(|| block_on(waiter));
    let task2 = thread::spawn(|| resolver.reject(Error::rejected("reject!!")));
    task2.join().expect("The task2 thread has panicked");
    let received = task1.join().expect("The task1 thread has panicked");
    assert!(matches!(received, Err(Error::Rejected(Value::String(ref s))) if &**s == "reject!!"));
}

#[test]
fn test_pair_unresolved() {
    let (resolver, waiter) = pair();
    let task1 = thread::spawn(move || block_on(waiter));
    let task2 = thread::spawn(move || {
        // Move the resolver into this thread and never settle it.
        std::mem::drop(resolver);
    });
    task2.join().expect("The task2 thread has panicked");
    let received = task1.join().expect("The task1 thread has panicked");
    assert!(matches!(received, Err(Error::ResolverDropped)));
}

#[test]
fn test_pair_no_waiter() {
    let (resolver, waiter) = pair();
    drop(waiter);
    resolver.resolve(Value::Null);
}
}
