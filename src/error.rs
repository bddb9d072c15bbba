//! Typed failures raised by every helper in the crate.
//!
//! Each expected failure mode has its own [`Error`] variant carrying the state
//! a caller needs to diagnose or resume: the index reached, the partial result
//! accumulated so far and the error that caused it. [`ErrorKind`] is the
//! fieldless discriminant with a stable name and code.

use std::borrow::Cow;
use std::fmt::Write as _;

use thiserror::Error;

use crate::value::Value;

/// Every failure a promise helper can produce.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The awaited value did not settle within `time` milliseconds.
    ///
    /// `time` is `None` when the duration itself was not a number.
    #[error("{message}")]
    Timeout { message: Cow<'static, str>, time: Option<u64> },

    /// `timeoutDefault` was called without a fallback value.
    #[error("there is no default for timeoutDefault")]
    TimeoutDefault,

    #[error("timeout ({timeout}) must be greater than atLeast ({at_least})")]
    TimersCoherence { delay: Option<u64>, at_least: u64, timeout: u64 },

    /// The input of an iteration combinator did not resolve to a list.
    #[error("trying to use {operation} without an iterable object")]
    Iterable { operation: &'static str, iterable: Value },

    #[error("some callback or iterator throws an error")]
    Map {
        iterable: Value,
        index: usize,
        partial: Vec<Value>,
        #[source]
        cause: Box<Error>,
    },

    #[error("some callback or iterator throws an error")]
    Find {
        iterable: Value,
        index: usize,
        #[source]
        cause: Box<Error>,
    },

    #[error("find operation failed in some")]
    Some {
        iterable: Value,
        index: usize,
        #[source]
        cause: Box<Error>,
    },

    #[error("some callback or iterable throws error")]
    ForEach {
        iterable: Value,
        index: usize,
        #[source]
        cause: Box<Error>,
    },

    #[error("some callback or iterable throws error")]
    Sequence {
        iterable: Value,
        index: usize,
        partial: Vec<Value>,
        #[source]
        cause: Box<Error>,
    },

    #[error("some callback or iterable throws error")]
    SequenceAllSettled {
        iterable: Value,
        index: usize,
        partial: Vec<Value>,
        #[source]
        cause: Box<Error>,
    },

    /// A fold step failed. `last_result` is the accumulator *before* the
    /// failing step, so a caller can resume from known-good state.
    #[error("some iterable throws error")]
    Reduce {
        iterable: Value,
        index: usize,
        last_result: Value,
        #[source]
        cause: Box<Error>,
    },

    #[error("some callback or iterable throws error")]
    Waterfall {
        iterable: Value,
        index: usize,
        last_result: Value,
        #[source]
        cause: Box<Error>,
    },

    #[error("key {key} not found")]
    KeyNotFound { key: String, result: Value },

    #[error("fulfilled promise is not an object")]
    NotObject { operation: &'static str, result: Value },

    #[error("resulting promise is not a function")]
    Callable { operation: &'static str, result: Value, args: Vec<Value> },

    #[error("max iterations have been reached")]
    MaxIterations { operation: &'static str, iterations: u32 },

    /// A user rejection carrying an arbitrary reason.
    #[error("rejected: {0}")]
    Rejected(Value),

    /// The resolving half of a settle pair was dropped before settling.
    #[error("resolver dropped before the promise settled")]
    ResolverDropped,

    #[error("capability `{name}`: {reason}")]
    Capability { name: String, reason: Cow<'static, str> },

    #[error("invalid argument for {operation}: {reason}")]
    InvalidArgument { operation: &'static str, reason: Cow<'static, str> },
}

/// Discriminant of an [`Error`], usable for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Timeout,
    TimeoutDefault,
    TimersCoherence,
    Iterable,
    Map,
    Find,
    Some,
    ForEach,
    Sequence,
    SequenceAllSettled,
    Reduce,
    Waterfall,
    KeyNotFound,
    NotObject,
    Callable,
    MaxIterations,
    Rejected,
    ResolverDropped,
    Capability,
    InvalidArgument,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 20] = [
        ErrorKind::Timeout,
        ErrorKind::TimeoutDefault,
        ErrorKind::TimersCoherence,
        ErrorKind::Iterable,
        ErrorKind::Map,
        ErrorKind::Find,
        ErrorKind::Some,
        ErrorKind::ForEach,
        ErrorKind::Sequence,
        ErrorKind::SequenceAllSettled,
        ErrorKind::Reduce,
        ErrorKind::Waterfall,
        ErrorKind::KeyNotFound,
        ErrorKind::NotObject,
        ErrorKind::Callable,
        ErrorKind::MaxIterations,
        ErrorKind::Rejected,
        ErrorKind::ResolverDropped,
        ErrorKind::Capability,
        ErrorKind::InvalidArgument,
    ];

    /// Stable, human readable name such as `"TimeoutError"`.
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::TimeoutDefault => "TimeoutDefaultError",
            ErrorKind::TimersCoherence => "TimersCoherenceError",
            ErrorKind::Iterable => "IterableError",
            ErrorKind::Map => "MapError",
            ErrorKind::Find => "FindError",
            ErrorKind::Some => "SomeError",
            ErrorKind::ForEach => "ForEachError",
            ErrorKind::Sequence => "SequenceError",
            ErrorKind::SequenceAllSettled => "SequenceAllSettledError",
            ErrorKind::Reduce => "ReduceError",
            ErrorKind::Waterfall => "WaterfallError",
            ErrorKind::KeyNotFound => "KeyNotFoundError",
            ErrorKind::NotObject => "NotObjectError",
            ErrorKind::Callable => "CallableError",
            ErrorKind::MaxIterations => "MaxIterationsError",
            ErrorKind::Rejected => "RejectedError",
            ErrorKind::ResolverDropped => "ResolverDroppedError",
            ErrorKind::Capability => "CapabilityError",
            ErrorKind::InvalidArgument => "InvalidArgumentError",
        }
    }

    /// Stable short machine tag such as `"TIMEOUT"`.
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::TimeoutDefault => "TIMEOUT_DEFAULT",
            ErrorKind::TimersCoherence => "ATTACH_TIMERS",
            ErrorKind::Iterable => "ITERABLE",
            ErrorKind::Map => "MAP",
            ErrorKind::Find => "FIND",
            ErrorKind::Some => "SOME",
            ErrorKind::ForEach => "FOREACH",
            ErrorKind::Sequence => "SEQUENCE",
            ErrorKind::SequenceAllSettled => "SEQUENCE_ALL_SETTLED",
            ErrorKind::Reduce => "REDUCE",
            ErrorKind::Waterfall => "WATERFALL",
            ErrorKind::KeyNotFound => "KEY_NOT_FOUND",
            ErrorKind::NotObject => "NOT_OBJECT",
            ErrorKind::Callable => "CALLABLE",
            ErrorKind::MaxIterations => "MAX_ITERATIONS",
            ErrorKind::Rejected => "REJECTED",
            ErrorKind::ResolverDropped => "RESOLVER_DROPPED",
            ErrorKind::Capability => "CAPABILITY",
            ErrorKind::InvalidArgument => "ARGUMENT",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        ErrorKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    /// Wraps an arbitrary reason as a rejection.
    pub fn rejected(reason: impl Into<Value>) -> Self {
        Error::Rejected(reason.into())
    }

    pub(crate) fn capability(name: impl Into<String>, reason: impl Into<Cow<'static, str>>) -> Self {
        Error::Capability { name: name.into(), reason: reason.into() }
    }

    pub(crate) fn invalid_argument(
        operation: &'static str,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Error::InvalidArgument { operation, reason: reason.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::TimeoutDefault => ErrorKind::TimeoutDefault,
            Error::TimersCoherence { .. } => ErrorKind::TimersCoherence,
            Error::Iterable { .. } => ErrorKind::Iterable,
            Error::Map { .. } => ErrorKind::Map,
            Error::Find { .. } => ErrorKind::Find,
            Error::Some { .. } => ErrorKind::Some,
            Error::ForEach { .. } => ErrorKind::ForEach,
            Error::Sequence { .. } => ErrorKind::Sequence,
            Error::SequenceAllSettled { .. } => ErrorKind::SequenceAllSettled,
            Error::Reduce { .. } => ErrorKind::Reduce,
            Error::Waterfall { .. } => ErrorKind::Waterfall,
            Error::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Error::NotObject { .. } => ErrorKind::NotObject,
            Error::Callable { .. } => ErrorKind::Callable,
            Error::MaxIterations { .. } => ErrorKind::MaxIterations,
            Error::Rejected(_) => ErrorKind::Rejected,
            Error::ResolverDropped => ErrorKind::ResolverDropped,
            Error::Capability { .. } => ErrorKind::Capability,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// The error that made an iteration combinator fail.
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::Map { cause, .. }
            | Error::Find { cause, .. }
            | Error::Some { cause, .. }
            | Error::ForEach { cause, .. }
            | Error::Sequence { cause, .. }
            | Error::SequenceAllSettled { cause, .. }
            | Error::Reduce { cause, .. }
            | Error::Waterfall { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Position of the first failing element.
    pub fn index(&self) -> Option<usize> {
        match self {
            Error::Map { index, .. }
            | Error::Find { index, .. }
            | Error::Some { index, .. }
            | Error::ForEach { index, .. }
            | Error::Sequence { index, .. }
            | Error::SequenceAllSettled { index, .. }
            | Error::Reduce { index, .. }
            | Error::Waterfall { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Results collected before the failure.
    pub fn partial(&self) -> Option<&[Value]> {
        match self {
            Error::Map { partial, .. }
            | Error::Sequence { partial, .. }
            | Error::SequenceAllSettled { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Accumulator of a fold before its failing step.
    pub fn last_result(&self) -> Option<&Value> {
        match self {
            Error::Reduce { last_result, .. } | Error::Waterfall { last_result, .. } => {
                Some(last_result)
            }
            _ => None,
        }
    }

    pub fn iterable(&self) -> Option<&Value> {
        match self {
            Error::Iterable { iterable, .. }
            | Error::Map { iterable, .. }
            | Error::Find { iterable, .. }
            | Error::Some { iterable, .. }
            | Error::ForEach { iterable, .. }
            | Error::Sequence { iterable, .. }
            | Error::SequenceAllSettled { iterable, .. }
            | Error::Reduce { iterable, .. }
            | Error::Waterfall { iterable, .. } => Some(iterable),
            _ => None,
        }
    }

    pub fn time(&self) -> Option<u64> {
        match self {
            Error::Timeout { time, .. } => *time,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Renders this error followed by every causing error.
    pub fn report(&self) -> String {
        let mut out = format!("{}: {self}", self.name());
        let mut current = self.cause();
        while let Some(cause) = current {
            let _ = write!(out, "\n  From previous error: {}: {cause}", cause.name());
            current = cause.cause();
        }
        out
    }
}
