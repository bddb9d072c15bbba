use crate::iter::map;
use crate::options::SerialOptions;
use crate::timing::delay;
use crate::{Error, Function, Object, Promise, Value};

/// One element of a [`sequence`] or a [`waterfall`](super::waterfall),
/// decided once when the element is read: a bare number pauses, a function
/// runs.
#[derive(Debug, Clone)]
pub enum Step {
    /// Wait this many milliseconds and contribute nothing.
    Pause(u64),
    Run(Function),
}

impl Step {
    pub fn pause(ms: u64) -> Self {
        Step::Pause(ms)
    }

    pub fn run(function: Function) -> Self {
        Step::Run(function)
    }

    /// # Errors
    /// [`Error::Callable`] for anything that is neither a number nor a
    /// function. Negative numbers pause for zero milliseconds.
    pub fn from_value(operation: &'static str, value: Value) -> Result<Self, Error> {
        match value {
            Value::Function(function) => Ok(Step::Run(function)),
            value => match value.as_millis() {
                Some(ms) => Ok(Step::Pause(ms)),
                None => Err(Error::Callable { operation, result: value, args: Vec::new() }),
            },
        }
    }
}

impl From<Step> for Value {
    fn from(step: Step) -> Self {
        match step {
            Step::Pause(ms) => Value::from(ms),
            Step::Run(function) => Value::Function(function),
        }
    }
}

/// Outcome of one element of [`sequence_all_settled`].
#[derive(Debug, Clone)]
pub enum Settlement {
    Fulfilled(Value),
    Rejected(Error),
}

impl Settlement {
    pub fn status(&self) -> &'static str {
        match self {
            Settlement::Fulfilled(_) => "fulfilled",
            Settlement::Rejected(_) => "rejected",
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Settlement::Fulfilled(value) => Some(value),
            Settlement::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&Error> {
        match self {
            Settlement::Fulfilled(_) => None,
            Settlement::Rejected(reason) => Some(reason),
        }
    }

    /// The `{status, value}` / `{status, reason}` record form.
    pub fn into_value(self) -> Value {
        let record = Object::new();
        record.insert("status", self.status());
        match self {
            Settlement::Fulfilled(value) => record.insert("value", value),
            Settlement::Rejected(reason) => record.insert("reason", reason),
        };
        Value::Object(record)
    }
}

impl From<Result<Value, Error>> for Settlement {
    fn from(settled: Result<Value, Error>) -> Self {
        match settled {
            Ok(value) => Settlement::Fulfilled(value),
            Err(reason) => Settlement::Rejected(reason),
        }
    }
}

impl From<Value> for Settlement {
    /// Reads a record back; a bare error is a rejection and anything else a
    /// fulfilment.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(ref record) if record.get("status").as_ref().and_then(Value::as_str) == Some("rejected") => {
                match record.get("reason") {
                    Some(Value::Error(reason)) => Settlement::Rejected(*reason),
                    reason => Settlement::Rejected(Error::Rejected(reason.unwrap_or_default())),
                }
            }
            Value::Object(ref record) if record.get("status").as_ref().and_then(Value::as_str) == Some("fulfilled") => {
                Settlement::Fulfilled(record.get("value").unwrap_or_default())
            }
            Value::Error(err) => Settlement::Rejected(*err),
            value => Settlement::Fulfilled(value),
        }
    }
}

fn without_pauses(results: Vec<Value>, pauses: &[usize]) -> Vec<Value> {
    results
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !pauses.contains(index))
        .map(|(_, value)| value)
        .collect()
}

/// Runs the elements strictly in order. Numbers pause for that many
/// milliseconds; functions are invoked with no arguments and their results
/// collected. Pauses are left out of the result.
///
/// # Errors
/// [`Error::Sequence`] when an element fails, with pauses left out of its
/// partial results.
pub async fn sequence(iterable: impl Into<Value>, options: SerialOptions) -> Result<Vec<Value>, Error> {
    let mut pauses = Vec::new();
    let traversal = map(
        iterable,
        |element, index, _| match Step::from_value("sequence", element) {
            Ok(Step::Pause(ms)) => {
                pauses.push(index);
                delay(ms, Value::Undefined)
            }
            Ok(Step::Run(function)) => function.call(Vec::new()),
            Err(err) => Promise::reject(err),
        },
        options.into(),
    )
    .await;
    match traversal {
        Ok(results) => Ok(without_pauses(results, &pauses)),
        Err(Error::Map { iterable, index, partial, cause }) => Err(Error::Sequence {
            iterable,
            index,
            partial: without_pauses(partial, &pauses),
            cause,
        }),
        Err(err) => Err(err),
    }
}

/// Like [`sequence`], but every function's outcome is captured as a
/// [`Settlement`] instead of aborting. Only structural failures, such as a
/// non-list input or an expired timer, fail the whole traversal.
///
/// Those failures surface as [`Error::SequenceAllSettled`], a kind of its
/// own: matching on [`ErrorKind::Sequence`] does not catch them.
///
/// [`ErrorKind::Sequence`]: crate::ErrorKind::Sequence
pub async fn sequence_all_settled(
    iterable: impl Into<Value>,
    options: SerialOptions,
) -> Result<Vec<Settlement>, Error> {
    let mut pauses = Vec::new();
    let traversal = map(
        iterable,
        |element, index, _| match Step::from_value("sequenceAllSettled", element) {
            Ok(Step::Pause(ms)) => {
                pauses.push(index);
                delay(ms, Value::Undefined)
            }
            Ok(Step::Run(function)) => {
                let running = function.call(Vec::new());
                Promise::from_future(async move { Ok(Settlement::from(running.await).into_value()) })
            }
            Err(err) => Promise::resolve(Settlement::Rejected(err).into_value()),
        },
        options.into(),
    )
    .await;
    match traversal {
        Ok(results) => Ok(without_pauses(results, &pauses).into_iter().map(Settlement::from).collect()),
        Err(Error::Map { iterable, index, partial, cause }) => Err(Error::SequenceAllSettled {
            iterable,
            index,
            partial: without_pauses(partial, &pauses),
            cause,
        }),
        Err(err) => Err(err),
    }
}
