//! Iteration combinators.
//!
//! Every combinator accepts an iterable that may itself be a promise (or a
//! thunk); it is resolved before iteration starts and must be a
//! [`Value::List`], otherwise the combinator fails with [`Error::Iterable`].
//! Elements that are promises are awaited before the callback sees them.
//!
//! Higher combinators re-wrap the failure of the one they are built on into
//! their own variant, keeping the index, partial results and cause:
//! `for_each` atop `map`, `sequence` and `sequence_all_settled` atop `map`,
//! `some` atop `find`, `waterfall` atop `reduce`.

mod fold;
mod sequence;
mod traverse;

pub use fold::{reduce, waterfall};
pub use sequence::{sequence, sequence_all_settled, Settlement, Step};
pub use traverse::{find, for_each, map, some};

use crate::util::resolve_promise;
use crate::{Error, Value};

/// Resolves `iterable` and splits it into the resolved value, kept for error
/// context and callbacks, and its elements.
async fn elements(operation: &'static str, iterable: impl Into<Value>) -> Result<(Value, Vec<Value>), Error> {
    match resolve_promise(iterable).await? {
        Value::List(items) => Ok((Value::List(items.clone()), items)),
        iterable => Err(Error::Iterable { operation, iterable }),
    }
}
