//! Actions: structured records or deferred thunks.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::dispatch::{Dispatch, Dispatched};
use crate::error::StoreError;

type ThunkBody = dyn Fn(&dyn Dispatch) -> Result<Dispatched, StoreError> + Send + Sync;

/// A request for a state change.
#[derive(Clone)]
pub enum Action {
    /// A JSON record carrying a `type` discriminator.
    Record(Value),
    /// A deferred computation run by a thunk-aware stage.
    Thunk(Thunk),
}

/// A callable action. Carries its source text so repeated occurrences can be
/// recognised even when the closures are distinct values.
#[derive(Clone)]
pub struct Thunk {
    source: Arc<str>,
    body: Arc<ThunkBody>,
}

impl Thunk {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn call(&self, dispatch: &dyn Dispatch) -> Result<Dispatched, StoreError> {
        (self.body)(dispatch)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk").field("source", &self.source).finish()
    }
}

impl Action {
    /// A record action `{"type": kind}`.
    pub fn of_type(kind: impl Into<String>) -> Self {
        Action::Record(serde_json::json!({ "type": kind.into() }))
    }

    /// A record action from any JSON value. Shape is checked on identification.
    pub fn record(value: Value) -> Self {
        Action::Record(value)
    }

    /// A record action from a serializable event, e.g. a `#[serde(tag = "type")]` enum.
    pub fn from_event<T: Serialize>(event: &T) -> serde_json::Result<Self> {
        Ok(Action::Record(serde_json::to_value(event)?))
    }

    /// A thunk with explicit source text. Prefer the [`thunk!`](crate::thunk) macro,
    /// which captures the closure's own tokens.
    pub fn thunk<F>(source: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&dyn Dispatch) -> Result<Dispatched, StoreError> + Send + Sync + 'static,
    {
        Action::Thunk(Thunk {
            source: source.into(),
            body: Arc::new(body),
        })
    }

    pub fn is_thunk(&self) -> bool {
        matches!(self, Action::Thunk(_))
    }

    pub fn as_record(&self) -> Option<&Value> {
        match self {
            Action::Record(value) => Some(value),
            Action::Thunk(_) => None,
        }
    }

    /// Human-readable body: source text for thunks, pretty JSON for records.
    pub fn describe(&self) -> String {
        match self {
            Action::Thunk(thunk) => thunk.source().to_string(),
            Action::Record(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Record(value) => f.debug_tuple("Record").field(value).finish(),
            Action::Thunk(thunk) => f.debug_tuple("Thunk").field(&thunk.source).finish(),
        }
    }
}

impl From<Value> for Action {
    fn from(value: Value) -> Self {
        Action::Record(value)
    }
}

/// Build a thunk action whose source text is the closure's own tokens.
///
/// ```
/// use universal_common::{thunk, Action, Dispatched};
///
/// let action: Action = thunk!(|_dispatch| Ok(Dispatched::Value(serde_json::json!(42))));
/// assert!(action.is_thunk());
/// ```
#[macro_export]
macro_rules! thunk {
    ($($body:tt)+) => {
        $crate::Action::thunk(stringify!($($body)+), $($body)+)
    };
}
