//! The store: locked state, a reducer and the middleware chain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::trace;
use universal_common::{identify, Action, Dispatch, Dispatched, StoreError};

use crate::middleware::{Middleware, Next};

/// Pure state updates. No I/O, no dispatching.
///
/// Called with every record action that reaches the end of the chain.
pub trait Reducer<S>: Send + Sync {
    fn reduce(&self, state: &mut S, action: &Value);
}

impl<S, F> Reducer<S> for F
where
    F: Fn(&mut S, &Value) + Send + Sync,
{
    fn reduce(&self, state: &mut S, action: &Value) {
        self(state, action)
    }
}

/// Cheaply cloneable store handle. Clones share state and chain.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    state: Mutex<S>,
    reducer: Box<dyn Reducer<S>>,
    chain: Vec<Arc<dyn Middleware<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Send + 'static> Store<S> {
    /// A store with no middleware: dispatch goes straight to the reducer.
    pub fn new(reducer: impl Reducer<S> + 'static, initial_state: S) -> Self {
        Self::with_middleware(reducer, initial_state, Vec::new())
    }

    /// A store whose dispatches run through `chain` in order before reducing.
    pub fn with_middleware(
        reducer: impl Reducer<S> + 'static,
        initial_state: S,
        chain: Vec<Arc<dyn Middleware<S>>>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial_state),
                reducer: Box::new(reducer),
                chain,
            }),
        }
    }

    /// Dispatch an action through the whole chain.
    pub fn dispatch(&self, action: Action) -> Result<Dispatched, StoreError> {
        Next::new(self, &self.inner.chain).run(action)
    }

    /// Clone of the current state.
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.lock().clone()
    }

    /// Read the current state without cloning it.
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.lock())
    }

    pub fn middleware_names(&self) -> Vec<&str> {
        self.inner.chain.iter().map(|stage| stage.name()).collect()
    }

    /// Tail of the chain: reduce a record and hand it back.
    pub(crate) fn reduce(&self, action: Action) -> Result<Dispatched, StoreError> {
        let identity = identify(&action)?;
        match action {
            Action::Thunk(thunk) => Err(StoreError::UnhandledThunk(thunk.source().to_string())),
            Action::Record(record) => {
                trace!(action = %identity, "reducing");
                self.inner.reducer.reduce(&mut self.lock(), &record);
                Ok(Dispatched::Value(record))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Send + 'static> Dispatch for Store<S> {
    fn dispatch(&self, action: Action) -> Result<Dispatched, StoreError> {
        Store::dispatch(self, action)
    }
}
