//! Processing stages and the chain that runs them.

use std::fmt;
use std::sync::Arc;

use tracing::trace;
use universal_common::{Action, Dispatched, StoreError};

use crate::store::Store;

/// A processing stage around dispatch.
///
/// A stage may inspect or transform the action, call `next` zero or more
/// times, dispatch new actions through `store`, or return an asynchronous
/// result instead of a value.
pub trait Middleware<S>: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle(
        &self,
        store: &Store<S>,
        action: Action,
        next: Next<'_, S>,
    ) -> Result<Dispatched, StoreError>;
}

/// The remainder of the chain after the current stage, ending at the reducer.
pub struct Next<'a, S> {
    store: &'a Store<S>,
    rest: &'a [Arc<dyn Middleware<S>>],
}

impl<S> Clone for Next<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Next<'_, S> {}

impl<S> fmt::Debug for Next<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_stages", &self.rest.len())
            .finish()
    }
}

impl<'a, S: Send + 'static> Next<'a, S> {
    pub(crate) fn new(store: &'a Store<S>, chain: &'a [Arc<dyn Middleware<S>>]) -> Self {
        Self { store, rest: chain }
    }

    pub fn run(self, action: Action) -> Result<Dispatched, StoreError> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.handle(
                self.store,
                action,
                Next {
                    store: self.store,
                    rest,
                },
            ),
            None => self.store.reduce(action),
        }
    }
}

/// Runs thunk actions with the store as their dispatcher and returns what
/// they return. Records pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThunkMiddleware;

impl<S: Send + 'static> Middleware<S> for ThunkMiddleware {
    fn name(&self) -> &str {
        "thunk"
    }

    fn handle(
        &self,
        store: &Store<S>,
        action: Action,
        next: Next<'_, S>,
    ) -> Result<Dispatched, StoreError> {
        match &action {
            Action::Thunk(thunk) => {
                trace!(source = thunk.source(), "running thunk");
                thunk.call(store)
            }
            Action::Record(_) => next.run(action),
        }
    }
}

/// A stage built from a closure.
pub struct FnMiddleware<F> {
    name: &'static str,
    handler: F,
}

impl<S: Send + 'static, F> Middleware<S> for FnMiddleware<F>
where
    F: for<'a> Fn(&Store<S>, Action, Next<'a, S>) -> Result<Dispatched, StoreError> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn handle(
        &self,
        store: &Store<S>,
        action: Action,
        next: Next<'_, S>,
    ) -> Result<Dispatched, StoreError> {
        (self.handler)(store, action, next)
    }
}

/// Wrap a closure as a shareable stage.
pub fn from_fn<S, F>(name: &'static str, handler: F) -> Arc<dyn Middleware<S>>
where
    S: Send + 'static,
    F: for<'a> Fn(&Store<S>, Action, Next<'a, S>) -> Result<Dispatched, StoreError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware { name, handler })
}
