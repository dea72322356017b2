//! Transparent wrapping of stages so their asynchronous results are tracked.

use std::sync::Arc;

use universal_common::{Action, Dispatched, StoreError};

use crate::middleware::{Middleware, Next};
use crate::registry::OperationRegistry;
use crate::store::Store;

/// A stage whose asynchronous results are reported to a registry.
///
/// The wrapped stage sees the same store, action and `next` it would see
/// unwrapped, and its return value is passed back untouched.
pub struct Intercepted<S> {
    stage: Arc<dyn Middleware<S>>,
    registry: OperationRegistry,
}

/// Wrap `stage` so any [`Dispatched::Pending`] it returns is registered
/// together with the action the stage received.
pub fn intercept<S: Send + 'static>(
    stage: Arc<dyn Middleware<S>>,
    registry: &OperationRegistry,
) -> Arc<dyn Middleware<S>> {
    Arc::new(Intercepted {
        stage,
        registry: registry.clone(),
    })
}

impl<S: Send + 'static> Middleware<S> for Intercepted<S> {
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn handle(
        &self,
        store: &Store<S>,
        action: Action,
        next: Next<'_, S>,
    ) -> Result<Dispatched, StoreError> {
        let result = self.stage.handle(store, action.clone(), next)?;
        if let Dispatched::Pending(handle) = &result {
            self.registry.add_operation(handle.clone(), action);
        }
        Ok(result)
    }
}
