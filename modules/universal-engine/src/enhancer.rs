//! Store enhancer: tracked middleware plus `render_universal`.

use std::ops::Deref;
use std::sync::Arc;

use universal_common::RenderConfig;
use universal_store::{intercept, Middleware, OperationRegistry, Reducer, Store};

use crate::error::RenderFailure;
use crate::render::Render;
use crate::renderer::{ConvergenceRenderer, Rendered};

/// Wrap every stage so its asynchronous results are tracked, in order.
pub fn apply_middleware<S: Send + 'static>(stages: Vec<Arc<dyn Middleware<S>>>) -> Enhancer<S> {
    Enhancer {
        stages,
        config: RenderConfig::default(),
    }
}

pub struct Enhancer<S> {
    stages: Vec<Arc<dyn Middleware<S>>>,
    config: RenderConfig,
}

impl<S: Send + 'static> Enhancer<S> {
    /// Append one more stage after those already given.
    pub fn with(mut self, stage: Arc<dyn Middleware<S>>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the store. Each store gets its own registry, shared by its
    /// wrapped stages and its renderer.
    pub fn create_store(self, reducer: impl Reducer<S> + 'static, initial_state: S) -> UniversalStore<S> {
        let registry = OperationRegistry::new();
        let chain = self
            .stages
            .into_iter()
            .map(|stage| intercept(stage, &registry))
            .collect();

        UniversalStore {
            store: Store::with_middleware(reducer, initial_state, chain),
            renderer: ConvergenceRenderer::with_config(registry, self.config),
        }
    }
}

/// A store whose dispatches are tracked, plus the convergence loop over them.
pub struct UniversalStore<S> {
    store: Store<S>,
    renderer: ConvergenceRenderer<OperationRegistry>,
}

impl<S: Send + 'static> UniversalStore<S> {
    /// Render `element` until no new asynchronous work appears and all of
    /// it has settled.
    ///
    /// `render_fn` may dispatch into this store. It must not dispatch while
    /// holding [`Store::with_state`], the state lock is not reentrant.
    pub async fn render_universal<E, R>(&self, render_fn: R, element: &E) -> Result<Rendered, RenderFailure>
    where
        E: ?Sized,
        R: Render<E>,
    {
        self.renderer.render(render_fn, element).await
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    pub fn registry(&self) -> &OperationRegistry {
        self.renderer.source()
    }

    pub fn config(&self) -> &RenderConfig {
        self.renderer.config()
    }
}

impl<S> Deref for UniversalStore<S> {
    type Target = Store<S>;

    fn deref(&self) -> &Store<S> {
        &self.store
    }
}
