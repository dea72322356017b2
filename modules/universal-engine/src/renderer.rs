//! The convergence loop.

use futures::future::select_all;
use tracing::{debug, info, warn};
use universal_common::{AsyncHandle, RenderConfig};
use universal_store::ActiveOperations;

use crate::error::RenderFailure;
use crate::render::Render;
use crate::session::{RenderSession, Transition};

/// A settled render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    pub passes: u32,
}

/// Renders repeatedly until a pass triggers no new asynchronous work and
/// nothing is left outstanding.
///
/// Reads outstanding operations from `A` after every pass. Each
/// [`render`](Self::render) call gets its own [`RenderSession`].
pub struct ConvergenceRenderer<A> {
    source: A,
    config: RenderConfig,
}

impl<A: ActiveOperations> ConvergenceRenderer<A> {
    pub fn new(source: A) -> Self {
        Self::with_config(source, RenderConfig::default())
    }

    pub fn with_config(source: A, config: RenderConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `element` until settled.
    ///
    /// Fails with the last rendered output when the render function fails,
    /// an action repeats across passes, an action is malformed, or the
    /// configured pass limit is hit.
    pub async fn render<E, R>(&self, mut render_fn: R, element: &E) -> Result<Rendered, RenderFailure>
    where
        E: ?Sized,
        R: Render<E>,
    {
        let mut session = RenderSession::new(&self.config);

        loop {
            match session.advance(&mut render_fn, element, &self.source) {
                Ok(Transition::Resolved) => {
                    info!(passes = session.passes(), "render settled");
                    return Ok(session.finish());
                }
                Ok(Transition::Wait(handles)) => {
                    debug!(
                        pass = session.passes(),
                        outstanding = handles.len(),
                        "waiting for first settlement"
                    );
                    first_settlement(&handles).await;
                }
                Err(error) => {
                    warn!(
                        passes = session.passes(),
                        kind = error.kind(),
                        "render aborted"
                    );
                    return Err(session.fail(error));
                }
            }
        }
    }
}

/// Resolves when any handle settles, fulfilled or rejected alike.
async fn first_settlement(handles: &[AsyncHandle]) {
    if handles.is_empty() {
        return;
    }
    let _ = select_all(handles.iter().map(AsyncHandle::settled)).await;
}
