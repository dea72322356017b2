//! One render session: the per-call state of the convergence loop.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use universal_common::{identify, Action, ActionIdentity, AsyncHandle, OperationId, RenderConfig};
use universal_store::{ActiveOperations, TrackedOperation};

use crate::error::{RenderError, RenderFailure};
use crate::render::Render;
use crate::renderer::Rendered;

/// What the loop does after a successful pass.
#[derive(Debug)]
pub enum Transition {
    /// Nothing outstanding: the last output is final.
    Resolved,
    /// Wait for the first of these to settle, then render again.
    Wait(Vec<AsyncHandle>),
}

/// Tracks what a session has already observed across passes.
///
/// `seen_actions` only grows; a new operation whose action identity is
/// already in it means the render keeps re-triggering the same work.
#[derive(Debug)]
pub struct RenderSession<'c> {
    config: &'c RenderConfig,
    seen_operations: HashSet<OperationId>,
    seen_actions: HashMap<ActionIdentity, Action>,
    output: String,
    passes: u32,
}

impl<'c> RenderSession<'c> {
    pub fn new(config: &'c RenderConfig) -> Self {
        Self {
            config,
            seen_operations: HashSet::new(),
            seen_actions: HashMap::new(),
            output: String::new(),
            passes: 0,
        }
    }

    /// Last rendered output; empty before the first successful pass.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn seen_operation_count(&self) -> usize {
        self.seen_operations.len()
    }

    /// Render once, then decide whether to resolve or wait.
    pub fn advance<E, R>(
        &mut self,
        render_fn: &mut R,
        element: &E,
        source: &dyn ActiveOperations,
    ) -> Result<Transition, RenderError>
    where
        E: ?Sized,
        R: Render<E>,
    {
        if let Some(limit) = self.config.max_passes {
            if self.passes >= limit {
                return Err(RenderError::PassLimitExceeded { limit });
            }
        }

        self.passes += 1;
        self.output = render_fn.render(element).map_err(RenderError::RenderThrow)?;

        let active = source.list_active();
        let new_operations: Vec<&TrackedOperation> = active
            .iter()
            .filter(|op| !self.seen_operations.contains(&op.handle.id()))
            .collect();

        let fresh_actions = dedupe_by_identity(&new_operations)?;

        let repeated: Vec<Action> = fresh_actions
            .iter()
            .filter(|(identity, _)| self.seen_actions.contains_key(identity))
            .map(|(_, action)| action.clone())
            .collect();
        if !repeated.is_empty() {
            return Err(RenderError::cycle(repeated, self.config.color_diagnostics));
        }

        debug!(
            pass = self.passes,
            active = active.len(),
            new_operations = new_operations.len(),
            new_actions = fresh_actions.len(),
            "render pass complete"
        );

        self.seen_operations
            .extend(new_operations.iter().map(|op| op.handle.id()));
        self.seen_actions.extend(fresh_actions);

        if active.is_empty() {
            Ok(Transition::Resolved)
        } else {
            Ok(Transition::Wait(
                active.into_iter().map(|op| op.handle).collect(),
            ))
        }
    }

    pub fn finish(self) -> Rendered {
        Rendered {
            output: self.output,
            passes: self.passes,
        }
    }

    pub fn fail(self, error: RenderError) -> RenderFailure {
        RenderFailure {
            output: self.output,
            error,
            passes: self.passes,
        }
    }
}

/// Identity → action over one pass's new operations, in first-seen order.
/// A later action with an identity already present replaces the earlier one.
fn dedupe_by_identity(
    operations: &[&TrackedOperation],
) -> Result<Vec<(ActionIdentity, Action)>, RenderError> {
    let mut positions: HashMap<ActionIdentity, usize> = HashMap::new();
    let mut deduped: Vec<(ActionIdentity, Action)> = Vec::with_capacity(operations.len());

    for op in operations {
        let identity = identify(&op.action)?;
        match positions.get(&identity) {
            Some(&index) => deduped[index].1 = op.action.clone(),
            None => {
                positions.insert(identity.clone(), deduped.len());
                deduped.push((identity, op.action.clone()));
            }
        }
    }

    Ok(deduped)
}
