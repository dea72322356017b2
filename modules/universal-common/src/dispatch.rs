//! The dispatch capability shared by stores, stages and thunks.

use crate::action::Action;
use crate::error::StoreError;
use crate::handle::AsyncHandle;

/// What a dispatch produced.
#[derive(Debug, Clone)]
pub enum Dispatched {
    /// A plain value, usually the action record itself after reduction.
    Value(serde_json::Value),
    /// An asynchronous result still pending (or already settled).
    Pending(AsyncHandle),
}

impl Dispatched {
    pub fn as_pending(&self) -> Option<&AsyncHandle> {
        match self {
            Dispatched::Pending(handle) => Some(handle),
            Dispatched::Value(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatched::Pending(_))
    }

    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Dispatched::Value(value) => Some(value),
            Dispatched::Pending(_) => None,
        }
    }
}

impl From<AsyncHandle> for Dispatched {
    fn from(handle: AsyncHandle) -> Self {
        Dispatched::Pending(handle)
    }
}

impl From<serde_json::Value> for Dispatched {
    fn from(value: serde_json::Value) -> Self {
        Dispatched::Value(value)
    }
}

/// Anything actions can be dispatched into.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, action: Action) -> Result<Dispatched, StoreError>;
}
