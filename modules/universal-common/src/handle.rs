//! Asynchronous handles produced while processing an action.
//!
//! An [`AsyncHandle`] is a shared, cloneable future. Every clone observes the
//! same settlement, and identity is the [`OperationId`] assigned at creation,
//! never the settled value.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Why an operation was rejected. Cloneable so every handle clone can see it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct Rejection {
    pub message: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Rejection {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Outcome of an asynchronous operation: fulfilled with a value or rejected.
pub type Settlement = Result<serde_json::Value, Rejection>;

type SharedSettlement = Shared<BoxFuture<'static, Settlement>>;

#[derive(Clone)]
pub struct AsyncHandle {
    id: OperationId,
    future: SharedSettlement,
}

impl AsyncHandle {
    /// Wrap a future. It makes progress whenever any clone is polled.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Settlement> + Send + 'static,
    {
        Self {
            id: OperationId::next(),
            future: future.boxed().shared(),
        }
    }

    /// A handle that settles with `settlement` on first poll.
    pub fn ready(settlement: Settlement) -> Self {
        Self::new(futures::future::ready(settlement))
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    /// True once some clone has observed the settlement.
    pub fn is_settled(&self) -> bool {
        self.future.peek().is_some()
    }

    /// The settlement, if some clone has already observed it.
    pub fn settlement(&self) -> Option<Settlement> {
        self.future.peek().cloned()
    }

    /// A future resolving to the settlement. Dropping it does not cancel
    /// the operation for other clones.
    pub fn settled(&self) -> SharedSettlement {
        self.future.clone()
    }

    pub fn same_operation(&self, other: &AsyncHandle) -> bool {
        self.id == other.id
    }
}

impl IntoFuture for AsyncHandle {
    type Output = Settlement;
    type IntoFuture = SharedSettlement;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("id", &self.id)
            .field("settled", &self.is_settled())
            .finish()
    }
}
