//! Shared vocabulary for universal rendering.
//!
//! Actions (records and thunks), their identities, asynchronous handles,
//! the dispatch capability and renderer configuration. No store, no loop:
//! those live in `universal-store` and `universal-engine`.

pub mod action;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod identity;

pub use action::{Action, Thunk};
pub use config::RenderConfig;
pub use dispatch::{Dispatch, Dispatched};
pub use error::{ActionError, StoreError};
pub use handle::{AsyncHandle, OperationId, Rejection, Settlement};
pub use identity::{fingerprint, identify, ActionIdentity};
