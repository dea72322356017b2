//! Action store with an ordered middleware chain.
//!
//! Dispatch flows stage → stage → reducer. Stages wrapped with
//! [`intercept`] report any asynchronous result they return to a shared
//! [`OperationRegistry`], which the renderer polls between passes.
//!
//! The store holds a locked state, a reducer and the chain. Subscriptions
//! and reducer replacement are not provided.

pub mod intercept;
pub mod middleware;
pub mod registry;
pub mod store;

pub use intercept::{intercept, Intercepted};
pub use middleware::{from_fn, FnMiddleware, Middleware, Next, ThunkMiddleware};
pub use registry::{ActiveOperations, OperationRegistry, Removal, TrackedOperation};
pub use store::{Reducer, Store};
