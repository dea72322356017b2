//! Universal rendering engine.
//!
//! Render → snapshot outstanding operations → check for repeats → wait for
//! the first settlement → render again, until a pass triggers nothing new
//! and nothing is left outstanding.
//!
//! [`apply_middleware`] builds a store whose stages feed an operation
//! registry and exposes the loop as [`UniversalStore::render_universal`].

pub mod enhancer;
pub mod error;
pub mod render;
pub mod renderer;
pub mod session;

pub use enhancer::{apply_middleware, Enhancer, UniversalStore};
pub use error::{RenderError, RenderFailure};
pub use render::Render;
pub use renderer::{ConvergenceRenderer, Rendered};
pub use session::{RenderSession, Transition};
