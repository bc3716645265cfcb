//! Middleware registry and the concrete per-stage handlers.

pub mod handlers;
pub mod registry;

pub use registry::{Middleware, MiddlewareRegistry};
