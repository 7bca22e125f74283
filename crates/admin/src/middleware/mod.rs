//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, added in `main`)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Bearer token resolution, per handler via [`AdminCaller`]

pub mod auth;

pub use auth::AdminCaller;
