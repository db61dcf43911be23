//! # Tapir
//!
//! Request middleware core of the book club API: panic containment, per-client
//! rate limiting, bearer-token authentication over bcrypt credentials, tracked
//! background work, and a strict JSON boundary.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and `from_fn` middleware
//! - **Tower / tower-http**: panic catching, tracing, CORS
//! - **Tokio**: async runtime, timers and task tracking
//! - **Serde**: strict request decoding and enveloped responses
//!
//! ## Core Components
//!
//! - [`auth`]: credential hashing, tokens, identities and the bearer resolver
//! - [`background`]: detached tasks with a fault boundary and shutdown wait
//! - [`config`]: layered configuration
//! - [`error`]: the application error type and its HTTP mapping
//! - [`json`]: body decoding and the response envelope
//! - [`metrics`]: pipeline counters
//! - [`middleware`]: recovery, rate limiting, authentication and gates
//! - [`notify`]: outbound notifications
//! - [`routes`]: account endpoints and the router
//! - [`state`]: shared application state
//! - [`store`]: user and token persistence interfaces
//! - [`validator`]: field validation

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod json;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod validator;

#[cfg(test)]
mod tests;
