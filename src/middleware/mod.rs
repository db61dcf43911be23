//! Middleware for the request pipeline.
//!
//! Outer to inner: [`recover`] (panic containment), [`rate_limit`] (per-client
//! admission), [`auth::authenticate`] (identity resolution). The gates in
//! [`auth`] are attached per route group after routing.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod recover;

pub use rate_limit::RateLimiterRegistry;
