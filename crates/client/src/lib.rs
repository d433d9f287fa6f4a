//! Secure matrix API client.
//!
//! This crate is the single source of truth for talking to the secure-matrix
//! endpoints: save, undo/redo, load-cells, logout, plus the teardown-safe
//! logout beacon and CSRF token resolution.
//!
//! No UI concepts. No retries: callers decide what a failure means.

mod beacon;
mod client;
mod csrf;

pub use beacon::{Beacon, BeaconQueue};
pub use client::{ClientError, ClientOptions, MatrixApi, MatrixClient};
pub use csrf::{CookieJar, TokenSource, resolve_csrf_token};
