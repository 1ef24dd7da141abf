//! HTTP surface of the SOL payment relay.
//!
//! Exposes the router and error mapping as a library so they can be
//! exercised in tests; the binary entry point lives in `main.rs`.

/// HTTP error mapping.
pub mod error;
/// Route handlers and router assembly.
pub mod handlers;
