//! Integration test entry point.
//!
//! The tests live in the `integration/` directory and run against the
//! kernel inside throwaway network namespaces, so they need root:
//!
//! ```bash
//! sudo cargo test --test integration
//! sudo cargo test --test integration masquerade
//! ```
//!
//! Without root every test returns early.

#[macro_use]
#[path = "common/mod.rs"]
mod common;

#[path = "integration/interface.rs"]
mod interface;

#[path = "integration/masquerade.rs"]
mod masquerade;

#[path = "integration/orchestrator.rs"]
mod orchestrator;
