//! Workspace façade crate.
//!
//! Host applications depend on `earmark` and get the composed core
//! (`CoreService`) without wiring `core-service` and its sibling crates
//! individually.

pub use core_service::*;
