//! Use-case services on top of the registry.
//!
//! # Responsibility
//! - Orchestrate registry calls into whole-assembly operations.
//! - Keep callers independent of the concrete registry store.

pub mod reconcile;
