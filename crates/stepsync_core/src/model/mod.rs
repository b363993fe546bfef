//! Canonical registration model: assembly → handler → step → image, plus
//! the service endpoints a step may post to.
//!
//! # Responsibility
//! - Define the records produced by extractors and by the registry adapter.
//! - Keep containment identity consistent across all four levels.
//!
//! # Invariants
//! - A nil `RecordId` means the record has not been registered yet.
//! - Identity is changed only through `assign_id`/`rename`, which cascade to
//!   every descendant at assignment time.
//! - `structurally_eq` never treats records with different ids as equal.

pub mod assembly;
pub mod handler;
pub mod image;
pub mod kinds;
pub mod service_endpoint;
pub mod step;
