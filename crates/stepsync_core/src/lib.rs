//! Extraction and reconciliation of handler registrations.
//!
//! An extractor builds an `Assembly` tree from a module scan or an XML
//! descriptor; `ReconcileService` then converges a registry to that tree.

pub mod catalog;
pub mod db;
pub mod extract;
pub mod logging;
pub mod model;
pub mod naming;
pub mod options;
pub mod registry;
pub mod service;

pub use catalog::{Catalog, Message, MessageFilter};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use extract::descriptor_source::DescriptorExtractor;
pub use extract::error::{ExtractError, ExtractResult};
pub use extract::module_source::ModuleExtractor;
pub use extract::scan::{ModuleIdentity, ModuleIntrospector, ModuleScan, TypeDescriptor};
pub use extract::unsecure_config::{parse_unsecure_config, UnsecureConfigEntry};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::assembly::Assembly;
pub use model::handler::Handler;
pub use model::image::Image;
pub use model::kinds::RecordId;
pub use model::service_endpoint::ServiceEndpoint;
pub use model::step::Step;
pub use options::SyncOptions;
pub use registry::adapter::{DeleteSummary, DeleteTargets, RegistryAdapter};
pub use registry::sqlite::SqliteRegistry;
pub use registry::{
    EntityKind, FoundRecord, Predicate, Record, RegistryError, RegistryResult, RemoteRegistry,
};
pub use service::reconcile::{
    ReconcileError, ReconcileReport, ReconcileResult, ReconcileService, ReconcileWarning,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
