//! Extractors building a registration model from a module scan or an XML
//! registration descriptor.
//!
//! # Responsibility
//! - Classify candidate types into execution handlers and workflow activities.
//! - Resolve step messages/entities against the registry catalogs.
//!
//! # Invariants
//! - Extraction never touches the registry; catalogs are passed in.
//! - Both sources derive step names through `naming`, so reconciliation
//!   matches the same steps whichever source produced them.
//! - Any classification or catalog failure aborts the whole module.

pub mod descriptor_source;
pub mod error;
pub mod module_source;
pub mod scan;
pub mod unsecure_config;

use crate::model::assembly::{Assembly, NEUTRAL_CULTURE};
use crate::model::kinds::SourceType;
use error::{ExtractError, ExtractResult};
use scan::ModuleIdentity;
use uuid::Uuid;

/// Type-name suffix of execution handlers.
pub const HANDLER_SUFFIX: &str = "Plugin";
/// Type-name suffix of workflow activities.
pub const ACTIVITY_SUFFIX: &str = "Activity";

/// Whether a simple type name marks a registration candidate.
pub fn is_candidate_name(simple_name: &str) -> bool {
    simple_name.ends_with(HANDLER_SUFFIX) || simple_name.ends_with(ACTIVITY_SUFFIX)
}

/// Builds the handler-less assembly record for a module identity.
pub fn assembly_from_identity(identity: &ModuleIdentity) -> ExtractResult<Assembly> {
    if identity.name.trim().is_empty() {
        return Err(ExtractError::MissingArgument("module name"));
    }

    let mut assembly = Assembly::new(identity.name.as_str(), identity.version.as_str());
    assembly.source_type = SourceType::Database;
    assembly.culture = match identity.culture.as_deref() {
        Some(culture) if !culture.trim().is_empty() => culture.to_string(),
        _ => NEUTRAL_CULTURE.to_string(),
    };
    assembly.public_key_token = if identity.public_key_token.is_empty() {
        None
    } else {
        Some(
            identity
                .public_key_token
                .iter()
                .map(|byte| format!("{byte:02X}"))
                .collect(),
        )
    };
    Ok(assembly)
}

/// Stable friendly name for a handler, derived from its type name.
pub fn friendly_name_for(type_name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, type_name.as_bytes()).to_string()
}

/// Joins field names the way the registry stores them; empty lists become `None`.
pub(crate) fn join_field_names(fields: &[String]) -> Option<String> {
    let joined = fields
        .iter()
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::{assembly_from_identity, friendly_name_for, is_candidate_name, join_field_names};
    use crate::extract::error::ExtractError;
    use crate::extract::scan::ModuleIdentity;

    #[test]
    fn identity_maps_to_assembly() {
        let mut identity = ModuleIdentity::new("Acme.Plugins", "1.0.0.0");
        identity.public_key_token = vec![0x0a, 0xff, 0x31];
        let assembly = assembly_from_identity(&identity).expect("valid identity");

        assert_eq!(assembly.name(), "Acme.Plugins");
        assert_eq!(assembly.culture, "neutral");
        assert_eq!(assembly.public_key_token.as_deref(), Some("0AFF31"));
    }

    #[test]
    fn empty_module_name_is_rejected() {
        let err = assembly_from_identity(&ModuleIdentity::new(" ", "1.0")).unwrap_err();
        assert_eq!(err, ExtractError::MissingArgument("module name"));
    }

    #[test]
    fn candidate_suffixes_and_helpers() {
        assert!(is_candidate_name("ContactPlugin"));
        assert!(is_candidate_name("CalcActivity"));
        assert!(!is_candidate_name("ContactHelper"));
        assert_eq!(friendly_name_for("A.B"), friendly_name_for("A.B"));
        assert_ne!(friendly_name_for("A.B"), friendly_name_for("A.C"));
        assert_eq!(
            join_field_names(&["a".to_string(), " b ".to_string()]).as_deref(),
            Some("a,b")
        );
        assert_eq!(join_field_names(&[]), None);
    }
}
