//! Deterministic names shared by both extractors.
//!
//! # Responsibility
//! - Derive step names, which are the natural key used by reconciliation.
//! - Map message names to the payload property identifying the primary record.
//!
//! # Invariants
//! - Every function here is pure: equal inputs give equal outputs, whichever
//!   source produced them.

use once_cell::sync::Lazy;
use regex::Regex;

static TYPE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s.]+(\.[^\s.]+)*$").expect("valid type name regex")
});

const NOT_SPECIFIED_MESSAGE: &str = "Not Specified";
const ANY_ENTITY: &str = "any Entity";
const PLUGIN_SUFFIX: &str = "Plugin";

const MESSAGE_PROPERTY_NAMES: &[(&str, &str)] = &[
    ("Create", "Id"),
    ("Assign", "Target"),
    ("Update", "Target"),
    ("Delete", "Target"),
    ("Merge", "Target,SubordinateId"),
    ("SetState", "EntityMoniker"),
    ("SetStateDynamicEntity", "EntityMoniker"),
];

/// Derives the step name for one message subscription.
///
/// Format: `"{type}: {message} of {primary}[ and {secondary}]"`, where `type`
/// is the last `.` segment of `type_name`. A primary entity of `entity` or
/// `none` is treated as absent; with no entity at all the tail is
/// `"any Entity"`.
pub fn step_name(
    type_name: &str,
    message_name: &str,
    primary_entity: Option<&str>,
    secondary_entity: Option<&str>,
) -> String {
    let mut name = String::new();
    if !type_name.trim().is_empty() {
        name.push_str(last_segment(type_name));
        name.push_str(": ");
    }

    if message_name.is_empty() {
        name.push_str(NOT_SPECIFIED_MESSAGE);
    } else {
        name.push_str(message_name);
    }
    name.push_str(" of ");

    let primary = primary_entity
        .map(str::to_lowercase)
        .filter(|entity| !entity.is_empty() && entity != "entity" && entity != "none");
    let secondary = secondary_entity
        .filter(|entity| !entity.is_empty() && !entity.eq_ignore_ascii_case("none"));

    match (primary, secondary) {
        (Some(primary), Some(secondary)) => {
            name.push_str(&primary);
            name.push_str(" and ");
            name.push_str(secondary);
        }
        (Some(primary), None) => name.push_str(&primary),
        (None, Some(secondary)) => name.push_str(secondary),
        (None, None) => name.push_str(ANY_ENTITY),
    }

    name
}

/// Returns the payload property path identifying the primary record of a message.
///
/// A leading `On` (handler method naming) is ignored. Unknown messages map to `None`.
pub fn message_property_name(message_name: &str) -> Option<&'static str> {
    let message = message_name.strip_prefix("On").unwrap_or(message_name);
    MESSAGE_PROPERTY_NAMES
        .iter()
        .find(|(name, _)| *name == message)
        .map(|(_, property)| *property)
}

/// Last segment of the type name with every `Plugin` occurrence removed.
pub fn handler_short_name(type_name: &str) -> String {
    last_segment(type_name).replace(PLUGIN_SUFFIX, "")
}

/// Human-readable handler name: `"{namespace tail}: {short name}"`.
pub fn handler_display_name(type_name: &str) -> String {
    let short = handler_short_name(type_name);
    let mut segments = type_name.rsplit('.');
    segments.next();
    match segments.next() {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}: {short}"),
        _ => short,
    }
}

/// Simple (unqualified) type name.
pub fn last_segment(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

/// Whether `value` is a dot-separated type name such as
/// `Acme.Plugins.ContactPlugin`.
///
/// Segments may carry nested (`Outer+Inner`) and generic-arity (`` Name`1 ``)
/// markers; empty segments and whitespace are rejected.
pub fn is_valid_type_name(value: &str) -> bool {
    TYPE_NAME_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::{
        handler_display_name, handler_short_name, is_valid_type_name, message_property_name,
        step_name,
    };

    #[test]
    fn step_name_with_primary_entity() {
        assert_eq!(
            step_name("ContactPlugin", "Update", Some("contact"), None),
            "ContactPlugin: Update of contact"
        );
        assert_eq!(
            step_name("Acme.Plugins.Contact", "Create", Some("Contact"), None),
            "Contact: Create of contact"
        );
    }

    #[test]
    fn step_name_omits_generic_entity_placeholders() {
        assert_eq!(
            step_name("Audit", "Update", Some("Entity"), None),
            "Audit: Update of any Entity"
        );
        assert_eq!(
            step_name("Audit", "Update", Some("NONE"), None),
            "Audit: Update of any Entity"
        );
        assert_eq!(step_name("Audit", "Update", None, None), "Audit: Update of any Entity");
    }

    #[test]
    fn step_name_with_secondary_entity() {
        assert_eq!(
            step_name("Link", "Associate", Some("contact"), Some("account")),
            "Link: Associate of contact and account"
        );
        assert_eq!(
            step_name("Link", "Associate", Some("entity"), Some("account")),
            "Link: Associate of account"
        );
        assert_eq!(
            step_name("Link", "Associate", Some("contact"), Some("none")),
            "Link: Associate of contact"
        );
    }

    #[test]
    fn step_name_without_type_or_message() {
        assert_eq!(step_name("  ", "", Some("lead"), None), "Not Specified of lead");
    }

    #[test]
    fn step_name_is_deterministic() {
        let first = step_name("ContactPlugin", "Update", Some("contact"), None);
        let second = step_name("ContactPlugin", "Update", Some("contact"), None);
        assert_eq!(first, second);
    }

    #[test]
    fn message_property_lookup() {
        assert_eq!(message_property_name("Create"), Some("Id"));
        assert_eq!(message_property_name("OnUpdate"), Some("Target"));
        assert_eq!(message_property_name("Merge"), Some("Target,SubordinateId"));
        assert_eq!(message_property_name("SetStateDynamicEntity"), Some("EntityMoniker"));
        assert_eq!(message_property_name("Retrieve"), None);
    }

    #[test]
    fn handler_names() {
        assert_eq!(handler_short_name("Acme.Crm.ContactPlugin"), "Contact");
        assert_eq!(handler_display_name("Acme.Crm.ContactPlugin"), "Crm: Contact");
        assert_eq!(handler_display_name("ContactPlugin"), "Contact");
    }

    #[test]
    fn type_name_validation() {
        assert!(is_valid_type_name("Acme.Crm.ContactPlugin"));
        assert!(is_valid_type_name("_Inner"));
        assert!(is_valid_type_name("Acme.Plugins.Outer+ContactPlugin"));
        assert!(is_valid_type_name("Acme.Plugins.Handler`1Plugin"));
        assert!(!is_valid_type_name("Acme..Plugin"));
        assert!(!is_valid_type_name(".Acme.Plugin"));
        assert!(!is_valid_type_name("Acme Plugin"));
        assert!(!is_valid_type_name(""));
    }
}
