//! Unsecured step configuration entries.
//!
//! Entries come from an external `<items><item key value default/></items>`
//! document. A value equal to the `#{key}` placeholder means "not supplied for
//! this environment" and resolves to the declared default.

use crate::extract::error::{ExtractError, ExtractResult};

const ITEM_ELEMENT: &str = "item";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsecureConfigEntry {
    pub key: String,
    pub value: String,
    pub default: Option<String>,
}

impl UnsecureConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, default: Option<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            default,
        }
    }

    fn is_placeholder(&self) -> bool {
        self.value == format!("#{{{}}}", self.key)
    }

    /// Effective configuration value after placeholder substitution.
    pub fn resolve(&self) -> Option<String> {
        if self.is_placeholder() {
            self.default.clone()
        } else {
            Some(self.value.clone())
        }
    }
}

/// Resolves the configuration for `key` (first entry with that key).
pub fn resolve_unsecure_config(entries: &[UnsecureConfigEntry], key: &str) -> Option<String> {
    entries
        .iter()
        .find(|entry| entry.key == key)
        .and_then(UnsecureConfigEntry::resolve)
}

/// Reads `item` elements directly under the document root.
///
/// # Errors
/// - `MalformedDescriptor` when the XML is invalid or an item lacks `key`/`value`.
pub fn parse_unsecure_config(xml: &str) -> ExtractResult<Vec<UnsecureConfigEntry>> {
    let document = roxmltree::Document::parse(xml)?;
    let mut entries = Vec::new();
    for item in document
        .root_element()
        .children()
        .filter(|node| node.has_tag_name(ITEM_ELEMENT))
    {
        let key = item.attribute("key").ok_or_else(|| {
            ExtractError::MalformedDescriptor("configuration item without `key`".to_string())
        })?;
        let value = item.attribute("value").ok_or_else(|| {
            ExtractError::MalformedDescriptor(format!("configuration item `{key}` without `value`"))
        })?;
        entries.push(UnsecureConfigEntry::new(
            key,
            value,
            item.attribute("default").map(str::to_string),
        ));
    }
    Ok(entries)
}
