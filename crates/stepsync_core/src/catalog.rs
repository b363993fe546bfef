//! Message and message-filter catalogs published by the registry.
//!
//! Extractors resolve step messages and entities against these catalogs; a
//! step naming anything the catalog lacks is rejected before any write.

use crate::model::kinds::RecordId;
use serde::{Deserialize, Serialize};

/// One public message (`Create`, `Update`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    pub name: String,
}

/// A (message, primary entity) pair the registry allows custom steps for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    pub id: RecordId,
    pub message_id: RecordId,
    /// Lower-case logical entity name.
    pub primary_entity_name: String,
    pub secondary_entity_name: Option<String>,
}

/// Snapshot of both catalogs, loaded once per extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub messages: Vec<Message>,
    pub filters: Vec<MessageFilter>,
}

impl Catalog {
    pub fn new(messages: Vec<Message>, filters: Vec<MessageFilter>) -> Self {
        Self { messages, filters }
    }

    /// Resolves a message by exact (case-sensitive) name.
    pub fn message_id(&self, name: &str) -> Option<RecordId> {
        self.messages
            .iter()
            .find(|message| message.name == name)
            .map(|message| message.id)
    }

    /// Resolves the filter for a message and primary entity.
    ///
    /// The entity name is lower-cased before matching.
    pub fn filter_id(&self, message_id: RecordId, primary_entity: &str) -> Option<RecordId> {
        let entity = primary_entity.to_lowercase();
        self.filters
            .iter()
            .find(|filter| filter.message_id == message_id && filter.primary_entity_name == entity)
            .map(|filter| filter.id)
    }

    pub fn message_ids(&self) -> Vec<RecordId> {
        self.messages.iter().map(|message| message.id).collect()
    }
}
