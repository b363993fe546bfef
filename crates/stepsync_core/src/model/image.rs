//! Image model: a snapshot of record state handed to a step.

use crate::model::kinds::{ImageKind, RecordId};
use serde::Serialize;
use uuid::Uuid;

/// Conventional name and alias of a pre-operation image.
pub const PRE_IMAGE_NAME: &str = "preimage";
/// Conventional name and alias of a post-operation image.
pub const POST_IMAGE_NAME: &str = "postimage";

/// One image registered on a step.
///
/// `name` is the natural key within the owning step.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub name: String,
    pub kind: ImageKind,
    /// Comma-joined field names; `None` means all fields.
    pub attributes: Option<String>,
    pub related_attribute: Option<String>,
    pub entity_alias: String,
    /// Message payload property that identifies the imaged record.
    pub message_property_name: Option<String>,
    id: RecordId,
    step_id: RecordId,
    handler_id: RecordId,
    assembly_id: RecordId,
}

impl Image {
    /// Creates an unregistered image whose name doubles as its entity alias.
    pub fn new(name: impl Into<String>, kind: ImageKind) -> Self {
        let name = name.into();
        Self {
            entity_alias: name.clone(),
            name,
            kind,
            attributes: None,
            related_attribute: None,
            message_property_name: None,
            id: Uuid::nil(),
            step_id: Uuid::nil(),
            handler_id: Uuid::nil(),
            assembly_id: Uuid::nil(),
        }
    }

    /// Conventional pre-image (`preimage` name and alias).
    pub fn pre_image() -> Self {
        Self::new(PRE_IMAGE_NAME, ImageKind::PreImage)
    }

    /// Conventional post-image (`postimage` name and alias).
    pub fn post_image() -> Self {
        Self::new(POST_IMAGE_NAME, ImageKind::PostImage)
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn step_id(&self) -> RecordId {
        self.step_id
    }

    pub fn handler_id(&self) -> RecordId {
        self.handler_id
    }

    pub fn assembly_id(&self) -> RecordId {
        self.assembly_id
    }

    /// Assigns the registry identity. Images own nothing, so nothing cascades.
    pub fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    pub(crate) fn set_step_id(&mut self, id: RecordId) {
        self.step_id = id;
    }

    pub(crate) fn set_handler_id(&mut self, id: RecordId) {
        self.handler_id = id;
    }

    pub(crate) fn set_assembly_id(&mut self, id: RecordId) {
        self.assembly_id = id;
    }

    /// Field-by-field comparison used to decide whether an update write is needed.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.assembly_id == other.assembly_id
            && self.handler_id == other.handler_id
            && self.step_id == other.step_id
            && self.attributes == other.attributes
            && self.name == other.name
            && self.related_attribute == other.related_attribute
            && self.entity_alias == other.entity_alias
            && self.kind == other.kind
            && self.message_property_name == other.message_property_name
    }
}
