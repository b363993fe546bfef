//! Step model: one subscription of a handler to a message.
//!
//! # Invariants
//! - Every owned image carries this step's `id` as `step_id`, and the same
//!   `handler_id`/`assembly_id` as this step.
//! - Identity changes go through `assign_id`, which cascades immediately.

use crate::model::image::Image;
use crate::model::kinds::{InvocationSource, RecordId, StepDeployment, StepMode, StepStage};
use serde::Serialize;
use uuid::Uuid;

/// One message subscription registered for a handler.
///
/// `name` is derived by `naming::step_name` and is the natural key within the
/// owning handler.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub name: String,
    pub message_id: RecordId,
    pub message_entity_filter_id: RecordId,
    pub stage: StepStage,
    pub mode: StepMode,
    /// Execution order among steps with the same stage, message and entity.
    pub rank: i32,
    pub deployment: StepDeployment,
    /// Comma-joined field names; `None` means any field change triggers.
    pub filtering_attributes: Option<String>,
    pub unsecure_configuration: Option<String>,
    pub secure_configuration_id: RecordId,
    /// Assigned in the registry only; never derived from a source.
    pub impersonating_user_id: RecordId,
    /// Service endpoint receiving the execution context; nil when the step
    /// only runs its handler. Assigned in the registry only.
    pub service_endpoint_id: RecordId,
    pub invocation_source: Option<InvocationSource>,
    pub description: Option<String>,
    pub delete_async_operation_if_successful: bool,
    /// Controlled out-of-band through the registry state transition.
    pub enabled: bool,
    id: RecordId,
    handler_id: RecordId,
    assembly_id: RecordId,
    images: Vec<Image>,
}

impl Step {
    /// Creates an unregistered, enabled, synchronous post-operation step.
    pub fn new(name: impl Into<String>, message_id: RecordId) -> Self {
        Self {
            name: name.into(),
            message_id,
            message_entity_filter_id: Uuid::nil(),
            stage: StepStage::PostOperation,
            mode: StepMode::Synchronous,
            rank: 1,
            deployment: StepDeployment::ServerOnly,
            filtering_attributes: None,
            unsecure_configuration: None,
            secure_configuration_id: Uuid::nil(),
            impersonating_user_id: Uuid::nil(),
            service_endpoint_id: Uuid::nil(),
            invocation_source: None,
            description: None,
            delete_async_operation_if_successful: false,
            enabled: true,
            id: Uuid::nil(),
            handler_id: Uuid::nil(),
            assembly_id: Uuid::nil(),
            images: Vec::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn handler_id(&self) -> RecordId {
        self.handler_id
    }

    pub fn assembly_id(&self) -> RecordId {
        self.assembly_id
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Mutable access to owned images. The slice cannot grow, so containment
    /// identity stays consistent.
    pub fn images_mut(&mut self) -> &mut [Image] {
        &mut self.images
    }

    /// Adds an image, stamping this step's identity onto it.
    pub fn add_image(&mut self, mut image: Image) {
        image.set_step_id(self.id);
        image.set_handler_id(self.handler_id);
        image.set_assembly_id(self.assembly_id);
        self.images.push(image);
    }

    /// Assigns the registry identity and cascades it to every image's `step_id`.
    pub fn assign_id(&mut self, id: RecordId) {
        if self.id == id {
            return;
        }
        self.id = id;
        for image in &mut self.images {
            image.set_step_id(id);
        }
    }

    pub(crate) fn set_handler_id(&mut self, id: RecordId) {
        if self.handler_id == id {
            return;
        }
        self.handler_id = id;
        for image in &mut self.images {
            image.set_handler_id(id);
        }
    }

    pub(crate) fn set_assembly_id(&mut self, id: RecordId) {
        if self.assembly_id == id {
            return;
        }
        self.assembly_id = id;
        for image in &mut self.images {
            image.set_assembly_id(id);
        }
    }

    /// Field-by-field comparison used to decide whether an update write is needed.
    ///
    /// Images, `enabled` and `invocation_source` are not compared.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.assembly_id == other.assembly_id
            && self.handler_id == other.handler_id
            && self.name == other.name
            && self.mode == other.mode
            && self.stage == other.stage
            && self.message_id == other.message_id
            && self.message_entity_filter_id == other.message_entity_filter_id
            && self.rank == other.rank
            && self.filtering_attributes == other.filtering_attributes
            && self.deployment == other.deployment
            && self.description == other.description
            && self.unsecure_configuration == other.unsecure_configuration
            && self.secure_configuration_id == other.secure_configuration_id
            && self.impersonating_user_id == other.impersonating_user_id
            && self.service_endpoint_id == other.service_endpoint_id
            && self.delete_async_operation_if_successful
                == other.delete_async_operation_if_successful
    }
}
