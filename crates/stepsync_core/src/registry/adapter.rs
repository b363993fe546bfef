//! Tree-level access on top of a record-level `RemoteRegistry`.
//!
//! # Responsibility
//! - Load the full registered tree of one assembly.
//! - Write single records and reassert step state.
//! - Delete records bottom-up, resolving descendants that were not listed.
//! - Register and update service endpoints by name.
//!
//! # Invariants
//! - A loaded tree satisfies the model's identity cascade invariants.
//! - After `delete` no image, step or handler is left pointing at a deleted
//!   parent, and no step is left posting to a deleted service endpoint.

use crate::catalog::Catalog;
use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::RecordId;
use crate::model::service_endpoint::ServiceEndpoint;
use crate::model::step::Step;
use crate::registry::{
    EntityKind, FoundRecord, Predicate, Record, RegistryError, RegistryResult, RemoteRegistry,
};
use log::{debug, info};
use std::collections::HashMap;

/// Records explicitly selected for deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteTargets {
    pub assemblies: Vec<RecordId>,
    pub handlers: Vec<RecordId>,
    pub steps: Vec<RecordId>,
    pub images: Vec<RecordId>,
    /// Deleted after every step posting to them.
    pub service_endpoints: Vec<RecordId>,
}

impl DeleteTargets {
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
            && self.handlers.is_empty()
            && self.steps.is_empty()
            && self.images.is_empty()
            && self.service_endpoints.is_empty()
    }
}

/// Number of records actually deleted per kind, descendants included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub assemblies: usize,
    pub handlers: usize,
    pub steps: usize,
    pub images: usize,
    pub service_endpoints: usize,
}

/// Tree-level registry access.
pub struct RegistryAdapter<R: RemoteRegistry> {
    registry: R,
}

impl<R: RemoteRegistry> RegistryAdapter<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Public messages and the filters that allow custom steps for them.
    pub fn catalog(&self) -> RegistryResult<Catalog> {
        let messages = self.registry.list_public_messages()?;
        let message_ids: Vec<RecordId> = messages.iter().map(|message| message.id).collect();
        let filters = self.registry.list_filters(&message_ids)?;
        debug!(
            "event=catalog_load module=registry status=ok messages={} filters={}",
            messages.len(),
            filters.len()
        );
        Ok(Catalog::new(messages, filters))
    }

    /// Loads the registered tree of the assembly called `name`.
    ///
    /// Returns `Ok(None)` when no such assembly is registered.
    pub fn load_by_name(&self, name: &str) -> RegistryResult<Option<Assembly>> {
        if name.trim().is_empty() {
            return Err(RegistryError::MissingArgument("assembly name"));
        }

        let found = self
            .registry
            .find(EntityKind::Assembly, &Predicate::NameEquals(name.to_string()))?;
        let Some(record) = found.into_iter().next() else {
            return Ok(None);
        };
        let mut assembly = match record {
            FoundRecord::Assembly(assembly) => assembly,
            other => return Err(unexpected_kind(EntityKind::Assembly, &other)),
        };

        let handlers = self.find_handlers(&[assembly.id()])?;
        let handler_ids: Vec<RecordId> = handlers.iter().map(Handler::id).collect();
        let steps = self.find_steps(&handler_ids)?;
        let step_ids: Vec<RecordId> = steps.iter().map(Step::id).collect();
        let images = self.find_images(&step_ids)?;

        let mut images_by_step: HashMap<RecordId, Vec<Image>> = HashMap::new();
        for image in images {
            images_by_step.entry(image.step_id()).or_default().push(image);
        }
        let mut steps_by_handler: HashMap<RecordId, Vec<Step>> = HashMap::new();
        for mut step in steps {
            for image in images_by_step.remove(&step.id()).unwrap_or_default() {
                step.add_image(image);
            }
            steps_by_handler.entry(step.handler_id()).or_default().push(step);
        }
        for mut handler in handlers {
            for step in steps_by_handler.remove(&handler.id()).unwrap_or_default() {
                handler.add_step(step);
            }
            assembly.add_handler(handler);
        }

        info!(
            "event=registry_load module=registry status=ok assembly={} handlers={} steps={}",
            assembly.name(),
            assembly.handlers().len(),
            assembly.step_count()
        );
        Ok(Some(assembly))
    }

    /// Registers a new assembly with its payload. Handlers are not created.
    pub fn create_assembly(&self, assembly: &Assembly, content: &[u8]) -> RegistryResult<RecordId> {
        self.create(Record::Assembly {
            assembly,
            content,
            activities: &[],
        })
    }

    /// Replaces the payload and attributes of a registered assembly, writing
    /// the group names of the carried workflow activities with it.
    pub fn update_assembly(
        &self,
        assembly: &Assembly,
        content: &[u8],
        activities: &[Handler],
    ) -> RegistryResult<()> {
        self.update(Record::Assembly {
            assembly,
            content,
            activities,
        })
    }

    /// Loads the service endpoint called `name`, if registered.
    pub fn load_service_endpoint(&self, name: &str) -> RegistryResult<Option<ServiceEndpoint>> {
        if name.trim().is_empty() {
            return Err(RegistryError::MissingArgument("service endpoint name"));
        }
        let found = self
            .registry
            .find(EntityKind::ServiceEndpoint, &Predicate::NameEquals(name.to_string()))?;
        match found.into_iter().next() {
            Some(FoundRecord::ServiceEndpoint(endpoint)) => Ok(Some(endpoint)),
            Some(other) => Err(unexpected_kind(EntityKind::ServiceEndpoint, &other)),
            None => Ok(None),
        }
    }

    /// Registers `endpoint`, or updates the endpoint registered under its
    /// name, and stamps the registry id onto it.
    ///
    /// Returns whether a record write was issued.
    pub fn save_service_endpoint(&self, endpoint: &mut ServiceEndpoint) -> RegistryResult<bool> {
        let Some(current) = self.load_service_endpoint(&endpoint.name)? else {
            let id = self.create(Record::ServiceEndpoint(&*endpoint))?;
            endpoint.assign_id(id);
            return Ok(true);
        };
        endpoint.assign_id(current.id());
        if endpoint.structurally_eq(&current) {
            return Ok(false);
        }
        self.update(Record::ServiceEndpoint(&*endpoint))?;
        Ok(true)
    }

    /// Creates one record and returns the registry-assigned id.
    pub fn create(&self, record: Record<'_>) -> RegistryResult<RecordId> {
        let id = self.registry.create(record)?;
        debug!(
            "event=record_create module=registry status=ok kind={} id={id}",
            record.kind()
        );
        Ok(id)
    }

    pub fn update(&self, record: Record<'_>) -> RegistryResult<()> {
        if record.id().is_nil() {
            return Err(RegistryError::MissingArgument("record id"));
        }
        self.registry.update(record)?;
        debug!(
            "event=record_update module=registry status=ok kind={} id={}",
            record.kind(),
            record.id()
        );
        Ok(())
    }

    /// Reasserts the enabled state of a registered step.
    pub fn set_enabled(&self, step_id: RecordId, enabled: bool) -> RegistryResult<()> {
        if step_id.is_nil() {
            return Err(RegistryError::MissingArgument("step id"));
        }
        self.registry.set_state(step_id, enabled)
    }

    /// Deletes the targets and every descendant they own, images first.
    ///
    /// Steps posting to a targeted service endpoint are deleted with their
    /// images; the endpoints themselves go last.
    pub fn delete(&self, targets: &DeleteTargets) -> RegistryResult<DeleteSummary> {
        if targets.is_empty() {
            return Ok(DeleteSummary::default());
        }

        let mut handlers = targets.handlers.clone();
        extend_unique(
            &mut handlers,
            self.find_handlers(&targets.assemblies)?.iter().map(Handler::id),
        );
        let mut steps = targets.steps.clone();
        extend_unique(&mut steps, self.find_steps(&handlers)?.iter().map(Step::id));
        extend_unique(
            &mut steps,
            self.find_endpoint_steps(&targets.service_endpoints)?
                .iter()
                .map(Step::id),
        );
        let mut images = targets.images.clone();
        extend_unique(&mut images, self.find_images(&steps)?.iter().map(Image::id));

        for (kind, ids) in [
            (EntityKind::Image, &images),
            (EntityKind::Step, &steps),
            (EntityKind::Handler, &handlers),
            (EntityKind::Assembly, &targets.assemblies),
            (EntityKind::ServiceEndpoint, &targets.service_endpoints),
        ] {
            for id in ids {
                self.registry.delete(kind, *id)?;
            }
        }

        let summary = DeleteSummary {
            assemblies: targets.assemblies.len(),
            handlers: handlers.len(),
            steps: steps.len(),
            images: images.len(),
            service_endpoints: targets.service_endpoints.len(),
        };
        info!(
            "event=registry_delete module=registry status=ok assemblies={} handlers={} steps={} images={} service_endpoints={}",
            summary.assemblies,
            summary.handlers,
            summary.steps,
            summary.images,
            summary.service_endpoints
        );
        Ok(summary)
    }

    fn find_handlers(&self, assembly_ids: &[RecordId]) -> RegistryResult<Vec<Handler>> {
        self.find_children(EntityKind::Handler, assembly_ids)?
            .into_iter()
            .map(|record| match record {
                FoundRecord::Handler(handler) => Ok(handler),
                other => Err(unexpected_kind(EntityKind::Handler, &other)),
            })
            .collect()
    }

    fn find_steps(&self, handler_ids: &[RecordId]) -> RegistryResult<Vec<Step>> {
        self.find_children(EntityKind::Step, handler_ids)?
            .into_iter()
            .map(|record| match record {
                FoundRecord::Step(step) => Ok(step),
                other => Err(unexpected_kind(EntityKind::Step, &other)),
            })
            .collect()
    }

    fn find_endpoint_steps(&self, endpoint_ids: &[RecordId]) -> RegistryResult<Vec<Step>> {
        if endpoint_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.registry
            .find(EntityKind::Step, &Predicate::EndpointIn(endpoint_ids.to_vec()))?
            .into_iter()
            .map(|record| match record {
                FoundRecord::Step(step) => Ok(step),
                other => Err(unexpected_kind(EntityKind::Step, &other)),
            })
            .collect()
    }

    fn find_images(&self, step_ids: &[RecordId]) -> RegistryResult<Vec<Image>> {
        self.find_children(EntityKind::Image, step_ids)?
            .into_iter()
            .map(|record| match record {
                FoundRecord::Image(image) => Ok(image),
                other => Err(unexpected_kind(EntityKind::Image, &other)),
            })
            .collect()
    }

    fn find_children(
        &self,
        kind: EntityKind,
        parent_ids: &[RecordId],
    ) -> RegistryResult<Vec<FoundRecord>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.registry
            .find(kind, &Predicate::ParentIn(parent_ids.to_vec()))
    }
}

fn extend_unique(ids: &mut Vec<RecordId>, extra: impl Iterator<Item = RecordId>) {
    for id in extra {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

fn unexpected_kind(expected: EntityKind, record: &FoundRecord) -> RegistryError {
    RegistryError::InvalidData(format!(
        "expected {expected} record, registry returned {} {}",
        record.kind(),
        record.id()
    ))
}
