#![allow(dead_code)]

use std::cell::RefCell;
use stepsync_core::extract::scan::ModuleScan;
use stepsync_core::{
    Catalog, EntityKind, FoundRecord, Message, MessageFilter, ModuleExtractor, Predicate, Record,
    RecordId, RegistryResult, RemoteRegistry, SqliteRegistry, UnsecureConfigEntry,
};
use uuid::Uuid;

pub const CONTACT_SCAN: &str = include_str!("../fixtures/contact_scan.json");
pub const CONTACT_DESCRIPTOR: &str = include_str!("../fixtures/contact_descriptor.xml");

/// One write issued against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// kind, assigned id, parent id (nil for assemblies)
    Create(EntityKind, RecordId, RecordId),
    Update(EntityKind, RecordId),
    Delete(EntityKind, RecordId),
    SetState(RecordId, bool),
}

/// Registry wrapper that records every write in call order.
pub struct RecordingRegistry<'conn> {
    inner: SqliteRegistry<'conn>,
    calls: RefCell<Vec<Call>>,
}

impl<'conn> RecordingRegistry<'conn> {
    pub fn new(inner: SqliteRegistry<'conn>) -> Self {
        Self {
            inner,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &SqliteRegistry<'conn> {
        &self.inner
    }

    pub fn take_calls(&self) -> Vec<Call> {
        self.calls.borrow_mut().drain(..).collect()
    }
}

impl RemoteRegistry for RecordingRegistry<'_> {
    fn find(&self, kind: EntityKind, predicate: &Predicate) -> RegistryResult<Vec<FoundRecord>> {
        self.inner.find(kind, predicate)
    }

    fn create(&self, record: Record<'_>) -> RegistryResult<RecordId> {
        let id = self.inner.create(record)?;
        let parent = match record {
            Record::Assembly { .. } => Uuid::nil(),
            Record::Handler(handler) => handler.assembly_id(),
            Record::Step(step) => step.handler_id(),
            Record::Image(image) => image.step_id(),
            Record::ServiceEndpoint(_) => Uuid::nil(),
        };
        self.calls
            .borrow_mut()
            .push(Call::Create(record.kind(), id, parent));
        Ok(id)
    }

    fn update(&self, record: Record<'_>) -> RegistryResult<()> {
        self.inner.update(record)?;
        self.calls
            .borrow_mut()
            .push(Call::Update(record.kind(), record.id()));
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: RecordId) -> RegistryResult<()> {
        self.inner.delete(kind, id)?;
        self.calls.borrow_mut().push(Call::Delete(kind, id));
        Ok(())
    }

    fn set_state(&self, step_id: RecordId, enabled: bool) -> RegistryResult<()> {
        self.inner.set_state(step_id, enabled)?;
        self.calls.borrow_mut().push(Call::SetState(step_id, enabled));
        Ok(())
    }

    fn list_public_messages(&self) -> RegistryResult<Vec<Message>> {
        self.inner.list_public_messages()
    }

    fn list_filters(&self, message_ids: &[RecordId]) -> RegistryResult<Vec<MessageFilter>> {
        self.inner.list_filters(message_ids)
    }
}

/// Seeds `Create`, `Update` and `Delete` with `contact` and `account` filters.
pub fn seed_catalog(registry: &SqliteRegistry<'_>) {
    for message in ["Create", "Update", "Delete"] {
        let id = registry.insert_message(message, false).unwrap();
        registry.insert_filter(id, "contact", None, true).unwrap();
        registry.insert_filter(id, "account", None, true).unwrap();
    }
}

pub fn contact_config() -> Vec<UnsecureConfigEntry> {
    vec![UnsecureConfigEntry::new(
        "contactSync",
        "#{contactSync}",
        Some("{\"target\":\"dev\"}".to_string()),
    )]
}

/// Extracts the contact fixture module against `catalog`.
pub fn extract_contact(catalog: &Catalog) -> stepsync_core::Assembly {
    let scan = ModuleScan::from_json(CONTACT_SCAN).unwrap();
    ModuleExtractor::new(catalog, &contact_config())
        .extract(&scan)
        .unwrap()
}

pub fn count_rows(registry: &SqliteRegistry<'_>) -> [usize; 4] {
    [
        registry.count(EntityKind::Assembly).unwrap(),
        registry.count(EntityKind::Handler).unwrap(),
        registry.count(EntityKind::Step).unwrap(),
        registry.count(EntityKind::Image).unwrap(),
    ]
}
