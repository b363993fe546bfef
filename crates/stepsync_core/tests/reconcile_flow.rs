mod common;

use common::{count_rows, extract_contact, seed_catalog, Call, RecordingRegistry};
use stepsync_core::model::kinds::{EndpointContract, HandlerKind, IsolationMode};
use stepsync_core::service::reconcile::TreeSide;
use stepsync_core::{
    open_db_in_memory, Assembly, EntityKind, Handler, Image, Predicate, ReconcileError,
    ReconcileService, ReconcileWarning, RecordId, RegistryError, RegistryResult, RemoteRegistry,
    ServiceEndpoint, SqliteRegistry, Step, SyncOptions,
};
use uuid::Uuid;

const PAYLOAD: &[u8] = b"module-bytes-v1";

fn handler_with_step(type_name: &str, step_name: &str, message_id: RecordId) -> Handler {
    let mut handler = Handler::new(type_name, HandlerKind::ExecutionHandler);
    let mut step = Step::new(step_name, message_id);
    step.add_image(Image::post_image());
    handler.add_step(step);
    handler
}

fn position(calls: &[Call], wanted: impl Fn(&Call) -> bool) -> usize {
    calls
        .iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("no matching call in {calls:?}"))
}

#[test]
fn empty_registry_creates_tree_in_dependency_order() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());

    let mut desired = extract_contact(&service.adapter().catalog().unwrap());
    desired.isolation_mode = IsolationMode::Sandbox;
    let report = service.reconcile(&mut desired, PAYLOAD).unwrap();

    let calls = registry.take_calls();
    assert_eq!(calls.len(), 4, "unexpected calls: {calls:?}");
    let Call::Create(EntityKind::Assembly, assembly_id, _) = calls[0] else {
        panic!("assembly must be created first: {calls:?}");
    };
    let Call::Create(EntityKind::Handler, handler_id, handler_parent) = calls[1] else {
        panic!("handler must be created second: {calls:?}");
    };
    let Call::Create(EntityKind::Step, step_id, step_parent) = calls[2] else {
        panic!("step must be created third: {calls:?}");
    };
    let Call::Create(EntityKind::Image, image_id, image_parent) = calls[3] else {
        panic!("image must be created last: {calls:?}");
    };
    assert_eq!(handler_parent, assembly_id);
    assert_eq!(step_parent, handler_id);
    assert_eq!(image_parent, step_id);

    assert!(report.assembly_created);
    assert_eq!(report.assembly_id, assembly_id);
    assert_eq!(report.created.total(), 3);
    assert!(report.warnings.is_empty());
    assert_eq!(desired.isolation_mode, IsolationMode::None);

    let step = &desired.handlers()[0].steps()[0];
    assert_eq!(step.id(), step_id);
    assert_eq!(step.images()[0].id(), image_id);
    assert_eq!(step.unsecure_configuration.as_deref(), Some("{\"target\":\"dev\"}"));
    assert_eq!(
        registry.inner().assembly_content(assembly_id).unwrap().as_deref(),
        Some(PAYLOAD)
    );
}

#[test]
fn second_run_over_unchanged_module_issues_no_record_writes() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let catalog = service.adapter().catalog().unwrap();

    let mut first = extract_contact(&catalog);
    service.reconcile(&mut first, PAYLOAD).unwrap();
    registry.take_calls();

    let mut second = extract_contact(&catalog);
    let report = service.reconcile(&mut second, PAYLOAD).unwrap();
    let calls = registry.take_calls();

    assert_eq!(report.record_writes(), 0, "unexpected writes: {calls:?}");
    assert!(!report.assembly_created);
    assert_eq!(report.state_changes, 1);
    assert_eq!(
        calls,
        vec![
            Call::Update(EntityKind::Assembly, first.id()),
            Call::SetState(first.handlers()[0].steps()[0].id(), true),
        ]
    );
    assert_eq!(second.id(), first.id());
    assert_eq!(second.handlers()[0].id(), first.handlers()[0].id());
    assert_eq!(
        second.handlers()[0].steps()[0].images()[0].id(),
        first.handlers()[0].steps()[0].images()[0].id()
    );
}

#[test]
fn handlers_are_diffed_by_type_name() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let update = service.adapter().catalog().unwrap().message_id("Update").unwrap();

    let mut current = Assembly::new("Acme.Plugins", "1.0.0.0");
    current.add_handler(handler_with_step("Acme.Plugins.APlugin", "A: Update of contact", update));
    current.add_handler(handler_with_step("Acme.Plugins.BPlugin", "B: Update of contact", update));
    service.reconcile(&mut current, PAYLOAD).unwrap();
    let removed_handler = current.handlers()[0].id();
    let kept_handler = current.handlers()[1].id();
    registry.take_calls();

    let mut desired = Assembly::new("Acme.Plugins", "1.1.0.0");
    let mut changed_b = handler_with_step("Acme.Plugins.BPlugin", "B: Update of contact", update);
    changed_b.description = Some("now documented".to_string());
    desired.add_handler(changed_b);
    desired.add_handler(handler_with_step("Acme.Plugins.CPlugin", "C: Update of contact", update));
    let report = service.reconcile(&mut desired, PAYLOAD).unwrap();
    let calls = registry.take_calls();

    assert_eq!(report.deleted.handlers, 1);
    assert_eq!(report.deleted.steps, 1);
    assert_eq!(report.deleted.images, 1);
    assert_eq!(report.created.handlers, 1);
    assert_eq!(report.updated.handlers, 1);
    assert_eq!(report.updated.steps, 0);

    let handler_delete = position(&calls, |call| *call == Call::Delete(EntityKind::Handler, removed_handler));
    let image_delete = position(&calls, |call| matches!(call, Call::Delete(EntityKind::Image, _)));
    let step_delete = position(&calls, |call| matches!(call, Call::Delete(EntityKind::Step, _)));
    let handler_create = position(&calls, |call| matches!(call, Call::Create(EntityKind::Handler, ..)));
    let handler_update = position(&calls, |call| *call == Call::Update(EntityKind::Handler, kept_handler));
    assert!(image_delete < step_delete && step_delete < handler_delete);
    assert!(handler_delete < handler_create);
    assert!(handler_create < handler_update);

    assert_eq!(desired.handlers()[0].id(), kept_handler);
    assert_eq!(count_rows(registry.inner()), [1, 2, 2, 2]);
}

#[test]
fn matched_step_keeps_registry_owned_values_and_reasserts_state() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let catalog = service.adapter().catalog().unwrap();

    let mut first = extract_contact(&catalog);
    service.reconcile(&mut first, PAYLOAD).unwrap();
    let step_id = first.handlers()[0].steps()[0].id();
    let impersonated = Uuid::new_v4();
    conn.execute(
        "UPDATE steps SET impersonating_user_id = ?1, enabled = 0, invocation_source = 1 WHERE id = ?2;",
        rusqlite::params![impersonated.to_string(), step_id.to_string()],
    )
    .unwrap();
    registry.take_calls();

    let mut second = extract_contact(&catalog);
    second.handlers_mut()[0].steps_mut()[0].rank = 3;
    let report = service.reconcile(&mut second, PAYLOAD).unwrap();
    let calls = registry.take_calls();

    let step = &second.handlers()[0].steps()[0];
    assert_eq!(step.impersonating_user_id, impersonated);
    assert!(step.invocation_source.is_some());
    assert_eq!(report.updated.steps, 1);
    assert!(calls.contains(&Call::Update(EntityKind::Step, step_id)));
    assert_eq!(calls.last(), Some(&Call::SetState(step_id, true)));

    let reloaded = service.adapter().load_by_name("Acme.Plugins").unwrap().unwrap();
    let stored = &reloaded.handlers()[0].steps()[0];
    assert!(stored.enabled);
    assert_eq!(stored.rank, 3);
    assert_eq!(stored.impersonating_user_id, impersonated);
}

#[test]
fn matched_step_keeps_its_service_endpoint_routing() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let catalog = service.adapter().catalog().unwrap();

    let mut first = extract_contact(&catalog);
    service.reconcile(&mut first, PAYLOAD).unwrap();
    let mut endpoint = ServiceEndpoint::new("audit", "acme-bus", EndpointContract::Queue);
    service.adapter().save_service_endpoint(&mut endpoint).unwrap();
    let step_id = first.handlers()[0].steps()[0].id();
    conn.execute(
        "UPDATE steps SET service_endpoint_id = ?1 WHERE id = ?2;",
        rusqlite::params![endpoint.id().to_string(), step_id.to_string()],
    )
    .unwrap();
    registry.take_calls();

    let mut second = extract_contact(&catalog);
    let report = service.reconcile(&mut second, PAYLOAD).unwrap();

    assert_eq!(report.record_writes(), 0);
    assert_eq!(second.handlers()[0].steps()[0].service_endpoint_id, endpoint.id());
    let stored = service.adapter().load_by_name("Acme.Plugins").unwrap().unwrap();
    assert_eq!(stored.handlers()[0].steps()[0].service_endpoint_id, endpoint.id());
}

#[test]
fn changed_image_attributes_update_the_matched_image() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let catalog = service.adapter().catalog().unwrap();

    let mut first = extract_contact(&catalog);
    service.reconcile(&mut first, PAYLOAD).unwrap();
    let image_id = first.handlers()[0].steps()[0].images()[0].id();
    registry.take_calls();

    let mut second = extract_contact(&catalog);
    second.handlers_mut()[0].steps_mut()[0].images_mut()[0].attributes =
        Some("fullname,emailaddress1".to_string());
    let report = service.reconcile(&mut second, PAYLOAD).unwrap();
    let calls = registry.take_calls();

    assert_eq!(report.updated.images, 1);
    assert_eq!(report.record_writes(), 1);
    assert!(calls.contains(&Call::Update(EntityKind::Image, image_id)));
    assert!(!calls
        .iter()
        .any(|call| matches!(call, Call::Create(..) | Call::Delete(..))));
    assert_eq!(second.handlers()[0].steps()[0].images()[0].id(), image_id);

    let stored = service.adapter().load_by_name("Acme.Plugins").unwrap().unwrap();
    assert_eq!(
        stored.handlers()[0].steps()[0].images()[0].attributes.as_deref(),
        Some("fullname,emailaddress1")
    );

    let mut third = extract_contact(&catalog);
    third.handlers_mut()[0].steps_mut()[0].images_mut()[0].attributes =
        Some("fullname,emailaddress1".to_string());
    let report = service.reconcile(&mut third, PAYLOAD).unwrap();
    assert_eq!(report.record_writes(), 0);
    assert_eq!(report.updated.images, 0);
}

#[test]
fn removed_steps_are_deleted_before_new_steps_are_created() {
    let conn = open_db_in_memory().unwrap();
    let registry = RecordingRegistry::new(SqliteRegistry::new(&conn));
    seed_catalog(registry.inner());
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let catalog = service.adapter().catalog().unwrap();
    let update = catalog.message_id("Update").unwrap();
    let create = catalog.message_id("Create").unwrap();

    let mut current = Assembly::new("Acme.Plugins", "1.0.0.0");
    current.add_handler(handler_with_step("Acme.Plugins.APlugin", "A: Update of contact", update));
    service.reconcile(&mut current, PAYLOAD).unwrap();
    registry.take_calls();

    let mut desired = Assembly::new("Acme.Plugins", "1.0.0.0");
    desired.add_handler(handler_with_step("Acme.Plugins.APlugin", "A: Create of contact", create));
    let report = service.reconcile(&mut desired, PAYLOAD).unwrap();
    let calls = registry.take_calls();

    let kinds: Vec<&str> = calls
        .iter()
        .map(|call| match call {
            Call::Delete(EntityKind::Image, _) => "delete_image",
            Call::Delete(EntityKind::Step, _) => "delete_step",
            Call::Create(EntityKind::Step, ..) => "create_step",
            Call::Create(EntityKind::Image, ..) => "create_image",
            Call::Update(EntityKind::Assembly, _) => "update_assembly",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["update_assembly", "delete_image", "delete_step", "create_step", "create_image"]
    );
    assert_eq!(report.deleted.steps, 1);
    assert_eq!(report.created.steps, 1);
    assert_eq!(report.state_changes, 0);
    assert_eq!(count_rows(registry.inner()), [1, 1, 1, 1]);
}

#[test]
fn duplicate_natural_keys_are_reported_as_warnings() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqliteRegistry::new(&conn);
    seed_catalog(&registry);
    let service = ReconcileService::new(&registry, SyncOptions::default());
    let update = service.adapter().catalog().unwrap().message_id("Update").unwrap();

    let build = || {
        let mut assembly = Assembly::new("Acme.Plugins", "1.0.0.0");
        let mut handler = handler_with_step("Acme.Plugins.APlugin", "A: Update of contact", update);
        let mut twin = Step::new("A: Update of contact", update);
        twin.rank = 2;
        handler.add_step(twin);
        assembly.add_handler(handler);
        assembly
    };

    let mut desired = build();
    let report = service.reconcile(&mut desired, PAYLOAD).unwrap();
    assert_eq!(
        report.warnings,
        vec![ReconcileWarning::DuplicateKey {
            side: TreeSide::Extracted,
            kind: EntityKind::Step,
            scope: "Acme.Plugins.APlugin".to_string(),
            key: "A: Update of contact".to_string(),
        }]
    );
    assert_eq!(report.created.steps, 2);

    let mut again = build();
    let report = service.reconcile(&mut again, PAYLOAD).unwrap();
    assert_eq!(report.warnings.len(), 2);
    assert!(report
        .warnings
        .iter()
        .any(|warning| matches!(warning, ReconcileWarning::DuplicateKey { side: TreeSide::Registered, .. })));

    let quiet = ReconcileService::new(
        &registry,
        SyncOptions {
            warn_on_duplicate_keys: false,
            ..SyncOptions::default()
        },
    );
    let mut silent = build();
    assert!(quiet.reconcile(&mut silent, PAYLOAD).unwrap().warnings.is_empty());
}

struct RejectingRegistry;

impl RemoteRegistry for RejectingRegistry {
    fn find(
        &self,
        _kind: EntityKind,
        _predicate: &Predicate,
    ) -> RegistryResult<Vec<stepsync_core::FoundRecord>> {
        Ok(Vec::new())
    }

    fn create(&self, _record: stepsync_core::Record<'_>) -> RegistryResult<RecordId> {
        Err(RegistryError::InvalidData("quota exceeded".to_string()))
    }

    fn update(&self, _record: stepsync_core::Record<'_>) -> RegistryResult<()> {
        Err(RegistryError::InvalidData("read only".to_string()))
    }

    fn delete(&self, _kind: EntityKind, _id: RecordId) -> RegistryResult<()> {
        Err(RegistryError::InvalidData("read only".to_string()))
    }

    fn set_state(&self, _step_id: RecordId, _enabled: bool) -> RegistryResult<()> {
        Err(RegistryError::InvalidData("read only".to_string()))
    }

    fn list_public_messages(&self) -> RegistryResult<Vec<stepsync_core::Message>> {
        Ok(Vec::new())
    }

    fn list_filters(
        &self,
        _message_ids: &[RecordId],
    ) -> RegistryResult<Vec<stepsync_core::MessageFilter>> {
        Ok(Vec::new())
    }
}

#[test]
fn assembly_creation_failure_is_wrapped_with_cause() {
    let service = ReconcileService::new(RejectingRegistry, SyncOptions::default());
    let mut desired = Assembly::new("Acme.Plugins", "1.0.0.0");

    let err = service.reconcile(&mut desired, PAYLOAD).unwrap_err();
    match &err {
        ReconcileError::AssemblyRegistration { name, source } => {
            assert_eq!(name, "Acme.Plugins");
            assert!(source.to_string().contains("quota exceeded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert!(desired.id().is_nil());
}
