//! Reconciliation of an extracted assembly against its registered copy.
//!
//! # Responsibility
//! - Diff handlers, steps and images by natural key and converge the
//!   registry to the extracted tree with the fewest writes.
//! - Carry registry-owned values (ids, impersonation, secure configuration,
//!   service endpoint routing) forward onto the extracted records.
//!
//! # Invariants
//! - Removed records are deleted before anything is created or updated, at
//!   every nesting level; creates come before updates.
//! - A record is created only after its parent's id has been stamped onto it.
//! - Matched records are written only when `structurally_eq` fails, so a
//!   second run over unchanged input issues no record writes.
//! - Step state is reasserted for every matched step.
//! - The first failing registry call aborts the run; nothing is rolled back.

use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::{IsolationMode, RecordId};
use crate::model::step::Step;
use crate::options::SyncOptions;
use crate::registry::adapter::{DeleteSummary, DeleteTargets, RegistryAdapter};
use crate::registry::{EntityKind, Record, RegistryError, RemoteRegistry};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug)]
pub enum ReconcileError {
    /// A required input is empty; raised before any registry call.
    MissingArgument(&'static str),
    /// Registering a new assembly failed.
    AssemblyRegistration { name: String, source: RegistryError },
    /// Any other registry call failed.
    Registry(RegistryError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArgument(name) => write!(f, "required argument is missing: {name}"),
            Self::AssemblyRegistration { name, source } => {
                write!(f, "failed to register assembly `{name}`: {source}")
            }
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingArgument(_) => None,
            Self::AssemblyRegistration { source, .. } => Some(source),
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<RegistryError> for ReconcileError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Which tree a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSide {
    Extracted,
    Registered,
}

impl Display for TreeSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extracted => f.write_str("extracted"),
            Self::Registered => f.write_str("registered"),
        }
    }
}

/// Non-fatal finding of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// Several records of one parent share a natural key; only the first one
    /// takes part in matching.
    DuplicateKey {
        side: TreeSide,
        kind: EntityKind,
        /// Natural key of the parent the duplicates belong to.
        scope: String,
        key: String,
    },
}

impl Display for ReconcileWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey {
                side,
                kind,
                scope,
                key,
            } => write!(
                f,
                "{side} {kind} key `{key}` is not unique within `{scope}`; only the first is matched"
            ),
        }
    }
}

/// Per-kind record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub handlers: usize,
    pub steps: usize,
    pub images: usize,
}

impl RecordCounts {
    pub fn total(&self) -> usize {
        self.handlers + self.steps + self.images
    }

    fn add_deleted(&mut self, summary: DeleteSummary) {
        self.handlers += summary.handlers;
        self.steps += summary.steps;
        self.images += summary.images;
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub assembly_id: RecordId,
    /// `true` when the assembly was registered by this run, `false` when its
    /// payload was updated in place.
    pub assembly_created: bool,
    pub created: RecordCounts,
    pub updated: RecordCounts,
    pub deleted: RecordCounts,
    /// Step state reassertions.
    pub state_changes: usize,
    pub warnings: Vec<ReconcileWarning>,
}

impl ReconcileReport {
    /// Handler, step and image writes; excludes the assembly payload write and
    /// state reassertions.
    pub fn record_writes(&self) -> usize {
        self.created.total() + self.updated.total() + self.deleted.total()
    }
}

/// Converges the registry to extracted assemblies.
pub struct ReconcileService<R: RemoteRegistry> {
    adapter: RegistryAdapter<R>,
    options: SyncOptions,
}

impl<R: RemoteRegistry> ReconcileService<R> {
    pub fn new(registry: R, options: SyncOptions) -> Self {
        Self {
            adapter: RegistryAdapter::new(registry),
            options,
        }
    }

    pub fn adapter(&self) -> &RegistryAdapter<R> {
        &self.adapter
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Reconciles `desired` against the registered assembly of the same name.
    ///
    /// On success every record of `desired` carries its registry id.
    ///
    /// # Errors
    /// - `MissingArgument` when the assembly name or `content` is empty.
    /// - `AssemblyRegistration` when a new assembly cannot be created.
    /// - `Registry` for any other failed registry call.
    pub fn reconcile(
        &self,
        desired: &mut Assembly,
        content: &[u8],
    ) -> ReconcileResult<ReconcileReport> {
        if desired.name().trim().is_empty() {
            return Err(ReconcileError::MissingArgument("assembly name"));
        }
        if content.is_empty() {
            return Err(ReconcileError::MissingArgument("assembly content"));
        }

        let started_at = Instant::now();
        info!(
            "event=reconcile module=reconcile status=start assembly={} handlers={}",
            desired.name(),
            desired.handlers().len()
        );

        match self.run(desired, content) {
            Ok(report) => {
                info!(
                    "event=reconcile module=reconcile status=ok assembly={} created={} updated={} deleted={} state_changes={} warnings={} duration_ms={}",
                    desired.name(),
                    report.created.total(),
                    report.updated.total(),
                    report.deleted.total(),
                    report.state_changes,
                    report.warnings.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=reconcile module=reconcile status=error assembly={} duration_ms={} error={}",
                    desired.name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run(&self, desired: &mut Assembly, content: &[u8]) -> ReconcileResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if self.options.warn_on_duplicate_keys {
            collect_duplicate_keys(desired, TreeSide::Extracted, &mut report.warnings);
        }

        match self.adapter.load_by_name(desired.name())? {
            None => self.register_assembly(desired, content, &mut report)?,
            Some(current) => {
                if self.options.warn_on_duplicate_keys {
                    collect_duplicate_keys(&current, TreeSide::Registered, &mut report.warnings);
                }
                self.update_assembly(desired, &current, content, &mut report)?;
            }
        }

        for warning in &report.warnings {
            warn!("event=reconcile_warning module=reconcile status=warn detail=\"{warning}\"");
        }
        report.assembly_id = desired.id();
        Ok(report)
    }

    fn register_assembly(
        &self,
        desired: &mut Assembly,
        content: &[u8],
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        if self.options.force_isolation_none_on_create {
            desired.isolation_mode = IsolationMode::None;
        }
        let id = self
            .adapter
            .create_assembly(desired, content)
            .map_err(|source| ReconcileError::AssemblyRegistration {
                name: desired.name().to_string(),
                source,
            })?;
        desired.assign_id(id);
        report.assembly_created = true;

        for handler in desired.handlers_mut() {
            self.register_handler(handler, report)?;
        }
        Ok(())
    }

    fn update_assembly(
        &self,
        desired: &mut Assembly,
        current: &Assembly,
        content: &[u8],
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        desired.isolation_mode = current.isolation_mode;
        desired.assign_id(current.id());

        let removed: Vec<RecordId> = current
            .handlers()
            .iter()
            .filter(|handler| desired.handler(&handler.type_name).is_none())
            .map(Handler::id)
            .collect();
        if !removed.is_empty() {
            let summary = self.adapter.delete(&DeleteTargets {
                handlers: removed,
                ..DeleteTargets::default()
            })?;
            report.deleted.add_deleted(summary);
        }

        let activities: Vec<Handler> = current.workflow_activities().cloned().collect();
        self.adapter.update_assembly(desired, content, &activities)?;

        let matches: Vec<Option<&Handler>> = desired
            .handlers()
            .iter()
            .map(|handler| current.handler(&handler.type_name))
            .collect();

        for (handler, matched) in desired.handlers_mut().iter_mut().zip(&matches) {
            if matched.is_none() {
                self.register_handler(handler, report)?;
            }
        }
        for (handler, matched) in desired.handlers_mut().iter_mut().zip(&matches) {
            if let Some(current_handler) = matched {
                self.update_handler(handler, current_handler, report)?;
            }
        }
        Ok(())
    }

    fn register_handler(
        &self,
        handler: &mut Handler,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        let id = self.adapter.create(Record::Handler(handler))?;
        handler.assign_id(id);
        report.created.handlers += 1;

        for step in handler.steps_mut() {
            self.register_step(step, report)?;
        }
        Ok(())
    }

    fn register_step(&self, step: &mut Step, report: &mut ReconcileReport) -> ReconcileResult<()> {
        let id = self.adapter.create(Record::Step(step))?;
        step.assign_id(id);
        report.created.steps += 1;

        for image in step.images_mut() {
            self.register_image(image, report)?;
        }
        Ok(())
    }

    fn register_image(&self, image: &mut Image, report: &mut ReconcileReport) -> ReconcileResult<()> {
        let id = self.adapter.create(Record::Image(image))?;
        image.assign_id(id);
        report.created.images += 1;
        Ok(())
    }

    fn update_handler(
        &self,
        desired: &mut Handler,
        current: &Handler,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        desired.assign_id(current.id());
        if !desired.structurally_eq(current) {
            self.adapter.update(Record::Handler(desired))?;
            report.updated.handlers += 1;
        }

        let removed: Vec<RecordId> = current
            .steps()
            .iter()
            .filter(|step| find_by_key(desired.steps(), &step.name).is_none())
            .map(Step::id)
            .collect();
        if !removed.is_empty() {
            let summary = self.adapter.delete(&DeleteTargets {
                steps: removed,
                ..DeleteTargets::default()
            })?;
            report.deleted.add_deleted(summary);
        }

        let matches: Vec<Option<&Step>> = desired
            .steps()
            .iter()
            .map(|step| find_by_key(current.steps(), &step.name))
            .collect();

        for (step, matched) in desired.steps_mut().iter_mut().zip(&matches) {
            if matched.is_none() {
                self.register_step(step, report)?;
            }
        }
        for (step, matched) in desired.steps_mut().iter_mut().zip(&matches) {
            if let Some(current_step) = matched {
                self.update_step(step, current_step, report)?;
            }
        }
        Ok(())
    }

    fn update_step(
        &self,
        desired: &mut Step,
        current: &Step,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        desired.assign_id(current.id());
        desired.impersonating_user_id = current.impersonating_user_id;
        desired.secure_configuration_id = current.secure_configuration_id;
        desired.service_endpoint_id = current.service_endpoint_id;
        if desired.invocation_source.is_none() {
            desired.invocation_source = current.invocation_source;
        }
        if !desired.structurally_eq(current) {
            self.adapter.update(Record::Step(desired))?;
            report.updated.steps += 1;
        }

        let removed: Vec<RecordId> = current
            .images()
            .iter()
            .filter(|image| find_by_key(desired.images(), &image.name).is_none())
            .map(Image::id)
            .collect();
        if !removed.is_empty() {
            let summary = self.adapter.delete(&DeleteTargets {
                images: removed,
                ..DeleteTargets::default()
            })?;
            report.deleted.add_deleted(summary);
        }

        let matches: Vec<Option<&Image>> = desired
            .images()
            .iter()
            .map(|image| find_by_key(current.images(), &image.name))
            .collect();

        for (image, matched) in desired.images_mut().iter_mut().zip(&matches) {
            if matched.is_none() {
                self.register_image(image, report)?;
            }
        }
        for (image, matched) in desired.images_mut().iter_mut().zip(&matches) {
            if let Some(current_image) = matched {
                image.assign_id(current_image.id());
                if !image.structurally_eq(current_image) {
                    self.adapter.update(Record::Image(image))?;
                    report.updated.images += 1;
                }
            }
        }

        self.adapter.set_enabled(desired.id(), desired.enabled)?;
        report.state_changes += 1;
        Ok(())
    }
}

/// Natural key used to match records of one parent.
trait NaturalKey {
    fn natural_key(&self) -> &str;
}

impl NaturalKey for Handler {
    fn natural_key(&self) -> &str {
        &self.type_name
    }
}

impl NaturalKey for Step {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

impl NaturalKey for Image {
    fn natural_key(&self) -> &str {
        &self.name
    }
}

/// First record with the given key.
fn find_by_key<'a, T: NaturalKey>(items: &'a [T], key: &str) -> Option<&'a T> {
    items.iter().find(|item| item.natural_key() == key)
}

fn collect_duplicate_keys(assembly: &Assembly, side: TreeSide, warnings: &mut Vec<ReconcileWarning>) {
    push_duplicates(warnings, side, EntityKind::Handler, assembly.name(), assembly.handlers());
    for handler in assembly.handlers() {
        push_duplicates(warnings, side, EntityKind::Step, &handler.type_name, handler.steps());
        for step in handler.steps() {
            push_duplicates(warnings, side, EntityKind::Image, &step.name, step.images());
        }
    }
}

fn push_duplicates<T: NaturalKey>(
    warnings: &mut Vec<ReconcileWarning>,
    side: TreeSide,
    kind: EntityKind,
    scope: &str,
    items: &[T],
) {
    let keys: Vec<&str> = items.iter().map(NaturalKey::natural_key).collect();
    for key in duplicates(keys) {
        warnings.push(ReconcileWarning::DuplicateKey {
            side,
            kind,
            scope: scope.to_string(),
            key: key.to_string(),
        });
    }
}

/// Keys occurring more than once, each reported once in first-seen order.
fn duplicates(keys: Vec<&str>) -> Vec<&str> {
    let mut repeated = Vec::new();
    for (index, key) in keys.iter().enumerate() {
        if keys[..index].contains(key) && !repeated.contains(key) {
            repeated.push(*key);
        }
    }
    repeated
}

#[cfg(test)]
mod tests {
    use super::{duplicates, ReconcileError, ReconcileService};
    use crate::db::open_db_in_memory;
    use crate::model::assembly::Assembly;
    use crate::options::SyncOptions;
    use crate::registry::sqlite::SqliteRegistry;

    #[test]
    fn duplicates_are_reported_once_in_order() {
        assert_eq!(duplicates(vec!["a", "b", "a", "c", "b", "a"]), vec!["a", "b"]);
        assert!(duplicates(vec!["a", "b"]).is_empty());
    }

    #[test]
    fn empty_inputs_fail_before_registry_access() {
        let conn = open_db_in_memory().unwrap();
        let service = ReconcileService::new(SqliteRegistry::new(&conn), SyncOptions::default());

        let mut unnamed = Assembly::new("", "1.0");
        assert!(matches!(
            service.reconcile(&mut unnamed, b"payload"),
            Err(ReconcileError::MissingArgument("assembly name"))
        ));

        let mut named = Assembly::new("Acme.Plugins", "1.0");
        assert!(matches!(
            service.reconcile(&mut named, &[]),
            Err(ReconcileError::MissingArgument("assembly content"))
        ));
    }
}
