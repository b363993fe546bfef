//! Remote registry contract and implementations.
//!
//! # Responsibility
//! - Define the record-level contract of the store holding registrations.
//! - Lift record-level operations into whole-tree loads and cascading deletes
//!   (`adapter`).
//!
//! # Invariants
//! - `create` returns the registry-assigned id; callers must stamp it onto
//!   the in-memory record before creating children.
//! - `update` of a missing record fails with `NotFound`.
//! - `delete` never cascades; deleting a parent that still owns children is
//!   a registry error.

pub mod adapter;
pub mod sqlite;

use crate::catalog::{Message, MessageFilter};
use crate::db::DbError;
use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::RecordId;
use crate::model::service_endpoint::ServiceEndpoint;
use crate::model::step::Step;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug)]
pub enum RegistryError {
    Db(DbError),
    NotFound { kind: EntityKind, id: RecordId },
    InvalidData(String),
    MissingArgument(&'static str),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid registry data: {message}"),
            Self::MissingArgument(name) => write!(f, "required argument is missing: {name}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) | Self::MissingArgument(_) => None,
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Kind of registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Assembly,
    Handler,
    Step,
    Image,
    ServiceEndpoint,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Assembly => "assembly",
            Self::Handler => "handler",
            Self::Step => "step",
            Self::Image => "image",
            Self::ServiceEndpoint => "service endpoint",
        };
        f.write_str(label)
    }
}

/// Filter applied by `RemoteRegistry::find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Assembly name, handler type name, step name, image name or service
    /// endpoint name.
    NameEquals(String),
    /// Records owned by any of the given parents: handlers by assembly id,
    /// steps by handler id, images by step id.
    ParentIn(Vec<RecordId>),
    /// Steps posting to any of the given service endpoints.
    EndpointIn(Vec<RecordId>),
}

/// Record written through `create` or `update`.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Assembly {
        assembly: &'a Assembly,
        /// Module payload stored with the assembly.
        content: &'a [u8],
        /// Workflow activities whose group names are written with the
        /// assembly on update. Ignored on create.
        activities: &'a [Handler],
    },
    Handler(&'a Handler),
    Step(&'a Step),
    Image(&'a Image),
    ServiceEndpoint(&'a ServiceEndpoint),
}

impl Record<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Assembly { .. } => EntityKind::Assembly,
            Self::Handler(_) => EntityKind::Handler,
            Self::Step(_) => EntityKind::Step,
            Self::Image(_) => EntityKind::Image,
            Self::ServiceEndpoint(_) => EntityKind::ServiceEndpoint,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Assembly { assembly, .. } => assembly.id(),
            Self::Handler(handler) => handler.id(),
            Self::Step(step) => step.id(),
            Self::Image(image) => image.id(),
            Self::ServiceEndpoint(endpoint) => endpoint.id(),
        }
    }
}

/// Record returned by `find`, carrying its id and parent ids but no children.
#[derive(Debug, Clone)]
pub enum FoundRecord {
    Assembly(Assembly),
    Handler(Handler),
    Step(Step),
    Image(Image),
    ServiceEndpoint(ServiceEndpoint),
}

impl FoundRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Assembly(_) => EntityKind::Assembly,
            Self::Handler(_) => EntityKind::Handler,
            Self::Step(_) => EntityKind::Step,
            Self::Image(_) => EntityKind::Image,
            Self::ServiceEndpoint(_) => EntityKind::ServiceEndpoint,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Assembly(assembly) => assembly.id(),
            Self::Handler(handler) => handler.id(),
            Self::Step(step) => step.id(),
            Self::Image(image) => image.id(),
            Self::ServiceEndpoint(endpoint) => endpoint.id(),
        }
    }
}

/// Record-level access to the store holding registrations.
pub trait RemoteRegistry {
    fn find(&self, kind: EntityKind, predicate: &Predicate) -> RegistryResult<Vec<FoundRecord>>;
    /// Stores `record` under a newly assigned id and returns it.
    fn create(&self, record: Record<'_>) -> RegistryResult<RecordId>;
    fn update(&self, record: Record<'_>) -> RegistryResult<()>;
    fn delete(&self, kind: EntityKind, id: RecordId) -> RegistryResult<()>;
    fn set_state(&self, step_id: RecordId, enabled: bool) -> RegistryResult<()>;
    /// Messages that accept custom steps.
    fn list_public_messages(&self) -> RegistryResult<Vec<Message>>;
    /// Filters of the given messages that allow custom steps.
    fn list_filters(&self, message_ids: &[RecordId]) -> RegistryResult<Vec<MessageFilter>>;
}

impl<T: RemoteRegistry + ?Sized> RemoteRegistry for &T {
    fn find(&self, kind: EntityKind, predicate: &Predicate) -> RegistryResult<Vec<FoundRecord>> {
        (**self).find(kind, predicate)
    }

    fn create(&self, record: Record<'_>) -> RegistryResult<RecordId> {
        (**self).create(record)
    }

    fn update(&self, record: Record<'_>) -> RegistryResult<()> {
        (**self).update(record)
    }

    fn delete(&self, kind: EntityKind, id: RecordId) -> RegistryResult<()> {
        (**self).delete(kind, id)
    }

    fn set_state(&self, step_id: RecordId, enabled: bool) -> RegistryResult<()> {
        (**self).set_state(step_id, enabled)
    }

    fn list_public_messages(&self) -> RegistryResult<Vec<Message>> {
        (**self).list_public_messages()
    }

    fn list_filters(&self, message_ids: &[RecordId]) -> RegistryResult<Vec<MessageFilter>> {
        (**self).list_filters(message_ids)
    }
}
