//! Closed value sets shared by the registration model.
//!
//! Registry numeric codes for these values live in the SQLite registry
//! mapping, not here.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque registry identifier. `Uuid::nil()` means "not assigned yet".
pub type RecordId = Uuid;

/// Handler flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Event-driven plugin subscribed to messages through steps.
    ExecutionHandler,
    /// Workflow activity. Never owns steps.
    WorkflowActivity,
}

/// Whether a handler may run inside the registry sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolatable {
    Yes,
    No,
    Unknown,
}

/// Pipeline stage a step executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStage {
    PreValidation,
    PreOperation,
    PostOperation,
    PostOperationDeprecated,
}

/// Step execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    Synchronous,
    Asynchronous,
}

/// Where a step is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDeployment {
    ServerOnly,
    OfflineOnly,
    Both,
}

/// Whether a step fires for parent or child pipeline invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationSource {
    Parent,
    Child,
}

/// Snapshot flavor for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    PreImage,
    PostImage,
    Both,
}

/// Assembly isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    None,
    Sandbox,
}

/// Where the registry keeps the assembly payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Database,
    Disk,
    Normal,
}

/// Delivery contract of a service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointContract {
    OneWay,
    Queue,
    Rest,
    TwoWay,
}

/// Caller identity forwarded with each posted execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointUserClaim {
    None,
    UserId,
    UserInfo,
}

/// How the registry authenticates to a service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointConnectionMode {
    Normal,
    Federated,
}

/// SDK version an execution handler was compiled against.
///
/// Only major and minor are tracked; build/revision never reach the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SdkVersion {
    pub major: u32,
    pub minor: u32,
}

impl SdkVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parses `major.minor[.build[.revision]]`, keeping only major and minor.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |part| part.parse().ok())?;
        Some(Self { major, minor })
    }
}

impl Display for SdkVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
