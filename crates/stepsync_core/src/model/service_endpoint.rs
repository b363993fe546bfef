//! Service endpoint model: an external listener that steps post their
//! execution context to.
//!
//! # Invariants
//! - Endpoints own nothing; steps reference them through
//!   `Step::service_endpoint_id`.
//! - `name` is the natural key.

use crate::model::kinds::{
    EndpointConnectionMode, EndpointContract, EndpointUserClaim, RecordId,
};
use serde::Serialize;
use uuid::Uuid;

/// One registered service endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub description: Option<String>,
    /// Messaging namespace hosting the listener.
    pub solution_namespace: String,
    /// Queue, topic or relay path below the namespace.
    pub path: Option<String>,
    pub contract: EndpointContract,
    pub user_claim: EndpointUserClaim,
    pub connection_mode: EndpointConnectionMode,
    id: RecordId,
}

impl ServiceEndpoint {
    /// Creates an unregistered endpoint with no user claim and a normal
    /// connection.
    pub fn new(
        name: impl Into<String>,
        solution_namespace: impl Into<String>,
        contract: EndpointContract,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            solution_namespace: solution_namespace.into(),
            path: None,
            contract,
            user_claim: EndpointUserClaim::None,
            connection_mode: EndpointConnectionMode::Normal,
            id: Uuid::nil(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    /// Field-by-field comparison used to decide whether an update write is needed.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.solution_namespace == other.solution_namespace
            && self.path == other.path
            && self.contract == other.contract
            && self.user_claim == other.user_claim
            && self.connection_mode == other.connection_mode
    }
}
