//! Assembly model: root of the registration tree.
//!
//! # Invariants
//! - Every owned handler carries this assembly's `id` and `name`; the id also
//!   reaches every step and image below it.
//! - `assign_id` and `rename` cascade immediately; re-assigning an unchanged
//!   value does nothing.

use crate::model::handler::Handler;
use crate::model::kinds::{IsolationMode, RecordId, SdkVersion, SourceType};
use serde::Serialize;
use uuid::Uuid;

/// Culture label used for culture-neutral modules.
pub const NEUTRAL_CULTURE: &str = "neutral";

/// One module registered in the registry together with its handlers.
///
/// `name` is unique within the registry and is used to find the currently
/// registered copy.
#[derive(Debug, Clone, Serialize)]
pub struct Assembly {
    pub version: String,
    pub culture: String,
    /// Upper-case hex; `None` for unsigned modules.
    pub public_key_token: Option<String>,
    pub isolation_mode: IsolationMode,
    pub source_type: SourceType,
    pub sdk_version: Option<SdkVersion>,
    pub description: Option<String>,
    name: String,
    id: RecordId,
    handlers: Vec<Handler>,
}

impl Assembly {
    /// Creates an unregistered, culture-neutral assembly stored in the database.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            culture: NEUTRAL_CULTURE.to_string(),
            public_key_token: None,
            isolation_mode: IsolationMode::None,
            source_type: SourceType::Database,
            sdk_version: None,
            description: None,
            name: name.into(),
            id: Uuid::nil(),
            handlers: Vec::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut [Handler] {
        &mut self.handlers
    }

    /// Finds a handler by its natural key (first match).
    pub fn handler(&self, type_name: &str) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|handler| handler.type_name == type_name)
    }

    /// Adds a handler, stamping this assembly's id and name onto its subtree.
    pub fn add_handler(&mut self, mut handler: Handler) {
        handler.set_assembly_id(self.id);
        handler.set_assembly_name(&self.name);
        self.handlers.push(handler);
    }

    /// Assigns the registry identity and cascades it through the whole tree.
    pub fn assign_id(&mut self, id: RecordId) {
        if self.id == id {
            return;
        }
        self.id = id;
        for handler in &mut self.handlers {
            handler.set_assembly_id(id);
        }
    }

    /// Renames the assembly and cascades the name to every handler.
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name == name {
            return;
        }
        self.name = name;
        for handler in &mut self.handlers {
            handler.set_assembly_name(&self.name);
        }
    }

    /// Workflow activities currently owned by this assembly.
    pub fn workflow_activities(&self) -> impl Iterator<Item = &Handler> {
        self.handlers
            .iter()
            .filter(|handler| handler.is_workflow_activity())
    }

    /// Total number of steps across all handlers.
    pub fn step_count(&self) -> usize {
        self.handlers.iter().map(|handler| handler.steps().len()).sum()
    }
}
