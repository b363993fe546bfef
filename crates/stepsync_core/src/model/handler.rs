//! Handler model: a plugin type or workflow activity inside an assembly.
//!
//! # Invariants
//! - Every owned step (and transitively every image) carries this handler's
//!   `id` as `handler_id` and the same `assembly_id`.
//! - Workflow activities never own steps.

use crate::model::kinds::{HandlerKind, Isolatable, RecordId};
use crate::model::step::Step;
use serde::Serialize;
use uuid::Uuid;

/// One registered handler type.
///
/// `type_name` (fully qualified, case-sensitive) is the natural key within an
/// assembly.
#[derive(Debug, Clone, Serialize)]
pub struct Handler {
    pub type_name: String,
    pub kind: HandlerKind,
    pub isolatable: Isolatable,
    pub display_name: Option<String>,
    pub friendly_name: Option<String>,
    pub description: Option<String>,
    pub workflow_group_name: Option<String>,
    assembly_name: String,
    id: RecordId,
    assembly_id: RecordId,
    steps: Vec<Step>,
}

impl Handler {
    /// Creates an unregistered handler with isolation derived from its kind.
    pub fn new(type_name: impl Into<String>, kind: HandlerKind) -> Self {
        let isolatable = match kind {
            HandlerKind::ExecutionHandler => Isolatable::Yes,
            HandlerKind::WorkflowActivity => Isolatable::No,
        };
        Self {
            type_name: type_name.into(),
            kind,
            isolatable,
            display_name: None,
            friendly_name: None,
            description: None,
            workflow_group_name: None,
            assembly_name: String::new(),
            id: Uuid::nil(),
            assembly_id: Uuid::nil(),
            steps: Vec::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn assembly_id(&self) -> RecordId {
        self.assembly_id
    }

    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    pub fn is_workflow_activity(&self) -> bool {
        self.kind == HandlerKind::WorkflowActivity
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    /// Adds a step, stamping this handler's identity onto it and its images.
    pub fn add_step(&mut self, mut step: Step) {
        step.set_handler_id(self.id);
        step.set_assembly_id(self.assembly_id);
        self.steps.push(step);
    }

    /// Assigns the registry identity and cascades it to every step and image.
    pub fn assign_id(&mut self, id: RecordId) {
        if self.id == id {
            return;
        }
        self.id = id;
        for step in &mut self.steps {
            step.set_handler_id(id);
        }
    }

    pub(crate) fn set_assembly_id(&mut self, id: RecordId) {
        if self.assembly_id == id {
            return;
        }
        self.assembly_id = id;
        for step in &mut self.steps {
            step.set_assembly_id(id);
        }
    }

    pub(crate) fn set_assembly_name(&mut self, name: &str) {
        if self.assembly_name != name {
            self.assembly_name = name.to_string();
        }
    }

    /// Field-by-field comparison used to decide whether an update write is needed.
    ///
    /// Steps are not compared.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.assembly_name == other.assembly_name
            && self.type_name == other.type_name
            && self.description == other.description
            && self.friendly_name == other.friendly_name
            && self.kind == other.kind
            && self.isolatable == other.isolatable
            && self.display_name == other.display_name
            && self.workflow_group_name == other.workflow_group_name
            && self.assembly_id == other.assembly_id
    }
}

#[cfg(test)]
mod tests {
    use super::Handler;
    use crate::model::image::Image;
    use crate::model::kinds::{HandlerKind, Isolatable};
    use crate::model::step::Step;
    use uuid::Uuid;

    fn handler_with_two_steps() -> Handler {
        let mut handler = Handler::new("Acme.Crm.Plugins.ContactPlugin", HandlerKind::ExecutionHandler);
        let mut create = Step::new("Contact: Create of contact", Uuid::new_v4());
        create.add_image(Image::post_image());
        handler.add_step(create);
        handler.add_step(Step::new("Contact: Update of contact", Uuid::new_v4()));
        handler
    }

    #[test]
    fn new_derives_isolation_from_kind() {
        let plugin = Handler::new("A.BPlugin", HandlerKind::ExecutionHandler);
        assert_eq!(plugin.isolatable, Isolatable::Yes);
        let activity = Handler::new("A.BActivity", HandlerKind::WorkflowActivity);
        assert_eq!(activity.isolatable, Isolatable::No);
        assert!(activity.is_workflow_activity());
    }

    #[test]
    fn assign_id_cascades_to_steps_and_images() {
        let mut handler = handler_with_two_steps();
        let first = Uuid::new_v4();
        handler.assign_id(first);
        assert!(handler.steps().iter().all(|step| step.handler_id() == first));
        assert_eq!(handler.steps()[0].images()[0].handler_id(), first);

        let second = Uuid::new_v4();
        handler.assign_id(second);
        assert!(handler.steps().iter().all(|step| step.handler_id() == second));
        assert_eq!(handler.steps()[0].images()[0].handler_id(), second);
    }

    #[test]
    fn reassigning_same_id_keeps_children_consistent() {
        let mut handler = handler_with_two_steps();
        let id = Uuid::new_v4();
        handler.assign_id(id);
        handler.assign_id(id);
        assert!(handler.steps().iter().all(|step| step.handler_id() == id));
    }

    #[test]
    fn structural_equality_ignores_steps() {
        let a = handler_with_two_steps();
        let b = Handler::new("Acme.Crm.Plugins.ContactPlugin", HandlerKind::ExecutionHandler);
        assert!(a.structurally_eq(&b));

        let mut c = b.clone();
        c.assign_id(Uuid::new_v4());
        assert!(!b.structurally_eq(&c));
    }
}
