//! Statically-typed description of a compiled module's annotated types.
//!
//! A build-time or load-time scanner produces these descriptors; the module
//! extractor consumes them without knowing how they were obtained.

use crate::extract::error::ExtractResult;
use crate::model::kinds::{StepMode, StepStage};
use serde::{Deserialize, Serialize};

/// Identity of the scanned module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub version: String,
    /// `None` or empty for culture-neutral modules.
    #[serde(default)]
    pub culture: Option<String>,
    /// Raw public key token bytes; empty for unsigned modules.
    #[serde(default)]
    pub public_key_token: Vec<u8>,
}

impl ModuleIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            culture: None,
            public_key_token: Vec::new(),
        }
    }
}

/// Capability marker of one exported type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    /// Implements the execution-handler capability. `sdk_version` is the full
    /// version of the module defining that capability.
    ExecutionHandler { sdk_version: String },
    /// Derives from the workflow activity base type.
    WorkflowActivity,
    /// Neither of the above.
    Unrecognized,
}

/// Attribute declared on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum TypeAttribute {
    WorkflowActivity { group_name: String, name: String },
}

/// Step registration declared on a handler method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRegistration {
    pub message_name: String,
    pub entity_name: String,
    pub stage: StepStage,
    pub mode: StepMode,
    pub rank: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub delete_async_operation_if_successful: bool,
    /// Key into the unsecured-configuration entries.
    #[serde(default)]
    pub unsecure_config: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Attribute declared on a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum MethodAttribute {
    Step(StepRegistration),
    FilteringAttributes { attributes: Vec<String> },
}

/// Attribute declared on a method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum ParameterAttribute {
    ImageParameters { attributes: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub attributes: Vec<ParameterAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Fully qualified name of the type that declares this method.
    pub declaring_type: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub attributes: Vec<MethodAttribute>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

fn default_public() -> bool {
    true
}

impl MethodDescriptor {
    pub fn step_registrations(&self) -> impl Iterator<Item = &StepRegistration> {
        self.attributes.iter().filter_map(|attribute| match attribute {
            MethodAttribute::Step(registration) => Some(registration),
            MethodAttribute::FilteringAttributes { .. } => None,
        })
    }

    pub fn filtering_attributes(&self) -> Option<&[String]> {
        self.attributes.iter().find_map(|attribute| match attribute {
            MethodAttribute::FilteringAttributes { attributes } => Some(attributes.as_slice()),
            MethodAttribute::Step(_) => None,
        })
    }
}

/// One exported type of the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub full_name: String,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default = "default_is_class")]
    pub is_class: bool,
    #[serde(flatten)]
    pub kind: TypeKind,
    /// Last generic argument of the base type: the payload entity type.
    #[serde(default)]
    pub payload_entity: Option<String>,
    #[serde(default)]
    pub attributes: Vec<TypeAttribute>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

fn default_is_class() -> bool {
    true
}

impl TypeDescriptor {
    /// Unqualified type name.
    pub fn simple_name(&self) -> &str {
        crate::naming::last_segment(&self.full_name)
    }

    /// `(group_name, name)` of the workflow activity attribute, if declared.
    pub fn workflow_activity_attribute(&self) -> Option<(&str, &str)> {
        self.attributes.iter().find_map(|attribute| match attribute {
            TypeAttribute::WorkflowActivity { group_name, name } => {
                Some((group_name.as_str(), name.as_str()))
            }
        })
    }

    /// Public instance methods declared directly on this type.
    pub fn declared_instance_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter().filter(move |method| {
            method.is_public && !method.is_static && method.declaring_type == self.full_name
        })
    }
}

/// Source of type descriptors for one module.
pub trait ModuleIntrospector {
    fn identity(&self) -> ModuleIdentity;
    fn list_exported_classes(&self) -> Vec<TypeDescriptor>;
}

/// Serialized scan of a module, typically emitted by a build step as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleScan {
    pub identity: ModuleIdentity,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl ModuleScan {
    pub fn new(identity: ModuleIdentity) -> Self {
        Self {
            identity,
            types: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> ExtractResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ExtractResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ModuleIntrospector for ModuleScan {
    fn identity(&self) -> ModuleIdentity {
        self.identity.clone()
    }

    fn list_exported_classes(&self) -> Vec<TypeDescriptor> {
        self.types.clone()
    }
}
