//! Extraction errors. Every variant aborts extraction of the whole module.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required input is empty.
    MissingArgument(&'static str),
    /// A candidate type is neither an execution handler nor a workflow activity.
    Classification(String),
    /// A candidate type name is not a dotted identifier.
    InvalidTypeName(String),
    /// A step names a message the registry does not publish.
    UnknownMessage { type_name: String, message: String },
    /// A step names an entity the registry has no filter for.
    UnregisteredEntity {
        type_name: String,
        message: String,
        entity: String,
    },
    /// The XML descriptor (or unsecured configuration) is not well-formed or
    /// lacks a required element/attribute.
    MalformedDescriptor(String),
    /// A serialized module scan cannot be decoded.
    MalformedScan(String),
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArgument(name) => write!(f, "required argument is missing: {name}"),
            Self::Classification(type_name) => write!(
                f,
                "type `{type_name}` is neither an execution handler nor a workflow activity"
            ),
            Self::InvalidTypeName(type_name) => write!(f, "invalid type name: `{type_name}`"),
            Self::UnknownMessage { type_name, message } => write!(
                f,
                "type `{type_name}` registers a step for unknown message `{message}`"
            ),
            Self::UnregisteredEntity {
                type_name,
                message,
                entity,
            } => write!(
                f,
                "type `{type_name}` registers `{message}` for entity `{entity}`, which is not registered yet"
            ),
            Self::MalformedDescriptor(details) => write!(f, "malformed descriptor: {details}"),
            Self::MalformedScan(details) => write!(f, "malformed module scan: {details}"),
        }
    }
}

impl Error for ExtractError {}

impl From<roxmltree::Error> for ExtractError {
    fn from(value: roxmltree::Error) -> Self {
        Self::MalformedDescriptor(value.to_string())
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedScan(value.to_string())
    }
}
