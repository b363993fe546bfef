//! Model extraction from an XML registration descriptor.
//!
//! # Responsibility
//! - Read `Solutions/Solution/PluginTypes/Plugin` elements into handlers,
//!   their `Steps/Step` children into steps and `Images/Image` into images.
//!
//! # Invariants
//! - Only two stages are distinguishable: `PreInsideTransaction` maps to
//!   pre-operation, everything else to post-operation.
//! - Steps are always enabled and never delete their async operation.
//! - `Both` images are not supported and are skipped with a warning; any
//!   other unrecognised image type is a malformed descriptor.
//! - The caller's SDK version is kept only when at least one execution
//!   handler was read.

use crate::catalog::Catalog;
use crate::extract::error::{ExtractError, ExtractResult};
use crate::extract::scan::ModuleIdentity;
use crate::extract::{assembly_from_identity, ACTIVITY_SUFFIX, HANDLER_SUFFIX};
use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::{HandlerKind, SdkVersion, StepDeployment, StepMode, StepStage};
use crate::model::step::Step;
use crate::naming;
use log::{info, warn};
use roxmltree::Node;

/// Namespace of every descriptor element.
pub const DESCRIPTOR_NAMESPACE: &str =
    "http://schemas.microsoft.com/crm/2011/tools/pluginregistration";

const PRE_INSIDE_TRANSACTION: &str = "PreInsideTransaction";
const ASYNCHRONOUS_MODE: &str = "asynchronous";
const UNSUPPORTED_IMAGE_TYPE: &str = "Both";

/// Builds registration models from XML descriptors.
pub struct DescriptorExtractor<'a> {
    catalog: &'a Catalog,
}

impl<'a> DescriptorExtractor<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Extracts the assembly described by `xml`.
    ///
    /// The descriptor carries no module metadata, so identity and SDK version
    /// are supplied by the caller. An activity-only descriptor leaves the SDK
    /// version unset.
    ///
    /// # Errors
    /// - `MalformedDescriptor` for invalid XML or missing elements/attributes.
    /// - `Classification` for a type name with neither handler suffix.
    /// - `UnknownMessage`/`UnregisteredEntity` for unresolved steps.
    pub fn extract(
        &self,
        identity: &ModuleIdentity,
        sdk_version: Option<SdkVersion>,
        xml: &str,
    ) -> ExtractResult<Assembly> {
        let mut assembly = assembly_from_identity(identity)?;

        let document = roxmltree::Document::parse(xml)?;
        let plugin_types = required_path(
            document.root_element(),
            &["Solutions", "Solution", "PluginTypes"],
        )?;

        for plugin in children_named(plugin_types, "Plugin") {
            let handler = self.build_handler(plugin)?;
            assembly.add_handler(handler);
        }
        if assembly
            .handlers()
            .iter()
            .any(|handler| handler.kind == HandlerKind::ExecutionHandler)
        {
            assembly.sdk_version = sdk_version;
        }

        info!(
            "event=extract module=extract status=ok source=descriptor assembly={} handlers={} steps={}",
            assembly.name(),
            assembly.handlers().len(),
            assembly.step_count()
        );
        Ok(assembly)
    }

    fn build_handler(&self, plugin: Node<'_, '_>) -> ExtractResult<Handler> {
        let type_name = required_attribute(plugin, "TypeName")?;
        if !naming::is_valid_type_name(type_name) {
            return Err(ExtractError::InvalidTypeName(type_name.to_string()));
        }

        let kind = if type_name.ends_with(HANDLER_SUFFIX) {
            HandlerKind::ExecutionHandler
        } else if type_name.ends_with(ACTIVITY_SUFFIX) {
            HandlerKind::WorkflowActivity
        } else {
            return Err(ExtractError::Classification(type_name.to_string()));
        };

        let friendly_name = required_attribute(plugin, "FriendlyName")?;
        let mut handler = Handler::new(type_name, kind);
        handler.friendly_name = Some(friendly_name.to_string());

        if kind == HandlerKind::WorkflowActivity {
            handler.workflow_group_name = Some(friendly_name.to_string());
            handler.display_name = plugin.attribute("Name").map(str::to_string);
            return Ok(handler);
        }

        let short_name = naming::handler_short_name(type_name);
        handler.display_name = Some(naming::handler_display_name(type_name));

        if let Some(steps) = child_named(plugin, "Steps") {
            for step_node in children_named(steps, "Step") {
                let step = self.build_step(type_name, &short_name, step_node)?;
                handler.add_step(step);
            }
        }
        Ok(handler)
    }

    fn build_step(
        &self,
        type_name: &str,
        short_name: &str,
        node: Node<'_, '_>,
    ) -> ExtractResult<Step> {
        let message = required_attribute(node, "MessageName")?;
        let primary_entity = required_attribute(node, "PrimaryEntityName")?;
        let secondary_entity = non_empty_attribute(node, "SecondaryEntityName");

        let message_id =
            self.catalog
                .message_id(message)
                .ok_or_else(|| ExtractError::UnknownMessage {
                    type_name: type_name.to_string(),
                    message: message.to_string(),
                })?;
        let filter_id = self
            .catalog
            .filter_id(message_id, primary_entity)
            .ok_or_else(|| ExtractError::UnregisteredEntity {
                type_name: type_name.to_string(),
                message: message.to_string(),
                entity: primary_entity.to_string(),
            })?;

        let rank_text = required_attribute(node, "Rank")?;
        let rank = rank_text.trim().parse::<i32>().map_err(|_| {
            ExtractError::MalformedDescriptor(format!(
                "step `{message}` of `{type_name}` has invalid Rank `{rank_text}`"
            ))
        })?;

        let mut step = Step::new(
            naming::step_name(short_name, message, Some(primary_entity), secondary_entity),
            message_id,
        );
        step.message_entity_filter_id = filter_id;
        step.rank = rank;
        step.stage = if required_attribute(node, "Stage")? == PRE_INSIDE_TRANSACTION {
            StepStage::PreOperation
        } else {
            StepStage::PostOperation
        };
        step.mode = if required_attribute(node, "Mode")?.eq_ignore_ascii_case(ASYNCHRONOUS_MODE) {
            StepMode::Asynchronous
        } else {
            StepMode::Synchronous
        };
        step.deployment = StepDeployment::ServerOnly;
        step.description = non_empty_attribute(node, "Description").map(str::to_string);
        step.filtering_attributes =
            non_empty_attribute(node, "FilteringAttributes").map(str::to_string);
        step.unsecure_configuration =
            non_empty_attribute(node, "CustomConfiguration").map(str::to_string);
        step.enabled = true;
        step.delete_async_operation_if_successful = false;

        if let Some(images) = child_named(node, "Images") {
            for image_node in children_named(images, "Image") {
                if let Some(image) = build_image(image_node, message, &step.name)? {
                    step.add_image(image);
                }
            }
        }
        Ok(step)
    }
}

fn build_image(node: Node<'_, '_>, message: &str, step_name: &str) -> ExtractResult<Option<Image>> {
    let image_type = required_attribute(node, "ImageType")?;
    let mut image = match image_type {
        "PreImage" => Image::pre_image(),
        "PostImage" => Image::post_image(),
        UNSUPPORTED_IMAGE_TYPE => {
            warn!(
                "event=extract_image module=extract status=skip step=\"{step_name}\" image_type={UNSUPPORTED_IMAGE_TYPE} reason=unsupported"
            );
            return Ok(None);
        }
        other => {
            return Err(ExtractError::MalformedDescriptor(format!(
                "image of step `{step_name}` has unknown ImageType `{other}`"
            )));
        }
    };
    image.attributes = non_empty_attribute(node, "Attributes").map(str::to_string);
    image.message_property_name = naming::message_property_name(message).map(str::to_string);
    Ok(Some(image))
}

fn child_named<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.has_tag_name((DESCRIPTOR_NAMESPACE, name)))
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.has_tag_name((DESCRIPTOR_NAMESPACE, name)))
}

fn required_path<'a, 'input>(
    mut node: Node<'a, 'input>,
    path: &[&str],
) -> ExtractResult<Node<'a, 'input>> {
    for name in path {
        node = child_named(node, name).ok_or_else(|| {
            ExtractError::MalformedDescriptor(format!("missing element `{name}`"))
        })?;
    }
    Ok(node)
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> ExtractResult<&'a str> {
    node.attribute(name).ok_or_else(|| {
        ExtractError::MalformedDescriptor(format!(
            "element `{}` is missing attribute `{name}`",
            node.tag_name().name()
        ))
    })
}

fn non_empty_attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).filter(|value| !value.trim().is_empty())
}
