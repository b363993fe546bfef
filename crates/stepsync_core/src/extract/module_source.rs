//! Model extraction from a statically-typed module scan.

use crate::catalog::Catalog;
use crate::extract::error::{ExtractError, ExtractResult};
use crate::extract::scan::{
    MethodDescriptor, ModuleIntrospector, ParameterAttribute, StepRegistration, TypeDescriptor,
    TypeKind,
};
use crate::extract::unsecure_config::{resolve_unsecure_config, UnsecureConfigEntry};
use crate::extract::{assembly_from_identity, friendly_name_for, is_candidate_name, join_field_names};
use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::{HandlerKind, SdkVersion, StepDeployment};
use crate::model::step::Step;
use crate::naming;
use log::{debug, info};

/// Parameter name carrying the pre-operation image.
pub const PRE_IMAGE_PARAMETER: &str = "preEntityImage";
/// Parameter name carrying the post-operation image.
pub const POST_IMAGE_PARAMETER: &str = "postEntityImage";

/// Builds registration models from module scans.
pub struct ModuleExtractor<'a> {
    catalog: &'a Catalog,
    unsecure_config: &'a [UnsecureConfigEntry],
}

impl<'a> ModuleExtractor<'a> {
    pub fn new(catalog: &'a Catalog, unsecure_config: &'a [UnsecureConfigEntry]) -> Self {
        Self {
            catalog,
            unsecure_config,
        }
    }

    /// Extracts the assembly with all handlers, steps and images.
    ///
    /// # Errors
    /// - `MissingArgument` when the module has no name.
    /// - `Classification` for a candidate that is neither handler nor activity.
    /// - `UnknownMessage`/`UnregisteredEntity` when a step does not resolve
    ///   against the catalog.
    pub fn extract(&self, module: &dyn ModuleIntrospector) -> ExtractResult<Assembly> {
        let identity = module.identity();
        let mut assembly = assembly_from_identity(&identity)?;

        for descriptor in module
            .list_exported_classes()
            .iter()
            .filter(|descriptor| is_registration_candidate(descriptor))
        {
            let handler = self.build_handler(descriptor, &mut assembly)?;
            assembly.add_handler(handler);
        }

        info!(
            "event=extract module=extract status=ok source=module assembly={} handlers={} steps={}",
            assembly.name(),
            assembly.handlers().len(),
            assembly.step_count()
        );
        Ok(assembly)
    }

    fn build_handler(
        &self,
        descriptor: &TypeDescriptor,
        assembly: &mut Assembly,
    ) -> ExtractResult<Handler> {
        let type_name = descriptor.full_name.as_str();
        if !naming::is_valid_type_name(type_name) {
            return Err(ExtractError::InvalidTypeName(type_name.to_string()));
        }

        let kind = match &descriptor.kind {
            TypeKind::ExecutionHandler { sdk_version } => {
                let version = SdkVersion::parse(sdk_version).ok_or_else(|| {
                    ExtractError::MalformedScan(format!(
                        "type `{type_name}` reports invalid sdk version `{sdk_version}`"
                    ))
                })?;
                assembly.sdk_version = Some(version);
                HandlerKind::ExecutionHandler
            }
            TypeKind::WorkflowActivity => HandlerKind::WorkflowActivity,
            TypeKind::Unrecognized => {
                return Err(ExtractError::Classification(type_name.to_string()));
            }
        };

        let mut handler = Handler::new(type_name, kind);
        handler.friendly_name = Some(friendly_name_for(type_name));

        if kind == HandlerKind::WorkflowActivity {
            if let Some((group_name, name)) = descriptor.workflow_activity_attribute() {
                handler.workflow_group_name = Some(group_name.to_string());
                handler.display_name = Some(name.to_string());
            }
            return Ok(handler);
        }

        let Some(payload_entity) = descriptor.payload_entity.as_deref() else {
            debug!(
                "event=extract_handler module=extract status=skip type={type_name} reason=no_payload_entity"
            );
            return Ok(handler);
        };

        let short_name = naming::handler_short_name(type_name);
        handler.display_name = Some(naming::handler_display_name(type_name));

        for method in descriptor.declared_instance_methods() {
            let filtering_attributes = method.filtering_attributes().and_then(join_field_names);
            for registration in method.step_registrations() {
                let mut step = self.build_step(type_name, &short_name, registration)?;
                step.filtering_attributes = filtering_attributes.clone();
                for image in images_for(method, payload_entity, &registration.message_name) {
                    step.add_image(image);
                }
                handler.add_step(step);
            }
        }

        Ok(handler)
    }

    fn build_step(
        &self,
        type_name: &str,
        short_name: &str,
        registration: &StepRegistration,
    ) -> ExtractResult<Step> {
        let message = registration.message_name.as_str();
        let entity = registration.entity_name.to_lowercase();

        let message_id =
            self.catalog
                .message_id(message)
                .ok_or_else(|| ExtractError::UnknownMessage {
                    type_name: type_name.to_string(),
                    message: message.to_string(),
                })?;
        let filter_id = self.catalog.filter_id(message_id, &entity).ok_or_else(|| {
            ExtractError::UnregisteredEntity {
                type_name: type_name.to_string(),
                message: message.to_string(),
                entity: registration.entity_name.clone(),
            }
        })?;

        let mut step = Step::new(
            naming::step_name(short_name, message, Some(&entity), None),
            message_id,
        );
        step.message_entity_filter_id = filter_id;
        step.stage = registration.stage;
        step.mode = registration.mode;
        step.rank = registration.rank;
        step.deployment = StepDeployment::ServerOnly;
        step.enabled = registration.enabled;
        step.delete_async_operation_if_successful =
            registration.delete_async_operation_if_successful;
        step.unsecure_configuration = registration
            .unsecure_config
            .as_deref()
            .and_then(|key| resolve_unsecure_config(self.unsecure_config, key));
        Ok(step)
    }
}

fn is_registration_candidate(descriptor: &TypeDescriptor) -> bool {
    descriptor.is_class && !descriptor.is_abstract && is_candidate_name(descriptor.simple_name())
}

fn images_for(method: &MethodDescriptor, payload_entity: &str, message: &str) -> Vec<Image> {
    let mut images = Vec::new();
    for parameter in method
        .parameters
        .iter()
        .filter(|parameter| parameter.type_name == payload_entity)
    {
        let Some(ParameterAttribute::ImageParameters { attributes }) = parameter.attributes.first()
        else {
            continue;
        };
        let mut image = match parameter.name.as_str() {
            PRE_IMAGE_PARAMETER => Image::pre_image(),
            POST_IMAGE_PARAMETER => Image::post_image(),
            _ => continue,
        };
        image.attributes = join_field_names(attributes);
        image.message_property_name = naming::message_property_name(message).map(str::to_string);
        images.push(image);
    }
    images
}
