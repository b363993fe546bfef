//! SQLite-backed registry store.
//!
//! # Responsibility
//! - Persist assemblies, handlers, steps, images and service endpoints with
//!   their registry codes.
//! - Publish the message and filter catalogs.
//!
//! # Invariants
//! - Ids are stored as hyphenated UUID text; nil ids are stored as `NULL`.
//! - Read paths reject unknown codes and malformed ids instead of masking them.
//! - Foreign keys are enforced; deleting a parent that still owns rows fails.
//! - `create` always assigns a fresh id; any id already on the record is ignored.

use crate::catalog::{Message, MessageFilter};
use crate::model::assembly::Assembly;
use crate::model::handler::Handler;
use crate::model::image::Image;
use crate::model::kinds::{
    EndpointConnectionMode, EndpointContract, EndpointUserClaim, HandlerKind, ImageKind,
    InvocationSource, IsolationMode, Isolatable, RecordId, SdkVersion, SourceType,
    StepDeployment, StepMode, StepStage,
};
use crate::model::service_endpoint::ServiceEndpoint;
use crate::model::step::Step;
use crate::registry::{
    EntityKind, FoundRecord, Predicate, Record, RegistryError, RegistryResult, RemoteRegistry,
};
use log::debug;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const ASSEMBLY_COLUMNS: &str = "id, name, version, culture, public_key_token, isolation_mode,
    source_type, sdk_version, description";
const HANDLER_COLUMNS: &str = "id, assembly_id, type_name, kind, isolatable, display_name,
    friendly_name, description, workflow_group_name";
const STEP_COLUMNS: &str = "id, handler_id, assembly_id, name, message_id,
    message_entity_filter_id, stage, mode, rank, deployment, filtering_attributes,
    unsecure_configuration, secure_configuration_id, impersonating_user_id, invocation_source,
    description, delete_async_operation_if_successful, enabled, service_endpoint_id";
const IMAGE_COLUMNS: &str = "id, step_id, handler_id, assembly_id, name, kind, attributes,
    related_attribute, entity_alias, message_property_name";
const ENDPOINT_COLUMNS: &str = "id, name, description, solution_namespace, path, contract,
    user_claim, connection_mode";

/// SQLite-backed registry.
pub struct SqliteRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistry<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Adds a message to the catalog.
    pub fn insert_message(&self, name: &str, is_private: bool) -> RegistryResult<RecordId> {
        if name.trim().is_empty() {
            return Err(RegistryError::MissingArgument("message name"));
        }
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO messages (id, name, is_private) VALUES (?1, ?2, ?3);",
            params![id.to_string(), name, bool_to_int(is_private)],
        )?;
        Ok(id)
    }

    /// Adds a message filter to the catalog. The entity names are lower-cased.
    pub fn insert_filter(
        &self,
        message_id: RecordId,
        primary_entity_name: &str,
        secondary_entity_name: Option<&str>,
        custom_steps_allowed: bool,
    ) -> RegistryResult<RecordId> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO message_filters (
                id,
                message_id,
                primary_entity_name,
                secondary_entity_name,
                is_custom_processing_step_allowed
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                message_id.to_string(),
                primary_entity_name.to_lowercase(),
                secondary_entity_name.map(str::to_lowercase),
                bool_to_int(custom_steps_allowed),
            ],
        )?;
        Ok(id)
    }

    /// Stored payload of an assembly, if the assembly exists.
    pub fn assembly_content(&self, id: RecordId) -> RegistryResult<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content FROM assemblies WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    /// Number of rows stored for a record kind.
    pub fn count(&self, kind: EntityKind) -> RegistryResult<usize> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", table_name(kind)),
            [],
            |row| row.get::<_, i64>(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RegistryError::InvalidData(format!("negative row count `{count}`")))
    }

    fn create_assembly(&self, id: RecordId, assembly: &Assembly, content: &[u8]) -> RegistryResult<()> {
        self.conn.execute(
            "INSERT INTO assemblies (
                id,
                name,
                version,
                culture,
                public_key_token,
                isolation_mode,
                source_type,
                sdk_version,
                description,
                content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                id.to_string(),
                assembly.name(),
                assembly.version.as_str(),
                assembly.culture.as_str(),
                assembly.public_key_token.as_deref(),
                isolation_mode_to_db(assembly.isolation_mode),
                source_type_to_db(assembly.source_type),
                assembly.sdk_version.map(|version| version.to_string()),
                assembly.description.as_deref(),
                content,
            ],
        )?;
        Ok(())
    }

    fn create_handler(&self, id: RecordId, handler: &Handler) -> RegistryResult<()> {
        let assembly_id = required_parent(handler.assembly_id(), "handler assembly id")?;
        self.conn.execute(
            "INSERT INTO handlers (
                id,
                assembly_id,
                type_name,
                kind,
                isolatable,
                display_name,
                friendly_name,
                description,
                workflow_group_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id.to_string(),
                assembly_id.to_string(),
                handler.type_name.as_str(),
                handler_kind_to_db(handler.kind),
                isolatable_to_db(handler.isolatable),
                handler.display_name.as_deref(),
                handler.friendly_name.as_deref(),
                handler.description.as_deref(),
                handler.workflow_group_name.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn create_step(&self, id: RecordId, step: &Step) -> RegistryResult<()> {
        let handler_id = required_parent(step.handler_id(), "step handler id")?;
        let assembly_id = required_parent(step.assembly_id(), "step assembly id")?;
        self.conn.execute(
            "INSERT INTO steps (
                id,
                handler_id,
                assembly_id,
                name,
                message_id,
                message_entity_filter_id,
                stage,
                mode,
                rank,
                deployment,
                filtering_attributes,
                unsecure_configuration,
                secure_configuration_id,
                impersonating_user_id,
                invocation_source,
                description,
                delete_async_operation_if_successful,
                enabled,
                service_endpoint_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19);",
            params![
                id.to_string(),
                handler_id.to_string(),
                assembly_id.to_string(),
                step.name.as_str(),
                step.message_id.to_string(),
                optional_id_to_db(step.message_entity_filter_id),
                stage_to_db(step.stage),
                mode_to_db(step.mode),
                step.rank,
                deployment_to_db(step.deployment),
                step.filtering_attributes.as_deref(),
                step.unsecure_configuration.as_deref(),
                optional_id_to_db(step.secure_configuration_id),
                optional_id_to_db(step.impersonating_user_id),
                step.invocation_source.map(invocation_source_to_db),
                step.description.as_deref(),
                bool_to_int(step.delete_async_operation_if_successful),
                bool_to_int(step.enabled),
                optional_id_to_db(step.service_endpoint_id),
            ],
        )?;
        Ok(())
    }

    fn create_image(&self, id: RecordId, image: &Image) -> RegistryResult<()> {
        let step_id = required_parent(image.step_id(), "image step id")?;
        let handler_id = required_parent(image.handler_id(), "image handler id")?;
        let assembly_id = required_parent(image.assembly_id(), "image assembly id")?;
        self.conn.execute(
            "INSERT INTO images (
                id,
                step_id,
                handler_id,
                assembly_id,
                name,
                kind,
                attributes,
                related_attribute,
                entity_alias,
                message_property_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                id.to_string(),
                step_id.to_string(),
                handler_id.to_string(),
                assembly_id.to_string(),
                image.name.as_str(),
                image_kind_to_db(image.kind),
                image.attributes.as_deref(),
                image.related_attribute.as_deref(),
                image.entity_alias.as_str(),
                image.message_property_name.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn create_service_endpoint(&self, id: RecordId, endpoint: &ServiceEndpoint) -> RegistryResult<()> {
        if endpoint.name.trim().is_empty() {
            return Err(RegistryError::MissingArgument("service endpoint name"));
        }
        if endpoint.solution_namespace.trim().is_empty() {
            return Err(RegistryError::MissingArgument("service endpoint namespace"));
        }
        self.conn.execute(
            "INSERT INTO service_endpoints (
                id,
                name,
                description,
                solution_namespace,
                path,
                contract,
                user_claim,
                connection_mode
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                endpoint.name.as_str(),
                endpoint.description.as_deref(),
                endpoint.solution_namespace.as_str(),
                endpoint.path.as_deref(),
                contract_to_db(endpoint.contract),
                user_claim_to_db(endpoint.user_claim),
                connection_mode_to_db(endpoint.connection_mode),
            ],
        )?;
        Ok(())
    }

    fn update_assembly(
        &self,
        assembly: &Assembly,
        content: &[u8],
        activities: &[Handler],
    ) -> RegistryResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE assemblies
             SET
                name = ?1,
                version = ?2,
                culture = ?3,
                public_key_token = ?4,
                isolation_mode = ?5,
                source_type = ?6,
                sdk_version = ?7,
                description = ?8,
                content = ?9
             WHERE id = ?10;",
            params![
                assembly.name(),
                assembly.version.as_str(),
                assembly.culture.as_str(),
                assembly.public_key_token.as_deref(),
                isolation_mode_to_db(assembly.isolation_mode),
                source_type_to_db(assembly.source_type),
                assembly.sdk_version.map(|version| version.to_string()),
                assembly.description.as_deref(),
                content,
                assembly.id().to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound {
                kind: EntityKind::Assembly,
                id: assembly.id(),
            });
        }

        for activity in activities {
            tx.execute(
                "UPDATE handlers SET workflow_group_name = ?1 WHERE id = ?2 AND assembly_id = ?3;",
                params![
                    activity.workflow_group_name.as_deref(),
                    activity.id().to_string(),
                    assembly.id().to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_handler(&self, handler: &Handler) -> RegistryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE handlers
             SET
                type_name = ?1,
                kind = ?2,
                isolatable = ?3,
                display_name = ?4,
                friendly_name = ?5,
                description = ?6,
                workflow_group_name = ?7
             WHERE id = ?8;",
            params![
                handler.type_name.as_str(),
                handler_kind_to_db(handler.kind),
                isolatable_to_db(handler.isolatable),
                handler.display_name.as_deref(),
                handler.friendly_name.as_deref(),
                handler.description.as_deref(),
                handler.workflow_group_name.as_deref(),
                handler.id().to_string(),
            ],
        )?)
    }

    fn update_step(&self, step: &Step) -> RegistryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE steps
             SET
                name = ?1,
                message_id = ?2,
                message_entity_filter_id = ?3,
                stage = ?4,
                mode = ?5,
                rank = ?6,
                deployment = ?7,
                filtering_attributes = ?8,
                unsecure_configuration = ?9,
                secure_configuration_id = ?10,
                impersonating_user_id = ?11,
                invocation_source = ?12,
                description = ?13,
                delete_async_operation_if_successful = ?14,
                service_endpoint_id = ?15
             WHERE id = ?16;",
            params![
                step.name.as_str(),
                step.message_id.to_string(),
                optional_id_to_db(step.message_entity_filter_id),
                stage_to_db(step.stage),
                mode_to_db(step.mode),
                step.rank,
                deployment_to_db(step.deployment),
                step.filtering_attributes.as_deref(),
                step.unsecure_configuration.as_deref(),
                optional_id_to_db(step.secure_configuration_id),
                optional_id_to_db(step.impersonating_user_id),
                step.invocation_source.map(invocation_source_to_db),
                step.description.as_deref(),
                bool_to_int(step.delete_async_operation_if_successful),
                optional_id_to_db(step.service_endpoint_id),
                step.id().to_string(),
            ],
        )?)
    }

    fn update_image(&self, image: &Image) -> RegistryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE images
             SET
                name = ?1,
                kind = ?2,
                attributes = ?3,
                related_attribute = ?4,
                entity_alias = ?5,
                message_property_name = ?6
             WHERE id = ?7;",
            params![
                image.name.as_str(),
                image_kind_to_db(image.kind),
                image.attributes.as_deref(),
                image.related_attribute.as_deref(),
                image.entity_alias.as_str(),
                image.message_property_name.as_deref(),
                image.id().to_string(),
            ],
        )?)
    }

    fn update_service_endpoint(&self, endpoint: &ServiceEndpoint) -> RegistryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE service_endpoints
             SET
                name = ?1,
                description = ?2,
                solution_namespace = ?3,
                path = ?4,
                contract = ?5,
                user_claim = ?6,
                connection_mode = ?7
             WHERE id = ?8;",
            params![
                endpoint.name.as_str(),
                endpoint.description.as_deref(),
                endpoint.solution_namespace.as_str(),
                endpoint.path.as_deref(),
                contract_to_db(endpoint.contract),
                user_claim_to_db(endpoint.user_claim),
                connection_mode_to_db(endpoint.connection_mode),
                endpoint.id().to_string(),
            ],
        )?)
    }

    fn query_records(
        &self,
        sql: &str,
        values: Vec<String>,
        parse: fn(&Row<'_>) -> RegistryResult<FoundRecord>,
    ) -> RegistryResult<Vec<FoundRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse(row)?);
        }
        Ok(records)
    }

    fn query_id_in(
        &self,
        columns: &str,
        table: &str,
        column: &str,
        ids: &[RecordId],
        parse: fn(&Row<'_>) -> RegistryResult<FoundRecord>,
    ) -> RegistryResult<Vec<FoundRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.query_records(
            &format!(
                "SELECT {columns} FROM {table} WHERE {column} IN ({}) ORDER BY rowid;",
                placeholders(ids.len())
            ),
            ids.iter().map(Uuid::to_string).collect(),
            parse,
        )
    }
}

impl RemoteRegistry for SqliteRegistry<'_> {
    fn find(&self, kind: EntityKind, predicate: &Predicate) -> RegistryResult<Vec<FoundRecord>> {
        let (columns, name_column, parent_column, parse): (
            &str,
            &str,
            Option<&str>,
            fn(&Row<'_>) -> RegistryResult<FoundRecord>,
        ) = match kind {
            EntityKind::Assembly => (ASSEMBLY_COLUMNS, "name", None, parse_assembly_row),
            EntityKind::Handler => (
                HANDLER_COLUMNS,
                "type_name",
                Some("assembly_id"),
                parse_handler_row,
            ),
            EntityKind::Step => (STEP_COLUMNS, "name", Some("handler_id"), parse_step_row),
            EntityKind::Image => (IMAGE_COLUMNS, "name", Some("step_id"), parse_image_row),
            EntityKind::ServiceEndpoint => {
                (ENDPOINT_COLUMNS, "name", None, parse_service_endpoint_row)
            }
        };
        let table = table_name(kind);

        let records = match predicate {
            Predicate::NameEquals(name) => self.query_records(
                &format!("SELECT {columns} FROM {table} WHERE {name_column} = ? ORDER BY rowid;"),
                vec![name.clone()],
                parse,
            )?,
            Predicate::ParentIn(parent_ids) => {
                let parent_column = parent_column.ok_or_else(|| {
                    RegistryError::InvalidData(format!("{kind} records have no parent"))
                })?;
                self.query_id_in(columns, table, parent_column, parent_ids, parse)?
            }
            Predicate::EndpointIn(endpoint_ids) => {
                if kind != EntityKind::Step {
                    return Err(RegistryError::InvalidData(format!(
                        "{kind} records do not reference service endpoints"
                    )));
                }
                self.query_id_in(columns, table, "service_endpoint_id", endpoint_ids, parse)?
            }
        };

        debug!(
            "event=registry_find module=registry status=ok kind={kind} count={}",
            records.len()
        );
        Ok(records)
    }

    fn create(&self, record: Record<'_>) -> RegistryResult<RecordId> {
        let id = Uuid::new_v4();
        match record {
            Record::Assembly {
                assembly, content, ..
            } => {
                if assembly.name().trim().is_empty() {
                    return Err(RegistryError::MissingArgument("assembly name"));
                }
                self.create_assembly(id, assembly, content)?;
            }
            Record::Handler(handler) => self.create_handler(id, handler)?,
            Record::Step(step) => self.create_step(id, step)?,
            Record::Image(image) => self.create_image(id, image)?,
            Record::ServiceEndpoint(endpoint) => self.create_service_endpoint(id, endpoint)?,
        }
        debug!(
            "event=registry_create module=registry status=ok kind={} id={id}",
            record.kind()
        );
        Ok(id)
    }

    fn update(&self, record: Record<'_>) -> RegistryResult<()> {
        let changed = match record {
            Record::Assembly {
                assembly,
                content,
                activities,
            } => {
                self.update_assembly(assembly, content, activities)?;
                1
            }
            Record::Handler(handler) => self.update_handler(handler)?,
            Record::Step(step) => self.update_step(step)?,
            Record::Image(image) => self.update_image(image)?,
            Record::ServiceEndpoint(endpoint) => self.update_service_endpoint(endpoint)?,
        };
        if changed == 0 {
            return Err(RegistryError::NotFound {
                kind: record.kind(),
                id: record.id(),
            });
        }
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: RecordId) -> RegistryResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", table_name(kind)),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound { kind, id });
        }
        Ok(())
    }

    fn set_state(&self, step_id: RecordId, enabled: bool) -> RegistryResult<()> {
        let changed = self.conn.execute(
            "UPDATE steps SET enabled = ?1 WHERE id = ?2;",
            params![bool_to_int(enabled), step_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound {
                kind: EntityKind::Step,
                id: step_id,
            });
        }
        Ok(())
    }

    fn list_public_messages(&self) -> RegistryResult<Vec<Message>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM messages WHERE is_private = 0 ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            messages.push(Message {
                id: parse_id(row, "id", "messages")?,
                name: row.get("name")?,
            });
        }
        Ok(messages)
    }

    fn list_filters(&self, message_ids: &[RecordId]) -> RegistryResult<Vec<MessageFilter>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, message_id, primary_entity_name, secondary_entity_name
             FROM message_filters
             WHERE is_custom_processing_step_allowed = 1
               AND message_id IN ({})
             ORDER BY rowid;",
            placeholders(message_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(message_ids.iter().map(Uuid::to_string)))?;
        let mut filters = Vec::new();
        while let Some(row) = rows.next()? {
            filters.push(MessageFilter {
                id: parse_id(row, "id", "message_filters")?,
                message_id: parse_id(row, "message_id", "message_filters")?,
                primary_entity_name: row.get("primary_entity_name")?,
                secondary_entity_name: row.get("secondary_entity_name")?,
            });
        }
        Ok(filters)
    }
}

fn parse_assembly_row(row: &Row<'_>) -> RegistryResult<FoundRecord> {
    let name: String = row.get("name")?;
    let version: String = row.get("version")?;
    let mut assembly = Assembly::new(name, version);
    assembly.culture = row.get("culture")?;
    assembly.public_key_token = row.get("public_key_token")?;
    assembly.isolation_mode = decode(row, "isolation_mode", "assemblies", parse_isolation_mode)?;
    assembly.source_type = decode(row, "source_type", "assemblies", parse_source_type)?;
    assembly.sdk_version = match row.get::<_, Option<String>>("sdk_version")? {
        Some(value) => Some(SdkVersion::parse(&value).ok_or_else(|| {
            RegistryError::InvalidData(format!(
                "invalid sdk version `{value}` in assemblies.sdk_version"
            ))
        })?),
        None => None,
    };
    assembly.description = row.get("description")?;
    assembly.assign_id(parse_id(row, "id", "assemblies")?);
    Ok(FoundRecord::Assembly(assembly))
}

fn parse_handler_row(row: &Row<'_>) -> RegistryResult<FoundRecord> {
    let type_name: String = row.get("type_name")?;
    let kind = decode(row, "kind", "handlers", parse_handler_kind)?;
    let mut handler = Handler::new(type_name, kind);
    handler.isolatable = decode(row, "isolatable", "handlers", parse_isolatable)?;
    handler.display_name = row.get("display_name")?;
    handler.friendly_name = row.get("friendly_name")?;
    handler.description = row.get("description")?;
    handler.workflow_group_name = row.get("workflow_group_name")?;
    handler.assign_id(parse_id(row, "id", "handlers")?);
    handler.set_assembly_id(parse_id(row, "assembly_id", "handlers")?);
    Ok(FoundRecord::Handler(handler))
}

fn parse_step_row(row: &Row<'_>) -> RegistryResult<FoundRecord> {
    let name: String = row.get("name")?;
    let mut step = Step::new(name, parse_id(row, "message_id", "steps")?);
    step.message_entity_filter_id = parse_optional_id(row, "message_entity_filter_id", "steps")?;
    step.stage = decode(row, "stage", "steps", parse_stage)?;
    step.mode = decode(row, "mode", "steps", parse_mode)?;
    step.rank = row.get("rank")?;
    step.deployment = decode(row, "deployment", "steps", parse_deployment)?;
    step.filtering_attributes = row.get("filtering_attributes")?;
    step.unsecure_configuration = row.get("unsecure_configuration")?;
    step.secure_configuration_id = parse_optional_id(row, "secure_configuration_id", "steps")?;
    step.impersonating_user_id = parse_optional_id(row, "impersonating_user_id", "steps")?;
    step.invocation_source = match row.get::<_, Option<i64>>("invocation_source")? {
        Some(code) => Some(parse_invocation_source(code).ok_or_else(|| {
            RegistryError::InvalidData(format!(
                "invalid code `{code}` in steps.invocation_source"
            ))
        })?),
        None => None,
    };
    step.description = row.get("description")?;
    step.delete_async_operation_if_successful =
        parse_bool(row, "delete_async_operation_if_successful", "steps")?;
    step.enabled = parse_bool(row, "enabled", "steps")?;
    step.service_endpoint_id = parse_optional_id(row, "service_endpoint_id", "steps")?;
    step.assign_id(parse_id(row, "id", "steps")?);
    step.set_handler_id(parse_id(row, "handler_id", "steps")?);
    step.set_assembly_id(parse_id(row, "assembly_id", "steps")?);
    Ok(FoundRecord::Step(step))
}

fn parse_image_row(row: &Row<'_>) -> RegistryResult<FoundRecord> {
    let name: String = row.get("name")?;
    let kind = decode(row, "kind", "images", parse_image_kind)?;
    let mut image = Image::new(name, kind);
    image.attributes = row.get("attributes")?;
    image.related_attribute = row.get("related_attribute")?;
    image.entity_alias = row.get("entity_alias")?;
    image.message_property_name = row.get("message_property_name")?;
    image.assign_id(parse_id(row, "id", "images")?);
    image.set_step_id(parse_id(row, "step_id", "images")?);
    image.set_handler_id(parse_id(row, "handler_id", "images")?);
    image.set_assembly_id(parse_id(row, "assembly_id", "images")?);
    Ok(FoundRecord::Image(image))
}

fn parse_service_endpoint_row(row: &Row<'_>) -> RegistryResult<FoundRecord> {
    let name: String = row.get("name")?;
    let solution_namespace: String = row.get("solution_namespace")?;
    let contract = decode(row, "contract", "service_endpoints", parse_contract)?;
    let mut endpoint = ServiceEndpoint::new(name, solution_namespace, contract);
    endpoint.description = row.get("description")?;
    endpoint.path = row.get("path")?;
    endpoint.user_claim = decode(row, "user_claim", "service_endpoints", parse_user_claim)?;
    endpoint.connection_mode =
        decode(row, "connection_mode", "service_endpoints", parse_connection_mode)?;
    endpoint.assign_id(parse_id(row, "id", "service_endpoints")?);
    Ok(FoundRecord::ServiceEndpoint(endpoint))
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Assembly => "assemblies",
        EntityKind::Handler => "handlers",
        EntityKind::Step => "steps",
        EntityKind::Image => "images",
        EntityKind::ServiceEndpoint => "service_endpoints",
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn required_parent(id: RecordId, name: &'static str) -> RegistryResult<RecordId> {
    if id.is_nil() {
        return Err(RegistryError::MissingArgument(name));
    }
    Ok(id)
}

fn optional_id_to_db(id: RecordId) -> Option<String> {
    if id.is_nil() {
        None
    } else {
        Some(id.to_string())
    }
}

fn parse_id(row: &Row<'_>, column: &str, table: &str) -> RegistryResult<RecordId> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| {
        RegistryError::InvalidData(format!("invalid uuid value `{text}` in {table}.{column}"))
    })
}

fn parse_optional_id(row: &Row<'_>, column: &str, table: &str) -> RegistryResult<RecordId> {
    match row.get::<_, Option<String>>(column)? {
        Some(_) => parse_id(row, column, table),
        None => Ok(Uuid::nil()),
    }
}

fn parse_bool(row: &Row<'_>, column: &str, table: &str) -> RegistryResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RegistryError::InvalidData(format!(
            "invalid boolean value `{other}` in {table}.{column}"
        ))),
    }
}

fn decode<T>(
    row: &Row<'_>,
    column: &str,
    table: &str,
    parse: fn(i64) -> Option<T>,
) -> RegistryResult<T> {
    let code: i64 = row.get(column)?;
    parse(code).ok_or_else(|| {
        RegistryError::InvalidData(format!("invalid code `{code}` in {table}.{column}"))
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn handler_kind_to_db(kind: HandlerKind) -> i64 {
    match kind {
        HandlerKind::ExecutionHandler => 0,
        HandlerKind::WorkflowActivity => 1,
    }
}

fn parse_handler_kind(code: i64) -> Option<HandlerKind> {
    match code {
        0 => Some(HandlerKind::ExecutionHandler),
        1 => Some(HandlerKind::WorkflowActivity),
        _ => None,
    }
}

fn isolatable_to_db(value: Isolatable) -> i64 {
    match value {
        Isolatable::No => 0,
        Isolatable::Yes => 1,
        Isolatable::Unknown => 2,
    }
}

fn parse_isolatable(code: i64) -> Option<Isolatable> {
    match code {
        0 => Some(Isolatable::No),
        1 => Some(Isolatable::Yes),
        2 => Some(Isolatable::Unknown),
        _ => None,
    }
}

fn stage_to_db(stage: StepStage) -> i64 {
    match stage {
        StepStage::PreValidation => 10,
        StepStage::PreOperation => 20,
        StepStage::PostOperation => 40,
        StepStage::PostOperationDeprecated => 50,
    }
}

fn parse_stage(code: i64) -> Option<StepStage> {
    match code {
        10 => Some(StepStage::PreValidation),
        20 => Some(StepStage::PreOperation),
        40 => Some(StepStage::PostOperation),
        50 => Some(StepStage::PostOperationDeprecated),
        _ => None,
    }
}

fn mode_to_db(mode: StepMode) -> i64 {
    match mode {
        StepMode::Synchronous => 0,
        StepMode::Asynchronous => 1,
    }
}

fn parse_mode(code: i64) -> Option<StepMode> {
    match code {
        0 => Some(StepMode::Synchronous),
        1 => Some(StepMode::Asynchronous),
        _ => None,
    }
}

fn deployment_to_db(deployment: StepDeployment) -> i64 {
    match deployment {
        StepDeployment::ServerOnly => 0,
        StepDeployment::OfflineOnly => 1,
        StepDeployment::Both => 2,
    }
}

fn parse_deployment(code: i64) -> Option<StepDeployment> {
    match code {
        0 => Some(StepDeployment::ServerOnly),
        1 => Some(StepDeployment::OfflineOnly),
        2 => Some(StepDeployment::Both),
        _ => None,
    }
}

fn invocation_source_to_db(source: InvocationSource) -> i64 {
    match source {
        InvocationSource::Parent => 0,
        InvocationSource::Child => 1,
    }
}

fn parse_invocation_source(code: i64) -> Option<InvocationSource> {
    match code {
        0 => Some(InvocationSource::Parent),
        1 => Some(InvocationSource::Child),
        _ => None,
    }
}

fn image_kind_to_db(kind: ImageKind) -> i64 {
    match kind {
        ImageKind::PreImage => 0,
        ImageKind::PostImage => 1,
        ImageKind::Both => 2,
    }
}

fn parse_image_kind(code: i64) -> Option<ImageKind> {
    match code {
        0 => Some(ImageKind::PreImage),
        1 => Some(ImageKind::PostImage),
        2 => Some(ImageKind::Both),
        _ => None,
    }
}

fn isolation_mode_to_db(mode: IsolationMode) -> i64 {
    match mode {
        IsolationMode::None => 1,
        IsolationMode::Sandbox => 2,
    }
}

fn parse_isolation_mode(code: i64) -> Option<IsolationMode> {
    match code {
        1 => Some(IsolationMode::None),
        2 => Some(IsolationMode::Sandbox),
        _ => None,
    }
}

fn source_type_to_db(source: SourceType) -> i64 {
    match source {
        SourceType::Database => 0,
        SourceType::Disk => 1,
        SourceType::Normal => 2,
    }
}

fn parse_source_type(code: i64) -> Option<SourceType> {
    match code {
        0 => Some(SourceType::Database),
        1 => Some(SourceType::Disk),
        2 => Some(SourceType::Normal),
        _ => None,
    }
}

fn contract_to_db(contract: EndpointContract) -> i64 {
    match contract {
        EndpointContract::OneWay => 1,
        EndpointContract::Queue => 2,
        EndpointContract::Rest => 3,
        EndpointContract::TwoWay => 4,
    }
}

fn parse_contract(code: i64) -> Option<EndpointContract> {
    match code {
        1 => Some(EndpointContract::OneWay),
        2 => Some(EndpointContract::Queue),
        3 => Some(EndpointContract::Rest),
        4 => Some(EndpointContract::TwoWay),
        _ => None,
    }
}

fn user_claim_to_db(claim: EndpointUserClaim) -> i64 {
    match claim {
        EndpointUserClaim::None => 1,
        EndpointUserClaim::UserId => 2,
        EndpointUserClaim::UserInfo => 3,
    }
}

fn parse_user_claim(code: i64) -> Option<EndpointUserClaim> {
    match code {
        1 => Some(EndpointUserClaim::None),
        2 => Some(EndpointUserClaim::UserId),
        3 => Some(EndpointUserClaim::UserInfo),
        _ => None,
    }
}

fn connection_mode_to_db(mode: EndpointConnectionMode) -> i64 {
    match mode {
        EndpointConnectionMode::Normal => 1,
        EndpointConnectionMode::Federated => 2,
    }
}

fn parse_connection_mode(code: i64) -> Option<EndpointConnectionMode> {
    match code {
        1 => Some(EndpointConnectionMode::Normal),
        2 => Some(EndpointConnectionMode::Federated),
        _ => None,
    }
}
