// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Per-resource knowledge: which fields a form has, how a row reads in the
//! list, and how a filled form becomes a typed payload. The engine is
//! generic over this trait.

use anyhow::{Result, bail};

use crate::codec::serialize_metadata;
use crate::forms::{
    EntityInput, FieldKind, FieldSpec, FormPayload, FormState, JobInput, LogInput, ProtocolInput,
    RelationshipInput, Syntax, json_properties_text,
};
use crate::ids::RecordId;
use crate::model::{Record, RecordStatus, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub create: bool,
    pub edit: bool,
    pub archive: bool,
    pub bulk_tags: bool,
    pub bulk_scopes: bool,
    pub scopes: bool,
    pub revert: bool,
    /// Add goes through the source/target/type picker instead of a form.
    pub relate: bool,
}

pub trait Resource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn capabilities(&self) -> Capabilities;

    fn form_fields(&self) -> &'static [FieldSpec];

    fn row_label(&self, record: &Record) -> String;

    /// Text the local filter and suggestions match against.
    fn search_text<'a>(&self, record: &'a Record) -> &'a str {
        &record.title
    }

    fn detail_lines(&self, record: &Record) -> Vec<(String, String)> {
        let mut lines: Vec<(String, String)> = record
            .fields
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.replace('_', " "), value.clone()))
            .collect();
        lines.push(("status".to_owned(), record.status.as_str().to_owned()));
        if !record.tags.is_empty() {
            lines.push(("tags".to_owned(), join_set(&record.tags, "")));
        }
        if !record.scopes.is_empty() {
            lines.push(("scopes".to_owned(), join_set(&record.scopes, "#")));
        }
        if let Some(updated) = record.updated_at {
            lines.push(("updated".to_owned(), updated.date().to_string()));
        }
        lines
    }

    /// Multi-line block shown under the detail fields.
    fn detail_body(&self, record: &Record) -> String {
        serialize_metadata(&record.metadata)
    }

    fn blank_form(&self) -> FormState {
        FormState::new(self.form_fields())
    }

    fn seed_form(&self, record: &Record) -> FormState {
        FormState::seeded(self.form_fields(), record)
    }

    fn build_payload(&self, form: &FormState, editing: Option<&Record>) -> Result<FormPayload>;
}

fn join_set(values: &std::collections::BTreeSet<String>, prefix: &str) -> String {
    values
        .iter()
        .map(|value| format!("{prefix}{value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn archived_marker(record: &Record) -> &'static str {
    match record.status {
        RecordStatus::Active => "",
        RecordStatus::Archived => "  (archived)",
    }
}

pub struct Entities;
pub struct Relationships;
pub struct Jobs;
pub struct Logs;
pub struct Protocols;
pub struct History;

pub fn resource_for(kind: ResourceKind) -> &'static dyn Resource {
    match kind {
        ResourceKind::Entities => &Entities,
        ResourceKind::Relationships => &Relationships,
        ResourceKind::Jobs => &Jobs,
        ResourceKind::Logs => &Logs,
        ResourceKind::Protocols => &Protocols,
        ResourceKind::History => &History,
    }
}

const ENTITY_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", "Name", true),
    FieldSpec::text("type", "Type", true),
    FieldSpec::of("status", "Status", FieldKind::Status),
    FieldSpec::of("tags", "Tags", FieldKind::Tags),
    FieldSpec::of("scopes", "Scopes", FieldKind::Scopes),
    FieldSpec::of("metadata", "Metadata", FieldKind::Structured(Syntax::Metadata)),
];

impl Resource for Entities {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Entities
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create: true,
            edit: true,
            archive: true,
            bulk_tags: true,
            bulk_scopes: true,
            scopes: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        ENTITY_FIELDS
    }

    fn row_label(&self, record: &Record) -> String {
        let kind = record.field("type").unwrap_or("?");
        let mut label = format!("{}  [{kind}]", record.title);
        if !record.tags.is_empty() {
            label.push_str(&format!("  {}", join_set(&record.tags, "")));
        }
        label.push_str(archived_marker(record));
        label
    }

    fn build_payload(&self, form: &FormState, _editing: Option<&Record>) -> Result<FormPayload> {
        let input = EntityInput {
            name: form.required_text("name")?,
            entity_type: form.required_text("type")?,
            status: form.status(),
            tags: form.set_values("tags"),
            scopes: form.set_values("scopes"),
            metadata: form.metadata("metadata")?,
        };
        input.validate()?;
        Ok(FormPayload::Entity(input))
    }
}

const RELATIONSHIP_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("relationship_type", "Type", true),
    FieldSpec::of("status", "Status", FieldKind::Status),
    FieldSpec::of("properties", "Properties", FieldKind::Structured(Syntax::Json)),
];

/// Fields of the last step of the relate flow.
pub const RELATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("relationship_type", "Type", true),
    FieldSpec::of("properties", "Properties", FieldKind::Structured(Syntax::Json)),
];

pub fn relationship_payload(
    source: &Record,
    target: &Record,
    form: &FormState,
) -> Result<FormPayload> {
    let input = RelationshipInput {
        source_id: source.id.clone(),
        target_id: target.id.clone(),
        relationship_type: form.required_text("relationship_type")?,
        status: RecordStatus::Active,
        properties: form.json_properties("properties")?,
    };
    input.validate()?;
    Ok(FormPayload::Relationship(input))
}

impl Resource for Relationships {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Relationships
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create: true,
            edit: true,
            archive: true,
            relate: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        RELATIONSHIP_FIELDS
    }

    fn row_label(&self, record: &Record) -> String {
        let source = record
            .field("source_name")
            .or_else(|| record.field("source_id"))
            .unwrap_or("?");
        let target = record
            .field("target_name")
            .or_else(|| record.field("target_id"))
            .unwrap_or("?");
        format!(
            "{source} -[{}]-> {target}{}",
            record.title,
            archived_marker(record)
        )
    }

    fn detail_body(&self, record: &Record) -> String {
        json_properties_text(&record.metadata)
    }

    fn build_payload(&self, form: &FormState, editing: Option<&Record>) -> Result<FormPayload> {
        let Some(record) = editing else {
            bail!("relationships are created with the relate picker -- press enter on Add");
        };
        let input = RelationshipInput {
            source_id: RecordId::new(record.field("source_id").unwrap_or_default()),
            target_id: RecordId::new(record.field("target_id").unwrap_or_default()),
            relationship_type: form.required_text("relationship_type")?,
            status: form.status(),
            properties: form.json_properties("properties")?,
        };
        input.validate()?;
        Ok(FormPayload::Relationship(input))
    }
}

const JOB_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("title", "Title", true),
    FieldSpec::text("description", "Description", false),
    FieldSpec::of("priority", "Priority", FieldKind::Priority),
    FieldSpec::of("status", "Status", FieldKind::Status),
    FieldSpec::of("tags", "Tags", FieldKind::Tags),
    FieldSpec::of("metadata", "Metadata", FieldKind::Structured(Syntax::Metadata)),
];

impl Resource for Jobs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Jobs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create: true,
            edit: true,
            archive: true,
            bulk_tags: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        JOB_FIELDS
    }

    fn row_label(&self, record: &Record) -> String {
        let priority = record.field("priority").unwrap_or("medium");
        format!("[{priority}] {}{}", record.title, archived_marker(record))
    }

    fn build_payload(&self, form: &FormState, _editing: Option<&Record>) -> Result<FormPayload> {
        let input = JobInput {
            title: form.required_text("title")?,
            description: form.text("description").trim().to_owned(),
            priority: form.priority(),
            status: form.status(),
            tags: form.set_values("tags"),
            metadata: form.metadata("metadata")?,
        };
        input.validate()?;
        Ok(FormPayload::Job(input))
    }
}

const LOG_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("log_type", "Log type", true),
    FieldSpec::text("content", "Content", true),
    FieldSpec::of("status", "Status", FieldKind::Status),
    FieldSpec::of("tags", "Tags", FieldKind::Tags),
    FieldSpec::of("metadata", "Metadata", FieldKind::Structured(Syntax::Metadata)),
];

impl Resource for Logs {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Logs
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create: true,
            edit: true,
            archive: true,
            bulk_tags: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        LOG_FIELDS
    }

    fn row_label(&self, record: &Record) -> String {
        let log_type = record.field("log_type").unwrap_or("note");
        let when = record
            .updated_at
            .map(|at| at.date().to_string())
            .unwrap_or_default();
        format!(
            "{when} {log_type}: {}{}",
            record.title,
            archived_marker(record)
        )
        .trim_start()
        .to_owned()
    }

    fn build_payload(&self, form: &FormState, _editing: Option<&Record>) -> Result<FormPayload> {
        let input = LogInput {
            log_type: form.required_text("log_type")?,
            content: form.required_text("content")?,
            status: form.status(),
            tags: form.set_values("tags"),
            metadata: form.metadata("metadata")?,
        };
        input.validate()?;
        Ok(FormPayload::Log(input))
    }
}

const PROTOCOL_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("name", "Name", true),
    FieldSpec::text("title", "Title", false),
    FieldSpec::text("version", "Version", false),
    FieldSpec::text("content", "Content", true),
    FieldSpec::of("status", "Status", FieldKind::Status),
    FieldSpec::of("tags", "Tags", FieldKind::Tags),
    FieldSpec::of("metadata", "Metadata", FieldKind::Structured(Syntax::Metadata)),
];

impl Resource for Protocols {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Protocols
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create: true,
            edit: true,
            archive: true,
            bulk_tags: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        PROTOCOL_FIELDS
    }

    fn row_label(&self, record: &Record) -> String {
        let version = record
            .field("version")
            .filter(|version| !version.is_empty())
            .map(|version| format!(" v{version}"))
            .unwrap_or_default();
        let title = record
            .field("title")
            .filter(|title| !title.is_empty())
            .map(|title| format!(" - {title}"))
            .unwrap_or_default();
        format!("{}{version}{title}{}", record.title, archived_marker(record))
    }

    fn build_payload(&self, form: &FormState, _editing: Option<&Record>) -> Result<FormPayload> {
        let input = ProtocolInput {
            name: form.required_text("name")?,
            title: form.text("title").trim().to_owned(),
            version: form.text("version").trim().to_owned(),
            content: form.required_text("content")?,
            status: form.status(),
            tags: form.set_values("tags"),
            metadata: form.metadata("metadata")?,
        };
        input.validate()?;
        Ok(FormPayload::Protocol(input))
    }
}

impl Resource for History {
    fn kind(&self) -> ResourceKind {
        ResourceKind::History
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            revert: true,
            ..Capabilities::default()
        }
    }

    fn form_fields(&self) -> &'static [FieldSpec] {
        &[]
    }

    fn row_label(&self, record: &Record) -> String {
        let actor = record.field("actor").unwrap_or("unknown");
        let when = record
            .updated_at
            .map(|at| {
                format!(
                    "{} {:02}:{:02}",
                    at.date(),
                    at.time().hour(),
                    at.time().minute()
                )
            })
            .unwrap_or_default();
        format!("{when} {actor}: {}", record.title)
            .trim_start()
            .to_owned()
    }

    fn build_payload(&self, _form: &FormState, _editing: Option<&Record>) -> Result<FormPayload> {
        bail!("history entries are read-only -- use r to revert instead");
    }
}
