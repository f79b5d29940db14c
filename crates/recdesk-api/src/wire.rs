// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! JSON shapes exchanged with the record API and their conversion into
//! [`Record`] snapshots.

use anyhow::{Context, Result};
use recdesk_app::{BulkOp, Record, RecordId, RecordStatus, ResourceKind, map_from_json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Lists come back either bare or wrapped as `{"items": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(alias = "count")]
    pub(crate) updated: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkRequest<'a> {
    pub(crate) ids: &'a [RecordId],
    #[serde(flatten)]
    pub(crate) op: &'a BulkOp,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusPatch {
    pub(crate) status: RecordStatus,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_record_id(self) -> RecordId {
        match self {
            Self::Text(text) => RecordId::new(text),
            Self::Number(number) => RecordId::new(number.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRecord {
    id: WireId,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    properties: Value,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Scalar attributes surfaced in `Record::fields`, in display order.
fn field_keys(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Entities => &["name", "type"],
        ResourceKind::Relationships => &[
            "relationship_type",
            "source_id",
            "source_name",
            "target_id",
            "target_name",
        ],
        ResourceKind::Jobs => &["title", "description", "priority"],
        ResourceKind::Logs => &["log_type", "content"],
        ResourceKind::Protocols => &["name", "title", "version", "content"],
        ResourceKind::History => &[
            "resource",
            "record_id",
            "action",
            "actor",
            "changed_fields",
        ],
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
    let raw = raw?;
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(at) => Some(at),
        Err(error) => {
            tracing::debug!(raw, %error, "ignoring unparseable timestamp");
            None
        }
    }
}

impl WireRecord {
    pub(crate) fn into_record(self, kind: ResourceKind) -> Result<Record> {
        let id = self.id.into_record_id();
        let mut fields = Vec::new();
        for key in field_keys(kind) {
            if let Some(text) = self.rest.get(*key).and_then(scalar_text) {
                fields.push(((*key).to_owned(), text));
            }
        }
        let field = |key: &str| {
            fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        };
        let title = match kind {
            ResourceKind::Entities | ResourceKind::Protocols => field("name"),
            ResourceKind::Relationships => field("relationship_type"),
            ResourceKind::Jobs => field("title"),
            ResourceKind::Logs => field("content").lines().next().unwrap_or_default().to_owned(),
            ResourceKind::History => format!(
                "{} {}/{}",
                field("action"),
                field("resource"),
                field("record_id")
            ),
        };

        let structured = if kind == ResourceKind::Relationships {
            self.properties
        } else {
            self.metadata
        };
        let metadata = map_from_json(structured)
            .with_context(|| format!("decode metadata of {} {id}", kind.noun()))?;

        let stamp = self
            .updated_at
            .as_deref()
            .or(self.created_at.as_deref())
            .or_else(|| self.rest.get("at").and_then(Value::as_str));

        let mut record = Record::new(kind, id, title);
        record.fields = fields;
        record.status = self
            .status
            .as_deref()
            .and_then(RecordStatus::parse)
            .unwrap_or_default();
        record.tags = self.tags.unwrap_or_default().into_iter().collect();
        record.scopes = self.scopes.unwrap_or_default().into_iter().collect();
        record.metadata = metadata;
        record.updated_at = parse_timestamp(stamp);
        Ok(record)
    }
}
