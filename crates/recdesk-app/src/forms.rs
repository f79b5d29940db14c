// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::codec::{MetaMap, map_from_json, map_to_json, parse_metadata, serialize_metadata};
use crate::ids::RecordId;
use crate::keys::Key;
use crate::model::{Priority, Record, RecordStatus, ResourceKind};
use crate::staging::{Normalize, StagedSet};

pub const STATUS_OPTIONS: &[&str] = &["active", "archived"];
pub const PRIORITY_OPTIONS: &[&str] = &["low", "medium", "high", "urgent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Metadata,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Status,
    Priority,
    Tags,
    Scopes,
    Structured(Syntax),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn text(key: &'static str, label: &'static str, required: bool) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Text,
            required,
        }
    }

    pub const fn of(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Choice {
        index: usize,
        options: &'static [&'static str],
    },
    Set(StagedSet),
    Structured(String),
}

impl FieldValue {
    fn blank(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::Status => Self::Choice {
                index: 0,
                options: STATUS_OPTIONS,
            },
            FieldKind::Priority => Self::Choice {
                index: Priority::default().index(),
                options: PRIORITY_OPTIONS,
            },
            FieldKind::Tags => Self::Set(StagedSet::new(Normalize::Tag, BTreeSet::new())),
            FieldKind::Scopes => Self::Set(StagedSet::new(Normalize::Scope, BTreeSet::new())),
            FieldKind::Structured(_) => Self::Structured(String::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Handled,
    OpenEditor(Syntax),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    specs: &'static [FieldSpec],
    values: Vec<FieldValue>,
    focus: usize,
}

impl FormState {
    pub fn new(specs: &'static [FieldSpec]) -> Self {
        Self {
            specs,
            values: specs.iter().map(|spec| FieldValue::blank(spec.kind)).collect(),
            focus: 0,
        }
    }

    /// Seeds every field from a loaded record: scalar fields by key, status
    /// as an enum index, sets as committed values, metadata rendered to text.
    pub fn seeded(specs: &'static [FieldSpec], record: &Record) -> Self {
        let mut form = Self::new(specs);
        for (spec, value) in specs.iter().zip(form.values.iter_mut()) {
            match (spec.kind, value) {
                (FieldKind::Text, FieldValue::Text(text)) => {
                    *text = record.field(spec.key).unwrap_or_default().to_owned();
                }
                (FieldKind::Status, FieldValue::Choice { index, .. }) => {
                    *index = record.status.index();
                }
                (FieldKind::Priority, FieldValue::Choice { index, .. }) => {
                    *index = record
                        .field(spec.key)
                        .and_then(Priority::parse)
                        .unwrap_or_default()
                        .index();
                }
                (FieldKind::Tags, FieldValue::Set(set)) => {
                    set.committed = record.tags.clone();
                }
                (FieldKind::Scopes, FieldValue::Set(set)) => {
                    set.committed = record.scopes.clone();
                }
                (FieldKind::Structured(Syntax::Metadata), FieldValue::Structured(text)) => {
                    *text = serialize_metadata(&record.metadata);
                }
                (FieldKind::Structured(Syntax::Json), FieldValue::Structured(text)) => {
                    *text = json_properties_text(&record.metadata);
                }
                _ => {}
            }
        }
        form
    }

    pub fn specs(&self) -> &'static [FieldSpec] {
        self.specs
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn focused_spec(&self) -> Option<&FieldSpec> {
        self.specs.get(self.focus)
    }

    pub fn focused_set_mut(&mut self) -> Option<&mut StagedSet> {
        match self.values.get_mut(self.focus) {
            Some(FieldValue::Set(set)) => Some(set),
            _ => None,
        }
    }

    pub fn focus_next(&mut self) {
        self.commit_focused_set();
        if !self.specs.is_empty() {
            self.focus = (self.focus + 1) % self.specs.len();
        }
    }

    pub fn focus_prev(&mut self) {
        self.commit_focused_set();
        if !self.specs.is_empty() {
            self.focus = (self.focus + self.specs.len() - 1) % self.specs.len();
        }
    }

    fn commit_focused_set(&mut self) {
        if let Some(set) = self.focused_set_mut() {
            set.commit();
        }
    }

    /// Applies a key to the focused field only.
    pub fn handle_key(&mut self, key: Key) -> FieldOutcome {
        let Some(spec) = self.specs.get(self.focus).copied() else {
            return FieldOutcome::Ignored;
        };
        let Some(value) = self.values.get_mut(self.focus) else {
            return FieldOutcome::Ignored;
        };
        match value {
            FieldValue::Text(text) => match key {
                Key::Backspace => {
                    text.pop();
                    FieldOutcome::Handled
                }
                Key::Ctrl('u') => {
                    text.clear();
                    FieldOutcome::Handled
                }
                other => match other.printable() {
                    Some(ch) => {
                        text.push(ch);
                        FieldOutcome::Handled
                    }
                    None => FieldOutcome::Ignored,
                },
            },
            FieldValue::Choice { index, options } => match key {
                Key::Right | Key::Char(' ') => {
                    *index = (*index + 1) % options.len();
                    FieldOutcome::Handled
                }
                Key::Left => {
                    *index = (*index + options.len() - 1) % options.len();
                    FieldOutcome::Handled
                }
                _ => FieldOutcome::Ignored,
            },
            FieldValue::Set(set) => {
                if set.handle_key(key) {
                    FieldOutcome::Handled
                } else {
                    FieldOutcome::Ignored
                }
            }
            FieldValue::Structured(_) => match (key, spec.kind) {
                (Key::Enter, FieldKind::Structured(syntax)) => FieldOutcome::OpenEditor(syntax),
                _ => FieldOutcome::Ignored,
            },
        }
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.key == key)
    }

    pub fn text(&self, key: &str) -> &str {
        match self.index_of(key).and_then(|index| self.values.get(index)) {
            Some(FieldValue::Text(text) | FieldValue::Structured(text)) => text,
            _ => "",
        }
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        if let Some(index) = self.index_of(key)
            && let Some(FieldValue::Text(text) | FieldValue::Structured(text)) =
                self.values.get_mut(index)
        {
            *text = value.into();
        }
    }

    pub fn structured_at(&self, index: usize) -> Option<&str> {
        match self.values.get(index) {
            Some(FieldValue::Structured(text)) => Some(text),
            _ => None,
        }
    }

    pub fn set_structured_at(&mut self, index: usize, value: String) {
        if let Some(FieldValue::Structured(text)) = self.values.get_mut(index) {
            *text = value;
        }
    }

    pub fn choice(&self, key: &str) -> usize {
        match self.index_of(key).and_then(|index| self.values.get(index)) {
            Some(FieldValue::Choice { index, .. }) => *index,
            _ => 0,
        }
    }

    pub fn status(&self) -> RecordStatus {
        RecordStatus::from_index(self.choice("status"))
    }

    pub fn priority(&self) -> Priority {
        Priority::ALL
            .get(self.choice("priority"))
            .copied()
            .unwrap_or_default()
    }

    /// Committed values plus any staged text, in sorted order.
    pub fn set_values(&self, key: &str) -> Vec<String> {
        match self.index_of(key).and_then(|index| self.values.get(index)) {
            Some(FieldValue::Set(set)) => set.resolved().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Enforces `required` on text fields and returns the trimmed value.
    pub fn required_text(&self, key: &str) -> Result<String> {
        let value = self.text(key).trim().to_owned();
        let spec = self.specs.iter().find(|spec| spec.key == key);
        if value.is_empty() && spec.is_some_and(|spec| spec.required) {
            let label = spec.map(|spec| spec.label).unwrap_or(key);
            bail!("{label} is required -- enter a value and retry");
        }
        Ok(value)
    }

    pub fn metadata(&self, key: &str) -> Result<MetaMap> {
        parse_metadata(self.text(key)).map_err(|error| anyhow!("metadata {error}"))
    }

    pub fn json_properties(&self, key: &str) -> Result<MetaMap> {
        parse_json_properties(self.text(key))
    }
}

pub fn parse_json_properties(text: &str) -> Result<MetaMap> {
    if text.trim().is_empty() {
        return Ok(MetaMap::new());
    }
    let value: serde_json::Value = serde_json::from_str(text)
        .context("properties must be valid JSON -- fix the syntax and retry")?;
    if !value.is_object() {
        bail!("properties must be a JSON object like {{\"weight\": 1}}");
    }
    map_from_json(value)
}

pub fn json_properties_text(map: &MetaMap) -> String {
    if map.is_empty() {
        return String::new();
    }
    serde_json::to_string_pretty(&map_to_json(map)).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInput {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub status: RecordStatus,
    pub tags: Vec<String>,
    pub scopes: Vec<String>,
    pub metadata: MetaMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipInput {
    pub source_id: RecordId,
    pub target_id: RecordId,
    pub relationship_type: String,
    pub status: RecordStatus,
    pub properties: MetaMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInput {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: RecordStatus,
    pub tags: Vec<String>,
    pub metadata: MetaMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogInput {
    pub log_type: String,
    pub content: String,
    pub status: RecordStatus,
    pub tags: Vec<String>,
    pub metadata: MetaMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolInput {
    pub name: String,
    pub title: String,
    pub version: String,
    pub content: String,
    pub status: RecordStatus,
    pub tags: Vec<String>,
    pub metadata: MetaMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPayload {
    Entity(EntityInput),
    Relationship(RelationshipInput),
    Job(JobInput),
    Log(LogInput),
    Protocol(ProtocolInput),
}

impl FormPayload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Entity(_) => ResourceKind::Entities,
            Self::Relationship(_) => ResourceKind::Relationships,
            Self::Job(_) => ResourceKind::Jobs,
            Self::Log(_) => ResourceKind::Logs,
            Self::Protocol(_) => ResourceKind::Protocols,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Entity(entity) => entity.validate(),
            Self::Relationship(relationship) => relationship.validate(),
            Self::Job(job) => job.validate(),
            Self::Log(log) => log.validate(),
            Self::Protocol(protocol) => protocol.validate(),
        }
    }

    /// Request body for create/update calls.
    pub fn body(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Entity(input) => serde_json::to_value(input),
            Self::Relationship(input) => serde_json::to_value(input),
            Self::Job(input) => serde_json::to_value(input),
            Self::Log(input) => serde_json::to_value(input),
            Self::Protocol(input) => serde_json::to_value(input),
        };
        value.with_context(|| format!("encode {} payload", self.kind().noun()))
    }
}

impl EntityInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("entity name is required -- enter a name and retry");
        }
        if self.entity_type.trim().is_empty() {
            bail!("entity type is required -- enter a type (for example person) and retry");
        }
        Ok(())
    }
}

impl RelationshipInput {
    pub fn validate(&self) -> Result<()> {
        if self.source_id.as_str().is_empty() || self.target_id.as_str().is_empty() {
            bail!("relationship needs both a source and a target -- pick them and retry");
        }
        if self.source_id == self.target_id {
            bail!("relationship source and target must differ");
        }
        if self.relationship_type.trim().is_empty() {
            bail!("relationship type is required -- enter a type and retry");
        }
        Ok(())
    }
}

impl JobInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("job title is required -- enter a title and retry");
        }
        Ok(())
    }
}

impl LogInput {
    pub fn validate(&self) -> Result<()> {
        if self.log_type.trim().is_empty() {
            bail!("log type is required -- enter a type and retry");
        }
        if self.content.trim().is_empty() {
            bail!("log content is required -- enter content and retry");
        }
        Ok(())
    }
}

impl ProtocolInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("protocol name is required -- enter a name and retry");
        }
        if self.name.contains(char::is_whitespace) {
            bail!("protocol name must not contain spaces -- use a slug like daily-review");
        }
        if self.content.trim().is_empty() {
            bail!("protocol content is required -- enter content and retry");
        }
        Ok(())
    }
}
