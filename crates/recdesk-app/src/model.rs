// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::codec::MetaMap;
use crate::ids::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Entities,
    Relationships,
    Jobs,
    Logs,
    Protocols,
    History,
}

impl ResourceKind {
    pub const ALL: [Self; 6] = [
        Self::Entities,
        Self::Relationships,
        Self::Jobs,
        Self::Logs,
        Self::Protocols,
        Self::History,
    ];

    /// Path segment used by the remote API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::Relationships => "relationships",
            Self::Jobs => "jobs",
            Self::Logs => "logs",
            Self::Protocols => "protocols",
            Self::History => "history",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entities" => Some(Self::Entities),
            "relationships" => Some(Self::Relationships),
            "jobs" => Some(Self::Jobs),
            "logs" => Some(Self::Logs),
            "protocols" => Some(Self::Protocols),
            "history" => Some(Self::History),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::Relationships => "relations",
            Self::Jobs => "jobs",
            Self::Logs => "logs",
            Self::Protocols => "protocols",
            Self::History => "history",
        }
    }

    /// Singular noun for status messages.
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Entities => "entity",
            Self::Relationships => "relationship",
            Self::Jobs => "job",
            Self::Logs => "log",
            Self::Protocols => "protocol",
            Self::History => "history entry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Archived,
}

impl RecordStatus {
    pub const ALL: [Self; 2] = [Self::Active, Self::Archived];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "archived" | "inactive" | "deleted" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|status| *status == self)
            .unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|priority| *priority == self)
            .unwrap_or(1)
    }
}

/// Snapshot of one remote record, normalized across resource kinds.
///
/// `fields` holds the resource-specific scalar attributes keyed by their
/// wire name (for example `name` or `relationship_type`) in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub kind: ResourceKind,
    pub title: String,
    pub status: RecordStatus,
    pub fields: Vec<(String, String)>,
    pub tags: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
    pub metadata: MetaMap,
    pub updated_at: Option<OffsetDateTime>,
}

impl Record {
    pub fn new(kind: ResourceKind, id: impl Into<RecordId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            status: RecordStatus::Active,
            fields: Vec::new(),
            tags: BTreeSet::new(),
            scopes: BTreeSet::new(),
            metadata: MetaMap::new(),
            updated_at: None,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_owned(), value)),
        }
    }
}
