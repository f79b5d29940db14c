// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::ids::RecordId;
use crate::staging::Normalize;

/// Record ids marked for a multi-record mutation. Independent of the cursor
/// and keyed by id so it survives reloads and re-filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkSelection {
    ids: BTreeSet<RecordId>,
}

impl BulkSelection {
    /// Returns true when the id is selected after the toggle.
    pub fn toggle(&mut self, id: &RecordId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.ids.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Add,
    Remove,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkField {
    Tags,
    Scopes,
}

impl BulkField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Scopes => "scopes",
        }
    }

    fn normalize(self) -> Normalize {
        match self {
            Self::Tags => Normalize::Tag,
            Self::Scopes => Normalize::Scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOp {
    pub action: BulkAction,
    pub field: BulkField,
    pub values: Vec<String>,
}

/// Parses `add:a,b`, `remove:a`, `set:a,b` or the `+`, `-`, `=` shorthands.
/// `set` with no values clears the field; the other actions need values.
pub fn parse_bulk_input(field: BulkField, input: &str) -> Result<BulkOp> {
    let input = input.trim();
    let (action, rest) = if let Some(rest) = input.strip_prefix("add:") {
        (BulkAction::Add, rest)
    } else if let Some(rest) = input.strip_prefix("remove:") {
        (BulkAction::Remove, rest)
    } else if let Some(rest) = input.strip_prefix("set:") {
        (BulkAction::Set, rest)
    } else if let Some(rest) = input.strip_prefix('+') {
        (BulkAction::Add, rest)
    } else if let Some(rest) = input.strip_prefix('-') {
        (BulkAction::Remove, rest)
    } else if let Some(rest) = input.strip_prefix('=') {
        (BulkAction::Set, rest)
    } else {
        bail!("start with add:, remove:, set: (or +, -, =) followed by comma-separated values");
    };

    let mut values: Vec<String> = Vec::new();
    for raw in rest.split(',') {
        let value = field.normalize().apply(raw);
        if !value.is_empty() && !values.contains(&value) {
            values.push(value);
        }
    }
    if values.is_empty() && action != BulkAction::Set {
        bail!("no values provided");
    }

    Ok(BulkOp {
        action,
        field,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::{BulkAction, BulkField, BulkSelection, parse_bulk_input};
    use crate::ids::RecordId;

    #[test]
    fn toggle_adds_then_removes_by_id() {
        let mut selection = BulkSelection::default();
        let id = RecordId::new("ent-1");
        assert!(selection.toggle(&id));
        assert_eq!(selection.count(), 1);
        assert!(!selection.toggle(&id));
        assert_eq!(selection.count(), 0);
    }

    #[test]
    fn long_and_short_prefixes_parse() -> anyhow::Result<()> {
        let op = parse_bulk_input(BulkField::Tags, "add: AI, ml ,ai")?;
        assert_eq!(op.action, BulkAction::Add);
        assert_eq!(op.values, vec!["ai".to_owned(), "ml".to_owned()]);

        assert_eq!(
            parse_bulk_input(BulkField::Tags, "-old")?.action,
            BulkAction::Remove
        );
        assert_eq!(
            parse_bulk_input(BulkField::Tags, "remove:x")?.action,
            BulkAction::Remove
        );

        let scopes = parse_bulk_input(BulkField::Scopes, "=#Work,#home")?;
        assert_eq!(scopes.action, BulkAction::Set);
        assert_eq!(scopes.values, vec!["work".to_owned(), "home".to_owned()]);
        Ok(())
    }

    #[test]
    fn empty_values_only_allowed_for_set() -> anyhow::Result<()> {
        let error = parse_bulk_input(BulkField::Tags, "add:").expect_err("empty add");
        assert_eq!(error.to_string(), "no values provided");
        let error = parse_bulk_input(BulkField::Tags, "+ , ").expect_err("empty plus");
        assert_eq!(error.to_string(), "no values provided");

        let cleared = parse_bulk_input(BulkField::Tags, "set:")?;
        assert!(cleared.values.is_empty());
        Ok(())
    }

    #[test]
    fn missing_prefix_is_rejected() {
        let error = parse_bulk_input(BulkField::Tags, "ai,ml").expect_err("no prefix");
        assert!(error.to_string().contains("add:"));
    }
}
