// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Free-text entry for set-valued fields (tags, scopes). Typed text lands in
//! a staging buffer and only joins the committed set on a separator key.

use std::collections::BTreeSet;

use crate::keys::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Tag,
    Scope,
}

impl Normalize {
    pub fn apply(self, raw: &str) -> String {
        let lowered = raw.trim().to_lowercase();
        match self {
            Self::Tag => lowered,
            Self::Scope => lowered.trim_start_matches('#').trim().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSet {
    pub committed: BTreeSet<String>,
    pub staging: String,
    normalize: Normalize,
}

impl StagedSet {
    pub fn new(normalize: Normalize, committed: BTreeSet<String>) -> Self {
        Self {
            committed,
            staging: String::new(),
            normalize,
        }
    }

    /// Routes one key; returns false when the key is not a set-editing key.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Char(' ' | ',') | Key::Enter => {
                self.commit();
                true
            }
            Key::Backspace => {
                if self.staging.pop().is_none() {
                    self.remove_last();
                }
                true
            }
            Key::Ctrl('u') => {
                self.staging.clear();
                true
            }
            other => match other.printable() {
                Some(ch) => {
                    self.staging.push(ch);
                    true
                }
                None => false,
            },
        }
    }

    /// Moves the staging buffer into the committed set. Returns whether a new
    /// value was added.
    pub fn commit(&mut self) -> bool {
        let value = self.normalize.apply(&self.staging);
        self.staging.clear();
        if value.is_empty() {
            return false;
        }
        self.committed.insert(value)
    }

    /// Committed values plus whatever is still staged, as a save would see it.
    pub fn resolved(&self) -> BTreeSet<String> {
        let mut values = self.committed.clone();
        let pending = self.normalize.apply(&self.staging);
        if !pending.is_empty() {
            values.insert(pending);
        }
        values
    }

    pub fn complete_from<'a>(&mut self, candidates: impl IntoIterator<Item = &'a String>) -> bool {
        let prefix = self.normalize.apply(&self.staging);
        if prefix.is_empty() {
            return false;
        }
        let found = candidates.into_iter().find(|candidate| {
            candidate.starts_with(&prefix) && !self.committed.contains(*candidate)
        });
        match found {
            Some(candidate) => {
                self.staging = candidate.clone();
                true
            }
            None => false,
        }
    }

    fn remove_last(&mut self) {
        if let Some(last) = self.committed.iter().next_back().cloned() {
            self.committed.remove(&last);
        }
    }
}
