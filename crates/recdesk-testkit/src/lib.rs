// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use recdesk_app::{
    BulkAction, BulkField, BulkOp, FormPayload, Gateway, MetaValue, QueryFilter, Record, RecordId,
    RecordStatus, ResourceKind, UpdateBody, matches_query,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

const ENTITY_NAMES: [&str; 14] = [
    "Alpha", "Beacon", "Cobalt", "Delta", "Ember", "Fjord", "Granite", "Harbor", "Iris", "Juniper",
    "Kestrel", "Lumen", "Meridian", "Nova",
];
const ENTITY_TYPES: [&str; 5] = ["person", "organization", "project", "place", "concept"];
const TAGS: [&str; 8] = [
    "ai", "ops", "research", "draft", "urgent", "family", "finance", "health",
];
const SCOPES: [&str; 4] = ["personal", "work", "shared", "archive"];
const RELATION_TYPES: [&str; 5] = ["knows", "works-with", "depends-on", "part-of", "mentions"];
const LOG_TYPES: [&str; 4] = ["note", "meeting", "decision", "observation"];
const ACTORS: [&str; 4] = ["cli", "agent", "importer", "web"];
const WORDS: [&str; 20] = [
    "review", "draft", "sync", "plan", "migrate", "index", "backfill", "audit", "ship", "triage",
    "release", "schema", "notes", "weekly", "quarterly", "budget", "roadmap", "incident",
    "retro", "summary",
];

/// Small deterministic generator for tests and fixtures.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    pub fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }

    pub fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.int_n(items.len())]
    }
}

/// Generates plausible records for every resource kind.
#[derive(Debug, Clone)]
pub struct RecordFaker {
    rng: Lcg,
    next_id: u64,
}

impl RecordFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Lcg::new(seed.max(1)),
            next_id: 1,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    fn id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn tags(&mut self) -> Vec<&'static str> {
        let count = self.rng.int_n(3);
        (0..count).map(|_| self.rng.pick(&TAGS)).collect()
    }

    fn phrase(&mut self, words: usize) -> String {
        let mut parts: Vec<&str> = (0..words.max(1)).map(|_| self.rng.pick(&WORDS)).collect();
        parts.dedup();
        let mut phrase = parts.join(" ");
        if let Some(first) = phrase.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        phrase
    }

    fn stamp(&mut self) -> OffsetDateTime {
        fixture_datetime() - Duration::minutes(self.rng.int_n(60 * 24 * 90) as i64)
    }

    pub fn entity(&mut self) -> Record {
        let name = format!(
            "{} {}",
            self.rng.pick(&ENTITY_NAMES),
            self.rng.int_n(900) + 100
        );
        self.entity_named(&name)
    }

    pub fn entity_named(&mut self, name: &str) -> Record {
        let id = self.id("ent");
        let entity_type = self.rng.pick(&ENTITY_TYPES);
        let tags = self.tags();
        let mut record = Record::new(ResourceKind::Entities, id, name)
            .with_field("name", name)
            .with_field("type", entity_type)
            .with_tags(tags);
        record.scopes.insert(self.rng.pick(&SCOPES).to_owned());
        record.metadata.insert(
            "rank".to_owned(),
            MetaValue::Int(self.rng.int_n(100) as i64),
        );
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn relationship(&mut self, source: &Record, target: &Record) -> Record {
        let id = self.id("rel");
        let relationship_type = self.rng.pick(&RELATION_TYPES);
        let mut record = Record::new(ResourceKind::Relationships, id, relationship_type)
            .with_field("relationship_type", relationship_type)
            .with_field("source_id", source.id.as_str())
            .with_field("source_name", source.title.as_str())
            .with_field("target_id", target.id.as_str())
            .with_field("target_name", target.title.as_str());
        record
            .metadata
            .insert("weight".to_owned(), MetaValue::Int(self.rng.int_n(10) as i64));
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn job(&mut self) -> Record {
        let id = self.id("job");
        let title = self.phrase(3);
        let priority = ["low", "medium", "high", "urgent"][self.rng.int_n(4)];
        let description = self.phrase(6);
        let tags = self.tags();
        let mut record = Record::new(ResourceKind::Jobs, id, title.as_str())
            .with_field("title", title)
            .with_field("description", description)
            .with_field("priority", priority)
            .with_tags(tags);
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn log(&mut self) -> Record {
        let id = self.id("log");
        let content = self.phrase(8);
        let log_type = self.rng.pick(&LOG_TYPES);
        let mut record = Record::new(ResourceKind::Logs, id, content.as_str())
            .with_field("log_type", log_type)
            .with_field("content", content);
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn protocol(&mut self) -> Record {
        let id = self.id("proto");
        let name = self.phrase(2).to_lowercase().replace(' ', "-");
        let title = self.phrase(3);
        let content = self.phrase(10);
        let mut record = Record::new(ResourceKind::Protocols, id, name.as_str())
            .with_field("name", name)
            .with_field("title", title)
            .with_field("version", format!("1.{}", self.rng.int_n(5)))
            .with_field("content", content);
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn history(&mut self, subject: &Record) -> Record {
        let id = self.id("hist");
        let action = ["create", "update", "archive"][self.rng.int_n(3)];
        let actor = self.rng.pick(&ACTORS);
        let title = format!("{action} {}/{}", subject.kind.as_str(), subject.id);
        let mut record = Record::new(ResourceKind::History, id, title)
            .with_field("resource", subject.kind.as_str())
            .with_field("record_id", subject.id.as_str())
            .with_field("action", action)
            .with_field("actor", actor);
        record.updated_at = Some(self.stamp());
        record
    }

    pub fn records(&mut self, kind: ResourceKind, count: usize) -> Vec<Record> {
        match kind {
            ResourceKind::Entities => (0..count).map(|_| self.entity()).collect(),
            ResourceKind::Jobs => (0..count).map(|_| self.job()).collect(),
            ResourceKind::Logs => (0..count).map(|_| self.log()).collect(),
            ResourceKind::Protocols => (0..count).map(|_| self.protocol()).collect(),
            ResourceKind::Relationships => {
                let entities: Vec<Record> = (0..count + 1).map(|_| self.entity()).collect();
                entities
                    .windows(2)
                    .map(|pair| self.relationship(&pair[0], &pair[1]))
                    .collect()
            }
            ResourceKind::History => {
                let subjects: Vec<Record> = (0..count).map(|_| self.job()).collect();
                subjects.iter().map(|subject| self.history(subject)).collect()
            }
        }
    }
}

pub fn fixture_datetime() -> OffsetDateTime {
    time::macros::datetime!(2026-01-15 09:30 UTC)
}

#[derive(Debug, Default)]
struct Script {
    records: BTreeMap<ResourceKind, Vec<Record>>,
    scopes: Vec<String>,
    actors: Vec<String>,
    failures: BTreeMap<&'static str, String>,
    calls: Vec<String>,
    next_id: u64,
}

/// In-memory [`Gateway`] with per-operation failure injection and a call log.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, kind: ResourceKind, records: Vec<Record>) -> Self {
        self.lock().records.insert(kind, records);
        self
    }

    pub fn with_scopes(self, scopes: &[&str]) -> Self {
        self.lock().scopes = scopes.iter().map(|scope| (*scope).to_owned()).collect();
        self
    }

    pub fn with_actors(self, actors: &[&str]) -> Self {
        self.lock().actors = actors.iter().map(|actor| (*actor).to_owned()).collect();
        self
    }

    /// Every later call of `operation` (for example `"update"`) fails.
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.lock().failures.insert(operation, message.to_owned());
    }

    pub fn recover(&self, operation: &'static str) {
        self.lock().failures.remove(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn records(&self, kind: ResourceKind) -> Vec<Record> {
        self.lock().records.get(&kind).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin(
        &self,
        operation: &'static str,
        detail: String,
    ) -> Result<std::sync::MutexGuard<'_, Script>> {
        let mut script = self.lock();
        script.calls.push(format!("{operation} {detail}").trim_end().to_owned());
        if let Some(message) = script.failures.get(operation) {
            return Err(anyhow!("{message}"));
        }
        Ok(script)
    }
}

impl Gateway for ScriptedGateway {
    fn query(&self, kind: ResourceKind, filter: &QueryFilter) -> Result<Vec<Record>> {
        let script = self.begin("query", format!("{} {:?}", kind.as_str(), filter.search))?;
        Ok(script
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        filter.include_archived || record.status == RecordStatus::Active
                    })
                    .filter(|record| matches_query(&record.title, &filter.search))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, kind: ResourceKind, id: &RecordId) -> Result<Record> {
        let script = self.begin("get", format!("{}/{id}", kind.as_str()))?;
        script
            .records
            .get(&kind)
            .and_then(|records| records.iter().find(|record| &record.id == id))
            .cloned()
            .ok_or_else(|| anyhow!("{} {id} not found", kind.noun()))
    }

    fn create(&self, payload: &FormPayload) -> Result<Record> {
        let mut script = self.begin("create", payload.kind().as_str().to_owned())?;
        payload.validate()?;
        script.next_id += 1;
        let id = format!("new-{}", script.next_id);
        let record = record_from_payload(RecordId::new(id), payload);
        script
            .records
            .entry(payload.kind())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn update(&self, kind: ResourceKind, id: &RecordId, body: &UpdateBody) -> Result<Record> {
        let mut script = self.begin("update", format!("{}/{id}", kind.as_str()))?;
        let Some(record) = script
            .records
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|record| &record.id == id))
        else {
            bail!("{} {id} not found", kind.noun());
        };
        match body {
            UpdateBody::Status(status) => record.status = *status,
            UpdateBody::Full(payload) => {
                let mut updated = record_from_payload(id.clone(), payload);
                for (key, value) in &record.fields {
                    if updated.field(key).is_none() {
                        updated.set_field(key, value.clone());
                    }
                }
                *record = updated;
            }
        }
        Ok(record.clone())
    }

    fn bulk_update(&self, kind: ResourceKind, ids: &[RecordId], op: &BulkOp) -> Result<usize> {
        let mut script = self.begin("bulk_update", format!("{} x{}", kind.as_str(), ids.len()))?;
        let mut updated = 0;
        for record in script
            .records
            .get_mut(&kind)
            .into_iter()
            .flatten()
            .filter(|record| ids.contains(&record.id))
        {
            let set = match op.field {
                BulkField::Tags => &mut record.tags,
                BulkField::Scopes => &mut record.scopes,
            };
            match op.action {
                BulkAction::Add => set.extend(op.values.iter().cloned()),
                BulkAction::Remove => set.retain(|value| !op.values.contains(value)),
                BulkAction::Set => *set = op.values.iter().cloned().collect(),
            }
            updated += 1;
        }
        Ok(updated)
    }

    fn revert(&self, history_id: &RecordId) -> Result<()> {
        let _script = self.begin("revert", history_id.to_string())?;
        Ok(())
    }

    fn list_scopes(&self) -> Result<Vec<String>> {
        Ok(self.begin("list_scopes", String::new())?.scopes.clone())
    }

    fn list_actors(&self) -> Result<Vec<String>> {
        Ok(self.begin("list_actors", String::new())?.actors.clone())
    }
}

/// Builds the record a well-behaved server would return for a payload.
pub fn record_from_payload(id: RecordId, payload: &FormPayload) -> Record {
    let kind = payload.kind();
    match payload {
        FormPayload::Entity(input) => {
            let mut record = Record::new(kind, id, input.name.as_str())
                .with_field("name", input.name.as_str())
                .with_field("type", input.entity_type.as_str())
                .with_tags(input.tags.iter().cloned())
                .with_status(input.status);
            record.scopes = input.scopes.iter().cloned().collect();
            record.metadata = input.metadata.clone();
            record
        }
        FormPayload::Relationship(input) => {
            let mut record = Record::new(kind, id, input.relationship_type.as_str())
                .with_field("relationship_type", input.relationship_type.as_str())
                .with_field("source_id", input.source_id.as_str())
                .with_field("target_id", input.target_id.as_str())
                .with_status(input.status);
            record.metadata = input.properties.clone();
            record
        }
        FormPayload::Job(input) => {
            let mut record = Record::new(kind, id, input.title.as_str())
                .with_field("title", input.title.as_str())
                .with_field("description", input.description.as_str())
                .with_field("priority", input.priority.as_str())
                .with_tags(input.tags.iter().cloned())
                .with_status(input.status);
            record.metadata = input.metadata.clone();
            record
        }
        FormPayload::Log(input) => {
            let mut record = Record::new(kind, id, input.content.as_str())
                .with_field("log_type", input.log_type.as_str())
                .with_field("content", input.content.as_str())
                .with_tags(input.tags.iter().cloned())
                .with_status(input.status);
            record.metadata = input.metadata.clone();
            record
        }
        FormPayload::Protocol(input) => {
            let mut record = Record::new(kind, id, input.name.as_str())
                .with_field("name", input.name.as_str())
                .with_field("title", input.title.as_str())
                .with_field("version", input.version.as_str())
                .with_field("content", input.content.as_str())
                .with_tags(input.tags.iter().cloned())
                .with_status(input.status);
            record.metadata = input.metadata.clone();
            record
        }
    }
}
