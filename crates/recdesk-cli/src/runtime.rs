// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use recdesk_api::Client;
use recdesk_app::{
    BulkOp, FormPayload, Gateway, QueryFilter, Record, RecordId, ResourceKind, UpdateBody,
};

/// Gateway backed by the HTTP client. Each call names what it was doing so
/// the flattened error reads `query entities: cannot reach ...`.
pub struct ApiGateway {
    client: Client,
}

impl ApiGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Gateway for ApiGateway {
    fn query(&self, kind: ResourceKind, filter: &QueryFilter) -> Result<Vec<Record>> {
        self.client
            .query(kind, filter)
            .with_context(|| format!("query {}", kind.as_str()))
    }

    fn get(&self, kind: ResourceKind, id: &RecordId) -> Result<Record> {
        self.client
            .get(kind, id)
            .with_context(|| format!("load {} {id}", kind.noun()))
    }

    fn create(&self, payload: &FormPayload) -> Result<Record> {
        self.client
            .create(payload)
            .with_context(|| format!("create {}", payload.kind().noun()))
    }

    fn update(&self, kind: ResourceKind, id: &RecordId, body: &UpdateBody) -> Result<Record> {
        self.client
            .update(kind, id, body)
            .with_context(|| format!("update {} {id}", kind.noun()))
    }

    fn bulk_update(&self, kind: ResourceKind, ids: &[RecordId], op: &BulkOp) -> Result<usize> {
        self.client.bulk_update(kind, ids, op).with_context(|| {
            format!(
                "bulk update {} on {} {}",
                op.field.as_str(),
                ids.len(),
                kind.as_str()
            )
        })
    }

    fn revert(&self, history_id: &RecordId) -> Result<()> {
        self.client
            .revert(history_id)
            .with_context(|| format!("revert history {history_id}"))
    }

    fn list_scopes(&self) -> Result<Vec<String>> {
        self.client.list_scopes().context("list scopes")
    }

    fn list_actors(&self) -> Result<Vec<String>> {
        self.client.list_actors().context("list actors")
    }
}
