// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deferred API calls. The engine only ever builds [`Command`] values; an
//! external scheduler invokes them off the UI thread against a [`Gateway`]
//! and feeds the single [`ResultEvent`] each one yields back in.

use anyhow::Result;

use crate::bulk::BulkOp;
use crate::forms::FormPayload;
use crate::ids::RecordId;
use crate::model::{Record, RecordStatus, ResourceKind};

/// Logical action slot. At most one command per slot is in flight per tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Load,
    Detail,
    Save,
    Confirm,
    Bulk,
    Scopes,
    Actors,
    Candidates,
}

impl Slot {
    pub const ALL: [Self; 8] = [
        Self::Load,
        Self::Detail,
        Self::Save,
        Self::Confirm,
        Self::Bulk,
        Self::Scopes,
        Self::Actors,
        Self::Candidates,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    Failed(String),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryFilter {
    pub search: String,
    pub include_archived: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateBody {
    Full(FormPayload),
    Status(RecordStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Query {
        kind: ResourceKind,
        filter: QueryFilter,
    },
    Get {
        kind: ResourceKind,
        id: RecordId,
    },
    Create(FormPayload),
    Update {
        kind: ResourceKind,
        id: RecordId,
        body: UpdateBody,
    },
    BulkUpdate {
        kind: ResourceKind,
        ids: Vec<RecordId>,
        op: BulkOp,
    },
    Revert {
        history_id: RecordId,
    },
    ListScopes,
    ListActors,
}

impl Request {
    pub fn describe(&self) -> String {
        match self {
            Self::Query { kind, filter } => {
                format!("query {} {:?}", kind.as_str(), filter.search)
            }
            Self::Get { kind, id } => format!("get {}/{id}", kind.as_str()),
            Self::Create(payload) => format!("create {}", payload.kind().as_str()),
            Self::Update { kind, id, .. } => format!("update {}/{id}", kind.as_str()),
            Self::BulkUpdate { kind, ids, .. } => {
                format!("bulk update {} x{}", kind.as_str(), ids.len())
            }
            Self::Revert { history_id } => format!("revert history/{history_id}"),
            Self::ListScopes => "list scopes".to_owned(),
            Self::ListActors => "list actors".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Records(Vec<Record>),
    Record(Record),
    Names(Vec<String>),
    Updated(usize),
    Reverted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub tab: ResourceKind,
    pub slot: Slot,
    pub generation: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    pub tab: ResourceKind,
    pub slot: Slot,
    pub generation: u64,
    pub outcome: Result<Response, String>,
}

/// The remote API as seen by commands. Every method is exactly one call.
pub trait Gateway {
    fn query(&self, kind: ResourceKind, filter: &QueryFilter) -> Result<Vec<Record>>;
    fn get(&self, kind: ResourceKind, id: &RecordId) -> Result<Record>;
    fn create(&self, payload: &FormPayload) -> Result<Record>;
    fn update(&self, kind: ResourceKind, id: &RecordId, body: &UpdateBody) -> Result<Record>;
    fn bulk_update(&self, kind: ResourceKind, ids: &[RecordId], op: &BulkOp) -> Result<usize>;
    fn revert(&self, history_id: &RecordId) -> Result<()>;
    fn list_scopes(&self) -> Result<Vec<String>>;
    fn list_actors(&self) -> Result<Vec<String>>;
}

impl Command {
    pub fn new(tab: ResourceKind, slot: Slot, request: Request) -> Self {
        Self {
            tab,
            slot,
            generation: 0,
            request,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Performs the call and wraps whatever happened into one result event.
    pub fn invoke<G: Gateway + ?Sized>(self, gateway: &G) -> ResultEvent {
        let outcome = match &self.request {
            Request::Query { kind, filter } => gateway.query(*kind, filter).map(Response::Records),
            Request::Get { kind, id } => gateway.get(*kind, id).map(Response::Record),
            Request::Create(payload) => gateway.create(payload).map(Response::Record),
            Request::Update { kind, id, body } => {
                gateway.update(*kind, id, body).map(Response::Record)
            }
            Request::BulkUpdate { kind, ids, op } => {
                gateway.bulk_update(*kind, ids, op).map(Response::Updated)
            }
            Request::Revert { history_id } => {
                gateway.revert(history_id).map(|()| Response::Reverted)
            }
            Request::ListScopes => gateway.list_scopes().map(Response::Names),
            Request::ListActors => gateway.list_actors().map(Response::Names),
        };
        if let Err(error) = &outcome {
            tracing::warn!(
                tab = self.tab.as_str(),
                request = %self.request.describe(),
                error = %format!("{error:#}"),
                "command failed"
            );
        }
        ResultEvent {
            tab: self.tab,
            slot: self.slot,
            generation: self.generation,
            outcome: outcome.map_err(|error| format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Gateway, QueryFilter, Request, Response, Slot, UpdateBody};
    use crate::bulk::BulkOp;
    use crate::forms::FormPayload;
    use crate::ids::RecordId;
    use crate::model::{Record, ResourceKind};
    use anyhow::{Context, Result, anyhow};

    struct OfflineGateway;

    impl Gateway for OfflineGateway {
        fn query(&self, kind: ResourceKind, _filter: &QueryFilter) -> Result<Vec<Record>> {
            Ok(vec![Record::new(kind, "ent-1", "Alpha")])
        }

        fn get(&self, _kind: ResourceKind, id: &RecordId) -> Result<Record> {
            Err(anyhow!("connection refused")).with_context(|| format!("get {id}"))
        }

        fn create(&self, _payload: &FormPayload) -> Result<Record> {
            Err(anyhow!("offline"))
        }

        fn update(
            &self,
            _kind: ResourceKind,
            _id: &RecordId,
            _body: &UpdateBody,
        ) -> Result<Record> {
            Err(anyhow!("offline"))
        }

        fn bulk_update(
            &self,
            _kind: ResourceKind,
            ids: &[RecordId],
            _op: &BulkOp,
        ) -> Result<usize> {
            Ok(ids.len())
        }

        fn revert(&self, _history_id: &RecordId) -> Result<()> {
            Ok(())
        }

        fn list_scopes(&self) -> Result<Vec<String>> {
            Ok(vec!["personal".to_owned()])
        }

        fn list_actors(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn invoke_carries_routing_fields_into_the_result() {
        let command = Command::new(
            ResourceKind::Entities,
            Slot::Load,
            Request::Query {
                kind: ResourceKind::Entities,
                filter: QueryFilter::default(),
            },
        )
        .with_generation(4);

        let event = command.invoke(&OfflineGateway);
        assert_eq!(event.tab, ResourceKind::Entities);
        assert_eq!(event.slot, Slot::Load);
        assert_eq!(event.generation, 4);
        assert!(matches!(event.outcome, Ok(Response::Records(ref rows)) if rows.len() == 1));
    }

    #[test]
    fn invoke_flattens_error_chain_into_message() {
        let command = Command::new(
            ResourceKind::Jobs,
            Slot::Detail,
            Request::Get {
                kind: ResourceKind::Jobs,
                id: RecordId::new("job-1"),
            },
        );

        let event = command.invoke(&OfflineGateway);
        let Err(message) = event.outcome else {
            panic!("expected failure");
        };
        assert_eq!(message, "get job-1: connection refused");
    }

    #[test]
    fn describe_names_the_call() {
        let request = Request::Revert {
            history_id: RecordId::new("h-3"),
        };
        assert_eq!(request.describe(), "revert history/h-3");
    }
}
