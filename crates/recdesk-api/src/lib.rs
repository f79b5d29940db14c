// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod wire;

use anyhow::{Context, Result, anyhow, bail};
use recdesk_app::{BulkOp, FormPayload, QueryFilter, Record, RecordId, ResourceKind, UpdateBody};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::wire::{BulkRequest, BulkResponse, ListEnvelope, StatusPatch, WireRecord};

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    page_size: usize,
    http: HttpClient,
}

impl Client {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        page_size: usize,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if page_size == 0 {
            bail!("api.page_size must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
            timeout,
            page_size,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Appends each segment percent-encoded, so ids containing `/`, `?` or
    /// `#` stay a single path segment.
    fn segment_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("api.base_url {:?} is not a valid URL", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("api.base_url {:?} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn send(&self, method: &str, path: &str, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .map_err(|error| connection_error(&self.base_url, self.timeout, error))?;
        let status = response.status();
        tracing::debug!(method, path, status = status.as_u16(), "api request");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        response.json().with_context(|| format!("decode {what}"))
    }

    pub fn ping(&self) -> Result<()> {
        let path = "health";
        self.send("GET", path, self.http.get(self.url(path)))?;
        Ok(())
    }

    pub fn query(&self, kind: ResourceKind, filter: &QueryFilter) -> Result<Vec<Record>> {
        let mut url = Url::parse(&self.url(kind.as_str()))
            .with_context(|| format!("build {} query URL", kind.as_str()))?;
        {
            let mut pairs = url.query_pairs_mut();
            let search = filter.search.trim();
            if !search.is_empty() {
                pairs.append_pair("q", search);
            }
            if filter.include_archived {
                pairs.append_pair("include_archived", "true");
            }
            pairs.append_pair("limit", &self.page_size.to_string());
        }
        let response = self.send("GET", kind.as_str(), self.http.get(url))?;
        let envelope: ListEnvelope<WireRecord> =
            Self::decode(response, &format!("{} list", kind.as_str()))?;
        envelope
            .into_items()
            .into_iter()
            .map(|wire| wire.into_record(kind))
            .collect()
    }

    pub fn get(&self, kind: ResourceKind, id: &RecordId) -> Result<Record> {
        let path = format!("{}/{id}", kind.as_str());
        let url = self.segment_url(&[kind.as_str(), id.as_str()])?;
        let response = self.send("GET", &path, self.http.get(url))?;
        let wire: WireRecord = Self::decode(response, kind.noun())?;
        wire.into_record(kind)
    }

    pub fn create(&self, payload: &FormPayload) -> Result<Record> {
        let kind = payload.kind();
        payload.validate()?;
        let body = payload.body()?;
        let response = self.send(
            "POST",
            kind.as_str(),
            self.http.post(self.url(kind.as_str())).json(&body),
        )?;
        let wire: WireRecord = Self::decode(response, &format!("created {}", kind.noun()))?;
        wire.into_record(kind)
    }

    pub fn update(&self, kind: ResourceKind, id: &RecordId, body: &UpdateBody) -> Result<Record> {
        let path = format!("{}/{id}", kind.as_str());
        let json = match body {
            UpdateBody::Full(payload) => {
                payload.validate()?;
                payload.body()?
            }
            UpdateBody::Status(status) => serde_json::to_value(StatusPatch { status: *status })
                .context("encode status patch")?,
        };
        let url = self.segment_url(&[kind.as_str(), id.as_str()])?;
        let response = self.send("PATCH", &path, self.http.patch(url).json(&json))?;
        let wire: WireRecord = Self::decode(response, &format!("updated {}", kind.noun()))?;
        wire.into_record(kind)
    }

    pub fn bulk_update(&self, kind: ResourceKind, ids: &[RecordId], op: &BulkOp) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let path = format!("{}/bulk", kind.as_str());
        let request = BulkRequest { ids, op };
        let response = self.send("POST", &path, self.http.post(self.url(&path)).json(&request))?;
        let parsed: BulkResponse = Self::decode(response, "bulk update result")?;
        Ok(parsed.updated)
    }

    pub fn revert(&self, history_id: &RecordId) -> Result<()> {
        let path = format!("history/{history_id}/revert");
        let url = self.segment_url(&["history", history_id.as_str(), "revert"])?;
        self.send("POST", &path, self.http.post(url))?;
        Ok(())
    }

    pub fn list_scopes(&self) -> Result<Vec<String>> {
        self.list_names("scopes")
    }

    pub fn list_actors(&self) -> Result<Vec<String>> {
        self.list_names("actors")
    }

    fn list_names(&self, path: &str) -> Result<Vec<String>> {
        let response = self.send("GET", path, self.http.get(self.url(path)))?;
        let envelope: ListEnvelope<String> = Self::decode(response, path)?;
        let mut names = envelope.into_items();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

fn connection_error(base_url: &str, timeout: Duration, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "request to {base_url} timed out after {}ms -- raise [api].timeout or check the server",
            timeout.as_millis()
        );
    }
    anyhow!("cannot reach {base_url} -- check [api].base_url and that the server is running ({error})")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Text(String),
    Object { message: String },
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "unauthorized ({}) -- set [api].api_key or RECDESK_API_KEY",
            status.as_u16()
        );
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match parsed.error {
            Some(ErrorBody::Text(text)) => Some(text),
            Some(ErrorBody::Object { message }) => Some(message),
            None => parsed.detail.or(parsed.message),
        };
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
