// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use recdesk_api::Client;
use recdesk_app::{
    BulkField, EntityInput, FormPayload, MetaMap, QueryFilter, RecordId, RecordStatus,
    ResourceKind, UpdateBody, parse_bulk_input,
};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server};

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn mock_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());
    Ok((server, addr))
}

#[test]
fn unreachable_server_error_is_actionable() -> Result<()> {
    let client = Client::new("http://127.0.0.1:1/api", None, Duration::from_millis(50), 10)?;
    let error = client.ping().expect_err("ping should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("[api]"), "got {message}");
    Ok(())
}

#[test]
fn query_sends_filter_and_decodes_wrapped_items() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Get);
        assert_eq!(
            request.url(),
            "/api/entities?q=al&include_archived=true&limit=25"
        );
        let auth = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Authorization"))
            .map(|header| header.value.as_str().to_owned());
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
        let body = r#"{"items": [
            {"id": "ent-1", "name": "Alpha", "type": "person", "tags": ["ai"]},
            {"id": 2, "name": "Alps", "type": "place", "status": "archived"}
        ]}"#;
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Some("secret"), Duration::from_secs(1), 25)?;
    let records = client.query(
        ResourceKind::Entities,
        &QueryFilter {
            search: " al ".to_owned(),
            include_archived: true,
        },
    )?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "Alpha");
    assert_eq!(records[1].id.as_str(), "2");
    assert_eq!(records[1].status, RecordStatus::Archived);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn create_and_status_update_send_json_bodies() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("create expected");
        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.url(), "/api/entities");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body readable");
        let sent: serde_json::Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(sent["name"], "Gamma");
        assert_eq!(sent["type"], "project");
        assert_eq!(sent["scopes"], serde_json::json!(["work"]));
        request
            .respond(json_response(
                r#"{"id": "ent-9", "name": "Gamma", "type": "project", "scopes": ["work"]}"#,
                201,
            ))
            .expect("response should succeed");

        let mut request = server.recv().expect("update expected");
        assert_eq!(request.method(), &Method::Patch);
        assert_eq!(request.url(), "/api/entities/ent-9");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body readable");
        assert_eq!(body, r#"{"status":"archived"}"#);
        request
            .respond(json_response(
                r#"{"id": "ent-9", "name": "Gamma", "type": "project", "status": "archived"}"#,
                200,
            ))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, None, Duration::from_secs(1), 10)?;
    let created = client.create(&FormPayload::Entity(EntityInput {
        name: "Gamma".to_owned(),
        entity_type: "project".to_owned(),
        status: RecordStatus::Active,
        tags: Vec::new(),
        scopes: vec!["work".to_owned()],
        metadata: MetaMap::new(),
    }))?;
    assert_eq!(created.id.as_str(), "ent-9");

    let archived = client.update(
        ResourceKind::Entities,
        &created.id,
        &UpdateBody::Status(RecordStatus::Archived),
    )?;
    assert_eq!(archived.status, RecordStatus::Archived);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn bulk_update_posts_ids_and_operation() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/api/jobs/bulk");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("body readable");
        let sent: serde_json::Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(sent["ids"], serde_json::json!(["job-1", "job-2"]));
        assert_eq!(sent["action"], "remove");
        assert_eq!(sent["field"], "tags");
        assert_eq!(sent["values"], serde_json::json!(["stale"]));
        request
            .respond(json_response(r#"{"updated": 2}"#, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, None, Duration::from_secs(1), 10)?;
    let op = parse_bulk_input(BulkField::Tags, "-stale")?;
    let ids = [RecordId::new("job-1"), RecordId::new("job-2")];
    assert_eq!(client.bulk_update(ResourceKind::Jobs, &ids, &op)?, 2);
    assert_eq!(client.bulk_update(ResourceKind::Jobs, &[], &op)?, 0);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn revert_scopes_and_server_errors() -> Result<()> {
    let (server, addr) = mock_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("revert expected");
        assert_eq!(request.url(), "/api/history/h-4/revert");
        request
            .respond(json_response("{}", 200))
            .expect("response should succeed");

        let request = server.recv().expect("scopes expected");
        assert_eq!(request.url(), "/api/scopes");
        request
            .respond(json_response(r#"["work", "personal", "work"]"#, 200))
            .expect("response should succeed");

        let request = server.recv().expect("get expected");
        assert_eq!(request.url(), "/api/logs/missing");
        request
            .respond(json_response(r#"{"error": "log not found"}"#, 404))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, None, Duration::from_secs(1), 10)?;
    client.revert(&RecordId::new("h-4"))?;
    assert_eq!(client.list_scopes()?, vec!["personal", "work"]);
    let error = client
        .get(ResourceKind::Logs, &RecordId::new("missing"))
        .expect_err("404 expected");
    assert_eq!(error.to_string(), "server error (404): log not found");

    handle.join().expect("server thread should join");
    Ok(())
}
