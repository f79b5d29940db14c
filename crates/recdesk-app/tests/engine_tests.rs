// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;

use anyhow::Result;
use recdesk_app::{
    Command, ConfirmKind, Engine, Key, MetaValue, Record, RecordStatus, RelateStep, Request,
    ResourceKind, Slot, UpdateBody, View,
};
use recdesk_testkit::{RecordFaker, ScriptedGateway};

/// Runs commands to completion, feeding every follow-up back in.
fn settle(engine: &mut Engine, gateway: &ScriptedGateway, commands: Vec<Command>) {
    let mut queue: VecDeque<Command> = commands.into();
    while let Some(command) = queue.pop_front() {
        let event = command.invoke(gateway);
        queue.extend(engine.handle_result(event));
    }
}

fn press(engine: &mut Engine, gateway: &ScriptedGateway, key: Key) {
    let commands = engine.handle_key(key);
    settle(engine, gateway, commands);
}

fn type_text(engine: &mut Engine, gateway: &ScriptedGateway, text: &str) {
    for ch in text.chars() {
        press(engine, gateway, Key::Char(ch));
    }
}

fn entities_fixture() -> (Engine, ScriptedGateway) {
    let mut faker = RecordFaker::new(11);
    let gateway = ScriptedGateway::new()
        .with_records(
            ResourceKind::Entities,
            vec![faker.entity_named("Alpha"), faker.entity_named("Beta")],
        )
        .with_scopes(&["personal", "work"]);
    let mut engine = Engine::new(ResourceKind::Entities);
    let commands = engine.activate();
    settle(&mut engine, &gateway, commands);
    (engine, gateway)
}

#[test]
fn space_toggles_bulk_membership() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Char(' '));
    assert_eq!(engine.bulk().count(), 1);
    press(&mut engine, &gateway, Key::Char(' '));
    assert_eq!(engine.bulk().count(), 0);
}

#[test]
fn bulk_survives_cursor_moves_and_esc_clears_it() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Char(' '));
    press(&mut engine, &gateway, Key::Down);
    press(&mut engine, &gateway, Key::Char(' '));
    press(&mut engine, &gateway, Key::Up);
    assert_eq!(engine.bulk().count(), 2);
    press(&mut engine, &gateway, Key::Esc);
    assert!(engine.bulk().is_empty());
}

#[test]
fn search_filters_locally_and_suggests_from_full_collection() {
    let (mut engine, gateway) = entities_fixture();

    let first = engine.handle_key(Key::Char('a'));
    assert_eq!(first.len(), 1);
    let second = engine.handle_key(Key::Char('l'));
    assert_eq!(engine.view(), &View::Search);
    assert_eq!(
        engine
            .rows()
            .iter()
            .map(|record| record.title.as_str())
            .collect::<Vec<_>>(),
        vec!["Alpha"]
    );
    assert_eq!(engine.suggestion().as_deref(), Some("Alpha"));

    let Request::Query { filter, .. } = &second[0].request else {
        panic!("expected a query");
    };
    assert_eq!(filter.search, "al");

    settle(&mut engine, &gateway, second);
    settle(&mut engine, &gateway, first);
    assert_eq!(engine.rows().len(), 1);
}

#[test]
fn tab_accepts_the_suggestion() {
    let (mut engine, gateway) = entities_fixture();
    type_text(&mut engine, &gateway, "be");
    press(&mut engine, &gateway, Key::Tab);
    assert_eq!(engine.search(), "Beta");
    assert_eq!(engine.rows().len(), 1);
}

#[test]
fn confirm_archive_returns_immediately_with_one_update() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Detail);
    press(&mut engine, &gateway, Key::Char('a'));
    let View::Confirm { kind, .. } = engine.view() else {
        panic!("expected confirm, got {:?}", engine.view());
    };
    assert_eq!(kind.tag(ResourceKind::Entities), "entity-archive");
    assert_eq!(*kind, ConfirmKind::Archive);

    let commands = engine.handle_key(Key::Char('y'));
    assert_eq!(engine.view(), &View::Detail);
    assert_eq!(commands.len(), 1);
    assert!(matches!(
        commands[0].request,
        Request::Update {
            body: UpdateBody::Status(RecordStatus::Archived),
            ..
        }
    ));

    settle(&mut engine, &gateway, commands);
    assert_eq!(
        engine.detail().map(|record| record.status),
        Some(RecordStatus::Archived)
    );
    assert_eq!(engine.rows().len(), 1);
}

#[test]
fn confirm_cancel_issues_nothing() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('a'));
    assert!(engine.handle_key(Key::Char('n')).is_empty());
    assert_eq!(engine.view(), &View::Detail);
}

#[test]
fn edit_save_success_returns_to_detail_and_reloads() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    assert_eq!(engine.view(), &View::Edit);
    assert_eq!(engine.known_scopes(), ["personal", "work"]);

    press(&mut engine, &gateway, Key::Char('!'));
    let commands = engine.handle_key(Key::Ctrl('s'));
    assert!(engine.request(Slot::Save).is_pending());
    assert!(engine.handle_key(Key::Ctrl('s')).is_empty());
    settle(&mut engine, &gateway, commands);

    assert_eq!(engine.view(), &View::Detail);
    assert_eq!(engine.detail().map(|record| record.title.as_str()), Some("Alpha!"));
    assert!(!engine.request(Slot::Save).is_pending());
    assert!(
        engine
            .rows()
            .iter()
            .any(|record| record.title == "Alpha!")
    );
}

#[test]
fn late_save_result_leaves_a_newer_form_open() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    press(&mut engine, &gateway, Key::Char('!'));
    let save = engine.handle_key(Key::Ctrl('s'));
    assert_eq!(save.len(), 1);

    press(&mut engine, &gateway, Key::Esc);
    press(&mut engine, &gateway, Key::Esc);
    press(&mut engine, &gateway, Key::Up);
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Add);
    type_text(&mut engine, &gateway, "Gamma");

    settle(&mut engine, &gateway, save);
    assert_eq!(engine.view(), &View::Add);
    assert_eq!(engine.form().map(|form| form.text("name")), Some("Gamma"));
    assert_eq!(engine.notice(), Some("saved entity Alpha!"));
    assert!(!engine.request(Slot::Save).is_pending());
    assert!(
        gateway
            .records(ResourceKind::Entities)
            .iter()
            .any(|record| record.title == "Alpha!")
    );
}

#[test]
fn edit_save_failure_keeps_the_form_and_surfaces_the_error() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    gateway.fail("update", "server said no");

    press(&mut engine, &gateway, Key::Ctrl('s'));
    assert_eq!(engine.view(), &View::Edit);
    assert_eq!(engine.error(), Some("server said no"));
    for slot in Slot::ALL {
        assert!(!engine.request(slot).is_pending(), "slot {slot:?}");
    }
    assert!(engine.form().is_some());
}

#[test]
fn invalid_metadata_blocks_save_without_a_command() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    for _ in 0..5 {
        press(&mut engine, &gateway, Key::Down);
    }
    press(&mut engine, &gateway, Key::Enter);
    assert!(engine.editor().is_some());
    assert!(engine.is_modal());

    type_text(&mut engine, &gateway, "tags: [a, b");
    assert!(engine.editor().is_some_and(|editor| editor.status().is_err()));
    assert!(engine.handle_key(Key::Ctrl('s')).is_empty());
    assert!(engine.editor().is_some());

    press(&mut engine, &gateway, Key::Esc);
    assert!(engine.editor().is_none());
    assert!(engine.handle_key(Key::Ctrl('s')).is_empty());
    assert!(
        engine
            .error()
            .is_some_and(|error| error.starts_with("metadata line"))
    );
}

#[test]
fn metadata_typed_in_the_editor_reaches_the_payload() -> Result<()> {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    for _ in 0..5 {
        press(&mut engine, &gateway, Key::Down);
    }
    press(&mut engine, &gateway, Key::Enter);
    type_text(&mut engine, &gateway, "profile:");
    press(&mut engine, &gateway, Key::Enter);
    type_text(&mut engine, &gateway, "  age: 17");
    press(&mut engine, &gateway, Key::Esc);
    press(&mut engine, &gateway, Key::Ctrl('s'));

    let saved = engine.detail().cloned().ok_or_else(|| anyhow::anyhow!("no detail"))?;
    let profile = saved
        .metadata
        .get("profile")
        .and_then(MetaValue::as_map)
        .ok_or_else(|| anyhow::anyhow!("profile missing"))?;
    assert_eq!(profile.get("age"), Some(&MetaValue::Int(17)));
    Ok(())
}

#[test]
fn scope_field_completes_from_known_scopes() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Up);
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Add);
    type_text(&mut engine, &gateway, "Gamma");
    press(&mut engine, &gateway, Key::Tab);
    type_text(&mut engine, &gateway, "person");
    for _ in 0..3 {
        press(&mut engine, &gateway, Key::Tab);
    }
    type_text(&mut engine, &gateway, "#wo");
    press(&mut engine, &gateway, Key::Tab);
    press(&mut engine, &gateway, Key::Ctrl('s'));

    let created = engine.detail().cloned();
    assert_eq!(created.as_ref().map(|record| record.title.as_str()), Some("Gamma"));
    assert!(
        created.is_some_and(|record| record.scopes.contains("work")),
        "scope completed from the server list"
    );
}

#[test]
fn bulk_tag_prompt_updates_every_marked_record() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Ctrl('b'));
    assert!(engine.error().is_some());

    press(&mut engine, &gateway, Key::Char(' '));
    press(&mut engine, &gateway, Key::Down);
    press(&mut engine, &gateway, Key::Char(' '));
    press(&mut engine, &gateway, Key::Ctrl('b'));
    assert!(matches!(engine.view(), View::BulkPrompt(_)));

    type_text(&mut engine, &gateway, "nonsense");
    press(&mut engine, &gateway, Key::Enter);
    assert!(matches!(engine.view(), View::BulkPrompt(_)));
    assert!(engine.error().is_some_and(|error| error.contains("add:")));

    press(&mut engine, &gateway, Key::Ctrl('u'));
    type_text(&mut engine, &gateway, "+Team");
    press(&mut engine, &gateway, Key::Enter);

    assert_eq!(engine.view(), &View::List);
    assert!(engine.bulk().is_empty());
    assert_eq!(engine.notice(), Some("updated 2 records"));
    assert!(
        gateway
            .records(ResourceKind::Entities)
            .iter()
            .all(|record| record.tags.contains("team"))
    );
}

#[test]
fn bulk_marks_survive_filtering_and_reloads() {
    let (mut engine, gateway) = entities_fixture();
    let Some(alpha) = engine.selected_record().map(|record| record.id.clone()) else {
        panic!("fixture should select the first row");
    };
    press(&mut engine, &gateway, Key::Char(' '));

    type_text(&mut engine, &gateway, "be");
    assert!(engine.rows().iter().all(|record| record.id != alpha));
    assert!(engine.bulk().contains(&alpha));

    press(&mut engine, &gateway, Key::Ctrl('u'));
    press(&mut engine, &gateway, Key::Ctrl('r'));
    assert_eq!(engine.rows().len(), 2);
    assert!(engine.bulk().contains(&alpha));
    assert_eq!(engine.bulk().count(), 1);

    press(&mut engine, &gateway, Key::Ctrl('b'));
    type_text(&mut engine, &gateway, "+keep");
    let commands = engine.handle_key(Key::Enter);
    let [command] = commands.as_slice() else {
        panic!("expected one bulk command, got {commands:?}");
    };
    let Request::BulkUpdate { ids, .. } = &command.request else {
        panic!("expected a bulk update, got {:?}", command.request);
    };
    assert_eq!(ids, &vec![alpha.clone()]);

    settle(&mut engine, &gateway, commands);
    let records = gateway.records(ResourceKind::Entities);
    assert!(
        records
            .iter()
            .all(|record| record.tags.contains("keep") == (record.id == alpha))
    );
}

#[test]
fn archived_toggle_requeries_with_the_flag() {
    let (mut engine, gateway) = entities_fixture();
    let commands = engine.handle_key(Key::Ctrl('a'));
    let Request::Query { filter, .. } = &commands[0].request else {
        panic!("expected a query");
    };
    assert!(filter.include_archived);
    settle(&mut engine, &gateway, commands);
    assert!(engine.include_archived());
}

#[test]
fn relate_flow_picks_source_target_and_creates() {
    let mut faker = RecordFaker::new(2);
    let gateway = ScriptedGateway::new().with_records(
        ResourceKind::Entities,
        vec![
            faker.entity_named("Alpha"),
            faker.entity_named("Beta"),
            faker.entity_named("Gamma"),
        ],
    );
    let mut engine = Engine::new(ResourceKind::Relationships);
    let commands = engine.activate();
    settle(&mut engine, &gateway, commands);

    press(&mut engine, &gateway, Key::Up);
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Relate(RelateStep::Source));
    assert_eq!(engine.relate_list().len(), 3);

    type_text(&mut engine, &gateway, "gam");
    assert_eq!(engine.relate_list().len(), 1);
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Relate(RelateStep::Target));

    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(
        engine.relate_target().map(|record| record.title.as_str()),
        Some("Alpha")
    );
    assert_eq!(engine.view(), &View::Relate(RelateStep::Details));

    press(&mut engine, &gateway, Key::Ctrl('s'));
    assert!(engine.error().is_some_and(|error| error.contains("required")));

    type_text(&mut engine, &gateway, "knows");
    press(&mut engine, &gateway, Key::Ctrl('s'));
    assert_eq!(engine.view(), &View::Detail);
    let created = gateway.records(ResourceKind::Relationships);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "knows");
    assert_eq!(engine.rows().len(), 1);
}

#[test]
fn relate_esc_walks_back_one_step() {
    let mut faker = RecordFaker::new(2);
    let gateway = ScriptedGateway::new().with_records(
        ResourceKind::Entities,
        vec![faker.entity_named("Alpha"), faker.entity_named("Beta")],
    );
    let mut engine = Engine::new(ResourceKind::Relationships);
    press(&mut engine, &gateway, Key::Up);
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Down);
    press(&mut engine, &gateway, Key::Enter);
    assert_eq!(engine.view(), &View::Relate(RelateStep::Details));

    press(&mut engine, &gateway, Key::Esc);
    assert_eq!(engine.view(), &View::Relate(RelateStep::Target));
    press(&mut engine, &gateway, Key::Esc);
    assert_eq!(engine.view(), &View::Relate(RelateStep::Source));
    press(&mut engine, &gateway, Key::Esc);
    assert_eq!(engine.view(), &View::List);
}

#[test]
fn history_revert_confirms_then_calls_revert() {
    let mut faker = RecordFaker::new(8);
    let gateway = ScriptedGateway::new()
        .with_records(ResourceKind::History, faker.records(ResourceKind::History, 3))
        .with_actors(&["agent", "cli"]);
    let mut engine = Engine::new(ResourceKind::History);
    let commands = engine.activate();
    settle(&mut engine, &gateway, commands);
    assert_eq!(engine.known_actors(), ["agent", "cli"]);

    press(&mut engine, &gateway, Key::Enter);
    assert!(engine.handle_key(Key::Char('e')).is_empty());
    assert_eq!(engine.view(), &View::Detail);
    press(&mut engine, &gateway, Key::Char('r'));
    press(&mut engine, &gateway, Key::Char('y'));
    assert_eq!(engine.notice(), Some("change reverted"));
    assert!(
        gateway
            .calls()
            .iter()
            .any(|call| call.starts_with("revert hist-"))
    );
}

#[test]
fn history_search_suggests_actors() {
    let mut engine = Engine::new(ResourceKind::History);
    let gateway = ScriptedGateway::new().with_actors(&["importer"]);
    let commands = engine.activate();
    settle(&mut engine, &gateway, commands);
    type_text(&mut engine, &gateway, "imp");
    assert_eq!(engine.suggestion().as_deref(), Some("importer"));
}

#[test]
fn any_failure_clears_every_in_flight_flag() {
    let (mut engine, gateway) = entities_fixture();
    press(&mut engine, &gateway, Key::Enter);
    press(&mut engine, &gateway, Key::Char('e'));
    let save = engine.handle_key(Key::Ctrl('s'));
    assert!(engine.request(Slot::Save).is_pending());

    gateway.fail("query", "index offline");
    let reload = engine.reload();
    settle(&mut engine, &gateway, vec![reload]);
    assert!(!engine.request(Slot::Save).is_pending());
    assert_eq!(engine.error(), Some("index offline"));

    gateway.recover("query");
    settle(&mut engine, &gateway, save);
    assert_eq!(engine.view(), &View::Detail);
}

#[test]
fn shrinking_reload_clamps_the_cursor() -> Result<()> {
    let mut faker = RecordFaker::new(4);
    let gateway = ScriptedGateway::new()
        .with_records(ResourceKind::Jobs, faker.records(ResourceKind::Jobs, 5));
    let mut engine = Engine::new(ResourceKind::Jobs);
    let commands = engine.activate();
    settle(&mut engine, &gateway, commands);
    for _ in 0..4 {
        press(&mut engine, &gateway, Key::Down);
    }
    assert_eq!(engine.list().selected(), Some(4));

    let remaining: Vec<Record> = gateway.records(ResourceKind::Jobs).into_iter().take(2).collect();
    let smaller = ScriptedGateway::new().with_records(ResourceKind::Jobs, remaining);
    press(&mut engine, &smaller, Key::Ctrl('r'));
    assert_eq!(engine.list().selected(), Some(1));
    press(&mut engine, &smaller, Key::Enter);
    assert_eq!(engine.view(), &View::Detail);
    Ok(())
}
