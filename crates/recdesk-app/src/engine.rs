// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Per-tab interaction state machine.
//!
//! One [`Engine`] drives one resource tab. Keys go in through
//! [`Engine::handle_key`], remote outcomes through [`Engine::handle_result`];
//! both return the commands to schedule next. Nothing here performs I/O.

use std::collections::BTreeMap;
use std::fmt;

use crate::bulk::{BulkField, BulkSelection, parse_bulk_input};
use crate::codec::parse_metadata;
use crate::command::{
    Command, QueryFilter, Request, RequestState, Response, ResultEvent, Slot, UpdateBody,
};
use crate::forms::{FieldKind, FieldOutcome, FormState, Syntax, parse_json_properties};
use crate::ids::RecordId;
use crate::keys::Key;
use crate::list::VirtualList;
use crate::model::{Record, RecordStatus, ResourceKind};
use crate::resources::{RELATE_FIELDS, Resource, relationship_payload, resource_for};
use crate::search::{matches_query, suggest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleChoice {
    Add,
    Library,
}

/// Where list-view keys land: the rows, or the Add/Library toggle above them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFocus {
    Rows,
    Toggle(ToggleChoice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    Archive,
    Revert,
}

impl ConfirmKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Revert => "revert",
        }
    }

    /// Stable name such as `entity-archive` or `history-revert`.
    pub fn tag(self, kind: ResourceKind) -> String {
        let subject = match kind {
            ResourceKind::History => "history",
            other => other.noun(),
        };
        format!("{subject}-{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelateStep {
    Source,
    Target,
    Details,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    List,
    Search,
    Detail,
    Add,
    Edit,
    Confirm {
        kind: ConfirmKind,
        target: RecordId,
        return_to: Box<View>,
    },
    BulkPrompt(BulkField),
    Relate(RelateStep),
}

/// Modal multi-line editor for a metadata or JSON field. While one is open
/// it receives every key until closed with Esc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredEditor {
    pub field: usize,
    pub label: &'static str,
    pub syntax: Syntax,
    pub buffer: String,
}

impl StructuredEditor {
    /// Live parse status of the buffer: `ok (N keys)` or the parse error.
    pub fn status(&self) -> Result<String, String> {
        let parsed = match self.syntax {
            Syntax::Metadata => parse_metadata(&self.buffer)
                .map(|map| map.len())
                .map_err(|error| error.to_string()),
            Syntax::Json => parse_json_properties(&self.buffer)
                .map(|map| map.len())
                .map_err(|error| format!("{error:#}")),
        };
        parsed.map(|count| format!("ok ({count} keys)"))
    }

    fn handle_key(&mut self, key: Key) {
        match key {
            Key::Enter => self.buffer.push('\n'),
            Key::Tab => self.buffer.push_str("  "),
            Key::Backspace => {
                self.buffer.pop();
            }
            Key::Ctrl('u') => {
                let keep = self.buffer.rfind('\n').map_or(0, |index| index + 1);
                self.buffer.truncate(keep);
            }
            other => {
                if let Some(ch) = other.printable() {
                    self.buffer.push(ch);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct RelateFlow {
    source: Option<Record>,
    target: Option<Record>,
    query: String,
    catalog: Vec<Record>,
    candidates: Vec<Record>,
    list: VirtualList,
    generation: u64,
}

impl RelateFlow {
    fn restart(&mut self) {
        self.source = None;
        self.target = None;
        self.query.clear();
        self.candidates.clear();
        self.list.set_items(Vec::new());
    }

    fn apply_filter(&mut self) {
        self.candidates = self
            .catalog
            .iter()
            .filter(|record| matches_query(&record.title, &self.query))
            .cloned()
            .collect();
        self.sync_labels();
    }

    fn sync_labels(&mut self) {
        let labels = self
            .candidates
            .iter()
            .map(|record| record.title.clone())
            .collect();
        self.list.set_items(labels);
    }

    fn selected(&self) -> Option<&Record> {
        self.list
            .selected()
            .and_then(|index| self.candidates.get(index))
    }
}

pub struct Engine {
    resource: &'static dyn Resource,
    view: View,
    focus: ListFocus,
    catalog: Vec<Record>,
    rows: Vec<Record>,
    list: VirtualList,
    search: String,
    include_archived: bool,
    bulk: BulkSelection,
    prompt: String,
    detail: Option<Record>,
    form: Option<FormState>,
    /// Bumped whenever a form opens; save results only close the form they
    /// were issued from.
    form_token: u64,
    editors: Vec<StructuredEditor>,
    relate: RelateFlow,
    requests: BTreeMap<Slot, RequestState>,
    generation: u64,
    known_scopes: Vec<String>,
    known_actors: Vec<String>,
    error: Option<String>,
    notice: Option<String>,
    activated: bool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("kind", &self.kind())
            .field("view", &self.view)
            .field("rows", &self.rows.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            resource: resource_for(kind),
            view: View::List,
            focus: ListFocus::Rows,
            catalog: Vec::new(),
            rows: Vec::new(),
            list: VirtualList::default(),
            search: String::new(),
            include_archived: false,
            bulk: BulkSelection::default(),
            prompt: String::new(),
            detail: None,
            form: None,
            form_token: 0,
            editors: Vec::new(),
            relate: RelateFlow::default(),
            requests: BTreeMap::new(),
            generation: 0,
            known_scopes: Vec::new(),
            known_actors: Vec::new(),
            error: None,
            notice: None,
            activated: false,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    pub fn resource(&self) -> &'static dyn Resource {
        self.resource
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn focus(&self) -> ListFocus {
        self.focus
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn list(&self) -> &VirtualList {
        &self.list
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn include_archived(&self) -> bool {
        self.include_archived
    }

    pub fn bulk(&self) -> &BulkSelection {
        &self.bulk
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn detail(&self) -> Option<&Record> {
        self.detail.as_ref()
    }

    pub fn form(&self) -> Option<&FormState> {
        self.form.as_ref()
    }

    pub fn editor(&self) -> Option<&StructuredEditor> {
        self.editors.last()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn known_scopes(&self) -> &[String] {
        &self.known_scopes
    }

    pub fn known_actors(&self) -> &[String] {
        &self.known_actors
    }

    pub fn request(&self, slot: Slot) -> &RequestState {
        static IDLE: RequestState = RequestState::Idle;
        self.requests.get(&slot).unwrap_or(&IDLE)
    }

    pub fn relate_source(&self) -> Option<&Record> {
        self.relate.source.as_ref()
    }

    pub fn relate_target(&self) -> Option<&Record> {
        self.relate.target.as_ref()
    }

    pub fn relate_query(&self) -> &str {
        &self.relate.query
    }

    pub fn relate_list(&self) -> &VirtualList {
        &self.relate.list
    }

    /// True while a sub-state owns the keyboard exclusively.
    pub fn is_modal(&self) -> bool {
        !self.editors.is_empty()
            || matches!(self.view, View::Confirm { .. } | View::BulkPrompt(_))
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.list.selected().and_then(|index| self.rows.get(index))
    }

    /// Completion for the search buffer drawn from the unfiltered collection
    /// (plus known actors on the history tab).
    pub fn suggestion(&self) -> Option<String> {
        let titles = self
            .catalog
            .iter()
            .map(|record| self.resource.search_text(record));
        let actors = self.known_actors.iter().map(String::as_str);
        suggest(&self.search, titles.chain(actors))
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.list.set_viewport_height(height);
        self.relate.list.set_viewport_height(height);
    }

    /// Commands to run the first time the tab is shown.
    pub fn activate(&mut self) -> Vec<Command> {
        if self.activated {
            return Vec::new();
        }
        self.activated = true;
        let mut commands = vec![self.reload()];
        if self.kind() == ResourceKind::History {
            commands.extend(self.issue(Slot::Actors, Request::ListActors));
        }
        commands
    }

    pub fn handle_key(&mut self, key: Key) -> Vec<Command> {
        if !self.editors.is_empty() {
            self.handle_editor_key(key);
            return Vec::new();
        }
        self.error = None;
        self.notice = None;
        match self.view.clone() {
            View::List | View::Search => self.handle_list_key(key),
            View::Detail => self.handle_detail_key(key),
            View::Add | View::Edit => self.handle_form_key(key),
            View::Confirm {
                kind,
                target,
                return_to,
            } => self.handle_confirm_key(key, kind, target, *return_to),
            View::BulkPrompt(field) => self.handle_bulk_prompt_key(key, field),
            View::Relate(RelateStep::Details) => self.handle_form_key(key),
            View::Relate(step) => self.handle_relate_pick_key(key, step),
        }
    }

    fn handle_list_key(&mut self, key: Key) -> Vec<Command> {
        if let ListFocus::Toggle(choice) = self.focus {
            return self.handle_toggle_key(key, choice);
        }
        match key {
            Key::Up => {
                if self.list.selected().is_none_or(|index| index == 0) {
                    self.focus = ListFocus::Toggle(ToggleChoice::Add);
                } else {
                    self.list.up();
                }
                Vec::new()
            }
            Key::Down => {
                self.list.down();
                Vec::new()
            }
            Key::Enter => self.open_detail(),
            Key::Tab => match self.suggestion() {
                Some(completion) => {
                    self.search = completion;
                    self.search_changed()
                }
                None => Vec::new(),
            },
            Key::Char(' ') if self.search.is_empty() => {
                if let Some(id) = self.selected_record().map(|record| record.id.clone()) {
                    self.bulk.toggle(&id);
                }
                Vec::new()
            }
            Key::Backspace => {
                if self.search.pop().is_some() {
                    self.search_changed()
                } else {
                    Vec::new()
                }
            }
            Key::Ctrl('u') => self.clear_search(),
            Key::Ctrl('a') => {
                self.include_archived = !self.include_archived;
                self.notice = Some(
                    if self.include_archived {
                        "archived shown"
                    } else {
                        "archived hidden"
                    }
                    .to_owned(),
                );
                vec![self.reload()]
            }
            Key::Ctrl('r') => vec![self.reload()],
            Key::Ctrl('b') => self.open_bulk_prompt(BulkField::Tags),
            Key::Ctrl('g') => self.open_bulk_prompt(BulkField::Scopes),
            Key::Esc => {
                if !self.search.is_empty() {
                    return self.clear_search();
                }
                self.bulk.clear();
                Vec::new()
            }
            other => match other.printable() {
                Some(ch) => {
                    self.search.push(ch);
                    self.search_changed()
                }
                None => Vec::new(),
            },
        }
    }

    fn handle_toggle_key(&mut self, key: Key, choice: ToggleChoice) -> Vec<Command> {
        match key {
            Key::Left => self.focus = ListFocus::Toggle(ToggleChoice::Add),
            Key::Right => self.focus = ListFocus::Toggle(ToggleChoice::Library),
            Key::Down | Key::Esc => self.focus = ListFocus::Rows,
            Key::Enter => {
                self.focus = ListFocus::Rows;
                if choice == ToggleChoice::Add {
                    return self.open_add();
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn clear_search(&mut self) -> Vec<Command> {
        if self.search.is_empty() {
            return Vec::new();
        }
        self.search.clear();
        self.search_changed()
    }

    /// Re-filters locally right away and asks the server for the same query.
    fn search_changed(&mut self) -> Vec<Command> {
        self.view = if self.search.is_empty() {
            View::List
        } else {
            View::Search
        };
        self.apply_local_filter();
        vec![self.reload()]
    }

    fn apply_local_filter(&mut self) {
        let resource = self.resource;
        self.rows = self
            .catalog
            .iter()
            .filter(|record| matches_query(resource.search_text(record), &self.search))
            .cloned()
            .collect();
        self.sync_labels();
    }

    fn sync_labels(&mut self) {
        let resource = self.resource;
        let labels = self
            .rows
            .iter()
            .map(|record| resource.row_label(record))
            .collect();
        self.list.set_items(labels);
    }

    fn list_view(&self) -> View {
        if self.search.is_empty() {
            View::List
        } else {
            View::Search
        }
    }

    fn open_detail(&mut self) -> Vec<Command> {
        let Some(record) = self.selected_record().cloned() else {
            return Vec::new();
        };
        let request = Request::Get {
            kind: self.kind(),
            id: record.id.clone(),
        };
        self.detail = Some(record);
        self.view = View::Detail;
        self.issue(Slot::Detail, request).into_iter().collect()
    }

    fn open_add(&mut self) -> Vec<Command> {
        let caps = self.resource.capabilities();
        if !caps.create {
            self.error = Some(format!("{} are read-only", self.kind().label()));
            return Vec::new();
        }
        if caps.relate {
            self.relate.restart();
            self.view = View::Relate(RelateStep::Source);
            return vec![self.candidate_query()];
        }
        self.open_form(self.resource.blank_form());
        self.view = View::Add;
        self.scope_refresh()
    }

    fn scope_refresh(&mut self) -> Vec<Command> {
        if !self.resource.capabilities().scopes {
            return Vec::new();
        }
        self.issue(Slot::Scopes, Request::ListScopes)
            .into_iter()
            .collect()
    }

    fn handle_detail_key(&mut self, key: Key) -> Vec<Command> {
        let caps = self.resource.capabilities();
        let Some(record) = self.detail.clone() else {
            self.view = self.list_view();
            return Vec::new();
        };
        match key {
            Key::Char('e') if caps.edit => {
                self.open_form(self.resource.seed_form(&record));
                self.view = View::Edit;
                self.scope_refresh()
            }
            Key::Char('a') if caps.archive => {
                if record.status == RecordStatus::Archived {
                    self.notice = Some(format!("{} is already archived", record.title));
                } else {
                    self.open_confirm(ConfirmKind::Archive, record.id);
                }
                Vec::new()
            }
            Key::Char('r') if caps.revert => {
                self.open_confirm(ConfirmKind::Revert, record.id);
                Vec::new()
            }
            Key::Ctrl('r') => {
                let request = Request::Get {
                    kind: self.kind(),
                    id: record.id,
                };
                self.issue(Slot::Detail, request).into_iter().collect()
            }
            Key::Esc | Key::Char('q') => {
                self.detail = None;
                self.view = self.list_view();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn open_confirm(&mut self, kind: ConfirmKind, target: RecordId) {
        if self.request(Slot::Confirm).is_pending() {
            self.error = Some(format!("{} already in progress", kind.as_str()));
            return;
        }
        self.view = View::Confirm {
            kind,
            target,
            return_to: Box::new(self.view.clone()),
        };
    }

    fn handle_confirm_key(
        &mut self,
        key: Key,
        kind: ConfirmKind,
        target: RecordId,
        return_to: View,
    ) -> Vec<Command> {
        match key {
            Key::Char('y' | 'Y') => {
                self.view = return_to;
                let request = match kind {
                    ConfirmKind::Archive => Request::Update {
                        kind: self.kind(),
                        id: target,
                        body: UpdateBody::Status(RecordStatus::Archived),
                    },
                    ConfirmKind::Revert => Request::Revert { history_id: target },
                };
                self.issue(Slot::Confirm, request).into_iter().collect()
            }
            Key::Char('n' | 'N') | Key::Esc => {
                self.view = return_to;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn open_bulk_prompt(&mut self, field: BulkField) -> Vec<Command> {
        let caps = self.resource.capabilities();
        let supported = match field {
            BulkField::Tags => caps.bulk_tags,
            BulkField::Scopes => caps.bulk_scopes,
        };
        if !supported {
            self.error = Some(format!(
                "{} do not support bulk {}",
                self.kind().label(),
                field.as_str()
            ));
        } else if self.bulk.is_empty() {
            self.error = Some("select rows with space first".to_owned());
        } else {
            self.prompt.clear();
            self.view = View::BulkPrompt(field);
        }
        Vec::new()
    }

    fn handle_bulk_prompt_key(&mut self, key: Key, field: BulkField) -> Vec<Command> {
        match key {
            Key::Esc => {
                self.prompt.clear();
                self.view = self.list_view();
                Vec::new()
            }
            Key::Enter => {
                let op = match parse_bulk_input(field, &self.prompt) {
                    Ok(op) => op,
                    Err(error) => {
                        self.error = Some(format!("{error:#}"));
                        return Vec::new();
                    }
                };
                let request = Request::BulkUpdate {
                    kind: self.kind(),
                    ids: self.bulk.ids(),
                    op,
                };
                let commands: Vec<Command> = self.issue(Slot::Bulk, request).into_iter().collect();
                if !commands.is_empty() {
                    self.prompt.clear();
                    self.view = self.list_view();
                }
                commands
            }
            Key::Backspace => {
                self.prompt.pop();
                Vec::new()
            }
            Key::Ctrl('u') => {
                self.prompt.clear();
                Vec::new()
            }
            other => {
                if let Some(ch) = other.printable() {
                    self.prompt.push(ch);
                }
                Vec::new()
            }
        }
    }

    fn handle_form_key(&mut self, key: Key) -> Vec<Command> {
        let Some(form) = self.form.as_mut() else {
            self.view = self.list_view();
            return Vec::new();
        };
        match key {
            Key::Esc => {
                self.cancel_form();
                Vec::new()
            }
            Key::Ctrl('s') => self.save_form(),
            Key::Tab => {
                let completes_scope = form
                    .focused_spec()
                    .is_some_and(|spec| spec.kind == FieldKind::Scopes);
                let completed = completes_scope
                    && form
                        .focused_set_mut()
                        .is_some_and(|set| set.complete_from(self.known_scopes.iter()));
                if !completed {
                    form.focus_next();
                }
                Vec::new()
            }
            Key::Down => {
                form.focus_next();
                Vec::new()
            }
            Key::BackTab | Key::Up => {
                form.focus_prev();
                Vec::new()
            }
            other => {
                if let FieldOutcome::OpenEditor(syntax) = form.handle_key(other) {
                    let field = form.focus();
                    let label = form.focused_spec().map_or("", |spec| spec.label);
                    let buffer = form.structured_at(field).unwrap_or_default().to_owned();
                    self.editors.push(StructuredEditor {
                        field,
                        label,
                        syntax,
                        buffer,
                    });
                }
                Vec::new()
            }
        }
    }

    fn cancel_form(&mut self) {
        self.form = None;
        self.view = match self.view {
            View::Edit => View::Detail,
            View::Relate(RelateStep::Details) => {
                self.relate.target = None;
                View::Relate(RelateStep::Target)
            }
            _ => self.list_view(),
        };
    }

    fn open_form(&mut self, form: FormState) {
        self.form_token += 1;
        self.form = Some(form);
    }

    fn save_form(&mut self) -> Vec<Command> {
        if self.request(Slot::Save).is_pending() {
            self.error = Some("save already in progress".to_owned());
            return Vec::new();
        }
        let Some(form) = self.form.as_ref() else {
            return Vec::new();
        };
        let kind = self.kind();
        let built = match (&self.view, &self.detail) {
            (View::Add, _) => self
                .resource
                .build_payload(form, None)
                .map(Request::Create),
            (View::Edit, Some(record)) => self
                .resource
                .build_payload(form, Some(record))
                .map(|payload| Request::Update {
                    kind,
                    id: record.id.clone(),
                    body: UpdateBody::Full(payload),
                }),
            (View::Relate(RelateStep::Details), _) => {
                match (&self.relate.source, &self.relate.target) {
                    (Some(source), Some(target)) => {
                        relationship_payload(source, target, form).map(Request::Create)
                    }
                    _ => Err(anyhow::anyhow!("pick a source and a target first")),
                }
            }
            _ => return Vec::new(),
        };
        match built {
            Ok(request) => {
                let token = self.form_token;
                self.issue(Slot::Save, request)
                    .map(|command| command.with_generation(token))
                    .into_iter()
                    .collect()
            }
            Err(error) => {
                self.error = Some(format!("{error:#}"));
                Vec::new()
            }
        }
    }

    fn handle_editor_key(&mut self, key: Key) {
        if key == Key::Esc {
            if let Some(editor) = self.editors.pop()
                && let Some(form) = self.form.as_mut()
            {
                form.set_structured_at(editor.field, editor.buffer);
            }
            return;
        }
        if let Some(editor) = self.editors.last_mut() {
            editor.handle_key(key);
        }
    }

    fn handle_relate_pick_key(&mut self, key: Key, step: RelateStep) -> Vec<Command> {
        match key {
            Key::Up => {
                self.relate.list.up();
                Vec::new()
            }
            Key::Down => {
                self.relate.list.down();
                Vec::new()
            }
            Key::Esc => {
                match step {
                    RelateStep::Target => {
                        self.relate.source = None;
                        self.view = View::Relate(RelateStep::Source);
                        return self.relate_query_changed(String::new());
                    }
                    _ => {
                        self.relate.restart();
                        self.view = self.list_view();
                    }
                }
                Vec::new()
            }
            Key::Enter => {
                let Some(picked) = self.relate.selected().cloned() else {
                    return Vec::new();
                };
                match step {
                    RelateStep::Source => {
                        self.relate.source = Some(picked);
                        self.view = View::Relate(RelateStep::Target);
                        self.relate_query_changed(String::new())
                    }
                    _ => {
                        if self
                            .relate
                            .source
                            .as_ref()
                            .is_some_and(|source| source.id == picked.id)
                        {
                            self.error = Some("pick a different target than the source".to_owned());
                            return Vec::new();
                        }
                        self.relate.target = Some(picked);
                        self.open_form(FormState::new(RELATE_FIELDS));
                        self.view = View::Relate(RelateStep::Details);
                        Vec::new()
                    }
                }
            }
            Key::Backspace => {
                let mut query = self.relate.query.clone();
                if query.pop().is_none() {
                    return Vec::new();
                }
                self.relate_query_changed(query)
            }
            Key::Ctrl('u') => self.relate_query_changed(String::new()),
            other => match other.printable() {
                Some(ch) => {
                    let mut query = self.relate.query.clone();
                    query.push(ch);
                    self.relate_query_changed(query)
                }
                None => Vec::new(),
            },
        }
    }

    fn relate_query_changed(&mut self, query: String) -> Vec<Command> {
        self.relate.query = query;
        self.relate.apply_filter();
        vec![self.candidate_query()]
    }

    fn candidate_query(&mut self) -> Command {
        self.relate.generation += 1;
        Command::new(
            self.kind(),
            Slot::Candidates,
            Request::Query {
                kind: ResourceKind::Entities,
                filter: QueryFilter {
                    search: self.relate.query.clone(),
                    include_archived: false,
                },
            },
        )
        .with_generation(self.relate.generation)
    }

    /// Issues a fresh list query tagged with a new generation; results for
    /// any older generation are dropped on arrival.
    pub fn reload(&mut self) -> Command {
        self.generation += 1;
        self.requests.insert(Slot::Load, RequestState::Pending);
        Command::new(
            self.kind(),
            Slot::Load,
            Request::Query {
                kind: self.kind(),
                filter: QueryFilter {
                    search: self.search.clone(),
                    include_archived: self.include_archived,
                },
            },
        )
        .with_generation(self.generation)
    }

    /// Marks the slot pending and builds its command, or reports that the
    /// slot is still busy.
    fn issue(&mut self, slot: Slot, request: Request) -> Option<Command> {
        if self.request(slot).is_pending() {
            tracing::debug!(tab = self.kind().as_str(), ?slot, "slot busy, command skipped");
            if matches!(slot, Slot::Save | Slot::Bulk | Slot::Confirm) {
                self.error = Some(format!("{} already in progress", request.describe()));
            }
            return None;
        }
        self.requests.insert(slot, RequestState::Pending);
        Some(Command::new(self.kind(), slot, request))
    }

    pub fn handle_result(&mut self, event: ResultEvent) -> Vec<Command> {
        let current = match event.slot {
            Slot::Load => Some(self.generation),
            Slot::Candidates => Some(self.relate.generation),
            _ => None,
        };
        if let Some(current) = current
            && event.generation != current
        {
            tracing::debug!(
                tab = self.kind().as_str(),
                slot = ?event.slot,
                stale = event.generation,
                current,
                "dropping stale result"
            );
            return Vec::new();
        }

        let response = match event.outcome {
            Ok(response) => response,
            Err(message) => {
                self.fail_all(event.slot, message);
                return Vec::new();
            }
        };
        self.requests.insert(event.slot, RequestState::Idle);

        match (event.slot, response) {
            (Slot::Load, Response::Records(records)) => {
                self.apply_rows(records);
                Vec::new()
            }
            (Slot::Candidates, Response::Records(records)) => {
                if self.relate.query.is_empty() {
                    self.relate.catalog = records.clone();
                }
                self.relate.candidates = records;
                self.relate.sync_labels();
                Vec::new()
            }
            (Slot::Detail, Response::Record(record)) => {
                self.refresh_detail(record);
                Vec::new()
            }
            (Slot::Save, Response::Record(record)) => self.saved(event.generation, record),
            (Slot::Confirm, Response::Record(record)) => {
                self.notice = Some(format!("archived {}", record.title));
                self.refresh_detail(record);
                vec![self.reload()]
            }
            (Slot::Confirm, Response::Reverted) => {
                self.notice = Some("change reverted".to_owned());
                vec![self.reload()]
            }
            (Slot::Bulk, Response::Updated(count)) => {
                self.bulk.clear();
                self.notice = Some(format!(
                    "updated {count} {}",
                    if count == 1 { "record" } else { "records" }
                ));
                vec![self.reload()]
            }
            (Slot::Scopes, Response::Names(names)) => {
                self.known_scopes = names;
                Vec::new()
            }
            (Slot::Actors, Response::Names(names)) => {
                self.known_actors = names;
                Vec::new()
            }
            (slot, response) => {
                tracing::warn!(?slot, ?response, "unexpected response for slot");
                Vec::new()
            }
        }
    }

    /// Any remote failure clears every in-flight flag and surfaces its
    /// message; the failing slot keeps it.
    fn fail_all(&mut self, slot: Slot, message: String) {
        for state in self.requests.values_mut() {
            *state = RequestState::Idle;
        }
        self.requests
            .insert(slot, RequestState::Failed(message.clone()));
        self.error = Some(message);
    }

    fn apply_rows(&mut self, records: Vec<Record>) {
        if self.search.is_empty() {
            self.catalog = records.clone();
        }
        self.rows = records;
        self.sync_labels();
    }

    fn refresh_detail(&mut self, record: Record) {
        if self
            .detail
            .as_ref()
            .is_some_and(|current| current.id == record.id)
        {
            self.detail = Some(record);
        }
    }

    fn saved(&mut self, token: u64, record: Record) -> Vec<Command> {
        let owns_open_form = token == self.form_token
            && self.form.is_some()
            && matches!(
                self.view,
                View::Add | View::Edit | View::Relate(RelateStep::Details)
            );
        self.notice = Some(format!("saved {} {}", record.kind.noun(), record.title));
        if owns_open_form {
            self.form = None;
            self.editors.clear();
            self.relate.restart();
            self.detail = Some(record);
            self.view = View::Detail;
        } else {
            self.refresh_detail(record);
        }
        vec![self.reload()]
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfirmKind, Engine, ListFocus, StructuredEditor, ToggleChoice, View};
    use crate::command::{Command, Request, Response, ResultEvent, Slot};
    use crate::forms::Syntax;
    use crate::keys::Key;
    use crate::model::{Record, ResourceKind};

    fn loaded(kind: ResourceKind, titles: &[&str]) -> Engine {
        let mut engine = Engine::new(kind);
        let load = engine.activate().remove(0);
        let records = titles
            .iter()
            .enumerate()
            .map(|(index, title)| Record::new(kind, format!("id-{index}"), *title))
            .collect();
        engine.handle_result(respond(&load, Ok(Response::Records(records))));
        engine
    }

    fn respond(command: &Command, outcome: Result<Response, String>) -> ResultEvent {
        ResultEvent {
            tab: command.tab,
            slot: command.slot,
            generation: command.generation,
            outcome,
        }
    }

    #[test]
    fn confirm_tags_name_the_subject() {
        assert_eq!(
            ConfirmKind::Archive.tag(ResourceKind::Entities),
            "entity-archive"
        );
        assert_eq!(
            ConfirmKind::Revert.tag(ResourceKind::History),
            "history-revert"
        );
    }

    #[test]
    fn activation_loads_once_and_history_also_lists_actors() {
        let mut engine = Engine::new(ResourceKind::History);
        let commands = engine.activate();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].request, Request::ListActors);
        assert!(engine.activate().is_empty());
    }

    #[test]
    fn up_from_first_row_focuses_toggle_and_enter_opens_add() {
        let mut engine = loaded(ResourceKind::Jobs, &["Ship", "Fix"]);
        engine.handle_key(Key::Up);
        assert_eq!(engine.focus(), ListFocus::Toggle(ToggleChoice::Add));
        engine.handle_key(Key::Right);
        assert_eq!(engine.focus(), ListFocus::Toggle(ToggleChoice::Library));
        engine.handle_key(Key::Left);
        engine.handle_key(Key::Enter);
        assert_eq!(engine.view(), &View::Add);
        assert_eq!(engine.focus(), ListFocus::Rows);
    }

    #[test]
    fn typing_while_toggle_focused_does_not_search() {
        let mut engine = loaded(ResourceKind::Jobs, &["Ship"]);
        engine.handle_key(Key::Up);
        assert!(engine.handle_key(Key::Char('s')).is_empty());
        assert_eq!(engine.search(), "");
        engine.handle_key(Key::Down);
        assert_eq!(engine.focus(), ListFocus::Rows);
    }

    #[test]
    fn stale_load_results_are_dropped() {
        let mut engine = loaded(ResourceKind::Entities, &["Alpha", "Beta"]);
        let first = engine.handle_key(Key::Char('a')).remove(0);
        let second = engine.handle_key(Key::Char('l')).remove(0);
        assert!(second.generation > first.generation);

        let fresh = vec![Record::new(ResourceKind::Entities, "id-0", "Alpha")];
        engine.handle_result(respond(&second, Ok(Response::Records(fresh))));
        let stale = vec![Record::new(ResourceKind::Entities, "id-9", "Gamma")];
        engine.handle_result(respond(&first, Ok(Response::Records(stale))));

        assert_eq!(engine.rows().len(), 1);
        assert_eq!(engine.rows()[0].title, "Alpha");
    }

    #[test]
    fn search_view_tracks_buffer() {
        let mut engine = loaded(ResourceKind::Entities, &["Alpha"]);
        engine.handle_key(Key::Char('x'));
        assert_eq!(engine.view(), &View::Search);
        engine.handle_key(Key::Backspace);
        assert_eq!(engine.view(), &View::List);
        engine.handle_key(Key::Char('x'));
        engine.handle_key(Key::Esc);
        assert_eq!(engine.view(), &View::List);
        assert_eq!(engine.rows().len(), 1);
    }

    #[test]
    fn space_inside_search_extends_the_buffer() {
        let mut engine = loaded(ResourceKind::Entities, &["Alpha Centauri"]);
        engine.handle_key(Key::Char('a'));
        engine.handle_key(Key::Char(' '));
        assert_eq!(engine.search(), "a ");
        assert!(engine.bulk().is_empty());
    }

    #[test]
    fn structured_editor_reports_live_status() {
        let mut editor = StructuredEditor {
            field: 0,
            label: "Metadata",
            syntax: Syntax::Metadata,
            buffer: "profile:\n  age: 17".to_owned(),
        };
        assert_eq!(editor.status(), Ok("ok (1 keys)".to_owned()));
        editor.handle_key(Key::Enter);
        editor.handle_key(Key::Char(' '));
        editor.handle_key(Key::Char('x'));
        assert_eq!(
            editor.status(),
            Err("line 3: indentation must be a multiple of 2 spaces (found 1)".to_owned())
        );
        editor.handle_key(Key::Ctrl('u'));
        assert_eq!(editor.buffer, "profile:\n  age: 17\n");
    }

    #[test]
    fn load_failure_is_surfaced_and_clears_flags() {
        let mut engine = Engine::new(ResourceKind::Logs);
        let load = engine.activate().remove(0);
        assert!(engine.request(Slot::Load).is_pending());
        engine.handle_result(respond(&load, Err("connection refused".to_owned())));
        assert!(!engine.request(Slot::Load).is_pending());
        assert_eq!(engine.error(), Some("connection refused"));
    }
}
