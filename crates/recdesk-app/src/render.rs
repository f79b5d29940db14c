// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Terminal-agnostic view output. The engine is rendered into styled lines;
//! the TUI maps tones onto its own palette.

use crate::command::Slot;
use crate::engine::{ConfirmKind, Engine, ListFocus, RelateStep, ToggleChoice, View};
use crate::forms::{FieldValue, FormState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Header,
    Selected,
    Marked,
    Dim,
    Error,
    Notice,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self::default().push(text, tone)
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::toned(text, Tone::Normal)
    }

    pub fn push(mut self, text: impl Into<String>, tone: Tone) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.spans.push(Span { text, tone });
        }
        self
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }

    fn truncated(mut self, width: usize) -> Self {
        let mut remaining = width;
        let mut kept = Vec::with_capacity(self.spans.len());
        for mut span in self.spans {
            if remaining == 0 {
                break;
            }
            let count = span.text.chars().count();
            if count > remaining {
                span.text = span.text.chars().take(remaining).collect();
            }
            remaining -= count.min(remaining);
            kept.push(span);
        }
        self.spans = kept;
        self
    }
}

pub fn render(engine: &Engine, width: usize) -> Vec<Line> {
    let mut lines = vec![header(engine)];
    match engine.view() {
        View::List | View::Search => render_list(engine, &mut lines),
        View::Detail => render_detail(engine, &mut lines),
        View::Add | View::Edit => render_form(engine, &mut lines),
        View::Confirm { kind, .. } => render_confirm(engine, *kind, &mut lines),
        View::BulkPrompt(field) => {
            lines.push(
                Line::toned(
                    format!("bulk {} for {} selected: ", field.as_str(), engine.bulk().count()),
                    Tone::Header,
                )
                .push(engine.prompt(), Tone::Normal)
                .push("_", Tone::Dim),
            );
            lines.push(Line::toned(
                "add:a,b  remove:a  set:a,b  (or + - =)  enter apply  esc cancel",
                Tone::Hint,
            ));
        }
        View::Relate(step) => render_relate(engine, *step, &mut lines),
    }
    if let Some(error) = engine.error() {
        lines.push(Line::toned(format!("error: {error}"), Tone::Error));
    } else if let Some(notice) = engine.notice() {
        lines.push(Line::toned(notice, Tone::Notice));
    }
    lines
        .into_iter()
        .map(|line| line.truncated(width))
        .collect()
}

fn header(engine: &Engine) -> Line {
    let mut line = Line::toned(engine.kind().label(), Tone::Header).push(
        format!("  {} shown", engine.rows().len()),
        Tone::Dim,
    );
    if !engine.bulk().is_empty() {
        line = line.push(format!("  {} marked", engine.bulk().count()), Tone::Marked);
    }
    if engine.include_archived() {
        line = line.push("  +archived", Tone::Dim);
    }
    if engine.request(Slot::Load).is_pending() {
        line = line.push("  loading...", Tone::Dim);
    }
    line
}

fn render_list(engine: &Engine, lines: &mut Vec<Line>) {
    let toggle = |choice: ToggleChoice, label: &str| {
        let tone = if engine.focus() == ListFocus::Toggle(choice) {
            Tone::Selected
        } else {
            Tone::Dim
        };
        (format!("[ {label} ]"), tone)
    };
    let (add, add_tone) = toggle(ToggleChoice::Add, "Add");
    let (library, library_tone) = toggle(ToggleChoice::Library, "Library");
    lines.push(
        Line::default()
            .push(add, add_tone)
            .push(" ", Tone::Normal)
            .push(library, library_tone),
    );

    let mut search = Line::toned("/ ", Tone::Dim).push(engine.search(), Tone::Normal);
    if let Some(completion) = engine.suggestion() {
        let rest: String = completion.chars().skip(engine.search().chars().count()).collect();
        search = search.push(rest, Tone::Dim);
    }
    lines.push(search);

    let list = engine.list();
    if list.is_empty() {
        let empty = if engine.request(Slot::Load).is_pending() {
            "loading..."
        } else {
            "no records"
        };
        lines.push(Line::toned(empty, Tone::Dim));
        return;
    }
    for (relative, label) in list.visible().iter().enumerate() {
        let absolute = list.relative_to_absolute(relative);
        let marked = engine
            .rows()
            .get(absolute)
            .is_some_and(|record| engine.bulk().contains(&record.id));
        let marker = if marked { "* " } else { "  " };
        let tone = if list.is_selected(absolute) && engine.focus() == ListFocus::Rows {
            Tone::Selected
        } else if marked {
            Tone::Marked
        } else {
            Tone::Normal
        };
        lines.push(Line::toned(format!("{marker}{label}"), tone));
    }
}

fn render_detail(engine: &Engine, lines: &mut Vec<Line>) {
    let Some(record) = engine.detail() else {
        lines.push(Line::toned("nothing selected", Tone::Dim));
        return;
    };
    let resource = engine.resource();
    lines.push(Line::toned(record.title.clone(), Tone::Header));
    for (label, value) in resource.detail_lines(record) {
        lines.push(Line::toned(format!("{label}: "), Tone::Dim).push(value, Tone::Normal));
    }
    let body = resource.detail_body(record);
    if !body.is_empty() {
        lines.push(Line::default());
        lines.extend(body.lines().map(Line::plain));
    }
    let caps = resource.capabilities();
    let mut hints = Vec::new();
    if caps.edit {
        hints.push("e edit");
    }
    if caps.archive {
        hints.push("a archive");
    }
    if caps.revert {
        hints.push("r revert");
    }
    hints.push("esc back");
    lines.push(Line::toned(hints.join("  "), Tone::Hint));
}

fn render_form(engine: &Engine, lines: &mut Vec<Line>) {
    let Some(form) = engine.form() else {
        return;
    };
    let title = match engine.view() {
        View::Edit => format!("edit {}", engine.kind().noun()),
        View::Relate(_) => "relationship details".to_owned(),
        _ => format!("new {}", engine.kind().noun()),
    };
    lines.push(Line::toned(title, Tone::Header));

    if let Some(editor) = engine.editor() {
        lines.push(Line::toned(
            format!("{} (esc to close)", editor.label.to_lowercase()),
            Tone::Dim,
        ));
        lines.extend(editor.buffer.split('\n').map(Line::plain));
        lines.push(match editor.status() {
            Ok(status) => Line::toned(status, Tone::Notice),
            Err(error) => Line::toned(error, Tone::Error),
        });
        return;
    }

    form_fields(form, lines);
    let saving = if engine.request(Slot::Save).is_pending() {
        "saving...  "
    } else {
        ""
    };
    lines.push(Line::toned(
        format!("{saving}tab next  shift+tab prev  ctrl+s save  esc cancel"),
        Tone::Hint,
    ));
}

fn form_fields(form: &FormState, lines: &mut Vec<Line>) {
    for (index, (spec, value)) in form.specs().iter().zip(form.values()).enumerate() {
        let focused = index == form.focus();
        let marker = if focused { "> " } else { "  " };
        let required = if spec.required { "*" } else { "" };
        let label_tone = if focused { Tone::Selected } else { Tone::Dim };
        let line = Line::toned(format!("{marker}{}{required}: ", spec.label), label_tone);
        let line = match value {
            FieldValue::Text(text) => line.push(text.clone(), Tone::Normal),
            FieldValue::Choice { index, options } => {
                let current = options.get(*index).copied().unwrap_or_default();
                line.push(format!("< {current} >"), Tone::Normal)
            }
            FieldValue::Set(set) => {
                let committed = set
                    .committed
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                let spacer = if committed.is_empty() || set.staging.is_empty() {
                    ""
                } else {
                    " "
                };
                line.push(committed, Tone::Normal)
                    .push(format!("{spacer}{}", set.staging), Tone::Dim)
            }
            FieldValue::Structured(text) => {
                let summary = match text.lines().count() {
                    0 => "(enter to edit)".to_owned(),
                    1 => text.trim().to_owned(),
                    count => format!("{count} lines (enter to edit)"),
                };
                line.push(summary, Tone::Normal)
            }
        };
        lines.push(line);
    }
}

fn render_confirm(engine: &Engine, kind: ConfirmKind, lines: &mut Vec<Line>) {
    let subject = engine
        .detail()
        .map(|record| record.title.clone())
        .unwrap_or_else(|| "this record".to_owned());
    let question = match kind {
        ConfirmKind::Archive => format!("archive {} {subject}?", engine.kind().noun()),
        ConfirmKind::Revert => format!("revert the change recorded by {subject}?"),
    };
    lines.push(Line::toned(question, Tone::Header));
    lines.push(Line::toned("y confirm  n/esc cancel", Tone::Hint));
}

fn render_relate(engine: &Engine, step: RelateStep, lines: &mut Vec<Line>) {
    let name = |record: Option<&crate::model::Record>| {
        record.map_or_else(|| "?".to_owned(), |record| record.title.clone())
    };
    lines.push(Line::toned(
        format!(
            "relate: {} -> {}",
            name(engine.relate_source()),
            name(engine.relate_target())
        ),
        Tone::Header,
    ));
    if step == RelateStep::Details {
        render_form(engine, lines);
        return;
    }
    let prompt = match step {
        RelateStep::Source => "pick source: ",
        _ => "pick target: ",
    };
    lines.push(Line::toned(prompt, Tone::Dim).push(engine.relate_query(), Tone::Normal));
    let list = engine.relate_list();
    if list.is_empty() {
        lines.push(Line::toned("no matching entities", Tone::Dim));
    }
    for (relative, label) in list.visible().iter().enumerate() {
        let tone = if list.is_selected(list.relative_to_absolute(relative)) {
            Tone::Selected
        } else {
            Tone::Normal
        };
        lines.push(Line::toned(format!("  {label}"), tone));
    }
    lines.push(Line::toned(
        "type to filter  enter pick  esc back",
        Tone::Hint,
    ));
}
