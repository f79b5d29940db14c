// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use recdesk_app::render::{self as view, Tone};
use recdesk_app::{
    AppCommand, AppEvent, Command, Desk, Engine, Gateway, Key, Outcome, ResourceKind, ResultEvent,
    Slot, View,
};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const TAB_BAR_ROWS: u16 = 3;
const STATUS_BAR_ROWS: u16 = 2;
const BODY_BORDER_ROWS: u16 = 2;
/// Header, toggle, search and footer lines around the rows of a list view.
const LIST_CHROME_ROWS: u16 = 4;

pub type SharedGateway = Arc<dyn Gateway + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Completed(ResultEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub status_clear: Duration,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            status_clear: Duration::from_secs(4),
        }
    }
}

/// Off-thread command execution plus the status-line timer. Every command
/// runs on its own worker thread and reports back exactly once.
struct Scheduler {
    gateway: SharedGateway,
    tx: Sender<InternalEvent>,
    status_token: u64,
    status_clear: Duration,
}

impl Scheduler {
    fn new(gateway: SharedGateway, tx: Sender<InternalEvent>, options: UiOptions) -> Self {
        Self {
            gateway,
            tx,
            status_token: 0,
            status_clear: options.status_clear,
        }
    }

    fn spawn(&self, command: Command) {
        tracing::debug!(
            tab = command.tab.as_str(),
            slot = ?command.slot,
            request = %command.request.describe(),
            "dispatching command"
        );
        let gateway = Arc::clone(&self.gateway);
        let sender = self.tx.clone();
        thread::spawn(move || {
            let event = command.invoke(gateway.as_ref());
            let _ = sender.send(InternalEvent::Completed(event));
        });
    }

    fn schedule_status_clear(&self) {
        let sender = self.tx.clone();
        let token = self.status_token;
        let delay = self.status_clear;
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = sender.send(InternalEvent::ClearStatus { token });
        });
    }

    fn apply(&mut self, outcome: Outcome) {
        for command in outcome.commands {
            self.spawn(command);
        }
        if outcome
            .events
            .iter()
            .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
        {
            self.status_token = self.status_token.saturating_add(1);
            self.schedule_status_clear();
        }
    }
}

pub fn run_app(desk: &mut Desk, gateway: SharedGateway, options: UiOptions) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let result = match Terminal::new(backend).context("create terminal") {
        Ok(mut terminal) => event_loop(&mut terminal, desk, gateway, options),
        Err(error) => Err(error),
    };

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    tracing::info!("terminal restored");
    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    desk: &mut Desk,
    gateway: SharedGateway,
    options: UiOptions,
) -> Result<()> {
    let (internal_tx, internal_rx) = mpsc::channel();
    let mut scheduler = Scheduler::new(gateway, internal_tx, options);

    let size = terminal.size().context("read terminal size")?;
    desk.set_viewport_height(list_viewport_rows(size.height));
    let commands = desk.start();
    scheduler.apply(Outcome {
        commands,
        events: Vec::new(),
    });
    tracing::info!(tab = desk.state.active_tab.as_str(), "event loop started");

    while !desk.state.quit {
        process_internal_events(desk, &mut scheduler, &internal_rx);

        terminal
            .draw(|frame| render(frame, desk))
            .context("draw frame")?;

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if !has_event {
            continue;
        }
        match event::read().context("read event")? {
            Event::Key(key) => {
                if let Some(key) = key_from_event(key) {
                    let outcome = desk.handle_key(key);
                    scheduler.apply(outcome);
                }
            }
            Event::Resize(_, height) => desk.set_viewport_height(list_viewport_rows(height)),
            _ => {}
        }
    }
    Ok(())
}

fn process_internal_events(
    desk: &mut Desk,
    scheduler: &mut Scheduler,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(desk, scheduler, event);
    }
}

fn handle_internal_event(desk: &mut Desk, scheduler: &mut Scheduler, event: InternalEvent) {
    match event {
        InternalEvent::ClearStatus { token } if token == scheduler.status_token => {
            desk.dispatch(AppCommand::ClearStatus);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::Completed(result) => {
            let outcome = desk.handle_result(result);
            scheduler.apply(outcome);
        }
    }
}

pub fn key_from_event(key: KeyEvent) -> Option<Key> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let translated = match key.code {
        KeyCode::Char(ch) if ctrl => Key::Ctrl(ch.to_ascii_lowercase()),
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => Key::BackTab,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        _ => return None,
    };
    Some(translated)
}

fn list_viewport_rows(height: u16) -> usize {
    let chrome = TAB_BAR_ROWS + STATUS_BAR_ROWS + BODY_BORDER_ROWS + LIST_CHROME_ROWS;
    usize::from(height.saturating_sub(chrome).max(1))
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Normal => Style::default(),
        Tone::Header => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        Tone::Selected => Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
        Tone::Marked => Style::default().fg(Color::Yellow),
        Tone::Dim => Style::default().fg(Color::DarkGray),
        Tone::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Tone::Notice => Style::default().fg(Color::Green),
        Tone::Hint => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    }
}

fn to_widget_line(line: view::Line) -> ratatui::text::Line<'static> {
    ratatui::text::Line::from(
        line.spans
            .into_iter()
            .map(|span| ratatui::text::Span::styled(span.text, tone_style(span.tone)))
            .collect::<Vec<_>>(),
    )
}

fn tab_title(kind: ResourceKind, desk: &Desk) -> String {
    let Some(engine) = desk.engine(kind) else {
        return kind.label().to_owned();
    };
    let mut title = kind.label().to_owned();
    if !engine.bulk().is_empty() {
        title.push_str(&format!(" ({})", engine.bulk().count()));
    }
    if Slot::ALL
        .iter()
        .any(|slot| engine.request(*slot).is_pending())
    {
        title.push_str(" …");
    } else if engine.error().is_some() {
        title.push_str(" !");
    }
    title
}

fn view_hints(engine: &Engine) -> &'static str {
    let caps = engine.resource().capabilities();
    if engine.editor().is_some() {
        return "enter newline | tab indent | ctrl+u clear line | esc close";
    }
    match engine.view() {
        View::List | View::Search if caps.bulk_scopes => {
            "enter open | type search | tab accept | space mark | ctrl+b tags | ctrl+g scopes | ctrl+a archived | ctrl+r reload"
        }
        View::List | View::Search if caps.bulk_tags => {
            "enter open | type search | tab accept | space mark | ctrl+b tags | ctrl+a archived | ctrl+r reload"
        }
        View::List | View::Search => {
            "enter open | type search | tab accept | ctrl+a archived | ctrl+r reload"
        }
        View::Detail if caps.revert => "r revert | esc back",
        View::Detail if caps.archive => "e edit | a archive | esc back",
        View::Detail => "e edit | esc back",
        View::Add | View::Edit => "tab/shift+tab fields | enter editor | ctrl+s save | esc cancel",
        View::Confirm { .. } => "y confirm | n cancel",
        View::BulkPrompt(_) => "enter apply | esc cancel",
        View::Relate(_) => "type filter | up/down move | enter pick | esc back",
    }
}

fn status_text(desk: &Desk) -> String {
    let hints = desk.active().map(view_hints).unwrap_or_default();
    let default = format!("{hints} | ctrl+n/ctrl+p tabs | ctrl+q quit");
    match &desk.state.status_line {
        Some(status) => format!("{status} | {default}"),
        None => default,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, desk: &Desk) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(TAB_BAR_ROWS),
            Constraint::Min(1),
            Constraint::Length(STATUS_BAR_ROWS),
        ])
        .split(frame.area());

    let selected = ResourceKind::ALL
        .iter()
        .position(|kind| *kind == desk.state.active_tab)
        .unwrap_or(0);
    let titles = ResourceKind::ALL
        .iter()
        .map(|kind| tab_title(*kind, desk))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("recdesk").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    let body_width = usize::from(layout[1].width.saturating_sub(2));
    let lines = desk
        .active()
        .map(|engine| view::render(engine, body_width))
        .unwrap_or_default()
        .into_iter()
        .map(to_widget_line)
        .collect::<Vec<_>>();
    let body = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, layout[1]);

    let status = Paragraph::new(status_text(desk))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);
}
