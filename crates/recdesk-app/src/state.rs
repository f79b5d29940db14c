// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::command::{Command, ResultEvent};
use crate::engine::Engine;
use crate::keys::Key;
use crate::model::ResourceKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub active_tab: ResourceKind,
    pub status_line: Option<String>,
    pub quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_tab: ResourceKind::Entities,
            status_line: None,
            quit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SelectTab(ResourceKind),
    SetStatus(String),
    ClearStatus,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    TabChanged(ResourceKind),
    StatusUpdated(String),
    StatusCleared,
    QuitRequested,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(tab) => {
                self.active_tab = tab;
                vec![AppEvent::TabChanged(tab)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::Quit => {
                self.quit = true;
                vec![AppEvent::QuitRequested]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = ResourceKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

/// All tabs plus the global state. Routes keys to the active engine and
/// results to whichever engine issued the command.
#[derive(Debug)]
pub struct Desk {
    pub state: AppState,
    engines: BTreeMap<ResourceKind, Engine>,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub commands: Vec<Command>,
    pub events: Vec<AppEvent>,
}

impl Desk {
    pub fn new(start_tab: ResourceKind) -> Self {
        Self {
            state: AppState {
                active_tab: start_tab,
                ..AppState::default()
            },
            engines: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, Engine::new(kind)))
                .collect(),
        }
    }

    pub fn engine(&self, kind: ResourceKind) -> Option<&Engine> {
        self.engines.get(&kind)
    }

    pub fn active(&self) -> Option<&Engine> {
        self.engine(self.state.active_tab)
    }

    fn active_mut(&mut self) -> Option<&mut Engine> {
        self.engines.get_mut(&self.state.active_tab)
    }

    /// Loads the starting tab.
    pub fn start(&mut self) -> Vec<Command> {
        self.active_mut().map(Engine::activate).unwrap_or_default()
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        for engine in self.engines.values_mut() {
            engine.set_viewport_height(height);
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Outcome {
        let events = self.state.dispatch(command);
        let mut commands = Vec::new();
        if events
            .iter()
            .any(|event| matches!(event, AppEvent::TabChanged(_)))
            && let Some(engine) = self.active_mut()
        {
            commands = engine.activate();
        }
        Outcome { commands, events }
    }

    pub fn handle_key(&mut self, key: Key) -> Outcome {
        if key == Key::Ctrl('q') {
            return self.dispatch(AppCommand::Quit);
        }
        let modal = self.active().is_some_and(Engine::is_modal);
        if !modal {
            match key {
                Key::Ctrl('n') => return self.dispatch(AppCommand::NextTab),
                Key::Ctrl('p') => return self.dispatch(AppCommand::PrevTab),
                _ => {}
            }
        }
        Outcome {
            commands: self
                .active_mut()
                .map(|engine| engine.handle_key(key))
                .unwrap_or_default(),
            events: Vec::new(),
        }
    }

    /// Feeds a result to the tab that issued it. Failures on a background
    /// tab also land in the global status line.
    pub fn handle_result(&mut self, event: ResultEvent) -> Outcome {
        let tab = event.tab;
        let failure = event.outcome.as_ref().err().cloned();
        let Some(engine) = self.engines.get_mut(&tab) else {
            return Outcome::default();
        };
        let commands = engine.handle_result(event);
        let mut events = Vec::new();
        if tab != self.state.active_tab
            && let Some(message) = failure
        {
            events = self
                .state
                .dispatch(AppCommand::SetStatus(format!("{}: {message}", tab.label())));
        }
        Outcome { commands, events }
    }
}
