// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Discrete key event delivered by the input layer, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    BackTab,
}

impl Key {
    /// Printable runes that feed text buffers. Control keys never do.
    pub fn printable(self) -> Option<char> {
        match self {
            Self::Char(ch) if !ch.is_control() => Some(ch),
            _ => None,
        }
    }
}
