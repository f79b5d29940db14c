// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Indented `key: value` mini-language used by every metadata editor.
//!
//! Nesting is expressed only through 2-space indentation. Lists are inline
//! (`[a, b]`) and hold scalars only. Serialization always emits keys in
//! sorted order, so `parse(serialize(tree)) == tree` holds structurally but
//! the operator's original line order is not preserved.

use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

const INDENT_WIDTH: usize = 2;

pub type MetaMap = BTreeMap<String, MetaValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Map(MetaMap),
}

impl MetaValue {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    pub fn as_map(&self) -> Option<&MetaMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("indentation must be a multiple of 2 spaces (found {0})")]
    OddIndent(usize),
    #[error("tabs are not allowed in indentation")]
    TabIndent,
    #[error("unexpected indentation; nest only under a `key:` line")]
    UnexpectedIndent,
    #[error("list items (`- `) are not supported; use inline [a, b] syntax")]
    ListItemLine,
    #[error("inline objects not supported yet; nest with indentation instead")]
    InlineObject,
    #[error("expected `key: value` or `key:`")]
    MissingColon,
    #[error("key must not be empty")]
    EmptyKey,
    #[error("duplicate key {0:?}")]
    DuplicateKey(String),
    #[error("list is missing its closing `]`")]
    UnterminatedList,
    #[error("lists may only contain scalars")]
    NestedList,
    #[error("list contains an empty item")]
    EmptyListItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    /// 1-based line number in the source text.
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn at(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

struct SourceLine<'a> {
    number: usize,
    depth: usize,
    content: &'a str,
}

pub fn parse_metadata(text: &str) -> Result<MetaMap, ParseError> {
    let lines = split_lines(text)?;
    let mut cursor = 0;
    parse_block(&lines, &mut cursor, 0)
}

fn split_lines(text: &str) -> Result<Vec<SourceLine<'_>>, ParseError> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let raw = raw.trim_end();
        if raw.trim().is_empty() {
            continue;
        }

        let content = raw.trim_start_matches(' ');
        let indent = raw.len() - content.len();
        if content.starts_with('\t') {
            return Err(ParseError::at(number, ParseErrorKind::TabIndent));
        }
        if indent % INDENT_WIDTH != 0 {
            return Err(ParseError::at(number, ParseErrorKind::OddIndent(indent)));
        }
        lines.push(SourceLine {
            number,
            depth: indent / INDENT_WIDTH,
            content,
        });
    }
    Ok(lines)
}

fn parse_block(
    lines: &[SourceLine<'_>],
    cursor: &mut usize,
    depth: usize,
) -> Result<MetaMap, ParseError> {
    let mut map = MetaMap::new();
    while let Some(line) = lines.get(*cursor) {
        if line.depth < depth {
            break;
        }
        if line.depth > depth {
            return Err(ParseError::at(line.number, ParseErrorKind::UnexpectedIndent));
        }
        if line.content == "-" || line.content.starts_with("- ") {
            return Err(ParseError::at(line.number, ParseErrorKind::ListItemLine));
        }

        let Some((raw_key, raw_value)) = line.content.split_once(':') else {
            return Err(ParseError::at(line.number, ParseErrorKind::MissingColon));
        };
        let key = raw_key.trim();
        if key.is_empty() {
            return Err(ParseError::at(line.number, ParseErrorKind::EmptyKey));
        }
        if map.contains_key(key) {
            return Err(ParseError::at(
                line.number,
                ParseErrorKind::DuplicateKey(key.to_owned()),
            ));
        }

        let raw_value = raw_value.trim();
        *cursor += 1;
        let value = if raw_value.is_empty() {
            MetaValue::Map(parse_block(lines, cursor, depth + 1)?)
        } else {
            parse_value(raw_value).map_err(|kind| ParseError::at(line.number, kind))?
        };
        map.insert(key.to_owned(), value);
    }
    Ok(map)
}

fn parse_value(raw: &str) -> Result<MetaValue, ParseErrorKind> {
    if raw.starts_with('{') {
        return Err(ParseErrorKind::InlineObject);
    }
    if let Some(rest) = raw.strip_prefix('[') {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseErrorKind::UnterminatedList);
        };
        return parse_inline_list(inner);
    }
    Ok(parse_scalar(raw))
}

fn parse_inline_list(inner: &str) -> Result<MetaValue, ParseErrorKind> {
    if inner.trim().is_empty() {
        return Ok(MetaValue::List(Vec::new()));
    }

    let mut items = Vec::new();
    for token in split_list_items(inner) {
        let token = token.trim();
        if token.is_empty() {
            return Err(ParseErrorKind::EmptyListItem);
        }
        if token.starts_with('[') || token.starts_with('{') {
            return Err(ParseErrorKind::NestedList);
        }
        items.push(parse_scalar(token));
    }
    Ok(MetaValue::List(items))
}

fn split_list_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, ',') => {
                items.push(&inner[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

/// Types a bare token: booleans, null, integers, floats, quoted text, or raw
/// text, in that order. Floats that overflow to infinity stay text.
pub fn parse_scalar(token: &str) -> MetaValue {
    let lowered = token.to_ascii_lowercase();
    match lowered.as_str() {
        "true" => return MetaValue::Bool(true),
        "false" => return MetaValue::Bool(false),
        "null" | "nil" => return MetaValue::Null,
        _ => {}
    }
    if let Ok(value) = token.parse::<i64>() {
        return MetaValue::Int(value);
    }
    if looks_numeric(token)
        && let Ok(value) = token.parse::<f64>()
        && value.is_finite()
    {
        return MetaValue::Float(value);
    }
    if let Some(inner) = strip_quotes(token) {
        return MetaValue::String(inner.to_owned());
    }
    MetaValue::String(token.to_owned())
}

fn looks_numeric(token: &str) -> bool {
    token.chars().any(|ch| ch.is_ascii_digit())
        && token
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
}

fn strip_quotes(token: &str) -> Option<&str> {
    if token.len() < 2 {
        return None;
    }
    ['"', '\''].into_iter().find_map(|quote| {
        token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

pub fn serialize_metadata(map: &MetaMap) -> String {
    let mut out = String::new();
    write_map(&mut out, map, 0);
    out
}

fn write_map(out: &mut String, map: &MetaMap, depth: usize) {
    let pad = " ".repeat(depth * INDENT_WIDTH);
    for (key, value) in map {
        match value {
            MetaValue::Map(child) => {
                out.push_str(&format!("{pad}{key}:\n"));
                write_map(out, child, depth + 1);
            }
            MetaValue::List(items) => {
                let rendered = items
                    .iter()
                    .map(|item| format_scalar(item, true))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!("{pad}{key}: [{rendered}]\n"));
            }
            scalar => {
                out.push_str(&format!("{pad}{key}: {}\n", format_scalar(scalar, false)));
            }
        }
    }
}

fn format_scalar(value: &MetaValue, in_list: bool) -> String {
    match value {
        MetaValue::Null => "null".to_owned(),
        MetaValue::Bool(flag) => flag.to_string(),
        MetaValue::Int(number) => number.to_string(),
        MetaValue::Float(number) => format!("{number:?}"),
        MetaValue::String(text) => {
            if needs_quotes(text, in_list) {
                quote(text)
            } else {
                text.clone()
            }
        }
        // Lists never nest; a non-scalar that slipped in from the wire is
        // rendered as quoted JSON so it survives as text.
        other => quote(&serde_json::to_string(other).unwrap_or_default()),
    }
}

fn needs_quotes(text: &str, in_list: bool) -> bool {
    text.is_empty()
        || text.trim() != text
        || parse_scalar(text) != MetaValue::String(text.to_owned())
        || text.starts_with(['[', '{', '"', '\''])
        || (in_list && (text.contains(',') || text.contains(']')))
}

fn quote(text: &str) -> String {
    if text.contains('"') && !text.contains('\'') {
        format!("'{text}'")
    } else {
        format!("\"{text}\"")
    }
}

/// Converts wire JSON into a metadata map. Nested lists or objects inside a
/// list are kept as their JSON text so the result stays editable.
pub fn map_from_json(value: serde_json::Value) -> Result<MetaMap> {
    match value {
        serde_json::Value::Null => Ok(MetaMap::new()),
        serde_json::Value::Object(object) => Ok(object
            .into_iter()
            .map(|(key, value)| (key, value_from_json(value, false)))
            .collect()),
        other => bail!("metadata must be a JSON object, got {other}"),
    }
}

fn value_from_json(value: serde_json::Value, in_list: bool) -> MetaValue {
    use serde_json::Value;
    match value {
        Value::Null => MetaValue::Null,
        Value::Bool(flag) => MetaValue::Bool(flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => MetaValue::Int(int),
            None => MetaValue::Float(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => MetaValue::String(text),
        Value::Array(items) if !in_list => MetaValue::List(
            items
                .into_iter()
                .map(|item| value_from_json(item, true))
                .collect(),
        ),
        Value::Object(object) if !in_list => MetaValue::Map(
            object
                .into_iter()
                .map(|(key, value)| (key, value_from_json(value, false)))
                .collect(),
        ),
        nested => MetaValue::String(nested.to_string()),
    }
}

pub fn map_to_json(map: &MetaMap) -> serde_json::Value {
    serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
}
