//! Fragment format.
//!
//! Generated navigation data is written as JavaScript assignments whose
//! right-hand sides are JSON-compatible:
//!
//! ```text
//! var NAVTREE =
//! [
//!   [ "Intro", "intro.html", null ],
//!   [ "Reference", "ref.html", "ref_fragment" ]
//! ];
//!
//! var SYNCONMSG = 'click to disable panel synchronisation';
//! ```
//!
//! Each tree entry is `[title, target, children]`, optionally followed by a
//! fourth element naming a fragment to load lazily instead of `children`.
//! `children` is `null` for a leaf, an array of entries, or a fragment id.
//! A fragment may also be a bare JSON array without any assignment.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::node::{Children, FragmentId, TreeNode};
use crate::path::NodePath;

static VAR_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^var\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*").expect("valid declaration regex")
});

/// Error parsing a fragment.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    /// Text is not a sequence of assignments with JSON-compatible values.
    #[error("Syntax error in fragment {fragment} at byte {offset}: {message}")]
    Syntax {
        /// Fragment identifier.
        fragment: String,
        /// Byte offset of the offending value.
        offset: usize,
        /// Parser message.
        message: String,
    },
    /// Expected variable is not assigned in the fragment.
    #[error("Fragment {fragment} does not define `{name}`")]
    MissingVariable {
        /// Fragment identifier.
        fragment: String,
        /// Variable name.
        name: String,
    },
    /// A value has the wrong shape.
    #[error("Malformed entry {position} in fragment {fragment}: {reason}")]
    MalformedEntry {
        /// Fragment identifier.
        fragment: String,
        /// Position of the entry inside the fragment.
        position: NodePath,
        /// What is wrong with it.
        reason: String,
    },
}

/// One `var NAME = value;` statement, or a bare value.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    /// Variable name, `None` for a bare value.
    pub name: Option<String>,
    /// Assigned value.
    pub value: Value,
}

/// A fragment split into its assignments.
#[derive(Clone, Debug)]
pub struct ParsedFragment {
    id: String,
    assignments: Vec<Assignment>,
}

impl ParsedFragment {
    /// Parse fragment text.
    ///
    /// # Arguments
    ///
    /// * `id` - Fragment identifier, used for error context and subtree lookup
    /// * `source` - Raw fragment text
    pub fn parse(id: &str, source: &str) -> Result<Self, FragmentError> {
        Ok(Self {
            id: id.to_owned(),
            assignments: parse_assignments(id, source)?,
        })
    }

    /// Fragment identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All assignments in source order.
    #[must_use]
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Value assigned to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.assignments
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    }

    /// String value assigned to `name`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Tree entries assigned to `name`.
    pub fn nodes(&self, name: &str) -> Result<Vec<TreeNode>, FragmentError> {
        let value = self.get(name).ok_or_else(|| FragmentError::MissingVariable {
            fragment: self.id.clone(),
            name: name.to_owned(),
        })?;
        parse_nodes(&self.id, value)
    }

    /// Tree entries of a lazily loaded subtree fragment.
    ///
    /// Uses the variable named after the fragment; a fragment with a single
    /// assignment (or a bare array) is accepted under any name.
    pub fn subtree(&self) -> Result<Vec<TreeNode>, FragmentError> {
        if let Some(value) = self.get(&self.id) {
            return parse_nodes(&self.id, value);
        }
        match self.assignments.as_slice() {
            [single] => parse_nodes(&self.id, &single.value),
            _ => Err(FragmentError::MissingVariable {
                fragment: self.id.clone(),
                name: self.id.clone(),
            }),
        }
    }
}

/// Parse a lazily loaded subtree fragment into its nodes.
pub fn parse_subtree(id: &str, source: &str) -> Result<Vec<TreeNode>, FragmentError> {
    ParsedFragment::parse(id, source)?.subtree()
}

/// Convert an array of `[title, target, children(, fragment)]` entries into nodes.
pub fn parse_nodes(fragment: &str, value: &Value) -> Result<Vec<TreeNode>, FragmentError> {
    parse_entries(fragment, value, &NodePath::root())
}

fn parse_entries(
    fragment: &str,
    value: &Value,
    parent: &NodePath,
) -> Result<Vec<TreeNode>, FragmentError> {
    let Value::Array(entries) = value else {
        return Err(malformed(fragment, parent, "expected an array of entries"));
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(fragment, entry, &parent.child(i)))
        .collect()
}

fn parse_entry(
    fragment: &str,
    entry: &Value,
    position: &NodePath,
) -> Result<TreeNode, FragmentError> {
    let Value::Array(fields) = entry else {
        return Err(malformed(
            fragment,
            position,
            "expected [title, target, children]",
        ));
    };
    if !(3..=4).contains(&fields.len()) {
        return Err(malformed(
            fragment,
            position,
            &format!("expected 3 or 4 elements, found {}", fields.len()),
        ));
    }

    let title = match &fields[0] {
        Value::String(title) => title.clone(),
        _ => return Err(malformed(fragment, position, "title must be a string")),
    };

    let target = match &fields[1] {
        Value::String(target) => Some(target.clone()),
        Value::Null => None,
        _ => {
            return Err(malformed(
                fragment,
                position,
                "target must be a string or null",
            ));
        }
    };

    let lazy = match fields.get(3) {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(_) => {
            return Err(malformed(
                fragment,
                position,
                "fourth element must be a fragment id",
            ));
        }
    };

    let children = if let Some(id) = lazy {
        deferred(fragment, position, id)?
    } else {
        match &fields[2] {
            Value::Null => Children::None,
            Value::String(id) => deferred(fragment, position, id)?,
            Value::Array(items) if items.is_empty() => Children::None,
            items @ Value::Array(_) => Children::Inline(parse_entries(fragment, items, position)?),
            _ => {
                return Err(malformed(
                    fragment,
                    position,
                    "children must be null, an array or a fragment id",
                ));
            }
        }
    };

    Ok(TreeNode {
        title,
        target,
        children,
    })
}

fn deferred(fragment: &str, position: &NodePath, id: &str) -> Result<Children, FragmentError> {
    if id.is_empty() {
        return Err(malformed(fragment, position, "empty fragment id"));
    }
    Ok(Children::Deferred(FragmentId::new(id)))
}

fn malformed(fragment: &str, position: &NodePath, reason: &str) -> FragmentError {
    FragmentError::MalformedEntry {
        fragment: fragment.to_owned(),
        position: position.clone(),
        reason: reason.to_owned(),
    }
}

/// Split fragment text into assignments.
///
/// Comments, whitespace and statement separators between assignments are
/// skipped.
pub fn parse_assignments(fragment: &str, source: &str) -> Result<Vec<Assignment>, FragmentError> {
    let mut assignments = Vec::new();
    let mut pos = skip_trivia(fragment, source, 0)?;

    while pos < source.len() {
        let rest = &source[pos..];
        let (name, value_start) = match VAR_DECL.captures(rest) {
            Some(caps) => (Some(caps[1].to_owned()), pos + caps[0].len()),
            None => (None, pos),
        };

        let (value, consumed) = parse_value(fragment, source, value_start)?;
        assignments.push(Assignment { name, value });
        pos = skip_trivia(fragment, source, value_start + consumed)?;
    }

    Ok(assignments)
}

/// Advance past whitespace, `;` and comments.
fn skip_trivia(fragment: &str, source: &str, mut pos: usize) -> Result<usize, FragmentError> {
    loop {
        let rest = &source[pos..];
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ';');
        pos += rest.len() - trimmed.len();

        if let Some(body) = trimmed.strip_prefix("/*") {
            let Some(end) = body.find("*/") else {
                return Err(syntax(fragment, pos, "unterminated comment"));
            };
            pos += 2 + end + 2;
        } else if trimmed.starts_with("//") {
            pos += trimmed.find('\n').unwrap_or(trimmed.len());
        } else {
            return Ok(pos);
        }
    }
}

/// Parse one value starting at `start`, returning it and the bytes consumed.
fn parse_value(fragment: &str, source: &str, start: usize) -> Result<(Value, usize), FragmentError> {
    let rest = &source[start..];

    match rest.chars().next() {
        Some('\'') => {
            let end = string_end(rest, '\'')
                .ok_or_else(|| syntax(fragment, start, "unterminated string"))?;
            Ok((Value::String(unescape_single_quoted(&rest[1..end - 1])), end))
        }
        Some('"') => {
            let end = string_end(rest, '"')
                .ok_or_else(|| syntax(fragment, start, "unterminated string"))?;
            let value = serde_json::from_str(&rest[..end])
                .map_err(|e| syntax(fragment, start, &e.to_string()))?;
            Ok((value, end))
        }
        Some('[' | '{') => {
            let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => Ok((value, stream.byte_offset())),
                Some(Err(e)) => Err(syntax(fragment, start, &e.to_string())),
                None => Err(syntax(fragment, start, "expected a value")),
            }
        }
        Some(_) => {
            let end = rest.find([';', '\n']).unwrap_or(rest.len());
            let value = serde_json::from_str(rest[..end].trim())
                .map_err(|e| syntax(fragment, start, &e.to_string()))?;
            Ok((value, end))
        }
        None => Err(syntax(fragment, start, "expected a value")),
    }
}

/// Byte index just past the closing quote of a string literal.
fn string_end(literal: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in literal.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some(i + c.len_utf8());
        }
    }
    None
}

fn unescape_single_quoted(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn syntax(fragment: &str, offset: usize, message: &str) -> FragmentError {
    FragmentError::Syntax {
        fragment: fragment.to_owned(),
        offset,
        message: message.to_owned(),
    }
}
