//! Structural pass over `.chart` text.
//!
//! Reads lines into sections of `key = value…` entries without
//! interpreting them. Section nesting is tracked by a four-state machine;
//! any transition it does not allow aborts with the 1-based line number.

use log::{debug, warn};

use crate::{ChartError, StructureError};

/// A classified value token.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `true` / `false`
    Bool(bool),
    /// Double-quoted string, quotes stripped
    Str(String),
    /// Any number; integers are stored as floats too
    Number(f64),
    /// Bare word such as `N`, `B` or `TS`
    Ident(String),
}

impl Value {
    /// Classify a bare (unquoted) token. Precedence: boolean, number, identifier.
    pub fn classify(token: &str) -> Value {
        match token {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if token.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
            if let Ok(n) = token.parse::<f64>() {
                if n.is_finite() {
                    return Value::Number(n);
                }
            }
        }
        Value::Ident(token.to_string())
    }

    /// Text of a string or identifier.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral numbers only.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// One `key = value…` line.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub values: Vec<Value>,
    /// 1-based source line
    pub line: usize,
}

/// A `[Name] { … }` block.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub name: String,
    /// 1-based line of the header
    pub line: usize,
    pub entries: Vec<Entry>,
}

/// Sections in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawChart {
    pub sections: Vec<Section>,
}

impl RawChart {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// What the previous meaningful line was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// `[Name]`
    Header,
    /// `{`
    OpenBrace,
    /// `}` (also the start state)
    CloseBrace,
    /// `key = value…`
    Entry,
}

fn structure(line: usize, kind: StructureError) -> ChartError {
    ChartError::Structure { line, kind }
}

/// Parse chart text into sections.
///
/// A leading byte-order mark is skipped. Blank lines are ignored. An entry
/// directly after a header opens the section implicitly.
pub fn parse_raw(text: &str) -> Result<RawChart, ChartError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut state = State::CloseBrace;
    let mut sections: Vec<Section> = Vec::new();
    let mut line_count = 0;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        line_count = line_no;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = section_name(line) {
            if state != State::CloseBrace {
                return Err(structure(line_no, StructureError::UnexpectedHeader));
            }
            if sections.iter().any(|s| s.name == name) {
                return Err(structure(line_no, StructureError::DuplicateSection(name.to_string())));
            }
            sections.push(Section {
                name: name.to_string(),
                line: line_no,
                entries: Vec::new(),
            });
            state = State::Header;
        } else if line == "{" {
            if state != State::Header {
                return Err(structure(line_no, StructureError::UnexpectedOpenBrace));
            }
            state = State::OpenBrace;
        } else if line == "}" {
            state = match state {
                State::Entry => {
                    if let Some(section) = sections.last() {
                        debug!(
                            "section [{}] at line {}: {} entries",
                            section.name,
                            section.line,
                            section.entries.len()
                        );
                    }
                    State::CloseBrace
                }
                State::OpenBrace => {
                    let name = sections.last().map(|s| s.name.clone()).unwrap_or_default();
                    return Err(structure(line_no, StructureError::EmptySection(name)));
                }
                State::Header | State::CloseBrace => {
                    return Err(structure(line_no, StructureError::UnexpectedCloseBrace));
                }
            };
        } else {
            if state == State::CloseBrace {
                return Err(structure(line_no, StructureError::ValueOutsideSection));
            }
            let entry = parse_entry(line, line_no)?;
            let Some(section) = sections.last_mut() else {
                return Err(structure(line_no, StructureError::ValueOutsideSection));
            };
            if state == State::Header {
                warn!("line {}: section [{}] has no opening brace", line_no, section.name);
            }
            section.entries.push(entry);
            state = State::Entry;
        }
    }

    if state != State::CloseBrace {
        let name = sections.last().map(|s| s.name.clone()).unwrap_or_default();
        return Err(structure(line_count + 1, StructureError::UnterminatedSection(name)));
    }

    Ok(RawChart { sections })
}

/// `[Name]` where the name is one or more word characters.
fn section_name(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?;
    let is_word = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_word.then_some(name)
}

fn parse_entry(line: &str, line_no: usize) -> Result<Entry, ChartError> {
    let (key, rest) = line
        .split_once('=')
        .ok_or_else(|| structure(line_no, StructureError::MissingEquals))?;
    Ok(Entry {
        key: key.trim().to_string(),
        values: tokenize(rest, line_no)?,
        line: line_no,
    })
}

/// Split a value list on whitespace, keeping quoted strings whole.
fn tokenize(text: &str, line_no: usize) -> Result<Vec<Value>, ChartError> {
    let mut values = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted
                .find('"')
                .ok_or_else(|| structure(line_no, StructureError::UnterminatedString))?;
            values.push(Value::Str(quoted[..end].to_string()));
            rest = quoted[end + 1..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            values.push(Value::classify(&rest[..end]));
            rest = rest[end..].trim_start();
        }
    }
    Ok(values)
}
