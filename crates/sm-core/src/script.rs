//! Edit-script grammar
//!
//! One statement per line:
//!
//! ```text
//! param <ParamName>: id <RowID>: <FieldName>: = <Value>;
//! param <ParamName>: id <RowID>: Name: = <Display name>;
//! ```
//!
//! The `param` and `id` keywords are case-insensitive. Blank lines are not
//! valid input for interpreters of this grammar, so scripts are collapsed with
//! [`collapse_blank_lines`] before being parsed or handed on.

use crate::error::{Error, Result};
use crate::param::{FieldValue, ParamBank};
use std::fmt;
use tracing::{debug, warn};

/// What a statement assigns to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The row's display name
    Name,
    Field(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name => write!(f, "Name"),
            Target::Field(name) => write!(f, "{}", name),
        }
    }
}

/// One assignment statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub param: String,
    pub id: i32,
    pub target: Target,
    pub value: String,
}

impl Statement {
    pub fn field(
        param: impl Into<String>,
        id: i32,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            param: param.into(),
            id,
            target: Target::Field(field.into()),
            value: value.into(),
        }
    }

    pub fn name(param: impl Into<String>, id: i32, value: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            id,
            target: Target::Name,
            value: value.into(),
        }
    }

    /// Parse a single statement line
    pub fn parse(line: &str) -> Result<Self> {
        let fail = |reason: &str| Error::ScriptParse {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let rest = strip_keyword(line.trim(), "param ").ok_or_else(|| fail("expected 'param'"))?;
        let (param, rest) = rest
            .split_once(':')
            .ok_or_else(|| fail("missing ':' after param name"))?;

        let rest = strip_keyword(rest.trim_start(), "id ").ok_or_else(|| fail("expected 'id'"))?;
        let (id, rest) = rest
            .split_once(':')
            .ok_or_else(|| fail("missing ':' after row id"))?;
        let id = id
            .trim()
            .parse::<i32>()
            .map_err(|_| fail("row id is not an integer"))?;

        let (target, rest) = rest
            .split_once(':')
            .ok_or_else(|| fail("missing ':' after field name"))?;
        let value = rest
            .trim_start()
            .strip_prefix('=')
            .ok_or_else(|| fail("expected '= <value>'"))?;
        let value = value.trim_end();
        let value = value.strip_suffix(';').unwrap_or(value);

        let param = param.trim();
        let target = target.trim();
        if param.is_empty() || target.is_empty() {
            return Err(fail("empty param or field name"));
        }

        let target = if target.eq_ignore_ascii_case("name") {
            Target::Name
        } else {
            Target::Field(target.to_string())
        };

        Ok(Self {
            param: param.to_string(),
            id,
            target,
            value: value.trim().to_string(),
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "param {}: id {}: {}: = {};",
            self.param,
            self.id,
            self.target,
            single_line(&self.value)
        )
    }
}

/// `text` with carriage returns dropped and line feeds turned into spaces
pub fn single_line(text: &str) -> String {
    text.replace('\r', "").replace('\n', " ")
}

/// An ordered list of statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    statements: Vec<Statement>,
}

impl EditScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whole script; fails on the first malformed line
    pub fn parse(text: &str) -> Result<Self> {
        let statements = collapse_blank_lines(text)
            .lines()
            .map(Statement::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { statements })
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn append(&mut self, other: EditScript) {
        self.statements.extend(other.statements);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

/// Normalize line endings, trim, and collapse runs of blank lines
pub fn collapse_blank_lines(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Create default rows for every statement targeting a missing row
///
/// Returns the `(param, id)` pairs that were created. Params that received
/// rows are re-sorted by id; statements naming unknown params are skipped.
pub fn seed_missing_rows(bank: &mut ParamBank, script: &EditScript) -> Vec<(String, i32)> {
    let mut added = Vec::new();

    for statement in script.iter() {
        let Some(name) = bank.resolve_name(&statement.param).map(str::to_string) else {
            warn!(param = %statement.param, "could not find param");
            continue;
        };
        if let Some(param) = bank.get_mut(&name) {
            if param.add_default_row(statement.id) {
                debug!(param = %name, id = statement.id, "seeded default row");
                added.push((name, statement.id));
            }
        }
    }

    for (name, _) in &added {
        if let Some(param) = bank.get_mut(name) {
            param.sort_rows();
        }
    }

    added
}

/// Counts from applying a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub applied: usize,
    /// Statements naming a row that does not exist
    pub skipped: usize,
}

/// Execute the assignment statements of `script` against `bank`
///
/// Every statement is resolved and its value converted before anything is
/// written, so an unknown param or field or an unconvertible value leaves the
/// bank untouched.
pub fn apply_script(bank: &mut ParamBank, script: &EditScript) -> Result<ScriptReport> {
    enum Assignment {
        Name(String),
        Field(usize, FieldValue),
    }

    let mut resolved = Vec::with_capacity(script.len());
    let mut report = ScriptReport::default();

    for statement in script.iter() {
        let name = bank
            .resolve_name(&statement.param)
            .ok_or_else(|| Error::ParamNotFound(statement.param.clone()))?;
        let param = &bank.params[name];

        let Some(row) = param.row(statement.id) else {
            warn!(param = %name, id = statement.id, "row does not exist, statement skipped");
            report.skipped += 1;
            continue;
        };

        let assignment = match &statement.target {
            Target::Name => Assignment::Name(statement.value.clone()),
            Target::Field(field) => {
                let idx = param.field_index(field).ok_or_else(|| Error::FieldNotFound {
                    param: name.to_string(),
                    field: field.clone(),
                })?;
                let field_type = param.fields[idx].display_type;
                let current = row
                    .values
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| field_type.zero());
                let value = current
                    .parse_like(field_type, &statement.value)
                    .ok_or_else(|| Error::InvalidValue {
                        field: field.clone(),
                        value: statement.value.clone(),
                    })?;
                Assignment::Field(idx, value)
            }
        };
        resolved.push((name.to_string(), statement.id, assignment));
    }

    for (name, id, assignment) in resolved {
        let Some(row) = bank.get_mut(&name).and_then(|p| p.row_mut(id)) else {
            continue;
        };
        match assignment {
            Assignment::Name(value) => row.name = value,
            Assignment::Field(idx, value) => {
                if idx >= row.values.len() {
                    continue;
                }
                row.values[idx] = value;
            }
        }
        report.applied += 1;
    }

    Ok(report)
}

fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        Some(&s[keyword.len()..])
    } else {
        None
    }
}
