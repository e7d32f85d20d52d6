//! SQL DDL import.
//!
//! Parses CREATE TABLE, CREATE VIEW and ALTER TABLE statements into a
//! catalog container:
//! - Column definitions with types and nullability
//! - Primary key constraints, inline or table-level
//! - Foreign key constraints, inline `REFERENCES`, table-level or added by ALTER TABLE
//!
//! Foreign keys are resolved after every table of the script exists, so
//! statement order does not matter.

use super::Catalog;
use crate::error::Result;
use crate::meta::{MetadataProvider, ObjectHandle, ObjectKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Supports: `table` (MySQL), "table" (PostgreSQL), [table] (MSSQL), table (unquoted), schema.table
static CREATE_TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*CREATE\s+(?:TEMPORARY\s+|TEMP\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[\[\]`"\w]+\s*\.\s*)*[\[`"]?([^\[\]`"\s(]+)[\]`"]?"#)
        .unwrap()
});

static CREATE_VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:MATERIALIZED\s+)?VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[\[\]`"\w]+\s*\.\s*)*[\[`"]?([^\[\]`"\s(]+)[\]`"]?\s*(?:\(([^)]*)\))?"#)
        .unwrap()
});

static ALTER_TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*ALTER\s+TABLE\s+(?:ONLY\s+)?(?:IF\s+EXISTS\s+)?(?:[\[\]`"\w]+\s*\.\s*)*[\[`"]?([^\[\]`"\s]+)[\]`"]?"#).unwrap()
});

static COLUMN_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*[\[`"]?([^\[\]`"\s,]+)[\]`"]?\s+(\w+(?:\s+varying)?(?:\([^)]+\))?(?:\s+unsigned)?)"#).unwrap()
});

/// Supports MSSQL CLUSTERED/NONCLUSTERED keywords: PRIMARY KEY CLUSTERED ([col])
static PRIMARY_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)PRIMARY\s+KEY\s*(?:CLUSTERED\s+|NONCLUSTERED\s+)?\(([^)]+)\)").unwrap()
});

static INLINE_PRIMARY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPRIMARY\s+KEY\b").unwrap());

/// Table-level FOREIGN KEY with optional constraint name
static FOREIGN_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:CONSTRAINT\s+[\[`"]?([^\[\]`"\s]+)[\]`"]?\s+)?FOREIGN\s+KEY\s*\(([^)]+)\)\s*REFERENCES\s+(?:[\[\]`"\w]+\s*\.\s*)*[\[`"]?([^\[\]`"\s(]+)[\]`"]?\s*(?:\(([^)]+)\))?"#,
    )
    .unwrap()
});

/// Column-level `REFERENCES other(col)`
static INLINE_REFERENCES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\bREFERENCES\s+(?:[\[\]`"\w]+\s*\.\s*)*[\[`"]?([^\[\]`"\s(]+)[\]`"]?\s*(?:\(([^)]+)\))?"#,
    )
    .unwrap()
});

static NOT_NULL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNOT\s+NULL\b").unwrap());

/// Outcome of [`Catalog::import_ddl`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DdlImport {
    pub tables: usize,
    pub views: usize,
    pub foreign_keys: usize,
    /// Statements or constraints that could not be imported
    pub skipped: Vec<String>,
}

#[derive(Debug)]
struct PendingForeignKey {
    owner: ObjectHandle,
    name: Option<String>,
    columns: Vec<String>,
    referenced_table: String,
    referenced_columns: Vec<String>,
}

impl Catalog {
    /// Import a DDL script into `container`
    pub fn import_ddl(&mut self, container: ObjectHandle, sql: &str) -> Result<DdlImport> {
        let mut report = DdlImport::default();
        let mut pending = Vec::new();

        for stmt in split_statements(sql) {
            if let Some(table_name) = extract_create_table_name(&stmt) {
                if self.child_by_name(container, &table_name)?.is_some() {
                    debug!("table '{}' already exists, skipping", table_name);
                    continue;
                }
                match extract_table_body(&stmt) {
                    Some(body) => {
                        self.import_table(container, &table_name, &body, &mut pending)?;
                        report.tables += 1;
                    }
                    None => report
                        .skipped
                        .push(format!("CREATE TABLE {}: missing column list", table_name)),
                }
            } else if let Some(caps) = CREATE_VIEW_RE.captures(&stmt) {
                let view_name = &caps[1];
                if self.child_by_name(container, view_name)?.is_some() {
                    continue;
                }
                let view = self.add_entity(container, view_name, ObjectKind::View)?;
                if let Some(columns) = caps.get(2) {
                    for column in parse_column_list(columns.as_str()) {
                        self.add_column(view, &column, "", true)?;
                    }
                }
                report.views += 1;
            } else if let Some(table_name) = extract_alter_table_name(&stmt) {
                let Some(owner) = self.child_by_name(container, &table_name)? else {
                    report
                        .skipped
                        .push(format!("ALTER TABLE {}: unknown table", table_name));
                    continue;
                };
                pending.extend(parse_foreign_keys(owner, &stmt));
            }
        }

        let mut ordinals: ahash::AHashMap<ObjectHandle, usize> = ahash::AHashMap::new();
        for fk in pending {
            let ordinal = ordinals.entry(fk.owner).or_insert(0);
            *ordinal += 1;
            let owner_name = self.name(fk.owner)?;
            let name = fk
                .name
                .clone()
                .unwrap_or_else(|| format!("fk_{}_{}", owner_name, ordinal));

            let Some(referenced) = self.child_by_name(container, &fk.referenced_table)? else {
                warn!(
                    "foreign key '{}' on '{}' references unknown table '{}'",
                    name, owner_name, fk.referenced_table
                );
                report.skipped.push(format!(
                    "{}.{}: unknown table '{}'",
                    owner_name, name, fk.referenced_table
                ));
                continue;
            };

            let columns: Vec<&str> = fk.columns.iter().map(String::as_str).collect();
            let referenced_columns: Vec<&str> =
                fk.referenced_columns.iter().map(String::as_str).collect();
            match self.add_foreign_key(fk.owner, &name, &columns, referenced, &referenced_columns) {
                Ok(_) => report.foreign_keys += 1,
                Err(e) => {
                    warn!("skipping foreign key '{}' on '{}': {}", name, owner_name, e);
                    report.skipped.push(format!("{}.{}: {}", owner_name, name, e));
                }
            }
        }

        Ok(report)
    }

    fn import_table(
        &mut self,
        container: ObjectHandle,
        name: &str,
        body: &str,
        pending: &mut Vec<PendingForeignKey>,
    ) -> Result<()> {
        let table = self.add_entity(container, name, ObjectKind::Table)?;
        let mut primary_key: Vec<String> = Vec::new();

        for part in split_table_body(body) {
            let upper = part.to_uppercase();
            if upper.starts_with("PRIMARY KEY")
                || upper.starts_with("CONSTRAINT")
                || upper.starts_with("FOREIGN KEY")
                || upper.starts_with("KEY ")
                || upper.starts_with("INDEX ")
                || upper.starts_with("UNIQUE ")
                || upper.starts_with("FULLTEXT ")
                || upper.starts_with("SPATIAL ")
                || upper.starts_with("CHECK ")
            {
                if let Some(caps) = PRIMARY_KEY_RE.captures(&part) {
                    for column in parse_column_list(&caps[1]) {
                        if !primary_key.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
                            primary_key.push(column);
                        }
                    }
                }
                pending.extend(parse_foreign_keys(table, &part));
                continue;
            }

            let Some(caps) = COLUMN_DEF_RE.captures(&part) else {
                debug!("unrecognized definition in '{}': {}", name, part);
                continue;
            };
            let column = caps[1].to_string();
            let type_name = caps[2].to_lowercase();
            let inline_pk = INLINE_PRIMARY_KEY_RE.is_match(&part);
            let nullable = !inline_pk && !NOT_NULL_RE.is_match(&part);
            self.add_column(table, &column, &type_name, nullable)?;
            if inline_pk {
                primary_key.push(column.clone());
            }

            if let Some(refs) = INLINE_REFERENCES_RE.captures(&part) {
                pending.push(PendingForeignKey {
                    owner: table,
                    name: None,
                    columns: vec![column],
                    referenced_table: refs[1].to_string(),
                    referenced_columns: refs
                        .get(2)
                        .map(|m| parse_column_list(m.as_str()))
                        .unwrap_or_default(),
                });
            }
        }

        let primary_key: Vec<&str> = primary_key.iter().map(String::as_str).collect();
        self.set_primary_key(table, &primary_key)
    }
}

/// Split a script into statements on `;` outside of quotes and comments
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == '\\' && q != '`' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                current.push(' ');
            }
            ';' => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    statements
}

/// Table name of a CREATE TABLE statement
pub fn extract_create_table_name(stmt: &str) -> Option<String> {
    CREATE_TABLE_NAME_RE
        .captures(stmt)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_alter_table_name(stmt: &str) -> Option<String> {
    ALTER_TABLE_NAME_RE
        .captures(stmt)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Body between the first `(` and its matching `)`
fn extract_table_body(stmt: &str) -> Option<String> {
    let bytes = stmt.as_bytes();
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &b) in bytes.iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape_next = true;
            continue;
        }
        if b == b'\'' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }

        if b == b'(' {
            if depth == 0 {
                start = Some(i + 1);
            }
            depth += 1;
        } else if b == b')' {
            depth -= 1;
            if depth == 0 {
                if let Some(s) = start {
                    return Some(stmt[s..i].to_string());
                }
            }
        }
    }

    None
}

/// Split a table body by commas, respecting nested parentheses
fn split_table_body(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut in_string = false;

    for ch in body.chars() {
        if ch == '\'' {
            in_string = !in_string;
        }
        if !in_string {
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    let part = current.trim();
                    if !part.is_empty() {
                        parts.push(part.to_string());
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
        }
        current.push(ch);
    }

    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    parts
}

fn parse_foreign_keys(owner: ObjectHandle, stmt: &str) -> Vec<PendingForeignKey> {
    FOREIGN_KEY_RE
        .captures_iter(stmt)
        .filter_map(|caps| {
            let columns = parse_column_list(caps.get(2)?.as_str());
            let referenced_table = caps.get(3)?.as_str().to_string();
            if columns.is_empty() {
                return None;
            }
            Some(PendingForeignKey {
                owner,
                name: caps.get(1).map(|m| m.as_str().to_string()),
                columns,
                referenced_table,
                referenced_columns: caps
                    .get(4)
                    .map(|m| parse_column_list(m.as_str()))
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Comma-separated column list with quotes stripped
fn parse_column_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| {
            c.trim()
                .trim_matches('`')
                .trim_matches('"')
                .trim_matches('[')
                .trim_matches(']')
                .to_string()
        })
        .filter(|c| !c.is_empty())
        .collect()
}
