// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    Real,
    Integer,
    DateTime,
}

impl SqlType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Real => "REAL",
            Self::Integer => "INTEGER",
            Self::DateTime => "DATETIME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(Self::Text),
            "REAL" => Some(Self::Real),
            "INTEGER" => Some(Self::Integer),
            "DATETIME" => Some(Self::DateTime),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One expected column of a table.
///
/// `default_literal` is raw SQL and is emitted verbatim after `DEFAULT`, so
/// string defaults carry their own quotes (`"''"`, `"'UNKNOWN'"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub default_literal: Option<&'static str>,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            default_literal: None,
        }
    }

    pub const fn with_default(
        name: &'static str,
        sql_type: SqlType,
        default_literal: &'static str,
    ) -> Self {
        Self {
            name,
            sql_type,
            default_literal: Some(default_literal),
        }
    }

    /// Column definition as it appears after `ADD COLUMN`.
    pub fn definition(&self) -> String {
        match self.default_literal {
            Some(default) => format!(
                "{} {} DEFAULT {default}",
                quote_identifier(self.name),
                self.sql_type
            ),
            None => format!("{} {}", quote_identifier(self.name), self.sql_type),
        }
    }

    pub fn add_column_sql(&self, table: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(table),
            self.definition()
        )
    }

    pub fn matches(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOutcome {
    Added,
    Skipped { reason: String },
    Failed { reason: String },
}

impl ColumnOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Added => "OK",
            Self::Skipped { .. } => "SKIP",
            Self::Failed { .. } => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Committed {
        added: Vec<ColumnSpec>,
        skipped: Vec<ColumnSpec>,
    },
    RolledBack {
        /// `None` when every addition succeeded but the commit itself failed.
        failed_column: Option<ColumnSpec>,
        reason: String,
        discarded: Vec<ColumnSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    UpToDate,
    Applied(ApplyOutcome),
}

pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub fn column_names(columns: &[ColumnSpec]) -> Vec<&'static str> {
    columns.iter().map(|column| column.name).collect()
}
