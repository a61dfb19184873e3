// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end or degrade a reconcile run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid expected schema: {0}")]
    InvalidSchema(String),

    #[error("database file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("format backup timestamp")]
    Timestamp(#[from] time::error::Format),

    #[error("back up {} to {}", from.display(), to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error(
        "backup {} does not match {} (sha256 {actual} != {expected})",
        to.display(),
        from.display()
    )]
    BackupMismatch {
        from: PathBuf,
        to: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("open database at {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        error: rusqlite::Error,
    },

    #[error(
        "could not read table info for `{table}`: {reason}\nIf `{table}` doesn't exist, start the application once so it creates its tables, then rerun."
    )]
    SchemaIntrospection {
        table: String,
        reason: String,
        #[source]
        error: Option<rusqlite::Error>,
    },

    #[error("could not fetch final schema for `{table}`")]
    ReportQuery {
        table: String,
        #[source]
        error: rusqlite::Error,
    },
}

impl ReconcileError {
    /// Fatal errors end the run before any column is added.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ReportQuery { .. })
    }
}

/// Failure to add a single column.
#[derive(Debug, Error)]
pub enum AddColumnError {
    #[error("column `{column}` already exists: {message}")]
    ColumnAlreadyExists { column: String, message: String },

    #[error("add column `{column}`")]
    UnexpectedAddition {
        column: String,
        #[source]
        error: rusqlite::Error,
    },
}

impl AddColumnError {
    /// Sorts a failed `ALTER TABLE ... ADD COLUMN` into skip or abort.
    ///
    /// Only SQLite's duplicate column report is skippable. Syntax errors and
    /// other `SQLITE_ERROR` results share its error code, so the message is
    /// what tells them apart.
    pub fn classify(column: &str, error: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &error
            && failure.code == rusqlite::ErrorCode::Unknown
            && message.starts_with("duplicate column name")
        {
            return Self::ColumnAlreadyExists {
                column: column.to_owned(),
                message: message.clone(),
            };
        }
        Self::UnexpectedAddition {
            column: column.to_owned(),
            error,
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ColumnAlreadyExists { .. })
    }
}
