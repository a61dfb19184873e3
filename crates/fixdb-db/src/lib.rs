// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod backup;
mod error;
mod reconcile;

pub use backup::{Backup, backup_path_for, create_backup};
pub use error::{AddColumnError, ReconcileError};
pub use fixdb_app::{ANALYSES_SCHEMA, ANALYSES_TABLE, DEFAULT_DB_PATH};
pub use reconcile::{
    CheckReport, Narrator, ReconcileEvent, RunSummary, check, reconcile, verify_db_file,
};

use anyhow::{Result, bail};
use fixdb_app::{ApplyOutcome, ColumnOutcome, ColumnSpec};
use rusqlite::{Connection, OpenFlags, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaColumn {
    pub cid: i64,
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: i32,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens an existing database for writing. Never creates the file.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    pub fn open_read_only(path: &Path) -> rusqlite::Result<Self> {
        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(path, flags)?;
        configure_connection(&conn)?;
        debug!(path = %path.display(), ?flags, "opened database");
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        let exists = self.conn.query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ? COLLATE NOCASE
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    /// Column names of `table` in declaration order. Empty if the table is absent.
    pub fn table_columns(&self, table: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?) ORDER BY cid ASC")?;
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    pub fn table_info(&self, table: &str) -> rusqlite::Result<Vec<PragmaColumn>> {
        let mut stmt = self.conn.prepare(
            "
            SELECT cid, name, type, \"notnull\", dflt_value, pk
            FROM pragma_table_info(?)
            ORDER BY cid ASC
            ",
        )?;
        let rows = stmt.query_map(params![table], |row| {
            let not_null: i32 = row.get(3)?;
            Ok(PragmaColumn {
                cid: row.get(0)?,
                name: row.get(1)?,
                column_type: row.get(2)?,
                not_null: not_null != 0,
                default_value: row.get(4)?,
                primary_key: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    /// Adds `columns` to `table` inside one immediate transaction.
    ///
    /// A duplicate column is skipped and the loop moves on. Any other failure
    /// stops the loop and rolls back every addition made so far, including the
    /// ones that succeeded.
    pub fn apply_additions(
        &mut self,
        table: &str,
        columns: &[ColumnSpec],
        mut on_event: impl FnMut(AdditionEvent<'_>),
    ) -> rusqlite::Result<ApplyOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut added = Vec::new();
        let mut skipped = Vec::new();
        for column in columns {
            on_event(AdditionEvent::Attempt(column));
            let sql = column.add_column_sql(table);
            debug!(%sql, "adding column");
            match tx.execute_batch(&sql) {
                Ok(()) => {
                    added.push(*column);
                    on_event(AdditionEvent::Outcome(column, ColumnOutcome::Added));
                }
                Err(error) => {
                    let failure = AddColumnError::classify(column.name, error);
                    if failure.is_recoverable() {
                        warn!(column = column.name, error = %failure, "skipping column");
                        skipped.push(*column);
                        on_event(AdditionEvent::Outcome(
                            column,
                            ColumnOutcome::Skipped {
                                reason: failure.to_string(),
                            },
                        ));
                        continue;
                    }

                    let reason = error_chain(&failure);
                    warn!(column = column.name, error = %reason, "addition failed, rolling back");
                    on_event(AdditionEvent::Outcome(
                        column,
                        ColumnOutcome::Failed {
                            reason: reason.clone(),
                        },
                    ));
                    // SQLite already rolled back on its own for some failures (busy, full disk).
                    if let Err(rollback_error) = tx.rollback() {
                        debug!(error = %rollback_error, "explicit rollback failed");
                    }
                    return Ok(ApplyOutcome::RolledBack {
                        failed_column: Some(*column),
                        reason,
                        discarded: added,
                    });
                }
            }
        }

        if let Err(error) = tx.commit() {
            warn!(%error, "commit failed, additions rolled back");
            return Ok(ApplyOutcome::RolledBack {
                failed_column: None,
                reason: format!("commit: {error}"),
                discarded: added,
            });
        }
        Ok(ApplyOutcome::Committed { added, skipped })
    }
}

/// Progress reported by [`Store::apply_additions`] as each column is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionEvent<'a> {
    Attempt(&'a ColumnSpec),
    Outcome(&'a ColumnSpec, ColumnOutcome),
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        bail!("database path must name a file; an in-memory database has nothing to repair");
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
