// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use fixdb_app::{ApplyOutcome, ColumnOutcome, ColumnSpec, ExpectedSchema, RunOutcome};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::backup::create_backup;
use crate::error::ReconcileError;
use crate::{AdditionEvent, Store, error_chain};

/// Step-by-step narration of a run, in the order the steps happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    Starting { db_path: PathBuf },
    BackupCreated { path: PathBuf },
    ExistingColumns { table: String, columns: Vec<String> },
    UpToDate { table: String },
    ColumnsToAdd { columns: Vec<ColumnSpec> },
    AddingColumn { column: ColumnSpec },
    ColumnFinished { column: ColumnSpec, outcome: ColumnOutcome },
    Committed { added: usize, skipped: usize },
    RolledBack { reason: String },
    FinalColumns { table: String, columns: Vec<String> },
    FinalColumnsUnavailable { table: String, reason: String },
    Done,
}

pub trait Narrator {
    fn narrate(&mut self, event: &ReconcileEvent);
}

impl<F> Narrator for F
where
    F: FnMut(&ReconcileEvent),
{
    fn narrate(&mut self, event: &ReconcileEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub backup_path: PathBuf,
    pub existing_columns: Vec<String>,
    pub missing: Vec<ColumnSpec>,
    pub outcome: RunOutcome,
    /// `None` when the closing schema query failed.
    pub final_columns: Option<Vec<String>>,
}

/// What a run would do, computed without a backup or any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub db_path: PathBuf,
    pub existing_columns: Vec<String>,
    pub missing: Vec<ColumnSpec>,
}

impl CheckReport {
    pub fn is_up_to_date(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn verify_db_file(db_path: &Path) -> Result<(), ReconcileError> {
    if db_path.is_file() {
        Ok(())
    } else {
        Err(ReconcileError::MissingFile {
            path: db_path.to_path_buf(),
        })
    }
}

/// Backs up `db_path`, then adds every column of `schema` the table lacks.
///
/// Errors are returned only for failures before the first `ALTER TABLE`. Once
/// additions start, failures are folded into the summary and the final column
/// listing is always attempted.
pub fn reconcile(
    db_path: &Path,
    schema: &ExpectedSchema,
    backup_at: OffsetDateTime,
    narrator: &mut dyn Narrator,
) -> Result<RunSummary, ReconcileError> {
    schema
        .validate()
        .map_err(|error| ReconcileError::InvalidSchema(format!("{error:#}")))?;

    narrator.narrate(&ReconcileEvent::Starting {
        db_path: db_path.to_path_buf(),
    });
    verify_db_file(db_path)?;

    let backup = create_backup(db_path, backup_at)?;
    narrator.narrate(&ReconcileEvent::BackupCreated {
        path: backup.path.clone(),
    });

    let mut store = Store::open(db_path).map_err(|error| ReconcileError::Open {
        path: db_path.to_path_buf(),
        error,
    })?;
    let existing_columns = introspect(&store, schema.table)?;
    narrator.narrate(&ReconcileEvent::ExistingColumns {
        table: schema.table.to_owned(),
        columns: existing_columns.clone(),
    });

    let missing = schema.missing_from(&existing_columns);
    if missing.is_empty() {
        info!(table = schema.table, "schema up to date");
        narrator.narrate(&ReconcileEvent::UpToDate {
            table: schema.table.to_owned(),
        });
        return Ok(RunSummary {
            backup_path: backup.path,
            final_columns: Some(existing_columns.clone()),
            existing_columns,
            missing,
            outcome: RunOutcome::UpToDate,
        });
    }

    info!(table = schema.table, count = missing.len(), "adding missing columns");
    narrator.narrate(&ReconcileEvent::ColumnsToAdd {
        columns: missing.clone(),
    });

    let outcome = apply(&mut store, schema.table, &missing, narrator);
    match &outcome {
        ApplyOutcome::Committed { added, skipped } => {
            narrator.narrate(&ReconcileEvent::Committed {
                added: added.len(),
                skipped: skipped.len(),
            });
        }
        ApplyOutcome::RolledBack { reason, .. } => {
            narrator.narrate(&ReconcileEvent::RolledBack {
                reason: reason.clone(),
            });
        }
    }

    let final_columns = match store.table_columns(schema.table) {
        Ok(columns) => {
            narrator.narrate(&ReconcileEvent::FinalColumns {
                table: schema.table.to_owned(),
                columns: columns.clone(),
            });
            Some(columns)
        }
        Err(error) => {
            let error = ReconcileError::ReportQuery {
                table: schema.table.to_owned(),
                error,
            };
            warn!(error = %error, "final schema query failed");
            narrator.narrate(&ReconcileEvent::FinalColumnsUnavailable {
                table: schema.table.to_owned(),
                reason: error_chain(&error),
            });
            None
        }
    };
    narrator.narrate(&ReconcileEvent::Done);

    Ok(RunSummary {
        backup_path: backup.path,
        existing_columns,
        missing,
        outcome: RunOutcome::Applied(outcome),
        final_columns,
    })
}

/// Read-only variant of [`reconcile`]: reports the diff and touches nothing.
pub fn check(db_path: &Path, schema: &ExpectedSchema) -> Result<CheckReport, ReconcileError> {
    schema
        .validate()
        .map_err(|error| ReconcileError::InvalidSchema(format!("{error:#}")))?;
    verify_db_file(db_path)?;

    let store = Store::open_read_only(db_path).map_err(|error| ReconcileError::Open {
        path: db_path.to_path_buf(),
        error,
    })?;
    let existing_columns = introspect(&store, schema.table)?;
    let missing = schema.missing_from(&existing_columns);
    Ok(CheckReport {
        db_path: db_path.to_path_buf(),
        existing_columns,
        missing,
    })
}

fn introspect(store: &Store, table: &str) -> Result<Vec<String>, ReconcileError> {
    let introspection_error = |error: rusqlite::Error| ReconcileError::SchemaIntrospection {
        table: table.to_owned(),
        reason: error.to_string(),
        error: Some(error),
    };

    if !store.table_exists(table).map_err(introspection_error)? {
        return Err(ReconcileError::SchemaIntrospection {
            table: table.to_owned(),
            reason: "no such table".to_owned(),
            error: None,
        });
    }
    store.table_columns(table).map_err(introspection_error)
}

fn apply(
    store: &mut Store,
    table: &str,
    missing: &[ColumnSpec],
    narrator: &mut dyn Narrator,
) -> ApplyOutcome {
    let result = store.apply_additions(table, missing, |event| match event {
        AdditionEvent::Attempt(column) => {
            narrator.narrate(&ReconcileEvent::AddingColumn { column: *column });
        }
        AdditionEvent::Outcome(column, outcome) => {
            narrator.narrate(&ReconcileEvent::ColumnFinished {
                column: *column,
                outcome,
            });
        }
    });

    // Only opening the transaction can fail here; nothing was added yet.
    result.unwrap_or_else(|error| {
        warn!(%error, "could not start write transaction");
        ApplyOutcome::RolledBack {
            failed_column: None,
            reason: format!("begin transaction: {error}"),
            discarded: Vec::new(),
        }
    })
}
