// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use fixdb_app::{ColumnOutcome, column_names};
use fixdb_db::{CheckReport, Narrator, ReconcileEvent};
use std::io::{self, Write};

/// Narrates a run on a writer, one line per step.
pub struct ConsoleNarrator<W: Write> {
    out: W,
}

impl ConsoleNarrator<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleNarrator<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &ReconcileEvent) -> io::Result<()> {
        match event {
            ReconcileEvent::Starting { db_path } => {
                writeln!(self.out, "Starting schema repair for {}...", db_path.display())?;
            }
            ReconcileEvent::BackupCreated { path } => {
                writeln!(self.out, "Backup created: {}", path.display())?;
            }
            ReconcileEvent::ExistingColumns { table, columns } => {
                writeln!(self.out, "Existing columns in '{table}': {columns:?}")?;
            }
            ReconcileEvent::UpToDate { .. } => {
                writeln!(
                    self.out,
                    "No missing columns detected. Database schema looks up-to-date."
                )?;
            }
            ReconcileEvent::ColumnsToAdd { columns } => {
                writeln!(self.out, "Columns to add: {:?}", column_names(columns))?;
            }
            ReconcileEvent::AddingColumn { column } => {
                write!(self.out, "Adding column: {} ... ", column.name)?;
                self.out.flush()?;
            }
            ReconcileEvent::ColumnFinished { outcome, .. } => match outcome {
                ColumnOutcome::Added => writeln!(self.out, "{}", outcome.label())?,
                ColumnOutcome::Skipped { reason } | ColumnOutcome::Failed { reason } => {
                    writeln!(self.out, "{}: {reason}", outcome.label())?
                }
            },
            ReconcileEvent::Committed { added, skipped } => {
                writeln!(
                    self.out,
                    "All missing columns have been processed ({added} added, {skipped} skipped). Commit complete."
                )?;
            }
            ReconcileEvent::RolledBack { reason } => {
                writeln!(self.out, "Error during migration: {reason}")?;
                writeln!(self.out, "All additions from this run were rolled back.")?;
            }
            ReconcileEvent::FinalColumns { table, columns } => {
                writeln!(self.out)?;
                writeln!(self.out, "Final '{table}' columns:")?;
                for column in columns {
                    writeln!(self.out, " - {column}")?;
                }
            }
            ReconcileEvent::FinalColumnsUnavailable { reason, .. } => {
                writeln!(self.out, "Could not fetch final schema: {reason}")?;
            }
            ReconcileEvent::Done => {
                writeln!(
                    self.out,
                    "Done. Restart the application and check /dashboard."
                )?;
            }
        }
        Ok(())
    }
}

impl<W: Write> Narrator for ConsoleNarrator<W> {
    fn narrate(&mut self, event: &ReconcileEvent) {
        if let Err(error) = self.write_event(event) {
            tracing::warn!(%error, "could not write progress line");
        }
    }
}

pub fn write_check_report(out: &mut impl Write, table: &str, report: &CheckReport) -> io::Result<()> {
    writeln!(out, "Database: {}", report.db_path.display())?;
    writeln!(
        out,
        "Existing columns in '{table}': {:?}",
        report.existing_columns
    )?;
    if report.is_up_to_date() {
        writeln!(out, "No missing columns detected. Database schema looks up-to-date.")?;
    } else {
        writeln!(out, "Columns a repair would add:")?;
        for column in &report.missing {
            writeln!(out, " - {}", column.definition())?;
        }
    }
    Ok(())
}
