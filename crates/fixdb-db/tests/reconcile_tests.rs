// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use fixdb_app::{
    ANALYSES_SCHEMA, ApplyOutcome, ColumnOutcome, ColumnSpec, ExpectedSchema, RunOutcome, SqlType,
};
use fixdb_db::{ReconcileError, ReconcileEvent, Store, check, reconcile};
use fixdb_testkit::DbFixture;
use time::OffsetDateTime;
use time::macros::datetime;

const BACKUP_AT: OffsetDateTime = datetime!(2026-10-15 08:30:00 UTC);

#[derive(Default)]
struct Recorder {
    events: Vec<ReconcileEvent>,
}

impl Recorder {
    fn attempted(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReconcileEvent::AddingColumn { column } => Some(column.name),
                _ => None,
            })
            .collect()
    }
}

impl fixdb_db::Narrator for Recorder {
    fn narrate(&mut self, event: &ReconcileEvent) {
        self.events.push(event.clone());
    }
}

fn analyses_without(absent: &[&str]) -> Result<DbFixture> {
    let present: Vec<(&str, &str)> = ANALYSES_SCHEMA
        .columns
        .iter()
        .filter(|column| !absent.contains(&column.name))
        .map(|column| (column.name, column.sql_type.as_str()))
        .collect();
    DbFixture::with_analyses(&present)
}

#[test]
fn missing_file_fails_before_backup() -> Result<()> {
    let fixture = DbFixture::empty()?;
    let mut recorder = Recorder::default();

    let error = reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut recorder)
        .expect_err("missing database should be fatal");

    assert!(matches!(error, ReconcileError::MissingFile { .. }));
    assert!(error.is_fatal());
    assert!(!fixture.db_path().exists());
    assert!(fixture.backups()?.is_empty());
    assert!(recorder.attempted().is_empty());
    Ok(())
}

#[test]
fn missing_table_is_fatal_and_mutates_nothing() -> Result<()> {
    let fixture = DbFixture::without_analyses()?;
    let before = fixture.read_db()?;
    let mut recorder = Recorder::default();

    let error = reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut recorder)
        .expect_err("missing table should be fatal");

    assert!(matches!(error, ReconcileError::SchemaIntrospection { .. }));
    assert!(error.to_string().contains("rerun"));
    assert_eq!(fixture.read_db()?, before);
    assert!(recorder.attempted().is_empty());
    assert_eq!(fixture.backups()?.len(), 1);
    Ok(())
}

#[test]
fn complete_schema_is_a_no_op() -> Result<()> {
    let fixture = DbFixture::with_full_analyses()?;
    let columns_before = fixture.analyses_columns()?;
    let mut recorder = Recorder::default();

    let summary = reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut recorder)?;

    assert_eq!(summary.outcome, RunOutcome::UpToDate);
    assert!(summary.missing.is_empty());
    assert!(recorder.attempted().is_empty());
    assert!(
        recorder
            .events
            .contains(&ReconcileEvent::UpToDate {
                table: "analyses".to_owned()
            })
    );
    assert_eq!(fixture.analyses_columns()?, columns_before);
    assert_eq!(fixture.backups()?, vec![summary.backup_path]);
    Ok(())
}

#[test]
fn three_missing_columns_are_added_in_expected_order() -> Result<()> {
    let fixture = analyses_without(&["content", "user_id", "created_at"])?;
    fixture.insert_analysis_ids(3)?;
    let mut recorder = Recorder::default();

    let summary = reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut recorder)?;

    let missing: Vec<_> = summary.missing.iter().map(|column| column.name).collect();
    assert_eq!(missing, vec!["content", "user_id", "created_at"]);
    assert_eq!(recorder.attempted(), missing);
    assert!(matches!(
        summary.outcome,
        RunOutcome::Applied(ApplyOutcome::Committed { ref added, ref skipped })
            if added.len() == 3 && skipped.is_empty()
    ));

    let store = Store::open(fixture.db_path())?;
    let info = store.table_info("analyses")?;
    let find = |name: &str| info.iter().find(|column| column.name == name);
    let content = find("content").expect("content column");
    assert_eq!(content.column_type, "TEXT");
    assert_eq!(content.default_value.as_deref(), Some("''"));
    assert_eq!(find("user_id").map(|c| c.column_type.as_str()), Some("INTEGER"));
    assert_eq!(find("created_at").map(|c| c.column_type.as_str()), Some("DATETIME"));
    assert_eq!(find("created_at").and_then(|c| c.default_value.clone()), None);

    let rows: i64 = store
        .raw_connection()
        .query_row("SELECT COUNT(*) FROM analyses WHERE content = ''", [], |row| {
            row.get(0)
        })?;
    assert_eq!(rows, 3);

    let final_columns = summary.final_columns.expect("final columns");
    assert!(ANALYSES_SCHEMA.is_satisfied_by(&final_columns));
    Ok(())
}

#[test]
fn second_run_is_a_no_op() -> Result<()> {
    let fixture = DbFixture::with_analyses(&[("title", "TEXT")])?;

    let first = reconcile(
        fixture.db_path(),
        &ANALYSES_SCHEMA,
        BACKUP_AT,
        &mut Recorder::default(),
    )?;
    assert_eq!(first.missing.len(), ANALYSES_SCHEMA.columns.len() - 1);
    let after_first = fixture.analyses_columns()?;

    let mut recorder = Recorder::default();
    let second = reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut recorder)?;

    assert_eq!(second.outcome, RunOutcome::UpToDate);
    assert!(recorder.attempted().is_empty());
    assert_eq!(fixture.analyses_columns()?, after_first);
    assert_ne!(first.backup_path, second.backup_path);
    assert_eq!(fixture.backups()?.len(), 2);
    Ok(())
}

#[test]
fn backup_matches_database_before_mutation() -> Result<()> {
    let fixture = analyses_without(&["updated_at"])?;
    fixture.insert_analysis_ids(5)?;
    let before = fixture.read_db()?;

    let summary = reconcile(
        fixture.db_path(),
        &ANALYSES_SCHEMA,
        BACKUP_AT,
        &mut Recorder::default(),
    )?;

    assert_eq!(std::fs::read(&summary.backup_path)?, before);
    assert_ne!(fixture.read_db()?, before);
    assert!(
        summary
            .backup_path
            .to_string_lossy()
            .ends_with("truthguard.db.bak.20261015083000")
    );
    Ok(())
}

#[test]
fn unexpected_failure_rolls_back_and_still_reports() -> Result<()> {
    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec::new("title", SqlType::Text),
        ColumnSpec::new("content", SqlType::Text),
        ColumnSpec::with_default("broken", SqlType::Text, "'unterminated"),
        ColumnSpec::new("user_id", SqlType::Integer),
    ];
    let schema = ExpectedSchema::new("analyses", COLUMNS);
    let fixture = DbFixture::with_analyses(&[])?;
    let mut recorder = Recorder::default();

    let summary = reconcile(fixture.db_path(), &schema, BACKUP_AT, &mut recorder)?;

    assert_eq!(recorder.attempted(), vec!["title", "content", "broken"]);
    match &summary.outcome {
        RunOutcome::Applied(ApplyOutcome::RolledBack {
            failed_column,
            discarded,
            ..
        }) => {
            assert_eq!(failed_column.map(|column| column.name), Some("broken"));
            assert_eq!(discarded.len(), 2);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert!(recorder.events.iter().any(|event| matches!(
        event,
        ReconcileEvent::ColumnFinished {
            outcome: ColumnOutcome::Failed { .. },
            ..
        }
    )));
    assert!(
        recorder
            .events
            .iter()
            .any(|event| matches!(event, ReconcileEvent::RolledBack { .. }))
    );

    assert_eq!(summary.final_columns, Some(vec!["id".to_owned()]));
    assert_eq!(
        recorder.events.last(),
        Some(&ReconcileEvent::Done),
        "reporting must still complete after a rollback"
    );
    assert_eq!(fixture.analyses_columns()?, vec!["id"]);
    Ok(())
}

#[test]
fn invalid_schema_is_rejected_before_touching_files() -> Result<()> {
    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec::new("title", SqlType::Text),
        ColumnSpec::new("title", SqlType::Text),
    ];
    let fixture = DbFixture::with_analyses(&[])?;

    let error = reconcile(
        fixture.db_path(),
        &ExpectedSchema::new("analyses", COLUMNS),
        BACKUP_AT,
        &mut Recorder::default(),
    )
    .expect_err("duplicate columns should be rejected");

    assert!(matches!(error, ReconcileError::InvalidSchema(_)));
    assert!(fixture.backups()?.is_empty());
    Ok(())
}

#[test]
fn check_reports_diff_without_writing() -> Result<()> {
    let fixture = analyses_without(&["title", "fact_checks"])?;
    let before = fixture.read_db()?;

    let report = check(fixture.db_path(), &ANALYSES_SCHEMA)?;

    assert!(!report.is_up_to_date());
    let names: Vec<_> = report.missing.iter().map(|column| column.name).collect();
    assert_eq!(names, vec!["title", "fact_checks"]);
    assert_eq!(fixture.read_db()?, before);
    assert!(fixture.backups()?.is_empty());
    Ok(())
}

#[test]
fn closure_narrator_sees_every_step() -> Result<()> {
    let fixture = DbFixture::with_analyses(&[("title", "TEXT")])?;
    let mut steps = 0usize;
    let mut narrator = |_: &ReconcileEvent| steps += 1;

    reconcile(fixture.db_path(), &ANALYSES_SCHEMA, BACKUP_AT, &mut narrator)?;

    // starting, backup, existing, to-add, 15 x (attempt + outcome), committed, final, done
    assert_eq!(steps, 4 + 15 * 2 + 3);
    Ok(())
}
