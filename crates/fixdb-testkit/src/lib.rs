// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use fixdb_app::{ANALYSES_SCHEMA, ANALYSES_TABLE, DEFAULT_DB_PATH, ExpectedSchema, quote_identifier};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway working directory laid out like the owning application's:
/// `<root>/instance/truthguard.db`.
pub struct DbFixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl DbFixture {
    /// Working directory with an `instance/` folder but no database file.
    pub fn empty() -> Result<Self> {
        let dir = tempfile::tempdir().context("create fixture directory")?;
        let db_path = dir.path().join(DEFAULT_DB_PATH);
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        Ok(Self { dir, db_path })
    }

    /// Database whose `analyses` table has an `id` key plus `columns` (name, type).
    pub fn with_analyses(columns: &[(&str, &str)]) -> Result<Self> {
        let fixture = Self::empty()?;
        let mut definitions = vec!["id INTEGER PRIMARY KEY".to_owned()];
        definitions.extend(
            columns
                .iter()
                .map(|(name, sql_type)| format!("{} {sql_type}", quote_identifier(name))),
        );
        fixture.execute_batch(&format!(
            "CREATE TABLE {ANALYSES_TABLE} ({});",
            definitions.join(", ")
        ))?;
        Ok(fixture)
    }

    /// Database whose `analyses` table already matches `ANALYSES_SCHEMA`.
    pub fn with_full_analyses() -> Result<Self> {
        Self::with_schema(&ANALYSES_SCHEMA)
    }

    pub fn with_schema(schema: &ExpectedSchema) -> Result<Self> {
        let fixture = Self::empty()?;
        let mut definitions = vec!["id INTEGER PRIMARY KEY".to_owned()];
        definitions.extend(schema.columns.iter().map(|column| column.definition()));
        fixture.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_identifier(schema.table),
            definitions.join(", ")
        ))?;
        Ok(fixture)
    }

    /// Database file that exists but has no `analyses` table.
    pub fn without_analyses() -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);")?;
        Ok(fixture)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("open fixture database {}", self.db_path.display()))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connect()?
            .execute_batch(sql)
            .with_context(|| format!("run fixture sql {sql:?}"))
    }

    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?) ORDER BY cid ASC")
            .context("prepare column query")?;
        let rows = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .context("query columns")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect columns")
    }

    pub fn analyses_columns(&self) -> Result<Vec<String>> {
        self.columns(ANALYSES_TABLE)
    }

    pub fn insert_analysis_ids(&self, count: i64) -> Result<()> {
        let conn = self.connect()?;
        for id in 1..=count {
            conn.execute(
                &format!("INSERT INTO {ANALYSES_TABLE} (id) VALUES (?)"),
                [id],
            )
            .with_context(|| format!("insert analysis {id}"))?;
        }
        Ok(())
    }

    pub fn read_db(&self) -> Result<Vec<u8>> {
        fs::read(&self.db_path).with_context(|| format!("read {}", self.db_path.display()))
    }

    /// Backup artifacts next to the database, sorted by name.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let Some(dir) = self.db_path.parent() else {
            return Ok(Vec::new());
        };
        let prefix = format!(
            "{}.bak.",
            self.db_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        let mut backups = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry?.path();
            let is_backup = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&prefix));
            if is_backup {
                backups.push(path);
            }
        }
        backups.sort();
        Ok(backups)
    }
}
