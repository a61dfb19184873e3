// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;

use crate::model::{ColumnSpec, SqlType};

/// Database file of the owning application, relative to its working directory.
pub const DEFAULT_DB_PATH: &str = "instance/truthguard.db";

pub const ANALYSES_TABLE: &str = "analyses";

const ANALYSES_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::with_default("title", SqlType::Text, "''"),
    ColumnSpec::with_default("content", SqlType::Text, "''"),
    ColumnSpec::new("article_data", SqlType::Text),
    ColumnSpec::new("source_url", SqlType::Text),
    ColumnSpec::with_default("classification", SqlType::Text, "'UNKNOWN'"),
    ColumnSpec::new("confidence_score", SqlType::Real),
    ColumnSpec::new("sentiment_score", SqlType::Real),
    ColumnSpec::new("sensationalism_score", SqlType::Real),
    ColumnSpec::new("credibility_score", SqlType::Real),
    ColumnSpec::new("key_findings", SqlType::Text),
    ColumnSpec::new("recommendations", SqlType::Text),
    ColumnSpec::new("fact_checks", SqlType::Text),
    ColumnSpec::new("analysis_metadata", SqlType::Text),
    ColumnSpec::new("user_id", SqlType::Integer),
    ColumnSpec::new("created_at", SqlType::DateTime),
    ColumnSpec::new("updated_at", SqlType::DateTime),
];

pub const ANALYSES_SCHEMA: ExpectedSchema = ExpectedSchema::new(ANALYSES_TABLE, ANALYSES_COLUMNS);

/// Target shape of one table. Column order is the order additions are issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl ExpectedSchema {
    pub const fn new(table: &'static str, columns: &'static [ColumnSpec]) -> Self {
        Self { table, columns }
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            bail!("expected schema has an empty table name");
        }

        let mut seen = BTreeSet::new();
        for column in self.columns {
            if column.name.trim().is_empty() {
                bail!("table `{}` has a column with an empty name", self.table);
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                bail!(
                    "table `{}` lists column `{}` more than once",
                    self.table,
                    column.name
                );
            }
            if let Some(default) = column.default_literal
                && default.trim().is_empty()
            {
                bail!(
                    "column `{}` has a blank default; use `''` for an empty string",
                    column.name
                );
            }
        }
        Ok(())
    }

    /// Expected columns absent from `existing`, in expected-list order.
    pub fn missing_from<S: AsRef<str>>(&self, existing: &[S]) -> Vec<ColumnSpec> {
        self.columns
            .iter()
            .filter(|column| {
                !existing
                    .iter()
                    .any(|name| column.matches(name.as_ref()))
            })
            .copied()
            .collect()
    }

    pub fn is_satisfied_by<S: AsRef<str>>(&self, existing: &[S]) -> bool {
        self.missing_from(existing).is_empty()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        crate::model::column_names(self.columns)
    }
}
