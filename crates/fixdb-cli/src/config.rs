// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_VERSION: i64 = 1;
const DEFAULT_CONFIG_FILE: &str = "fixdb.toml";
const DEFAULT_LOG_LEVEL: &str = "warn";

pub const CONFIG_PATH_ENV: &str = "FIXDB_CONFIG_PATH";
pub const DB_PATH_ENV: &str = "FIXDB_DB_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put settings under [storage] and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            fixdb_db::validate_db_path(db_path)
                .with_context(|| format!("storage.db_path in {}", path.display()))?;
        }

        if let Some(level) = &self.log.level
            && level.trim().is_empty()
        {
            bail!(
                "log.level in {} must not be empty; use one of error, warn, info, debug, trace",
                path.display()
            );
        }

        Ok(())
    }

    /// Precedence: explicit override, then `FIXDB_DB_PATH`, then `[storage].db_path`.
    pub fn db_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        let path = if let Some(path) = cli_override {
            path.to_path_buf()
        } else if let Some(path) = env::var_os(DB_PATH_ENV) {
            PathBuf::from(path)
        } else {
            match &self.storage.db_path {
                Some(path) => PathBuf::from(path),
                None => PathBuf::from(fixdb_db::DEFAULT_DB_PATH),
            }
        };

        fixdb_db::validate_db_path(&path.to_string_lossy())?;
        Ok(path)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# fixdb config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Relative paths resolve against the working directory.\ndb_path = \"{}\"\n\n[log]\n# Overridden by the FIXDB_LOG environment variable.\nlevel = \"{}\"\n",
            path.display(),
            fixdb_db::DEFAULT_DB_PATH,
            DEFAULT_LOG_LEVEL,
        )
    }
}
