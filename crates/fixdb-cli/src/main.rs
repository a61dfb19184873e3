// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use fixdb_db::ANALYSES_SCHEMA;
use runtime::ConsoleNarrator;
use std::io;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Back up the application database and add any columns missing from its
/// `analyses` table. Run it while the application is stopped.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "fixdb", version, about)]
struct CliOptions {
    /// Database file to repair [default: instance/truthguard.db]
    #[arg(long = "db", value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Config file [default: $FIXDB_CONFIG_PATH or ./fixdb.toml]
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Report missing columns without backing up or changing anything
    #[arg(long = "check")]
    check_only: bool,

    /// Print the resolved database path and exit
    #[arg(long = "print-path")]
    print_db_path: bool,

    /// Print a config template and exit
    #[arg(long = "print-example-config")]
    print_example: bool,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("ERROR: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse();
    let config_path = options.config_path.clone().unwrap_or_else(Config::default_path);

    if options.print_example {
        print!("{}", Config::example_config(&config_path));
        return Ok(());
    }

    let config = Config::load(&config_path).with_context(|| {
        format!(
            "load config {}; run `fixdb --print-example-config` to generate a template",
            config_path.display()
        )
    })?;
    logging::init(config.log_level());

    let db_path = config.db_path(options.db_path.as_deref())?;
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    if options.check_only {
        let report = fixdb_db::check(&db_path, &ANALYSES_SCHEMA)?;
        runtime::write_check_report(&mut io::stdout().lock(), ANALYSES_SCHEMA.table, &report)
            .context("write check report")?;
        return Ok(());
    }

    let mut narrator = ConsoleNarrator::stdout();
    let summary = fixdb_db::reconcile(
        &db_path,
        &ANALYSES_SCHEMA,
        OffsetDateTime::now_utc(),
        &mut narrator,
    )?;
    tracing::info!(
        backup = %summary.backup_path.display(),
        missing = summary.missing.len(),
        outcome = ?summary.outcome,
        "run finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CliOptions;
    use anyhow::Result;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn no_arguments_runs_with_defaults() -> Result<()> {
        let options = CliOptions::try_parse_from(["fixdb"])?;
        assert_eq!(
            options,
            CliOptions {
                db_path: None,
                config_path: None,
                check_only: false,
                print_db_path: false,
                print_example: false,
            }
        );
        Ok(())
    }

    #[test]
    fn db_and_config_overrides_are_parsed() -> Result<()> {
        let options = CliOptions::try_parse_from([
            "fixdb",
            "--db",
            "/srv/app/instance/truthguard.db",
            "--config",
            "/etc/fixdb.toml",
        ])?;
        assert_eq!(
            options.db_path,
            Some(PathBuf::from("/srv/app/instance/truthguard.db"))
        );
        assert_eq!(options.config_path, Some(PathBuf::from("/etc/fixdb.toml")));
        Ok(())
    }

    #[test]
    fn db_flag_requires_a_value() {
        let error = CliOptions::try_parse_from(["fixdb", "--db"])
            .expect_err("missing --db value should fail");
        assert!(error.to_string().contains("--db"));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let error = CliOptions::try_parse_from(["fixdb", "--wat"])
            .expect_err("unknown arg should fail");
        assert_eq!(error.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn print_and_check_flags_are_parsed() -> Result<()> {
        let options =
            CliOptions::try_parse_from(["fixdb", "--check", "--print-path", "--print-example-config"])?;
        assert!(options.check_only);
        assert!(options.print_db_path);
        assert!(options.print_example);
        Ok(())
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        CliOptions::command().debug_assert();
    }
}
