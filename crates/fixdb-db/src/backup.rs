// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use crate::error::ReconcileError;

const MAX_NAME_ATTEMPTS: u32 = 100;

/// A verified copy of the database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// `<db>.bak.<YYYYMMDDHHMMSS>` with the timestamp taken in UTC.
pub fn backup_path_for(db_path: &Path, at: OffsetDateTime) -> Result<PathBuf, ReconcileError> {
    let stamp = at
        .to_offset(time::UtcOffset::UTC)
        .format(&format_description!(
            "[year][month][day][hour][minute][second]"
        ))?;
    let mut name = OsString::from(db_path.as_os_str());
    name.push(".bak.");
    name.push(stamp);
    Ok(PathBuf::from(name))
}

/// Copies `db_path` next to itself and checks the copy by digest.
///
/// An existing backup is never overwritten; a second run within the same
/// second gets a `-1`, `-2`, ... suffix instead.
pub fn create_backup(db_path: &Path, at: OffsetDateTime) -> Result<Backup, ReconcileError> {
    if !db_path.is_file() {
        return Err(ReconcileError::MissingFile {
            path: db_path.to_path_buf(),
        });
    }

    let base = backup_path_for(db_path, at)?;
    let (path, mut target) = open_unique(&base).map_err(|error| ReconcileError::Backup {
        from: db_path.to_path_buf(),
        to: base.clone(),
        error,
    })?;

    let backup_error = |error: io::Error| ReconcileError::Backup {
        from: db_path.to_path_buf(),
        to: path.clone(),
        error,
    };

    let bytes = match copy_with_metadata(db_path, &mut target) {
        Ok(bytes) => bytes,
        Err(error) => {
            drop(target);
            let _ = fs::remove_file(&path);
            return Err(backup_error(error));
        }
    };
    drop(target);

    let expected = checksum_sha256(db_path).map_err(backup_error)?;
    let actual = checksum_sha256(&path).map_err(backup_error)?;
    if expected != actual {
        return Err(ReconcileError::BackupMismatch {
            from: db_path.to_path_buf(),
            to: path,
            expected,
            actual,
        });
    }

    info!(backup = %path.display(), bytes, sha256 = %actual, "backup created");
    Ok(Backup {
        path,
        sha256: actual,
        bytes,
    })
}

fn copy_with_metadata(db_path: &Path, target: &mut File) -> io::Result<u64> {
    let mut source = File::open(db_path)?;
    let bytes = io::copy(&mut source, target)?;
    target.sync_all()?;

    let metadata = source.metadata()?;
    target.set_permissions(metadata.permissions())?;
    if let Ok(modified) = metadata.modified() {
        target.set_modified(modified)?;
    }
    Ok(bytes)
}

fn open_unique(base: &Path) -> io::Result<(PathBuf, File)> {
    let mut candidate = base.to_path_buf();
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(taken = %candidate.display(), "backup name in use");
                let mut name = OsString::from(base.as_os_str());
                name.push(format!("-{attempt}"));
                candidate = PathBuf::from(name);
            }
            Err(error) => return Err(error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "{} and {MAX_NAME_ATTEMPTS} numbered variants already exist",
            base.display()
        ),
    ))
}

fn checksum_sha256(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.finalize();
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    Ok(output)
}
