//! Output file handling: no-clobber, backup and atomic replacement.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use dg_core::OutputOptions;
use tempfile::NamedTempFile;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub bytes: usize,
}

/// Write `contents` according to `options`.
///
/// With no-clobber set, an existing target is left untouched and
/// `OutputBlocked` is returned before anything is written.
pub fn write_output(options: &OutputOptions, contents: &str) -> Result<WriteReport, Error> {
    let path = &options.path;

    if options.is_stdout() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(contents.as_bytes())
            .and_then(|_| handle.flush())
            .map_err(|source| Error::Output {
                path: path.clone(),
                source,
            })?;
        return Ok(WriteReport {
            path: path.clone(),
            backup: None,
            bytes: contents.len(),
        });
    }

    ensure_writable(options)?;
    let exists = path.exists();

    let backup = if exists && options.backup {
        let now = SystemTime::now();
        let backup_path = backup_file(path, now).map_err(|source| Error::Output {
            path: backup_path(path, now),
            source,
        })?;
        log::info!("Backed up {} to {}", path.display(), backup_path.display());
        Some(backup_path)
    } else {
        None
    };

    replace_atomically(path, contents).map_err(|source| Error::Output {
        path: path.clone(),
        source,
    })?;

    Ok(WriteReport {
        path: path.clone(),
        backup,
        bytes: contents.len(),
    })
}

/// Fail with `OutputBlocked` if no-clobber forbids replacing the target.
pub fn ensure_writable(options: &OutputOptions) -> Result<(), Error> {
    if options.no_clobber && !options.is_stdout() && options.path.exists() {
        return Err(Error::OutputBlocked {
            path: options.path.clone(),
        });
    }
    Ok(())
}

/// `<path>.bak.<unix-seconds>.<nanoseconds>`
pub fn backup_path(path: &Path, now: SystemTime) -> PathBuf {
    let stamp = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".bak.{}.{:09}", stamp.as_secs(), stamp.subsec_nanos()));
    PathBuf::from(name)
}

const MAX_BACKUP_ATTEMPTS: u32 = 100;

/// Copy `from` to a fresh backup name, adding a counter if the stamped
/// name is already taken. Existing backups are never overwritten.
fn backup_file(from: &Path, now: SystemTime) -> io::Result<PathBuf> {
    let base = backup_path(from, now);
    let mut attempt = 0;
    let (to, mut dest) = loop {
        let to = if attempt == 0 {
            base.clone()
        } else {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!(".{}", attempt));
            PathBuf::from(name)
        };
        match OpenOptions::new().write(true).create_new(true).open(&to) {
            Ok(file) => break (to, file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_BACKUP_ATTEMPTS => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    };

    let mut source = fs::File::open(from)?;
    io::copy(&mut source, &mut dest)?;
    dest.sync_all()?;
    Ok(to)
}

fn replace_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;

    // Temp files are created owner-only; keep the target readable by the resolver.
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
