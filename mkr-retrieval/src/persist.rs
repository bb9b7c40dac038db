//! File helpers shared by collections and the database manifest.
//!
//! Every file is written to a `.tmp` sibling and renamed into place, so a
//! reader never observes a half-written artifact.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{Result, RetrievalError};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a file atomically using `write` to produce its contents.
///
/// The temporary file is synced before the rename and the parent directory
/// after it. On failure the temporary file is removed.
pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let tmp = tmp_path(path);
    let written = write_synced(&tmp, write).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if let Err(e) = written {
        match fs::remove_file(&tmp) {
            Err(cleanup) if cleanup.kind() != io::ErrorKind::NotFound => {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary file");
            }
            _ => {}
        }
        return Err(e);
    }
    sync_parent(path);
    Ok(())
}

fn write_synced(
    tmp: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(tmp)?);
    write(&mut writer)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn sync_parent(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    if let Ok(dir) = File::open(parent) {
        if let Err(e) = dir.sync_all() {
            warn!(dir = %parent.display(), error = %e, "directory fsync failed");
        }
    }
}

/// Serialize `value` as pretty JSON to `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| Ok(serde_json::to_writer_pretty(writer, value)?))
}

/// Serialize each item as one JSON line.
pub(crate) fn write_jsonl<'a, T: Serialize + 'a>(
    path: &Path,
    items: impl IntoIterator<Item = &'a T>,
) -> Result<()> {
    write_atomic(path, |writer| {
        for item in items {
            serde_json::to_writer(&mut *writer, item)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Read a required JSON file, mapping absence and parse failures to
/// [`RetrievalError::CorruptState`].
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_required(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(path, e))
}

/// Read a required JSON-lines file. Blank lines are skipped.
pub(crate) fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(open_required(path)?);
    let mut items = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)
            .map_err(|e| corrupt(path, format!("line {}: {e}", line_no + 1)))?;
        items.push(item);
    }
    Ok(items)
}

/// Open a file that must exist.
pub(crate) fn open_required(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(corrupt(path, "missing file"));
    }
    Ok(File::open(path)?)
}

pub(crate) fn corrupt(path: &Path, message: impl ToString) -> RetrievalError {
    RetrievalError::CorruptState { path: path.to_path_buf(), message: message.to_string() }
}
