//! Library snapshot persistence.
//!
//! Snapshots are written to a temporary file next to the destination and
//! renamed into place, so a failed save never truncates the previous file.

use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;

use crate::{
    error::{LibraryError, Result},
    models::FieldMap,
};

/// Serialized representation of the library file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryPayload {
    /// Game records keyed by game id.
    #[serde(default)]
    pub games: BTreeMap<String, FieldMap>,
}

/// Read the library snapshot at `path`, returning `None` if it does not exist.
pub fn read_payload(path: &Path) -> Result<Option<LibraryPayload>> {
    read_json(path)
}

/// Read any JSON document, returning `None` if the file does not exist.
pub(crate) fn read_json<T>(path: &Path) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// A snapshot written to a temporary file, not yet visible at its destination.
pub(crate) struct Staged<'a> {
    file: NamedTempFile,
    path: &'a Path,
}

impl<'a> Staged<'a> {
    /// Move the staged file over its destination.
    pub(crate) fn commit(self) -> Result<()> {
        let path = self.path;
        self.file
            .persist(path)
            .map(|_| ())
            .map_err(|err| LibraryError::Persist {
                path: path.to_path_buf(),
                source: err.error,
            })
    }
}

/// Copy of a destination taken before it is replaced.
pub(crate) struct Backup<'a> {
    file: Option<NamedTempFile>,
    path: &'a Path,
}

impl<'a> Backup<'a> {
    /// Put the previous content back, or remove the file if there was none.
    pub(crate) fn restore(self) -> Result<()> {
        match self.file {
            Some(file) => Staged {
                file,
                path: self.path,
            }
            .commit(),
            None => match fs::remove_file(self.path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            },
        }
    }
}

/// Copy the current content of `path` (if any) beside it.
pub(crate) fn backup(path: &Path) -> Result<Backup<'_>> {
    if !path.is_file() {
        return Ok(Backup { file: None, path });
    }
    let file = NamedTempFile::new_in(parent_dir(path))?;
    fs::copy(path, file.path())?;
    Ok(Backup {
        file: Some(file),
        path,
    })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Serialize `value` as pretty JSON (sorted keys, four-space indent) into a
/// temporary file in the destination directory.
///
/// The staged file takes over the permissions of an existing destination.
pub(crate) fn stage_json<'a, T: Serialize>(path: &'a Path, value: &T) -> Result<Staged<'a>> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        let mut serializer =
            Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut serializer)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    if let Ok(existing) = fs::metadata(path) {
        if existing.is_file() {
            fs::set_permissions(file.path(), existing.permissions())?;
        }
    }
    Ok(Staged { file, path })
}

/// Write `value` to `path` through a staged temporary file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    stage_json(path, value)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_snapshot_reads_as_none() -> Result<()> {
        let dir = tempdir()?;
        assert!(read_payload(&dir.path().join("games.json"))?.is_none());
        Ok(())
    }

    #[test]
    fn writes_sorted_four_space_json() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.json");
        write_json(&path, &json!({"b": 1, "a": {"d": 2, "c": 3}}))?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(
            content,
            "{\n    \"a\": {\n        \"c\": 3,\n        \"d\": 2\n    },\n    \"b\": 1\n}\n"
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn staged_file_keeps_destination_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(&path, "{}")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        write_json(&path, &json!({"games": {}}))?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }

    #[test]
    fn backup_restores_previous_content_or_absence() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(&path, "previous")?;

        let saved = backup(&path)?;
        write_json(&path, &json!({"games": {}}))?;
        saved.restore()?;
        assert_eq!(fs::read_to_string(&path)?, "previous");

        let fresh = dir.path().join("fresh.json");
        let saved = backup(&fresh)?;
        write_json(&fresh, &json!({}))?;
        saved.restore()?;
        assert!(!fresh.exists());
        Ok(())
    }

    #[test]
    fn uncommitted_stage_leaves_destination_untouched() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(&path, "previous")?;

        let staged = stage_json(&path, &json!({"games": {}}))?;
        assert_eq!(fs::read_to_string(&path)?, "previous");
        drop(staged);
        assert_eq!(fs::read_to_string(&path)?, "previous");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
