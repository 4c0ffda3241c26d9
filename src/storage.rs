//! Whole-file persistence helpers shared by the preferences and history stores.

use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const TEMP_SUFFIX: &str = "tmp";

/// Writes `data` to `path` via a temp file and rename, so readers never see a partial file.
///
/// The file is readable and writable by the owner only on unix.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_with_suffix(path, TEMP_SUFFIX);
    let file = File::create(&temp_path)?;

    #[cfg(unix)]
    {
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&temp_path, perms)?;
    }

    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), bytes = data.len(), "Atomic write completed");
    Ok(())
}

/// Copies `path` aside as `<name>.backup-<timestamp>` and returns the copy's path.
pub fn backup(path: &Path) -> io::Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    let backup_path = sibling_with_suffix(path, &format!("backup-{}", stamp));
    fs::copy(path, &backup_path)?;
    debug!(from = %path.display(), to = %backup_path.display(), "Backup created");
    Ok(backup_path)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("nested").join("file.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_is_owner_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.json");
        atomic_write(&path, b"{}").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_backup_keeps_original_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "garbage").unwrap();

        let copy = backup(&path).unwrap();

        let name = copy.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("history.json.backup-"));
        assert_eq!(fs::read_to_string(copy).unwrap(), "garbage");
        assert!(path.exists());
    }
}
