//! Artifact files on disk
//!
//! Writes go to a temporary file in the destination directory and are
//! renamed into place, so a crash never leaves a half-written key,
//! certificate or CRL behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{CaError, Result};

/// File permissions applied to a staged artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Owner read/write only (private keys, export containers)
    Private,
    /// World readable (certificates, CSRs, CRLs)
    Public,
}

/// Artifact bytes written next to their destination but not yet visible there
///
/// Dropping a staged artifact without committing removes the temporary file.
pub struct StagedArtifact {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedArtifact {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Rename the staged file over its destination
    pub fn commit(self) -> Result<PathBuf> {
        let destination = self.destination;
        self.temp.persist(&destination).map_err(|e| {
            CaError::io(
                format!("Failed to move artifact into {}", destination.display()),
                e.error,
            )
        })?;
        debug!(path = %destination.display(), "artifact committed");
        Ok(destination)
    }
}

/// Write `data` to a temporary file in the destination's directory
pub fn stage(destination: &Path, data: &[u8], visibility: Visibility) -> Result<StagedArtifact> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| CaError::io(format!("Failed to create directory {}", dir.display()), e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
        CaError::io(
            format!("Failed to create temporary file in {}", dir.display()),
            e,
        )
    })?;
    temp.write_all(data)
        .map_err(|e| CaError::io("Failed to write artifact data", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| CaError::io("Failed to flush artifact data", e))?;
    set_visibility(temp.path(), visibility)?;

    Ok(StagedArtifact {
        temp,
        destination: destination.to_path_buf(),
    })
}

/// Stage and commit in one step
pub fn write_atomic(destination: &Path, data: &[u8], visibility: Visibility) -> Result<PathBuf> {
    stage(destination, data, visibility)?.commit()
}

#[cfg(unix)]
fn set_visibility(path: &Path, visibility: Visibility) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = match visibility {
        Visibility::Private => 0o600,
        Visibility::Public => 0o644,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| CaError::io("Failed to set artifact permissions", e))
}

#[cfg(not(unix))]
fn set_visibility(_path: &Path, _visibility: Visibility) -> Result<()> {
    Ok(())
}

/// Reject names that are empty or would escape their directory
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CaError::validation("artifact name must not be empty"));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(CaError::validation(format!(
            "artifact name {:?} must be a plain file name",
            name
        )));
    }
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CaError::not_found(format!("artifact {} does not exist", path.display()))
        } else {
            CaError::io(format!("Failed to read {}", path.display()), e)
        }
    })
}

/// Delete an artifact, returning whether a file was removed
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CaError::io(
            format!("Failed to delete {}", path.display()),
            e,
        )),
    }
}

/// Regular files in `dir`, sorted by name; a missing directory lists as empty
pub fn list_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CaError::io(
                format!("Failed to list {}", dir.display()),
                e,
            ))
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CaError::io("Failed to read directory entry", e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| CaError::io("Failed to read file type", e))?;
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        // staged files from an interrupted write are not artifacts
        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(".tmp"))
            .unwrap_or(false);
        if !is_temp {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crl").join("issuer.crl.pem");
        write_atomic(&path, b"first", Visibility::Public).unwrap();
        write_atomic(&path, b"second", Visibility::Public).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(list_artifacts(path.parent().unwrap()).unwrap(), vec![path]);
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuer1.cert.pem");
        {
            let staged = stage(&path, b"pending", Visibility::Public).unwrap();
            assert_eq!(staged.destination(), path.as_path());
        }
        assert!(!path.exists());
        assert!(list_artifacts(dir.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.key.pem");
        write_atomic(&path, b"key", Visibility::Private).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_remove_and_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pem");
        assert!(!remove(&path).unwrap());
        assert!(read(&path).unwrap_err().is_not_found());
        write_atomic(&path, b"x", Visibility::Public).unwrap();
        assert!(remove(&path).unwrap());
        assert!(list_artifacts(&dir.path().join("missing")).unwrap().is_empty());
    }
}
