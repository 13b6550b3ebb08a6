//! Per-session persistence artifacts
//!
//! Each session owns two opaque files keyed by its content hash: a full
//! machine snapshot (written only through explicit save requests) and a
//! battery RAM image (written on exit for battery-backed cartridges).
//! Battery writes go through a temp file and rename so an interrupted write
//! never truncates the previous image.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Errors from battery image I/O.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// No image exists at the path. For a freshly played cartridge this is
    /// the expected case, not a failure.
    #[error("no battery image at {0}")]
    NotFound(PathBuf),

    /// Underlying filesystem failure.
    #[error("battery image I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Full-state snapshot file for a session hash.
pub fn snapshot_path(root: &Path, hash: &str) -> PathBuf {
    root.join(format!("{hash}.state"))
}

/// Battery RAM image file for a session hash.
pub fn battery_path(root: &Path, hash: &str) -> PathBuf {
    root.join(format!("{hash}.sram"))
}

/// Read a persisted battery image.
pub fn read_battery(path: &Path) -> Result<Vec<u8>, PersistError> {
    match fs::read(path) {
        Ok(image) => Ok(image),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PersistError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(PersistError::Io(e)),
    }
}

/// Persist a battery image.
///
/// Writes to `<name>.tmp`, syncs, then renames over the destination.
pub fn write_battery(path: &Path, image: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = match path.file_name() {
        Some(name) => {
            let mut tmp_name = OsString::from(name);
            tmp_name.push(".tmp");
            path.with_file_name(tmp_name)
        }
        None => {
            return Err(PersistError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "battery path has no file name",
            )));
        }
    };

    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(image)?;
        f.sync_all()?;
    }

    #[cfg(windows)]
    {
        if path.exists() {
            // Windows rename fails if destination exists.
            fs::remove_file(path)?;
        }
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
