//! Atomic file publication.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::IoError;

/// Write `path` through a sibling temporary file and rename it into place.
///
/// The parent directory is created if needed. On any failure the temporary
/// file is removed and `path` is left untouched.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::OutputDirCreate`] | Parent directory cannot be created |
/// | [`IoError::WriteFile`] | Writing, flushing or renaming failed |
pub fn publish<F>(path: &Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| IoError::OutputDirCreate {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let tmp = temporary_sibling(path);
    let result = File::create(&tmp).and_then(|file| {
        let mut out = BufWriter::new(file);
        write(&mut out)?;
        out.flush()?;
        out.get_ref().sync_all()
    });
    if let Err(e) = result.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(IoError::write(path, e));
    }
    debug!(path = %path.display(), "published");
    Ok(())
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}
