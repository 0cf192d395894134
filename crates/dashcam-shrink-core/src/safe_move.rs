use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Move `src` to `dst`, preferring a rename.
///
/// When the two paths live on different filesystems the file is copied,
/// flushed to disk, then the source removed. If any step of that fallback
/// fails, the partial copy is deleted and `src` is left where it was.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            debug!(
                "{} and {} are on different devices, copying",
                src.display(),
                dst.display()
            );
            copy_then_remove(src, dst)
        }
        Err(err) => Err(err),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

pub(crate) fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    if let Err(err) = copy_synced(src, dst) {
        discard_partial(dst);
        return Err(err);
    }

    if let Err(err) = fs::remove_file(src) {
        // Leaving both copies would make the file look already processed.
        discard_partial(dst);
        return Err(err);
    }

    Ok(())
}

/// Copy through the handle that wrote the bytes so the flush works on every
/// platform, even when the source is read-only. Permissions follow afterwards.
fn copy_synced(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    fs::set_permissions(dst, reader.metadata()?.permissions())
}

fn discard_partial(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        warn!("Could not remove partial copy {}: {}", path.display(), e);
    }
}

/// Delete `path` if it is there. Returns whether something was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// True when anything, including a dangling symlink, occupies `path`.
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
