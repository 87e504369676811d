use std::{io::Write, path::Path};

/// Suffix of the sidecar information file, appended to the image basename.
pub const INFORMATION_FILE_SUFFIX: &str = ".raw.info";

/// Derives the default sidecar filename for an image basename.
///
/// The basename is the segment name with any naming-scheme suffix already
/// stripped, so `img` maps to `img.raw.info` regardless of whether the
/// segments are called `img.raw.001` or `img.001`.
pub fn information_filename_for(basename: &str) -> String {
    if let Some(stem) = basename.strip_suffix(".raw") {
        format!("{stem}{INFORMATION_FILE_SUFFIX}")
    } else {
        format!("{basename}{INFORMATION_FILE_SUFFIX}")
    }
}

/// The directory a file lives in; bare filenames resolve to the working
/// directory.
fn parent_of(path: &Path) -> &Path {
    match path.parent() {
        Some(folder) if !folder.as_os_str().is_empty() => folder,
        _ => Path::new("."),
    }
}

/// Replaces `path` without ever exposing a half-written file.
///
/// The content goes to a temporary file next to the target first and is
/// renamed over it only once fully written and synced, so an interrupted
/// sidecar rewrite leaves the previous information file untouched. The
/// rename itself is made durable by syncing the directory entry.
pub fn rewrite_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    let folder = parent_of(path);

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    sync_directory(folder)
}

/// Flushes the directory entry of `name` down to the storage device, so
/// that a freshly created or renamed segment survives a crash.
pub fn sync_parent_directory(name: &str) -> std::io::Result<()> {
    sync_directory(parent_of(Path::new(name)))
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> std::io::Result<()> {
    std::fs::File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(path: &Path) -> std::io::Result<()> {
    // directory handles cannot be synced on this platform
    let _ = path;
    Ok(())
}
