/*
File: bps-aio/src/fs.rs
Purpose: Filesystem copy helpers used to stage checksum inputs.
*/
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::symlink;
use std::path::Path;

use bps_common::error::{BpsError, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Copies a file or a whole directory tree to `destination`. Symlinks below
/// a copied directory are recreated as symlinks, not followed.
pub fn copy_path(source: &Path, destination: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    if metadata.is_dir() {
        copy_dir(source, destination)
    } else {
        debug!(
            "Copying file {} -> {}",
            source.display(),
            destination.display()
        );
        fs::copy(source, destination)?;
        Ok(())
    }
}

fn copy_dir(source: &Path, destination: &Path) -> Result<()> {
    debug!(
        "Copying directory {} -> {}",
        source.display(),
        destination.display()
    );
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| BpsError::Io(std::sync::Arc::new(e.into())))?;
        let relative = entry.path().strip_prefix(source).map_err(|e| {
            BpsError::Checksum(format!(
                "{} is not below {}: {}",
                entry.path().display(),
                source.display(),
                e
            ))
        })?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            symlink(&link, &target)?;
            #[cfg(not(unix))]
            tracing::warn!(
                "Skipping symlink {} -> {} on non-unix system",
                target.display(),
                link.display()
            );
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn copies_trees_and_keeps_symlinks() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file"), b"content").unwrap();
        symlink("b/file", src.path().join("a/link")).unwrap();

        let dst = TempDir::new().unwrap();
        let target = dst.path().join("copy");
        copy_path(src.path(), &target).unwrap();

        assert_eq!(fs::read(target.join("a/b/file")).unwrap(), b"content");
        assert_eq!(
            fs::read_link(target.join("a/link")).unwrap(),
            Path::new("b/file")
        );
    }

    #[test]
    fn copies_single_files() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("file");
        fs::write(&file, b"single").unwrap();

        let dst = TempDir::new().unwrap();
        copy_path(&file, &dst.path().join("copied")).unwrap();
        assert_eq!(fs::read(dst.path().join("copied")).unwrap(), b"single");
    }

    #[test]
    fn missing_source_is_an_error() {
        let dst = TempDir::new().unwrap();
        assert!(copy_path(Path::new("/no/such/path"), &dst.path().join("x")).is_err());
    }
}
