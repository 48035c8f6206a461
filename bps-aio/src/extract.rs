// bps-aio/src/extract.rs
// Streams tar, gzip/xz compressed tar and zip containers into a destination directory.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use bps_common::error::{BpsError, Result};
use flate2::read::MultiGzDecoder;
use tar::EntryType;
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Container formats understood by [`Archive`]. The caller picks one; the
/// stream content is never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGzip,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Maps the file name at the end of a URI (or path) onto a format.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let path = uri
            .split(['?', '#'])
            .next()
            .unwrap_or(uri)
            .to_ascii_lowercase();

        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(ArchiveFormat::TarGzip)
        } else if path.ends_with(".tar.xz") || path.ends_with(".txz") {
            Some(ArchiveFormat::TarXz)
        } else if path.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if path.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// A container read from an arbitrary byte stream.
///
/// ```no_run
/// # use std::path::Path;
/// # use bps_aio::extract::Archive;
/// let file = std::fs::File::open("node.tgz")?;
/// Archive::tar_gzip(file)
///     .strip_components(1)
///     .decompress(Path::new("/layers/node"))?;
/// # Ok::<(), bps_common::BpsError>(())
/// ```
pub struct Archive<R> {
    reader: R,
    format: ArchiveFormat,
    components: usize,
}

impl<R: Read> Archive<R> {
    pub fn new(format: ArchiveFormat, reader: R) -> Self {
        Self {
            reader,
            format,
            components: 0,
        }
    }

    pub fn tar(reader: R) -> Self {
        Self::new(ArchiveFormat::Tar, reader)
    }

    pub fn tar_gzip(reader: R) -> Self {
        Self::new(ArchiveFormat::TarGzip, reader)
    }

    pub fn tar_xz(reader: R) -> Self {
        Self::new(ArchiveFormat::TarXz, reader)
    }

    pub fn zip(reader: R) -> Self {
        Self::new(ArchiveFormat::Zip, reader)
    }

    /// Behaves like `tar --strip-components`: the first `components` path
    /// segments of every entry are dropped, entries with nothing left are
    /// skipped. Zip containers ignore this setting.
    pub fn strip_components(mut self, components: usize) -> Self {
        self.components = components;
        self
    }

    /// Writes every entry of the container below `destination`, in container
    /// order. Nothing is cleaned up on failure.
    pub fn decompress(self, destination: &Path) -> Result<()> {
        debug!(
            "Decompressing {:?} archive into {} (strip_components={})",
            self.format,
            destination.display(),
            self.components
        );

        match self.format {
            ArchiveFormat::Tar => extract_tar(self.reader, destination, self.components),
            ArchiveFormat::TarGzip => {
                let reader = expect_magic(self.reader, GZIP_MAGIC, "gzip")?;
                extract_tar(MultiGzDecoder::new(reader), destination, self.components)
            }
            ArchiveFormat::TarXz => {
                let reader = expect_magic(self.reader, XZ_MAGIC, "xz")?;
                extract_tar(
                    XzDecoder::new_multi_decoder(reader),
                    destination,
                    self.components,
                )
            }
            ArchiveFormat::Zip => {
                if self.components > 0 {
                    warn!(
                        "strip_components={} is not supported for zip archives and is ignored",
                        self.components
                    );
                }
                extract_zip(self.reader, destination)
            }
        }
    }
}

/// Reads the leading magic bytes of a compressed stream and hands back a
/// reader that replays them ahead of the rest of the stream.
fn expect_magic<R: Read>(
    mut reader: R,
    magic: &'static [u8],
    kind: &str,
) -> Result<io::Chain<Cursor<Vec<u8>>, R>> {
    let mut header = vec![0u8; magic.len()];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(BpsError::FormatHeader(format!(
                    "failed to create {kind} reader: {e}"
                )))
            }
        }
    }

    if header[..filled] != *magic {
        error!(
            "Stream does not start with the {} magic bytes ({} bytes read)",
            kind, filled
        );
        return Err(BpsError::FormatHeader(format!(
            "failed to create {kind} reader: missing {kind} magic bytes"
        )));
    }

    Ok(Cursor::new(header).chain(reader))
}

fn extract_tar<R: Read>(reader: R, destination: &Path, strip_components: usize) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| BpsError::MalformedContainer(format!("failed to read tar response: {e}")))?;

    let mut links = HashSet::new();
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            error!("Error reading TAR entry: {}", e);
            BpsError::MalformedContainer(format!("failed to read tar response: {e}"))
        })?;

        let original_path = entry
            .path()
            .map_err(|e| {
                BpsError::MalformedContainer(format!("invalid path in tar entry: {e}"))
            })?
            .into_owned();

        let Some(target) = stripped_target(&original_path, destination, strip_components)? else {
            debug!(
                "Skipping entry due to strip_components: {}",
                original_path.display()
            );
            continue;
        };

        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().map_err(|e| {
            BpsError::MalformedContainer(format!(
                "invalid mode for tar entry {}: {e}",
                original_path.display()
            ))
        })?;

        match entry_type {
            EntryType::Directory => {
                reject_extracted_links(&target, destination, &links, true)?;
                create_directory(&target, mode)?
            }
            t if t.is_file() => {
                reject_extracted_links(&target, destination, &links, true)?;
                write_file(&mut entry, &target, mode)?
            }
            EntryType::Symlink => {
                reject_extracted_links(&target, destination, &links, false)?;
                let link_target = entry
                    .link_name()
                    .map_err(|e| {
                        BpsError::Symlink(target.display().to_string(), e.to_string())
                    })?
                    .map(|p| p.into_owned())
                    .unwrap_or_default();
                create_symlink(&link_target, &target)?;
                links.insert(target);
            }
            other => {
                debug!(
                    "Ignoring tar entry {} of type {:?}",
                    original_path.display(),
                    other
                );
            }
        }
    }

    debug!("Finished TAR extraction into {}", destination.display());
    Ok(())
}

fn extract_zip<R: Read>(mut reader: R, destination: &Path) -> Result<()> {
    // The central directory sits at the end of the file, so the zip reader
    // needs random access to the whole container.
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    debug!("Buffered {} bytes of zip archive", buffer.len());

    let mut archive = ZipArchive::new(Cursor::new(buffer))
        .map_err(|e| BpsError::MalformedContainer(format!("failed to create zip reader: {e}")))?;

    let mut links = HashSet::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| {
            BpsError::MalformedContainer(format!("failed to read zip entry {i}: {e}"))
        })?;

        let relative: PathBuf = match file.enclosed_name() {
            Some(p) => p,
            None => {
                error!("Unsafe ZIP entry name {}", file.name());
                return Err(BpsError::UnsafePath(file.name().to_string()));
            }
        };
        let target = destination.join(&relative);
        let unix_mode = file.unix_mode();

        let is_link = unix_mode.is_some_and(|m| m & S_IFMT == S_IFLNK);
        reject_extracted_links(&target, destination, &links, !is_link)?;

        if file.is_dir() {
            create_directory(&target, unix_mode.unwrap_or(DEFAULT_DIR_MODE))?;
        } else if is_link {
            let mut link_target = String::new();
            file.read_to_string(&mut link_target).map_err(|e| {
                BpsError::MalformedContainer(format!(
                    "failed to read symlink target of {}: {e}",
                    relative.display()
                ))
            })?;
            create_symlink(Path::new(&link_target), &target)?;
            links.insert(target);
        } else {
            write_file(&mut file, &target, unix_mode.unwrap_or(DEFAULT_FILE_MODE))?;
        }
    }

    debug!("Finished ZIP extraction into {}", destination.display());
    Ok(())
}

/// Drops the leading `strip_components` segments of `original` and joins
/// the rest under `destination`. `None` means nothing is left to write.
fn stripped_target(
    original: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<Option<PathBuf>> {
    let remaining: Vec<Component<'_>> = original.components().skip(strip_components).collect();
    if remaining.is_empty() {
        return Ok(None);
    }

    let mut target = destination.to_path_buf();
    for comp in remaining {
        match comp {
            Component::Normal(p) => target.push(p),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                error!(
                    "Disallowed component {:?} in TAR path {}",
                    comp,
                    original.display()
                );
                return Err(BpsError::UnsafePath(original.display().to_string()));
            }
        }
    }
    Ok(Some(target))
}

/// Fails when `target` would be written through a symlink created earlier in
/// the same extraction. With `include_self` the target path itself counts.
fn reject_extracted_links(
    target: &Path,
    destination: &Path,
    links: &HashSet<PathBuf>,
    include_self: bool,
) -> Result<()> {
    let skip = if include_self { 0 } else { 1 };
    for ancestor in target.ancestors().skip(skip) {
        if ancestor == destination || !ancestor.starts_with(destination) {
            break;
        }
        if links.contains(ancestor) {
            error!(
                "Entry {} would be written through extracted symlink {}",
                target.display(),
                ancestor.display()
            );
            return Err(BpsError::UnsafePath(target.display().to_string()));
        }
    }
    Ok(())
}

fn create_directory(path: &Path, mode: u32) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode & 0o7777);
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        BpsError::CreateDirectory(path.display().to_string(), e.to_string())
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.exists() => {
            debug!("Creating missing parent directory {}", parent.display());
            create_directory(parent, DEFAULT_DIR_MODE)
        }
        _ => Ok(()),
    }
}

fn write_file<R: Read>(reader: &mut R, path: &Path, mode: u32) -> Result<()> {
    ensure_parent(path)?;

    let create_err = |e: io::Error| BpsError::CreateFile(path.display().to_string(), e.to_string());

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode & 0o7777);
    let mut file: File = options.open(path).map_err(create_err)?;

    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(BpsError::MalformedContainer(format!(
                    "failed to read contents of {}: {e}",
                    path.display()
                )))
            }
        };
        file.write_all(&buf[..n]).map_err(create_err)?;
        written += n as u64;
    }

    // An existing file keeps its old mode through truncation.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
        .map_err(create_err)?;
    #[cfg(not(unix))]
    let _ = mode;

    debug!("Wrote {} ({} bytes)", path.display(), written);
    Ok(())
}

fn create_symlink(link_target: &Path, path: &Path) -> Result<()> {
    if link_target.as_os_str().is_empty() {
        error!("Symlink entry {} has an empty link target", path.display());
        return Err(BpsError::Symlink(
            path.display().to_string(),
            "empty link target".to_string(),
        ));
    }
    ensure_parent(path)?;

    if let Ok(existing) = path.symlink_metadata() {
        if !existing.is_dir() {
            debug!("Replacing existing entry at {}", path.display());
            fs::remove_file(path)
                .map_err(|e| BpsError::Symlink(path.display().to_string(), e.to_string()))?;
        }
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(link_target, path).map_err(|e| {
            debug!(
                "Failed to create symlink {} -> {}: {}",
                path.display(),
                link_target.display(),
                e
            );
            BpsError::Symlink(path.display().to_string(), e.to_string())
        })?;
    }
    #[cfg(not(unix))]
    {
        warn!(
            "Cannot create symlink on non-unix system: {} -> {}",
            path.display(),
            link_target.display()
        );
    }
    Ok(())
}
