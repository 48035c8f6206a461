// bps-aio/src/checksum.rs
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bps_common::error::{BpsError, Result};
use crossbeam_channel::bounded;
use sha2::{Digest, Sha256};
use threadpool::ThreadPool;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::fs::copy_path;

/// Calculates SHA-256 checksums of files and directory trees. Directory
/// trees are hashed in parallel on a fixed pool of workers.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumCalculator {
    workers: usize,
}

struct CalculatedFile {
    path: PathBuf,
    checksum: io::Result<Vec<u8>>,
}

impl Default for ChecksumCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumCalculator {
    /// One worker per logical processor.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hex-encoded SHA-256 of a file, or of a directory tree.
    ///
    /// A directory digest is the SHA-256 over the raw digests of every regular
    /// file below it, ordered by path, so it does not depend on walk or
    /// worker completion order. Symlinks and special files are skipped.
    pub fn sum(&self, path: &Path) -> Result<String> {
        let metadata = fs::metadata(path)
            .map_err(|e| BpsError::Checksum(format!("{}: {}", path.display(), e)))?;

        if !metadata.is_dir() {
            let digest = hash_file(path)
                .map_err(|e| BpsError::Checksum(format!("{}: {}", path.display(), e)))?;
            return Ok(hex::encode(digest));
        }

        let files = regular_files(path)?;
        debug!(
            "Calculating checksum of {} files below {} with {} workers",
            files.len(),
            path.display(),
            self.workers
        );

        let mut hasher = Sha256::new();
        for (_, checksum) in parallel_checksums(files, self.workers, hash_file)? {
            hasher.update(&checksum);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Hex-encoded SHA-256 over several files and/or directories, computed by
    /// copying each input into one scratch directory and summing that.
    pub fn sum_multiple<P: AsRef<Path>>(&self, paths: &[P]) -> Result<String> {
        let scratch = tempfile::Builder::new()
            .prefix("checksum")
            .tempdir()
            .map_err(|e| BpsError::Checksum(format!("failed to create temp directory: {e}")))?;

        for (index, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            // The index keeps the inputs in argument order once sorted.
            let name = format!("{index:08}-{}", hex::encode(rand::random::<[u8; 16]>()));
            copy_path(path, &scratch.path().join(name))
                .map_err(|e| BpsError::Checksum(format!("{}: {}", path.display(), e)))?;
        }

        let sum = self.sum(scratch.path())?;
        scratch
            .close()
            .map_err(|e| BpsError::Checksum(format!("failed to remove temp directory: {e}")))?;
        Ok(sum)
    }
}

fn hash_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

fn regular_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| BpsError::Checksum(e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Hashes `files` on a pool of `workers` threads and returns the digests
/// sorted by the byte representation of their paths.
///
/// All files are queued up front and the result channel can hold every
/// result, so neither side ever blocks on the other. On failure the first
/// error received is returned; receive order is completion order, so which
/// error wins depends on scheduling when several files fail.
fn parallel_checksums<F>(
    files: Vec<PathBuf>,
    workers: usize,
    hash: F,
) -> Result<Vec<(PathBuf, Vec<u8>)>>
where
    F: Fn(&Path) -> io::Result<Vec<u8>> + Send + Sync + 'static,
{
    let num_files = files.len();
    if num_files == 0 {
        return Ok(Vec::new());
    }

    let hash = Arc::new(hash);
    let (file_tx, file_rx) = bounded::<PathBuf>(num_files);
    let (result_tx, result_rx) = bounded::<CalculatedFile>(num_files);

    for path in files {
        file_tx
            .send(path)
            .map_err(|e| BpsError::Checksum(format!("failed to queue {}", e.0.display())))?;
    }
    drop(file_tx);

    let pool = ThreadPool::new(workers.max(1));
    for _ in 0..pool.max_count() {
        let file_rx = file_rx.clone();
        let result_tx = result_tx.clone();
        let hash = Arc::clone(&hash);
        pool.execute(move || {
            for path in file_rx {
                let checksum = hash(&path);
                // The collector may already have bailed out on an error.
                let _ = result_tx.send(CalculatedFile { path, checksum });
            }
        });
    }
    drop(result_tx);

    let mut calculated = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        let file = result_rx.recv().map_err(|_| {
            BpsError::Checksum("checksum workers stopped before reporting every file".to_string())
        })?;
        match file.checksum {
            Ok(checksum) => calculated.push((file.path, checksum)),
            Err(e) => {
                error!("Failed to hash {}: {}", file.path.display(), e);
                return Err(BpsError::Checksum(format!("{}: {}", file.path.display(), e)));
            }
        }
    }

    calculated.sort_by(|(a, _), (b, _)| {
        a.as_os_str()
            .as_encoded_bytes()
            .cmp(b.as_os_str().as_encoded_bytes())
    });
    Ok(calculated)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        fs::write(dir.path().join("b.txt"), b"bravo").unwrap();
        fs::write(dir.path().join("nested/c.txt"), b"charlie").unwrap();
        fs::write(dir.path().join("nested/deeper/d.txt"), b"delta").unwrap();
        fs::write(dir.path().join("a-z.txt"), b"ordering").unwrap();
        dir
    }

    fn sha(bytes: &[u8]) -> Vec<u8> {
        Sha256::digest(bytes).to_vec()
    }

    #[test]
    fn sums_a_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"").unwrap();
        assert_eq!(ChecksumCalculator::new().sum(&file).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn directory_sum_hashes_sorted_raw_digests() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b"), b"first").unwrap();
        fs::write(dir.path().join("a-c"), b"second").unwrap();

        // Byte order puts "a-c" ('-' = 0x2d) before "a/b" ('/' = 0x2f).
        let mut expected = Sha256::new();
        expected.update(sha(b"second"));
        expected.update(sha(b"first"));

        assert_eq!(
            ChecksumCalculator::new().sum(dir.path()).unwrap(),
            hex::encode(expected.finalize())
        );
    }

    #[test]
    fn empty_directory_sums_to_empty_digest() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ChecksumCalculator::new().sum(dir.path()).unwrap(), EMPTY_SHA256);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_hashed() {
        let dir = tree();
        let before = ChecksumCalculator::new().sum(dir.path()).unwrap();
        std::os::unix::fs::symlink("a.txt", dir.path().join("link")).unwrap();
        assert_eq!(ChecksumCalculator::new().sum(dir.path()).unwrap(), before);
    }

    #[test]
    fn worker_count_does_not_change_the_digest() {
        let dir = tree();
        let single = ChecksumCalculator::with_workers(1).sum(dir.path()).unwrap();
        let many = ChecksumCalculator::with_workers(8).sum(dir.path()).unwrap();
        assert_eq!(single, many);
    }

    #[test]
    fn digest_is_independent_of_completion_order() {
        let dir = tree();
        let files = regular_files(dir.path()).unwrap();

        // Delay each file differently, reversing the order between runs.
        let run = |reverse: bool| {
            let total = files.len() as u64;
            let order: Vec<PathBuf> = files.clone();
            parallel_checksums(files.clone(), 4, move |path: &Path| {
                let position = order.iter().position(|p| p == path).unwrap() as u64;
                let slot = if reverse { total - position } else { position };
                std::thread::sleep(Duration::from_millis(5 * slot));
                hash_file(path)
            })
            .unwrap()
        };

        let forward = run(false);
        let backward = run(true);
        assert_eq!(forward, backward);
        assert_eq!(
            forward.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>(),
            {
                let mut sorted = files.clone();
                sorted.sort_by(|a, b| {
                    a.as_os_str()
                        .as_encoded_bytes()
                        .cmp(b.as_os_str().as_encoded_bytes())
                });
                sorted
            }
        );
    }

    #[test]
    fn a_failing_file_aborts_the_sum() {
        let dir = tree();
        let files = regular_files(dir.path()).unwrap();
        let err = parallel_checksums(files, 3, |path: &Path| {
            if path.ends_with("c.txt") {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"))
            } else {
                hash_file(path)
            }
        })
        .unwrap_err();
        assert!(matches!(err, BpsError::Checksum(_)));
        assert!(err.to_string().contains("c.txt"));
    }

    #[test]
    fn missing_path_fails() {
        let err = ChecksumCalculator::new()
            .sum(Path::new("/no/such/checksum/input"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to calculate checksum"));
    }

    #[test]
    fn sum_multiple_keeps_argument_order_and_is_stable() {
        let dir = tree();
        let calculator = ChecksumCalculator::new();
        let inputs = [dir.path().join("a.txt"), dir.path().join("nested")];

        let first = calculator.sum_multiple(&inputs).unwrap();
        let second = calculator.sum_multiple(&inputs).unwrap();
        assert_eq!(first, second);

        let mut expected = Sha256::new();
        expected.update(sha(b"alpha"));
        expected.update(sha(b"charlie"));
        expected.update(sha(b"delta"));
        assert_eq!(first, hex::encode(expected.finalize()));
    }

    #[test]
    fn sum_multiple_fails_on_missing_input() {
        let dir = tree();
        let err = ChecksumCalculator::new()
            .sum_multiple(&[dir.path().join("a.txt"), dir.path().join("missing")])
            .unwrap_err();
        assert!(matches!(err, BpsError::Checksum(_)));
    }
}
