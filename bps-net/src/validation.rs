// bps-net/src/validation.rs
use std::io::{self, Read};

use bps_common::error::{BpsError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Hashes every byte that passes through it so the stream can be checked
/// against an expected SHA-256 once it has been consumed.
pub struct ValidatedReader<R> {
    reader: R,
    hasher: Sha256,
    expected: String,
    bytes_read: u64,
}

impl<R: Read> ValidatedReader<R> {
    pub fn new(reader: R, expected: impl Into<String>) -> Self {
        Self {
            reader,
            hasher: Sha256::new(),
            expected: expected.into(),
            bytes_read: 0,
        }
    }

    /// Hex digest of everything read so far.
    pub fn hex_digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Reads whatever the consumer left behind (archive padding, compression
    /// trailers) and compares the digest of the whole stream, ignoring case.
    pub fn valid(&mut self) -> io::Result<bool> {
        io::copy(self, &mut io::sink())?;
        let actual = self.hex_digest();
        debug!(
            "Calculated SHA256: {} ({} bytes read)",
            actual, self.bytes_read
        );
        debug!("Expected SHA256:   {}", self.expected);
        Ok(actual.eq_ignore_ascii_case(&self.expected))
    }

    /// Like [`valid`](Self::valid), with the outcome mapped onto the error
    /// taxonomy: read failures are validation errors, a differing digest is
    /// a checksum mismatch.
    pub fn validate(&mut self) -> Result<()> {
        match self.valid() {
            Ok(true) => Ok(()),
            Ok(false) => Err(BpsError::ChecksumMismatch {
                expected: self.expected.clone(),
                actual: self.hex_digest(),
            }),
            Err(e) => Err(BpsError::Validation(e.to_string())),
        }
    }
}

impl<R: Read> Read for ValidatedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
