//! File transfer chunking and reassembly.
//!
//! Files travel over the signaling stream as a `file-metadata` frame, a run
//! of base64-encoded chunks of at most 16384 raw bytes, and a `file-eof`
//! terminator. The stream is ordered per sender, so reassembly is a plain
//! concatenation checked against the announced size.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use tandem_common::{FileMetadata, FILE_CHUNK_SIZE};

/// File transfer failures.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Chunk decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Size mismatch: announced {expected} bytes, received {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Split raw bytes into wire chunks.
pub fn encode_chunks(bytes: &[u8]) -> impl Iterator<Item = String> + '_ {
    bytes.chunks(FILE_CHUNK_SIZE).map(|chunk| BASE64.encode(chunk))
}

/// In-progress inbound transfer.
#[derive(Debug)]
pub struct FileReassembly {
    metadata: FileMetadata,
    buffer: Vec<u8>,
}

impl FileReassembly {
    #[must_use]
    pub fn new(metadata: FileMetadata) -> Self {
        let capacity = usize::try_from(metadata.size).unwrap_or(0);
        Self {
            metadata,
            buffer: Vec::with_capacity(capacity.min(64 * 1024 * 1024)),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Decode and append one chunk.
    pub fn push_chunk(&mut self, encoded: &str) -> Result<(), FileError> {
        let raw = BASE64.decode(encoded)?;
        self.buffer.extend_from_slice(&raw);
        Ok(())
    }

    /// Finish on `file-eof`; the byte count must match the metadata exactly.
    pub fn finish(self) -> Result<(FileMetadata, Vec<u8>), FileError> {
        let actual = self.buffer.len() as u64;
        if actual != self.metadata.size {
            return Err(FileError::SizeMismatch {
                expected: self.metadata.size,
                actual,
            });
        }
        Ok((self.metadata, self.buffer))
    }
}
