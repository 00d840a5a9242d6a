//! Random-access cleartext view over a chunk-encrypted file.
//!
//! # File Format Reference
//!
//! An encrypted file is a header followed by zero or more chunks:
//! - **Header**: per-file nonce and content key, sealed under the master key
//! - **Chunks**: each holds up to one cleartext chunk plus a fixed overhead,
//!   authenticated together with its index and the header nonce
//!
//! Any chunk can be decrypted on its own given the header, so reads seek
//! straight to the first chunk they need. Writes pick one of three strategies:
//! a full replace for truncating opens, a header-rotating merge into a
//! scratch file when the chunk count changes, or an in-place update of just
//! the touched chunks.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::str::FromStr;

use relative_path::{RelativePath, RelativePathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, Cryptor};
use crate::storage::{Storage, StorageError, WriteMode};
use crate::vault::config::ROTATION_TEMP_SUFFIX;

// ============================================================================
// Chunk Math Helpers
// ============================================================================

/// Framing constants of one cryptor, in the units the arithmetic needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub header_size: u64,
    pub cleartext_chunk_size: u64,
    pub ciphertext_chunk_size: u64,
}

impl ChunkLayout {
    pub fn new(header_size: u64, cleartext_chunk_size: u64, ciphertext_chunk_size: u64) -> Self {
        Self {
            header_size,
            cleartext_chunk_size,
            ciphertext_chunk_size,
        }
    }

    pub fn of<C: Cryptor>(cryptor: &C) -> Self {
        Self::new(
            cryptor.header_size() as u64,
            cryptor.cleartext_chunk_size() as u64,
            cryptor.ciphertext_chunk_size() as u64,
        )
    }

    #[inline]
    pub fn chunk_overhead(&self) -> u64 {
        self.ciphertext_chunk_size - self.cleartext_chunk_size
    }

    /// Cleartext length of a ciphertext file of `ciphertext_len` bytes.
    ///
    /// Anything shorter than a header is an empty file, as is a header
    /// followed by one empty chunk. Any other trailing remainder that cannot
    /// hold a byte of cleartext is corrupt.
    pub fn cleartext_size(&self, ciphertext_len: u64) -> Result<u64, InvalidCiphertextSize> {
        if ciphertext_len < self.header_size {
            return Ok(0);
        }
        let content = ciphertext_len - self.header_size;
        let full_chunks = content / self.ciphertext_chunk_size;
        let remainder = content % self.ciphertext_chunk_size;

        if remainder == 0 {
            return Ok(full_chunks * self.cleartext_chunk_size);
        }
        if remainder <= self.chunk_overhead() {
            if full_chunks == 0 && remainder == self.chunk_overhead() {
                return Ok(0);
            }
            return Err(InvalidCiphertextSize(ciphertext_len));
        }
        Ok(full_chunks * self.cleartext_chunk_size + remainder - self.chunk_overhead())
    }

    /// Ciphertext length produced for `cleartext_len` bytes of content.
    pub fn ciphertext_size(&self, cleartext_len: u64) -> u64 {
        let full_chunks = cleartext_len / self.cleartext_chunk_size;
        let remainder = cleartext_len % self.cleartext_chunk_size;
        let tail = if remainder > 0 {
            remainder + self.chunk_overhead()
        } else {
            0
        };
        self.header_size + full_chunks * self.ciphertext_chunk_size + tail
    }

    /// Number of chunks holding `cleartext_len` bytes.
    #[inline]
    pub fn chunk_count(&self, cleartext_len: u64) -> u64 {
        cleartext_len.div_ceil(self.cleartext_chunk_size)
    }

    /// Chunk containing the cleartext byte at `offset`.
    #[inline]
    pub fn chunk_index(&self, offset: u64) -> u64 {
        offset / self.cleartext_chunk_size
    }

    /// Position of cleartext byte `offset` within its chunk.
    #[inline]
    pub fn chunk_offset(&self, offset: u64) -> usize {
        (offset % self.cleartext_chunk_size) as usize
    }

    /// Ciphertext file position where chunk `index` starts.
    #[inline]
    pub fn chunk_position(&self, index: u64) -> u64 {
        self.header_size + index * self.ciphertext_chunk_size
    }
}

/// A ciphertext length that no sequence of chunks can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ciphertext length {0} does not frame into whole chunks")]
pub struct InvalidCiphertextSize(pub u64);

// ============================================================================
// Configuration
// ============================================================================

/// When a write re-keys the file under a fresh header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Rotate only when a write changes the chunk count or the file has no header.
    #[default]
    OnResize,
    /// Rotate on every write.
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub rotation: RotationPolicy,
}

/// How a file handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMode {
    pub read: bool,
    pub write: bool,
    /// The first write replaces all prior content
    pub truncate: bool,
}

impl AccessMode {
    pub const READ: Self = Self {
        read: true,
        write: false,
        truncate: false,
    };
    pub const WRITE_TRUNCATE: Self = Self {
        read: false,
        write: true,
        truncate: true,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        truncate: false,
    };
    pub const READ_WRITE_TRUNCATE: Self = Self {
        read: true,
        write: true,
        truncate: true,
    };
}

impl FromStr for AccessMode {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::READ),
            "w" | "wt" => Ok(Self::WRITE_TRUNCATE),
            "rw" => Ok(Self::READ_WRITE),
            "rwt" => Ok(Self::READ_WRITE_TRUNCATE),
            other => Err(ContentError::InvalidMode(other.to_owned())),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Context for content operations, providing debugging information.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    /// Cleartext path inside the vault
    pub cleartext_path: Option<String>,
    /// Container path relative to the vault root
    pub container: Option<String>,
}

impl FileContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cleartext_path(mut self, path: impl Into<String>) -> Self {
        self.cleartext_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

impl fmt::Display for FileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.cleartext_path, &self.container) {
            (Some(path), Some(container)) => write!(f, "file '{path}' at '{container}'"),
            (Some(path), None) => write!(f, "file '{path}'"),
            (None, Some(container)) => write!(f, "container '{container}'"),
            (None, None) => write!(f, "(no context)"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("{context} is not open for writing")]
    NotWritable { context: FileContext },

    #[error("Unknown access mode '{0}'")]
    InvalidMode(String),

    /// The ciphertext length is not a valid framing; the file is corrupt.
    #[error("Invalid ciphertext size {size} for {context}")]
    InvalidCiphertextSize { size: u64, context: FileContext },

    #[error("Chunk {chunk} of {context} is missing")]
    TruncatedChunk { chunk: u64, context: FileContext },

    /// Header or chunk crypto failed. Authentication failures are
    /// **[INTEGRITY VIOLATION]**s.
    #[error("Crypto failure for {context}: {source}")]
    Crypto {
        #[source]
        source: CryptoError,
        context: FileContext,
    },

    #[error("IO error for {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: FileContext,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ContentError {
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, ContentError::Crypto { source, .. } if source.is_integrity_violation())
    }
}

// ============================================================================
// ChunkedFile
// ============================================================================

/// Byte-addressable handle on one encrypted file.
///
/// Every call opens the ciphertext afresh; nothing is buffered between calls.
/// Callers must not run two mutating operations on the same file at once.
pub struct ChunkedFile<'a, C: Cryptor, S: Storage> {
    cryptor: &'a C,
    storage: &'a S,
    container: RelativePathBuf,
    layout: ChunkLayout,
    mode: AccessMode,
    config: ContentConfig,
    truncate_pending: bool,
    context: FileContext,
}

impl<C: Cryptor, S: Storage> fmt::Debug for ChunkedFile<'_, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedFile")
            .field("container", &self.container)
            .field("mode", &self.mode)
            .field("truncate_pending", &self.truncate_pending)
            .finish_non_exhaustive()
    }
}

/// Which write strategy a call ends up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Replace,
    Rotate,
    InPlace,
}

impl<'a, C: Cryptor, S: Storage> ChunkedFile<'a, C, S> {
    pub fn new(
        cryptor: &'a C,
        storage: &'a S,
        container: impl Into<RelativePathBuf>,
        mode: AccessMode,
        config: ContentConfig,
    ) -> Self {
        let container = container.into();
        let context = FileContext::new().with_container(container.as_str());
        Self {
            cryptor,
            storage,
            layout: ChunkLayout::of(cryptor),
            truncate_pending: mode.truncate && mode.write,
            container,
            mode,
            config,
            context,
        }
    }

    /// Attach the cleartext path used in error messages.
    #[must_use]
    pub fn with_cleartext_path(mut self, path: impl Into<String>) -> Self {
        self.context = self.context.with_cleartext_path(path);
        self
    }

    pub fn container(&self) -> &RelativePath {
        &self.container
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    /// Cleartext length, derived from the ciphertext length.
    pub fn size(&self) -> Result<u64, ContentError> {
        let ciphertext_len = self.ciphertext_len()?;
        self.layout
            .cleartext_size(ciphertext_len)
            .map_err(|InvalidCiphertextSize(size)| ContentError::InvalidCiphertextSize {
                size,
                context: self.context.clone(),
            })
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer bytes at end of file and none at all past it.
    #[instrument(level = "debug", skip(self), fields(file = %self.context))]
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>, ContentError> {
        let size = self.size()?;
        if offset >= size || len == 0 {
            trace!(offset, size, "Read past EOF");
            return Ok(Vec::new());
        }
        let end = size.min(offset.saturating_add(len as u64));
        let first = self.layout.chunk_index(offset);
        let last = self.layout.chunk_index(end - 1);

        let mut reader = self.storage.open_read(&self.container)?;
        let header = self.read_header(&mut reader)?;
        self.seek(&mut reader, self.layout.chunk_position(first))?;

        let mut result = Vec::with_capacity((end - offset) as usize);
        let mut buf = vec![0u8; self.layout.ciphertext_chunk_size as usize];
        for index in first..=last {
            let chunk = self.read_chunk(&mut reader, index, &header, &mut buf)?;
            let chunk_start = index * self.layout.cleartext_chunk_size;
            let from = if index == first {
                self.layout.chunk_offset(offset)
            } else {
                0
            };
            let to = ((end - chunk_start) as usize).min(chunk.len());
            if from < to {
                result.extend_from_slice(&chunk[from..to]);
            }
        }

        trace!(read_bytes = result.len(), "Range read complete");
        Ok(result)
    }

    /// Write `data` at `offset`, returning the number of bytes accepted.
    #[instrument(level = "debug", skip(self, data), fields(file = %self.context, len = data.len()))]
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<usize, ContentError> {
        self.ensure_writable()?;

        if self.truncate_pending {
            self.truncate_pending = false;
            debug!(strategy = ?Strategy::Replace, "Writing");
            self.replace(offset, data)?;
            return Ok(data.len());
        }
        if data.is_empty() {
            return Ok(0);
        }

        let ciphertext_len = self.ciphertext_len()?;
        let original_size = self.size()?;
        let end = offset + data.len() as u64;
        let has_header = ciphertext_len >= self.layout.header_size;

        let strategy = if has_header
            && self.config.rotation == RotationPolicy::OnResize
            && self.layout.chunk_count(original_size.max(end))
                == self.layout.chunk_count(original_size)
        {
            Strategy::InPlace
        } else {
            Strategy::Rotate
        };
        debug!(?strategy, original_size, offset, "Writing");

        match strategy {
            Strategy::InPlace => self.update_in_place(offset, data, original_size)?,
            _ => self.rotate(offset, data, original_size, has_header, false)?,
        }
        Ok(data.len())
    }

    /// Truncate or zero-extend to `len` bytes under a fresh header.
    #[instrument(level = "debug", skip(self), fields(file = %self.context))]
    pub fn set_len(&mut self, len: u64) -> Result<(), ContentError> {
        self.ensure_writable()?;
        self.truncate_pending = false;
        let ciphertext_len = self.ciphertext_len()?;
        let original_size = self.size()?;
        let has_header = ciphertext_len >= self.layout.header_size;
        self.rotate(len, &[], original_size, has_header, true)
    }

    /// Apply any pending truncation so the ciphertext reflects the handle.
    pub fn flush(&mut self) -> Result<(), ContentError> {
        if self.truncate_pending {
            self.truncate_pending = false;
            self.replace(0, &[])?;
        }
        Ok(())
    }

    /// Release the handle.
    pub fn close(mut self) -> Result<(), ContentError> {
        self.flush()
    }

    // ------------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------------

    /// Discard the old ciphertext and stream `offset` zero bytes followed by
    /// `data` under a new header.
    fn replace(&self, offset: u64, data: &[u8]) -> Result<(), ContentError> {
        let header = self.new_header()?;
        let mut writer = self.storage.open_write(&self.container, WriteMode::Truncate)?;
        self.write_header(&mut writer, &header)?;

        let mut input = io::repeat(0).take(offset).chain(data);
        let mut piece = Zeroizing::new(vec![0u8; self.layout.cleartext_chunk_size as usize]);
        let mut index = 0u64;
        loop {
            let n = read_full(&mut input, &mut piece).map_err(|e| self.io(e))?;
            if n == 0 {
                break;
            }
            self.write_chunk(&mut writer, &piece[..n], index, &header)?;
            index += 1;
        }

        self.storage.sync(&mut writer)?;
        trace!(chunks = index, "Replace complete");
        Ok(())
    }

    /// Rebuild the whole file under a new header in a scratch file, merging
    /// original chunks with `data`, then rename it over the original.
    fn rotate(
        &self,
        offset: u64,
        data: &[u8],
        original_size: u64,
        has_header: bool,
        truncate: bool,
    ) -> Result<(), ContentError> {
        let temp = RelativePathBuf::from(format!(
            "{}{ROTATION_TEMP_SUFFIX}",
            self.container.as_str()
        ));

        let result = self.rotate_into(&temp, offset, data, original_size, has_header, truncate);
        match result {
            Ok(()) => self
                .storage
                .rename(&temp, &self.container)
                .map_err(ContentError::from),
            Err(err) => {
                if let Err(cleanup) = self.storage.delete(&temp)
                    && !cleanup.is_not_found()
                {
                    warn!(temp = %temp, error = %cleanup, "Failed to remove rotation scratch file");
                }
                Err(err)
            }
        }
    }

    fn rotate_into(
        &self,
        temp: &RelativePath,
        offset: u64,
        data: &[u8],
        original_size: u64,
        has_header: bool,
        truncate: bool,
    ) -> Result<(), ContentError> {
        let end = offset + data.len() as u64;
        let new_size = if truncate { end } else { original_size.max(end) };
        let original_size = if has_header { original_size } else { 0 };

        let mut original = if original_size > 0 {
            let mut reader = self.storage.open_read(&self.container)?;
            let header = self.read_header(&mut reader)?;
            Some((reader, header))
        } else {
            None
        };
        // Next chunk the reader would return without seeking
        let mut reader_at: Option<u64> = None;

        let header = self.new_header()?;
        let mut writer = self.storage.open_write(temp, WriteMode::Truncate)?;
        self.write_header(&mut writer, &header)?;

        let cs = self.layout.cleartext_chunk_size;
        let mut buf = vec![0u8; self.layout.ciphertext_chunk_size as usize];
        let chunks = self.layout.chunk_count(new_size);
        for index in 0..chunks {
            let chunk_start = index * cs;
            let chunk_end = (chunk_start + cs).min(new_size);
            let (lo, hi) = (offset.max(chunk_start), end.min(chunk_end));
            let existing_end = original_size.min(chunk_end);

            let needs_original =
                existing_end > chunk_start && !(lo == chunk_start && hi >= existing_end);
            let mut plain = match (&mut original, needs_original) {
                (Some((reader, old_header)), true) => {
                    if reader_at != Some(index) {
                        self.seek(reader, self.layout.chunk_position(index))?;
                    }
                    let chunk = self.read_chunk(reader, index, old_header, &mut buf)?;
                    reader_at = Some(index + 1);
                    chunk
                }
                _ => Zeroizing::new(Vec::new()),
            };

            plain.resize((chunk_end - chunk_start) as usize, 0);
            if lo < hi {
                let dst = (lo - chunk_start) as usize..(hi - chunk_start) as usize;
                let src = (lo - offset) as usize..(hi - offset) as usize;
                plain[dst].copy_from_slice(&data[src]);
            }
            self.write_chunk(&mut writer, &plain, index, &header)?;
        }

        self.storage.sync(&mut writer)?;
        trace!(chunks, new_size, "Rotation complete");
        Ok(())
    }

    /// Re-encrypt only the chunks `data` touches, under the existing header.
    ///
    /// Boundary chunks are decrypted and spliced; chunks `data` covers
    /// entirely are encrypted from `data` alone.
    fn update_in_place(
        &self,
        offset: u64,
        data: &[u8],
        original_size: u64,
    ) -> Result<(), ContentError> {
        let end = offset + data.len() as u64;
        let first = self.layout.chunk_index(offset);
        let last = self.layout.chunk_index(end - 1);
        let cs = self.layout.cleartext_chunk_size;

        let mut reader = self.storage.open_read(&self.container)?;
        let header = self.read_header(&mut reader)?;
        let mut writer = self
            .storage
            .open_write(&self.container, WriteMode::RandomAccess)?;

        let mut buf = vec![0u8; self.layout.ciphertext_chunk_size as usize];
        for index in first..=last {
            let chunk_start = index * cs;
            let (lo, hi) = (offset.max(chunk_start), end.min(chunk_start + cs));
            let existing_end = original_size.min(chunk_start + cs);

            let mut plain = if existing_end > chunk_start && !(lo == chunk_start && hi >= existing_end)
            {
                trace!(chunk = index, "Splicing into existing chunk");
                self.seek(&mut reader, self.layout.chunk_position(index))?;
                self.read_chunk(&mut reader, index, &header, &mut buf)?
            } else {
                Zeroizing::new(Vec::new())
            };

            let needed = (hi - chunk_start) as usize;
            if plain.len() < needed {
                plain.resize(needed, 0);
            }
            let dst = (lo - chunk_start) as usize..needed;
            plain[dst].copy_from_slice(&data[(lo - offset) as usize..(hi - offset) as usize]);

            self.seek(&mut writer, self.layout.chunk_position(index))?;
            self.write_chunk(&mut writer, &plain, index, &header)?;
        }

        self.storage.sync(&mut writer)?;
        trace!(first, last, "In-place update complete");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn ensure_writable(&self) -> Result<(), ContentError> {
        if self.mode.write {
            Ok(())
        } else {
            Err(ContentError::NotWritable {
                context: self.context.clone(),
            })
        }
    }

    fn ciphertext_len(&self) -> Result<u64, ContentError> {
        match self.storage.entry(&self.container)? {
            Some(entry) if entry.is_file() => Ok(entry.len),
            _ => Err(StorageError::NotFound {
                path: self.container.as_str().to_owned(),
            }
            .into()),
        }
    }

    fn new_header(&self) -> Result<C::Header, ContentError> {
        self.cryptor.create_header().map_err(|e| self.crypto(e))
    }

    fn read_header<R: Read>(&self, reader: &mut R) -> Result<C::Header, ContentError> {
        let mut sealed = vec![0u8; self.layout.header_size as usize];
        reader.read_exact(&mut sealed).map_err(|e| self.io(e))?;
        self.cryptor.decrypt_header(&sealed).map_err(|e| self.crypto(e))
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &C::Header) -> Result<(), ContentError> {
        let sealed = self.cryptor.encrypt_header(header).map_err(|e| self.crypto(e))?;
        writer.write_all(&sealed).map_err(|e| self.io(e))
    }

    fn read_chunk<R: Read>(
        &self,
        reader: &mut R,
        index: u64,
        header: &C::Header,
        buf: &mut [u8],
    ) -> Result<Zeroizing<Vec<u8>>, ContentError> {
        let n = read_full(reader, buf).map_err(|e| self.io(e))?;
        if n == 0 {
            return Err(ContentError::TruncatedChunk {
                chunk: index,
                context: self.context.clone(),
            });
        }
        self.cryptor
            .decrypt_chunk(&buf[..n], index, header)
            .map_err(|e| self.crypto(e))
    }

    fn write_chunk<W: Write>(
        &self,
        writer: &mut W,
        cleartext: &[u8],
        index: u64,
        header: &C::Header,
    ) -> Result<(), ContentError> {
        let sealed = self
            .cryptor
            .encrypt_chunk(cleartext, index, header)
            .map_err(|e| self.crypto(e))?;
        writer.write_all(&sealed).map_err(|e| self.io(e))
    }

    fn seek<T: Seek>(&self, stream: &mut T, position: u64) -> Result<(), ContentError> {
        stream
            .seek(SeekFrom::Start(position))
            .map(drop)
            .map_err(|e| self.io(e))
    }

    fn crypto(&self, source: CryptoError) -> ContentError {
        ContentError::Crypto {
            source,
            context: self.context.clone(),
        }
    }

    fn io(&self, source: io::Error) -> ContentError {
        ContentError::Io {
            source,
            context: self.context.clone(),
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: ChunkLayout = ChunkLayout {
        header_size: 88,
        cleartext_chunk_size: 32768,
        ciphertext_chunk_size: 32816,
    };

    #[test]
    fn chunk_arithmetic() {
        assert_eq!(LAYOUT.chunk_index(0), 0);
        assert_eq!(LAYOUT.chunk_index(32767), 0);
        assert_eq!(LAYOUT.chunk_index(32768), 1);
        assert_eq!(LAYOUT.chunk_offset(32768 + 5), 5);
        assert_eq!(LAYOUT.chunk_position(0), 88);
        assert_eq!(LAYOUT.chunk_position(2), 88 + 2 * 32816);
        assert_eq!(LAYOUT.chunk_count(0), 0);
        assert_eq!(LAYOUT.chunk_count(1), 1);
        assert_eq!(LAYOUT.chunk_count(32768), 1);
        assert_eq!(LAYOUT.chunk_count(32769), 2);
    }

    #[test]
    fn size_edge_cases() {
        assert_eq!(LAYOUT.cleartext_size(0), Ok(0));
        assert_eq!(LAYOUT.cleartext_size(87), Ok(0));
        assert_eq!(LAYOUT.cleartext_size(88), Ok(0));
        // Header plus one empty chunk
        assert_eq!(LAYOUT.cleartext_size(88 + 48), Ok(0));
        assert_eq!(LAYOUT.cleartext_size(88 + 49), Ok(1));
        assert_eq!(LAYOUT.cleartext_size(88 + 32816), Ok(32768));
        assert_eq!(
            LAYOUT.cleartext_size(88 + 32816 + 10),
            Err(InvalidCiphertextSize(88 + 32816 + 10))
        );
        assert_eq!(
            LAYOUT.cleartext_size(88 + 32816 + 48),
            Err(InvalidCiphertextSize(88 + 32816 + 48))
        );
    }

    #[test]
    fn sizes_invert() {
        for len in [0u64, 1, 47, 32767, 32768, 32769, 100_000, 3 * 32768] {
            assert_eq!(LAYOUT.cleartext_size(LAYOUT.ciphertext_size(len)), Ok(len));
        }
    }

    #[test]
    fn worked_example_with_forty_byte_overhead() {
        let layout = ChunkLayout::new(88, 32768, 32768 + 40);
        assert_eq!(layout.chunk_count(100_000), 4);
        assert_eq!(100_000 - 3 * 32768, 2096);
        assert_eq!(
            layout.ciphertext_size(100_000),
            88 + 3 * 32808 + (2096 + 40)
        );
        assert_eq!(layout.cleartext_size(88 + 3 * 32808 + 2136), Ok(100_000));
    }

    #[test]
    fn access_modes_parse() {
        assert_eq!("r".parse::<AccessMode>().unwrap(), AccessMode::READ);
        assert_eq!("w".parse::<AccessMode>().unwrap(), AccessMode::WRITE_TRUNCATE);
        assert_eq!("wt".parse::<AccessMode>().unwrap(), AccessMode::WRITE_TRUNCATE);
        assert_eq!("rw".parse::<AccessMode>().unwrap(), AccessMode::READ_WRITE);
        assert_eq!("rwt".parse::<AccessMode>().unwrap(), AccessMode::READ_WRITE_TRUNCATE);
        assert!(matches!(
            "x".parse::<AccessMode>(),
            Err(ContentError::InvalidMode(_))
        ));
    }

    #[test]
    fn read_full_stops_at_eof() {
        let mut input: &[u8] = b"abc";
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut input, &mut buf).unwrap(), 3);
        assert_eq!(read_full(&mut input, &mut buf).unwrap(), 0);
    }

    #[test]
    fn context_display() {
        let ctx = FileContext::new()
            .with_cleartext_path("/a.txt")
            .with_container("d/AB/CD/x.c9r");
        assert_eq!(ctx.to_string(), "file '/a.txt' at 'd/AB/CD/x.c9r'");
        assert_eq!(FileContext::new().to_string(), "(no context)");
    }
}
