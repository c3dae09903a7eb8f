use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloudmux_protocol::HashAlgorithm;
use tempfile::NamedTempFile;

use crate::hasher::{ContentDigest, ContentHasher};
use crate::{HASH_WINDOW, TransferError};

/// Byte source that supports independent, concurrent ranged reads.
///
/// Chunk workers call [`read_range`](Self::read_range) from several threads
/// at once for disjoint ranges, so implementations must not keep a shared
/// cursor.
pub trait RangeSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `len` bytes starting at `offset`.
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError>;
}

fn check_range(offset: u64, len: usize, size: u64) -> Result<(), TransferError> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(TransferError::OutOfRange { offset, len, size }),
    }
}

/// Fills `buf` from `reader`, reporting how many bytes were actually read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_file_range(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    let n = read_full(file, &mut buf)?;
    if n != len {
        return Err(TransferError::ShortRead {
            offset,
            expected: len,
            actual: n,
        });
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file on local disk. Every read opens its own handle.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Records the file's current length; the file must not change size
    /// while an upload is running.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let len = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
        check_range(offset, len, self.len)?;
        let mut file = File::open(&self.path)?;
        read_file_range(&mut file, offset, len)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// An in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl RangeSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
        check_range(offset, len, self.len())?;
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }
}

// ---------------------------------------------------------------------------
// TempFileSource
// ---------------------------------------------------------------------------

/// A forward-only stream spooled to a temporary file.
///
/// The file is deleted when the source is dropped.
pub struct TempFileSource {
    file: NamedTempFile,
    len: u64,
}

impl TempFileSource {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl RangeSource for TempFileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, TransferError> {
        check_range(offset, len, self.len)?;
        let mut file = self.file.reopen()?;
        read_file_range(&mut file, offset, len)
    }
}

/// Copies a non-seekable stream into a temporary file, hashing it in the
/// same pass.
pub fn buffer_stream(
    mut reader: impl Read,
    algorithm: HashAlgorithm,
) -> Result<(TempFileSource, ContentDigest), TransferError> {
    let mut file = NamedTempFile::new()?;
    let mut hasher = ContentHasher::new(algorithm);
    let mut buf = vec![0u8; HASH_WINDOW];
    let mut len = 0u64;
    loop {
        let n = read_full(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])?;
        len += n as u64;
    }
    file.flush()?;
    Ok((TempFileSource { file, len }, hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{digest_bytes, digest_source};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn file_source_reads_ranges() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");
        let source = FileSource::open(&path).unwrap();
        assert_eq!(source.len(), 10);
        assert_eq!(source.read_range(0, 4).unwrap(), b"AABB");
        assert_eq!(source.read_range(8, 2).unwrap(), b"EE");
        assert!(source.read_range(10, 0).unwrap().is_empty());
    }

    #[test]
    fn file_source_rejects_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABB");
        let source = FileSource::open(&path).unwrap();
        assert!(matches!(
            source.read_range(2, 4),
            Err(TransferError::OutOfRange { .. })
        ));
    }

    #[test]
    fn file_source_truncated_after_open_is_short_read() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDD");
        let source = FileSource::open(&path).unwrap();
        std::fs::write(&path, b"AA").unwrap();
        match source.read_range(0, 8) {
            Err(TransferError::ShortRead {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn file_source_concurrent_disjoint_reads() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let path = create_test_file(dir.path(), "test.bin", &data);
        let source = Arc::new(FileSource::open(&path).unwrap());

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let s = Arc::clone(&source);
                std::thread::spawn(move || s.read_range(i * 512, 512).unwrap())
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            let start = i * 512;
            assert_eq!(h.join().unwrap(), &data[start..start + 512]);
        }
    }

    #[test]
    fn memory_source_reads_ranges() {
        let source = MemorySource::new(b"hello world".to_vec());
        assert_eq!(source.read_range(6, 5).unwrap(), b"world");
        assert!(source.read_range(6, 6).is_err());
    }

    #[test]
    fn buffer_stream_spools_and_hashes() {
        let data: Vec<u8> = (0..(HASH_WINDOW + 100)).map(|i| (i % 7) as u8).collect();
        let (source, digest) =
            buffer_stream(Cursor::new(data.clone()), HashAlgorithm::Md5).unwrap();
        assert_eq!(source.len(), data.len() as u64);
        assert_eq!(digest, digest_bytes(HashAlgorithm::Md5, &data));
        assert_eq!(digest_source(HashAlgorithm::Md5, &source).unwrap(), digest);
        assert_eq!(source.read_range(HASH_WINDOW as u64, 100).unwrap(), &data[HASH_WINDOW..]);
    }

    #[test]
    fn buffer_stream_removes_file_on_drop() {
        let (source, _) = buffer_stream(Cursor::new(b"abc".to_vec()), HashAlgorithm::Md5).unwrap();
        let path = source.path().to_path_buf();
        assert!(path.exists());
        drop(source);
        assert!(!path.exists());
    }
}
