//! Local headers and verified decompression of a single member.

use bytes::Bytes;
use std::io::{self, Cursor, Read};

use crate::error::{ZipError, ZipResult};

use super::decoder::FieldReader;
use super::registry::DecompressorRegistry;
use super::structures::{ExtractedFile, FileHeader, LFH_SIGNATURE, LFH_SIZE};

/// The variable-length part of a local file header.
///
/// These lengths can legitimately differ from the central directory's copy
/// (extra fields in particular), so the body offset must come from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeader {
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalHeader {
    /// Parse the fixed 30-byte header at the start of `window`.
    pub fn parse(window: &[u8]) -> ZipResult<Self> {
        let mut r = FieldReader::new(window);
        if r.read_u32()? != LFH_SIGNATURE {
            return Err(ZipError::format("invalid local file header signature"));
        }
        // Skip over everything up to the name and extra lengths.
        r.skip(22)?;
        Ok(Self {
            file_name_length: r.read_u16()?,
            extra_field_length: r.read_u16()?,
        })
    }

    /// Offset of the member's data from the start of its local header.
    pub fn body_offset(&self) -> u64 {
        LFH_SIZE as u64 + self.file_name_length as u64 + self.extra_field_length as u64
    }
}

/// A member's header bound to the fetched bytes holding its local header
/// and compressed body.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    header: FileHeader,
    /// Starts at the local header
    window: Bytes,
}

impl ArchiveEntry {
    pub fn new(header: FileHeader, window: Bytes) -> Self {
        Self { header, window }
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Open a reader over the member's decompressed contents.
    ///
    /// The reader fails with [`io::ErrorKind::UnexpectedEof`] if the data
    /// doesn't decompress to exactly the declared size.
    pub fn open(&self, registry: &DecompressorRegistry) -> ZipResult<VerifiedReader> {
        if self.header.is_encrypted() {
            return Err(ZipError::Encrypted(self.header.name.clone()));
        }
        let local = LocalHeader::parse(&self.window)?;

        let mut body = Cursor::new(self.window.clone());
        body.set_position(local.body_offset());
        let body = Box::new(body.take(self.header.compressed_size));

        let decompressed = registry.open(self.header.method, body).ok_or_else(|| {
            ZipError::UnsupportedAlgorithm {
                name: self.header.name.clone(),
                method: self.header.method.as_u16(),
            }
        })?;
        Ok(VerifiedReader::new(
            decompressed,
            self.header.uncompressed_size,
        ))
    }

    /// Decompress the whole member into memory.
    pub fn extract(self, registry: &DecompressorRegistry) -> ZipResult<ExtractedFile> {
        let mut reader = self.open(registry)?;
        let mut contents = Vec::with_capacity(self.header.uncompressed_size.min(1 << 26) as usize);
        if let Err(e) = reader.read_to_end(&mut contents) {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => ZipError::UnexpectedEof {
                    name: self.header.name,
                    expected: self.header.uncompressed_size,
                    actual: reader.bytes_read(),
                },
                _ => ZipError::Decompress {
                    name: self.header.name,
                    source: e,
                },
            });
        }
        Ok(ExtractedFile {
            header: self.header,
            contents: Bytes::from(contents),
        })
    }
}

enum ReadState {
    Ready,
    /// The first failure, replayed on every later read
    Errored(io::ErrorKind, String),
}

/// Counts decompressed bytes and checks them against the declared size.
///
/// Errors are sticky: after the first one, the inner reader is never
/// touched again.
pub struct VerifiedReader {
    inner: Box<dyn Read + Send>,
    expected: u64,
    nread: u64,
    state: ReadState,
}

impl VerifiedReader {
    pub fn new(inner: Box<dyn Read + Send>, expected: u64) -> Self {
        Self {
            inner,
            expected,
            nread: 0,
            state: ReadState::Ready,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.nread
    }

    fn fail(&mut self, e: io::Error) -> io::Error {
        self.state = ReadState::Errored(e.kind(), e.to_string());
        e
    }

    fn length_mismatch(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "decompressed {} bytes, expected {}",
                self.nread, self.expected
            ),
        )
    }
}

impl Read for VerifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let ReadState::Errored(kind, message) = &self.state {
            return Err(io::Error::new(*kind, message.clone()));
        }
        match self.inner.read(buf) {
            Ok(0) if !buf.is_empty() && self.nread != self.expected => {
                let e = self.length_mismatch();
                Err(self.fail(e))
            }
            Ok(n) => {
                self.nread += n as u64;
                if self.nread > self.expected {
                    let e = self.length_mismatch();
                    return Err(self.fail(e));
                }
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::zip::structures::CompressionMethod;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn local_header(name: &str, extra: &[u8]) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&LFH_SIGNATURE.to_le_bytes());
        h.extend_from_slice(&[0; 22]);
        h.extend_from_slice(&(name.len() as u16).to_le_bytes());
        h.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        h.extend_from_slice(name.as_bytes());
        h.extend_from_slice(extra);
        h
    }

    fn header(method: CompressionMethod, compressed: u64, uncompressed: u64) -> FileHeader {
        FileHeader {
            name: "member".to_string(),
            comment: String::new(),
            flags: 0,
            method,
            crc32: 0,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            extra: Vec::new(),
            header_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
        }
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn entry(method: CompressionMethod, body: &[u8], uncompressed: u64) -> ArchiveEntry {
        // The local extra field is longer than the central directory's (empty) one.
        let mut window = local_header("member", &[0xAB; 12]);
        window.extend_from_slice(body);
        window.extend_from_slice(b"trailing bytes past the body");
        ArchiveEntry::new(
            header(method, body.len() as u64, uncompressed),
            Bytes::from(window),
        )
    }

    #[test]
    fn body_offset_uses_local_lengths() {
        let window = local_header("abc", &[0; 7]);
        let local = LocalHeader::parse(&window).unwrap();
        assert_eq!(local.body_offset(), 30 + 3 + 7);
    }

    #[test]
    fn bad_local_signature() {
        let mut window = local_header("abc", &[]);
        window[0] = b'X';
        assert!(matches!(
            LocalHeader::parse(&window),
            Err(ZipError::Format(_))
        ));
        assert!(matches!(
            LocalHeader::parse(&window[..10]),
            Err(ZipError::Format(_))
        ));
    }

    #[test]
    fn stored_round_trip() {
        let registry = DecompressorRegistry::new();
        let plain = b"plain old stored bytes";
        let file = entry(CompressionMethod::Stored, plain, plain.len() as u64)
            .extract(&registry)
            .unwrap();
        assert_eq!(&file.contents[..], plain);
        assert_eq!(file.header.name, "member");
    }

    #[test]
    fn deflate_round_trip() {
        let registry = DecompressorRegistry::new();
        let plain = "the quick brown fox jumps over the lazy dog\n".repeat(50);
        let file = entry(
            CompressionMethod::Deflate,
            &deflate(plain.as_bytes()),
            plain.len() as u64,
        )
        .extract(&registry)
        .unwrap();
        assert_eq!(&file.contents[..], plain.as_bytes());
    }

    #[test]
    fn understated_size_is_unexpected_eof() {
        let registry = DecompressorRegistry::new();
        let plain = "abcdefgh".repeat(100);
        let err = entry(
            CompressionMethod::Deflate,
            &deflate(plain.as_bytes()),
            plain.len() as u64 - 1,
        )
        .extract(&registry)
        .unwrap_err();
        assert!(matches!(err, ZipError::UnexpectedEof { expected: 799, .. }));
    }

    #[test]
    fn overstated_size_is_unexpected_eof() {
        let registry = DecompressorRegistry::new();
        let err = entry(CompressionMethod::Stored, b"12345", 6)
            .extract(&registry)
            .unwrap_err();
        assert!(matches!(
            err,
            ZipError::UnexpectedEof {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let registry = DecompressorRegistry::new();
        let err = entry(CompressionMethod::Unknown(99), b"??", 2)
            .extract(&registry)
            .unwrap_err();
        assert!(matches!(
            err,
            ZipError::UnsupportedAlgorithm { method: 99, .. }
        ));
    }

    #[test]
    fn encrypted_entries_are_refused() {
        let registry = DecompressorRegistry::new();
        let mut e = entry(CompressionMethod::Stored, b"secret", 6);
        e.header.flags |= crate::zip::structures::FLAG_ENCRYPTED;
        assert!(matches!(
            e.extract(&registry),
            Err(ZipError::Encrypted(_))
        ));
    }

    #[test]
    fn corrupt_deflate_is_a_decompress_error() {
        let registry = DecompressorRegistry::new();
        // 0b111 is a final block with the reserved block type.
        let err = entry(CompressionMethod::Deflate, &[0xFF; 16], 10)
            .extract(&registry)
            .unwrap_err();
        assert!(matches!(err, ZipError::Decompress { .. }));
    }

    /// Fails once, then would happily succeed if asked again.
    struct Flaky {
        calls: Arc<AtomicUsize>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "boom"));
            }
            buf[0] = 1;
            Ok(1)
        }
    }

    #[test]
    fn errors_are_sticky() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reader = VerifiedReader::new(
            Box::new(Flaky {
                calls: calls.clone(),
            }),
            10,
        );
        let mut buf = [0u8; 4];
        let first = reader.read(&mut buf).unwrap_err();
        let second = reader.read(&mut buf).unwrap_err();
        assert_eq!(first.kind(), io::ErrorKind::InvalidData);
        assert_eq!(second.kind(), first.kind());
        assert_eq!(second.to_string(), first.to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clean_end_repeats() {
        let mut reader = VerifiedReader::new(Box::new(&b"abc"[..]), 3);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf[..0]).unwrap(), 0);
        assert_eq!(reader.bytes_read(), 3);
    }
}
