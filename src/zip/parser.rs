//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any [`ObjectStore`] one byte window at a time.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) in the object's tail
//! 2. If the EOCD is saturated and a ZIP64 locator precedes it, read the ZIP64 EOCD
//! 3. Fetch the Central Directory in one request and decode every header in it
//!
//! Local headers are handled separately (see [`entry`](super::entry)), since
//! each one lives next to its member's data.

use log::{debug, trace};
use std::sync::Arc;

use crate::error::{ZipError, ZipResult};
use crate::io::{ObjectLocator, ObjectStore};

use super::decoder::FieldReader;
use super::structures::*;

/// Tail windows searched for the EOCD, smallest first.
///
/// Most archives have no comment, so the first window nearly always
/// suffices. The second covers the largest comment the format allows.
pub const EOCD_SEARCH_WINDOWS: [u64; 2] = [1024, 65536];

/// Reads an archive's directory structures out of an object store.
pub struct ZipParser<S: ObjectStore> {
    store: Arc<S>,
    object: ObjectLocator,
    /// Total size of the archive in bytes
    size: u64,
}

impl<S: ObjectStore> ZipParser<S> {
    /// Create a parser for `object`, asking the store for its size.
    pub async fn new(store: Arc<S>, object: ObjectLocator) -> ZipResult<Self> {
        let size = store.size(&object).await?;
        debug!("{object} is {size} bytes");
        Ok(Self {
            store,
            object,
            size,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn object(&self) -> &ObjectLocator {
        &self.object
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// # Errors
    ///
    /// Returns [`ZipError::Format`] if no window holds a plausible EOCD,
    /// or if the EOCD points the central directory outside the object.
    pub async fn find_directory_end(&self) -> ZipResult<DirectoryEnd> {
        let mut searched = 0;
        for window in EOCD_SEARCH_WINDOWS {
            let window = window.min(self.size);
            if window <= searched || window < EndOfCentralDirectory::SIZE as u64 {
                break;
            }
            searched = window;

            let window_start = self.size - window;
            let buf = self
                .store
                .read_range(&self.object, window_start, self.size - 1)
                .await?;

            if let Some(pos) = scan_directory_end(&buf) {
                return self.decode_directory_end(&buf, window_start, pos).await;
            }
            trace!("no EOCD in the last {window} bytes");
        }

        Err(ZipError::format("unable to locate end of central directory"))
    }

    async fn decode_directory_end(
        &self,
        buf: &[u8],
        window_start: u64,
        pos: usize,
    ) -> ZipResult<DirectoryEnd> {
        let eocd = EndOfCentralDirectory::parse(&buf[pos..])?;
        trace!("{:?}", eocd);

        let comment_start = pos + EndOfCentralDirectory::SIZE;
        let comment = buf
            .get(comment_start..comment_start + eocd.comment_len as usize)
            .ok_or_else(|| ZipError::format("invalid comment length"))?;

        let mut dir = DirectoryEnd {
            record_count: eocd.total_entries as u64,
            directory_size: eocd.cd_size as u64,
            directory_offset: eocd.cd_offset as u64,
            directory_end_offset: window_start + pos as u64,
            comment_length: eocd.comment_len,
            comment: String::from_utf8_lossy(comment).into_owned(),
        };

        if eocd.is_zip64()
            && let Some(eocd64) = self.read_zip64_eocd(buf, &dir, pos).await?
        {
            trace!("{:?}", eocd64);
            dir.record_count = eocd64.total_entries;
            dir.directory_size = eocd64.cd_size;
            dir.directory_offset = eocd64.cd_offset;
        }

        // Make sure the directory offset points somewhere in our object.
        if dir.directory_offset >= self.size {
            return Err(ZipError::format(format!(
                "central directory offset {} is outside the {} byte object",
                dir.directory_offset, self.size
            )));
        }
        Ok(dir)
    }

    /// Read the ZIP64 End of Central Directory record, if the archive has one.
    ///
    /// The ZIP64 locator sits immediately before the regular EOCD, so it's
    /// usually already in `buf`. Archives that merely happen to have 65535
    /// entries have no locator, and keep their legacy values.
    async fn read_zip64_eocd(
        &self,
        buf: &[u8],
        dir: &DirectoryEnd,
        pos: usize,
    ) -> ZipResult<Option<Zip64EOCD>> {
        let locator_size = Zip64EOCDLocator::SIZE as u64;
        let locator = if pos >= Zip64EOCDLocator::SIZE {
            Zip64EOCDLocator::parse(&buf[pos - Zip64EOCDLocator::SIZE..pos])?
        } else if dir.directory_end_offset >= locator_size {
            let bytes = self
                .store
                .read_range(
                    &self.object,
                    dir.directory_end_offset - locator_size,
                    dir.directory_end_offset - 1,
                )
                .await?;
            Zip64EOCDLocator::parse(&bytes)?
        } else {
            None
        };
        let Some(locator) = locator else {
            return Ok(None);
        };
        trace!("{:?}", locator);

        let record_end = locator
            .eocd64_offset
            .checked_add(Zip64EOCD::MIN_SIZE as u64)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| ZipError::format("ZIP64 locator points outside the object"))?;
        let bytes = self
            .store
            .read_range(&self.object, locator.eocd64_offset, record_end - 1)
            .await?;
        match Zip64EOCD::parse(&bytes)? {
            Some(eocd64) => Ok(Some(eocd64)),
            None => Err(ZipError::format("ZIP64 locator points at no ZIP64 EOCD")),
        }
    }

    /// Fetch the central directory and decode every header in it.
    pub async fn read_central_directory(&self, dir: &DirectoryEnd) -> ZipResult<Vec<FileHeader>> {
        if dir.directory_offset > dir.directory_end_offset {
            return Err(ZipError::format(
                "central directory starts after its end record",
            ));
        }

        // Read the entire Central Directory in one request
        debug!(
            "fetching central directory: bytes {}-{}",
            dir.directory_offset, dir.directory_end_offset
        );
        let cd_data = self
            .store
            .read_range(&self.object, dir.directory_offset, dir.directory_end_offset)
            .await?;

        let headers = parse_central_directory(&cd_data)?;
        if headers.len() as u64 % 0x1_0000 != dir.record_count % 0x1_0000 {
            debug!(
                "EOCD records {} entries, found {}",
                dir.record_count,
                headers.len()
            );
        }
        Ok(headers)
    }
}

/// Find the EOCD signature in `buf`, scanning backward from its end.
///
/// A candidate only counts if its declared comment fits in what's left of
/// the buffer. Scanning from the end favors the real record over look-alikes
/// earlier in the archive.
pub fn scan_directory_end(buf: &[u8]) -> Option<usize> {
    let size = EndOfCentralDirectory::SIZE;
    if buf.len() < size {
        return None;
    }
    (0..=buf.len() - size).rev().find(|&i| {
        let signature = u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let comment_len = u16::from_le_bytes([buf[i + size - 2], buf[i + size - 1]]) as usize;
        signature == EndOfCentralDirectory::SIGNATURE && i + size + comment_len <= buf.len()
    })
}

/// Decode central directory headers until one doesn't start with the
/// header signature or the data runs out.
///
/// The EOCD's entry count is deliberately ignored: it's 16 bits wide,
/// and archives with more entries than that simply let it wrap.
pub fn parse_central_directory(data: &[u8]) -> ZipResult<Vec<FileHeader>> {
    let mut reader = FieldReader::new(data);
    let mut headers = Vec::new();
    while let Some(header) = parse_directory_header(&mut reader)? {
        headers.push(header);
    }
    Ok(headers)
}

/// Parse one Central Directory File Header.
///
/// Returns `Ok(None)` where the directory ends: a missing signature or a
/// header cut short.
fn parse_directory_header(reader: &mut FieldReader<'_>) -> ZipResult<Option<FileHeader>> {
    let Ok(fixed) = reader.take(CDFH_MIN_SIZE) else {
        return Ok(None);
    };
    let mut b = FieldReader::new(fixed);
    if b.read_u32()? != CDFH_SIGNATURE {
        return Ok(None);
    }

    // version made by, version needed
    let flags = b.skip(4)?.read_u16()?;
    let method = b.read_u16()?;
    let last_mod_time = b.read_u16()?;
    let last_mod_date = b.read_u16()?;
    let crc32 = b.read_u32()?;
    let compressed_size32 = b.read_u32()?;
    let uncompressed_size32 = b.read_u32()?;
    let name_len = b.read_u16()? as usize;
    let extra_len = b.read_u16()? as usize;
    let comment_len = b.read_u16()? as usize;
    // disk number start, internal and external attributes
    let header_offset32 = b.skip(8)?.read_u32()?;

    let Ok(name) = reader.take(name_len) else {
        return Ok(None);
    };
    let Ok(extra) = reader.take(extra_len) else {
        return Ok(None);
    };
    let Ok(comment) = reader.take(comment_len) else {
        return Ok(None);
    };

    let mut uncompressed_size = uncompressed_size32 as u64;
    let mut compressed_size = compressed_size32 as u64;
    let mut header_offset = header_offset32 as u64;

    let mut need_uncompressed = uncompressed_size32 == ZIP64_SENTINEL;
    let mut need_compressed = compressed_size32 == ZIP64_SENTINEL;
    let mut need_offset = header_offset32 == ZIP64_SENTINEL;

    let mut fields = FieldReader::new(extra);
    while fields.remaining() >= 4 {
        let tag = fields.read_u16()?;
        let size = fields.read_u16()? as usize;
        if fields.remaining() < size {
            break;
        }
        let mut field = fields.sub(size)?;
        if tag != ZIP64_EXTRA_ID {
            continue;
        }
        // The ZIP64 record only carries the values whose legacy field saturated,
        // in this order.
        if need_uncompressed {
            need_uncompressed = false;
            uncompressed_size = field.read_u64()?;
        }
        if need_compressed {
            need_compressed = false;
            compressed_size = field.read_u64()?;
        }
        if need_offset {
            need_offset = false;
            header_offset = field.read_u64()?;
        }
    }

    Ok(Some(FileHeader {
        name: String::from_utf8_lossy(name).into_owned(),
        comment: String::from_utf8_lossy(comment).into_owned(),
        flags,
        method: CompressionMethod::from_u16(method),
        crc32,
        compressed_size,
        uncompressed_size,
        extra: extra.to_vec(),
        header_offset,
        last_mod_time,
        last_mod_date,
    }))
}
