use bytes::Bytes;

use super::decoder::{FieldReader, OutOfBounds};

/// Legacy 32-bit fields hold this when the real value lives in a zip64 record.
pub const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// Extra field tag of the zip64 extended information record.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// General purpose flag: the entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
pub const LFH_SIZE: usize = 30;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) as stored - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    /// Decode the fields following the signature.
    /// The caller has already matched the signature.
    pub fn parse(record: &[u8]) -> Result<Self, OutOfBounds> {
        let mut r = FieldReader::new(record);
        r.skip(4)?;
        Ok(Self {
            disk_number: r.read_u16()?,
            disk_with_cd: r.read_u16()?,
            disk_entries: r.read_u16()?,
            total_entries: r.read_u16()?,
            cd_size: r.read_u32()?,
            cd_offset: r.read_u32()?,
            comment_len: r.read_u16()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == ZIP64_SENTINEL
            || self.cd_offset == ZIP64_SENTINEL
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const SIZE: usize = 20;

    /// Returns `None` if the bytes don't start with the locator signature.
    pub fn parse(data: &[u8]) -> Result<Option<Self>, OutOfBounds> {
        let mut r = FieldReader::new(data);
        if r.read_u32()? != Self::SIGNATURE {
            return Ok(None);
        }
        Ok(Some(Self {
            disk_with_eocd64: r.read_u32()?,
            eocd64_offset: r.read_u64()?,
            total_disks: r.read_u32()?,
        }))
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const MIN_SIZE: usize = 56;

    pub fn parse(data: &[u8]) -> Result<Option<Self>, OutOfBounds> {
        let mut r = FieldReader::new(data);
        if r.read_u32()? != Self::SIGNATURE {
            return Ok(None);
        }
        Ok(Some(Self {
            eocd64_size: r.read_u64()?,
            version_made_by: r.read_u16()?,
            version_needed: r.read_u16()?,
            disk_number: r.read_u32()?,
            disk_with_cd: r.read_u32()?,
            disk_entries: r.read_u64()?,
            total_entries: r.read_u64()?,
            cd_size: r.read_u64()?,
            cd_offset: r.read_u64()?,
        }))
    }
}

/// Where the central directory lives, resolved from the EOCD
/// (and the zip64 EOCD, when the archive has one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEnd {
    /// Entry count as recorded; may have wrapped past 65535 in plain archives.
    pub record_count: u64,
    pub directory_size: u64,
    /// Start of the central directory, relative to the archive start
    pub directory_offset: u64,
    /// Absolute position of the EOCD signature in the object
    pub directory_end_offset: u64,
    pub comment_length: u16,
    pub comment: String,
}

/// Metadata for one archive member, read from its central directory header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub name: String,
    pub comment: String,
    pub flags: u16,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub extra: Vec<u8>,
    /// Absolute position of the member's local file header
    pub header_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

impl FileHeader {
    /// Directory entries end with '/' and carry no data.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') && self.uncompressed_size == 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// A member's header along with its decompressed contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub header: FileHeader,
    pub contents: Bytes,
}
