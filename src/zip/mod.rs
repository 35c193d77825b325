//! ZIP archive parsing and extraction over byte-range reads.
//!
//! ## Architecture
//!
//! - [`decoder`]: little-endian field decoding over fetched byte windows
//! - [`structures`]: ZIP format records (EOCD, file headers, etc.)
//! - [`parser`]: locating the EOCD and decoding the Central Directory
//! - [`entry`]: local headers and length-checked decompression of one member
//! - [`registry`]: compression method → decompressor lookup
//! - [`extractor`]: the high-level "give me these files" API
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading the EOCD first (from the object's tail), then the Central
//! Directory, lets us find any member's bytes without reading the rest
//! of the archive. Pulling out one file costs three or four range requests.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No CRC32 verification
//! - Only STORED and DEFLATE out of the box (see [`DecompressorRegistry`])

pub mod decoder;
pub mod entry;
mod extractor;
mod parser;
pub mod registry;
mod structures;

pub use entry::{ArchiveEntry, LocalHeader, VerifiedReader};
pub use extractor::{
    ArchiveIndex, DEFAULT_CONCURRENCY, DEFAULT_SLACK, ExtractionResult, ExtractorOptions,
    ZipExtractor, entry_range, match_terms,
};
pub use parser::{EOCD_SEARCH_WINDOWS, ZipParser, parse_central_directory, scan_directory_end};
pub use registry::{Decompressor, DecompressorRegistry};
pub use structures::*;
