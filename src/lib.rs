//! # zipspy
//!
//! Extract files from ZIP archives in S3 (or any object store that serves
//! byte ranges) without downloading the whole archive.
//!
//! The archive's tail is fetched to find the End of Central Directory, then
//! the Central Directory itself, and finally just the bytes of each member
//! that was asked for. Members are decompressed in memory and checked
//! against the sizes the archive declares.
//!
//! ## Features
//!
//! - Substring search: a term can be a file name, part of a path or a directory
//! - Support for ZIP64 archives and archives with more than 65535 entries
//! - STORED and DEFLATE, plus any decompressor you register
//! - Concurrent fetches for the matched members
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipspy::{ObjectLocator, S3ObjectStore, ZipExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(S3ObjectStore::from_env().await);
//!     let extractor = ZipExtractor::new(store);
//!
//!     let archive = ObjectLocator::new("my-bucket", "builds/output.zip");
//!     let result = extractor
//!         .extract_files(&archive, &["plan.txt".to_string()])
//!         .await?;
//!     for (term, files) in result.iter() {
//!         for file in files {
//!             println!("{term}: {} ({} bytes)", file.header.name, file.contents.len());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{ZipError, ZipResult};
pub use io::{
    HttpObjectStore, LocalObjectStore, MemoryObjectStore, ObjectLocator, ObjectStore, S3ObjectStore,
};
pub use zip::{
    DecompressorRegistry, ExtractedFile, ExtractionResult, ExtractorOptions, FileHeader,
    ZipExtractor,
};
