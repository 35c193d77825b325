use bytes::{Bytes, BytesMut};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::error::{ZipError, ZipResult};
use crate::io::{ObjectLocator, ObjectStore};

use super::entry::{ArchiveEntry, LocalHeader};
use super::parser::ZipParser;
use super::registry::DecompressorRegistry;
use super::structures::{DirectoryEnd, ExtractedFile, FileHeader, LFH_SIZE};

/// Bytes fetched past a member's compressed body, to cover the local header
/// (fixed part, name and a small extra field) that precedes it.
pub const DEFAULT_SLACK: u64 = 100;

/// Entry fetches in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorOptions {
    pub slack: u64,
    pub concurrency: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            slack: DEFAULT_SLACK,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// One archive's directory, read once and reused for any number of extractions.
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    pub object: ObjectLocator,
    pub size: u64,
    pub directory_end: DirectoryEnd,
    /// Every header, in central directory order
    pub headers: Vec<FileHeader>,
}

/// Extracted files keyed by the search term that matched them.
///
/// Terms keep the order they were given in; each term's files keep
/// central directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    matches: Vec<(String, Vec<ExtractedFile>)>,
}

impl ExtractionResult {
    /// Files matched by `term`, or `None` if it wasn't searched for.
    pub fn get(&self, term: &str) -> Option<&[ExtractedFile]> {
        self.matches
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, files)| files.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ExtractedFile])> {
        self.matches
            .iter()
            .map(|(term, files)| (term.as_str(), files.as_slice()))
    }

    /// Number of search terms
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Indices of the headers whose names contain each term.
///
/// Repeated terms collapse into their first occurrence.
pub fn match_terms<'t>(headers: &[FileHeader], terms: &'t [String]) -> Vec<(&'t str, Vec<usize>)> {
    let mut matches: Vec<(&str, Vec<usize>)> = Vec::with_capacity(terms.len());
    for term in terms {
        if matches.iter().any(|(t, _)| *t == term.as_str()) {
            continue;
        }
        let indices = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.name.contains(term.as_str()))
            .map(|(i, _)| i)
            .collect();
        matches.push((term.as_str(), indices));
    }
    matches
}

/// The inclusive byte range to fetch for a member: its local header plus
/// compressed body, clamped to the object.
///
/// The range always covers at least the fixed part of the local header,
/// however small the body and slack are.
pub fn entry_range(header: &FileHeader, slack: u64, size: u64) -> ZipResult<(u64, u64)> {
    if header.header_offset >= size {
        return Err(ZipError::format(format!(
            "{}: local header offset {} is outside the {} byte object",
            header.name, header.header_offset, size
        )));
    }
    let end = header
        .header_offset
        .saturating_add(header.compressed_size)
        .saturating_add(slack)
        .max(header.header_offset.saturating_add(LFH_SIZE as u64))
        .min(size);
    Ok((header.header_offset, end - 1))
}

/// Fetch the bytes holding a member's local header and body.
///
/// When the local header turns out bigger than the slack allowed for,
/// the missing tail is fetched with a second request.
async fn fetch_entry<S: ObjectStore>(
    store: &S,
    object: &ObjectLocator,
    header: &FileHeader,
    slack: u64,
    size: u64,
) -> ZipResult<Bytes> {
    let (start, end) = entry_range(header, slack, size)?;
    debug!("fetching {}: bytes {}-{}", header.name, start, end);
    let window = store.read_range(object, start, end).await?;

    // Only a truncated object leaves less than a fixed header; parsing reports it.
    if window.len() < LFH_SIZE {
        return Ok(window);
    }
    let needed = LocalHeader::parse(&window)?
        .body_offset()
        .saturating_add(header.compressed_size);
    let fetched_end = start + window.len() as u64;
    if needed <= window.len() as u64 || fetched_end >= size {
        return Ok(window);
    }

    let missing_end = start.saturating_add(needed).min(size) - 1;
    debug!(
        "local header of {} outgrew the slack; fetching bytes {}-{}",
        header.name, fetched_end, missing_end
    );
    let rest = store.read_range(object, fetched_end, missing_end).await?;
    let mut joined = BytesMut::with_capacity(window.len() + rest.len());
    joined.extend_from_slice(&window);
    joined.extend_from_slice(&rest);
    Ok(joined.freeze())
}

/// Decompress a fetched member on the blocking pool.
async fn decompress(
    header: FileHeader,
    window: Bytes,
    registry: Arc<DecompressorRegistry>,
) -> ZipResult<ExtractedFile> {
    let task =
        tokio::task::spawn_blocking(move || ArchiveEntry::new(header, window).extract(&registry));
    match task.await {
        Ok(result) => result,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Pulls named members out of archives in an object store.
pub struct ZipExtractor<S: ObjectStore> {
    store: Arc<S>,
    registry: Arc<DecompressorRegistry>,
    options: ExtractorOptions,
}

impl<S: ObjectStore + 'static> ZipExtractor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry: Arc::new(DecompressorRegistry::new()),
            options: ExtractorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: DecompressorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn registry(&self) -> &DecompressorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read an archive's directory: its size, EOCD and every central directory header.
    pub async fn index(&self, object: &ObjectLocator) -> ZipResult<ArchiveIndex> {
        let parser = ZipParser::new(self.store.clone(), object.clone()).await?;
        let directory_end = parser.find_directory_end().await?;
        let headers = parser.read_central_directory(&directory_end).await?;
        debug!("{object}: {} entries", headers.len());
        Ok(ArchiveIndex {
            object: object.clone(),
            size: parser.size(),
            directory_end,
            headers,
        })
    }

    /// List all files in the archive
    pub async fn list_files(&self, object: &ObjectLocator) -> ZipResult<Vec<FileHeader>> {
        Ok(self.index(object).await?.headers)
    }

    /// Fetch and decompress one member of an indexed archive.
    pub async fn extract_entry(
        &self,
        index: &ArchiveIndex,
        header: &FileHeader,
    ) -> ZipResult<ExtractedFile> {
        let window = fetch_entry(
            self.store.as_ref(),
            &index.object,
            header,
            self.options.slack,
            index.size,
        )
        .await?;
        decompress(header.clone(), window, self.registry.clone()).await
    }

    /// Extract every member whose name contains one of `terms`.
    ///
    /// Any failure fails the whole extraction.
    pub async fn extract_files(
        &self,
        object: &ObjectLocator,
        terms: &[String],
    ) -> ZipResult<ExtractionResult> {
        let index = self.index(object).await?;
        self.extract_matching(&index, terms).await
    }

    /// Like [`extract_files`](Self::extract_files), against an already-read directory.
    pub async fn extract_matching(
        &self,
        index: &ArchiveIndex,
        terms: &[String],
    ) -> ZipResult<ExtractionResult> {
        let matches = match_terms(&index.headers, terms);

        // Each entry is fetched once, however many terms it matches.
        let wanted: BTreeSet<usize> = matches
            .iter()
            .flat_map(|(_, indices)| indices.iter().copied())
            .collect();
        debug!(
            "{} terms matched {} entries",
            matches.len(),
            wanted.len()
        );

        // One slot per header, filled in whatever order fetches finish.
        let mut slots: Vec<Option<ExtractedFile>> = vec![None; index.headers.len()];
        let concurrency = self.options.concurrency.max(1);
        let mut tasks = JoinSet::new();
        let mut pending = wanted.into_iter();

        loop {
            while tasks.len() < concurrency {
                let Some(i) = pending.next() else {
                    break;
                };
                let store = self.store.clone();
                let registry = self.registry.clone();
                let object = index.object.clone();
                let header = index.headers[i].clone();
                let (slack, size) = (self.options.slack, index.size);
                tasks.spawn(async move {
                    let window = fetch_entry(store.as_ref(), &object, &header, slack, size).await?;
                    let file = decompress(header, window, registry).await?;
                    Ok::<_, ZipError>((i, file))
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            // Returning early drops the set, aborting whatever is still running.
            let (i, file) = match joined {
                Ok(result) => result?,
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            };
            slots[i] = Some(file);
        }

        let matches = matches
            .into_iter()
            .map(|(term, indices)| {
                let files = indices
                    .into_iter()
                    .filter_map(|i| slots[i].clone())
                    .collect();
                (term.to_string(), files)
            })
            .collect();
        Ok(ExtractionResult { matches })
    }
}
