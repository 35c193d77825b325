//! Main entry point for the zipspy CLI application.
//!
//! This binary extracts files from zip archives in S3 (or an S3-compatible
//! store, or a local mirror) using byte-range reads.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use zipspy::cli::{Command, Destinations, ExtractArgs, ListArgs};
use zipspy::{
    Cli, ExtractedFile, HttpObjectStore, LocalObjectStore, ObjectStore, S3ObjectStore, ZipExtractor,
};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and picks the object
/// store the archive is read from: a local directory, an S3-compatible
/// endpoint over plain HTTP, or S3 through the AWS SDK.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Some(root) = &cli.local_root {
        let store = Arc::new(LocalObjectStore::new(root));
        return run(store, &cli).await;
    }

    let transferred = if let Some(endpoint) = &cli.endpoint {
        let store = Arc::new(HttpObjectStore::new(Some(endpoint.as_str()))?);
        run(store.clone(), &cli).await?;
        store.transferred_bytes()
    } else {
        let store = Arc::new(S3ObjectStore::from_env().await);
        run(store.clone(), &cli).await?;
        store.transferred_bytes()
    };

    // Display network transfer statistics
    if !cli.quiet {
        eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
    }
    Ok(())
}

async fn run<S: ObjectStore + 'static>(store: Arc<S>, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Extract(args) => extract(store, args).await,
        Command::List(args) => list(store, args).await,
    }
}

/// Extract the files matching each search term and write them out.
///
/// Destinations are checked before anything is fetched:
/// - No `-o`: write every file to stdout
/// - One `-o`: append every file to it
/// - One `-o` per term: append each term's files to its own output
async fn extract<S: ObjectStore + 'static>(store: Arc<S>, args: &ExtractArgs) -> Result<()> {
    let terms = args.search_terms();
    let destinations = args.destinations()?;
    let object = args.target.locator();

    let extractor = ZipExtractor::new(store).with_options(args.options());
    let result = extractor
        .extract_files(&object, &terms)
        .await
        .with_context(|| format!("error extracting files from {object}"))?;

    for (term, files) in result.iter() {
        if files.is_empty() {
            warn!("no files in {object} match {term:?}");
        }
        for file in files {
            info!("  extracting: {}", file.header.name);
        }
    }

    match destinations {
        Destinations::Stdout => {
            let mut stdout = tokio::io::stdout();
            for (_, files) in result.iter() {
                write_files(&mut stdout, files).await?;
            }
            stdout.flush().await?;
        }
        Destinations::Single(path) => {
            let mut out = open_output(&path).await?;
            for (_, files) in result.iter() {
                write_files(&mut out, files).await?;
            }
            out.flush().await?;
        }
        Destinations::PerTerm(paths) => {
            for (term, path) in terms.iter().zip(paths) {
                let files = result.get(term).unwrap_or_default();
                if files.is_empty() {
                    continue;
                }
                let mut out = open_output(&path).await?;
                write_files(&mut out, files).await?;
                out.flush().await?;
            }
        }
    }

    Ok(())
}

async fn write_files<W: AsyncWrite + Unpin>(out: &mut W, files: &[ExtractedFile]) -> Result<()> {
    for file in files {
        out.write_all(&file.contents)
            .await
            .with_context(|| format!("error writing {}", file.header.name))?;
    }
    Ok(())
}

/// Open an output file for appending, creating it (and its parents) if needed.
async fn open_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .with_context(|| format!("error opening file {}", path.display()))
}

/// List files in the archive.
///
/// Supports two output formats:
/// - Simple format: Just file names, one per line
/// - Long format (`-l`): Detailed table with size, compression ratio, and timestamps
async fn list<S: ObjectStore + 'static>(store: Arc<S>, args: &ListArgs) -> Result<()> {
    let object = args.target.locator();
    let extractor = ZipExtractor::new(store);
    let entries = extractor
        .list_files(&object)
        .await
        .with_context(|| format!("error listing files in {object}"))?;

    if !args.long {
        for entry in &entries {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !entry.is_dir() {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Space saved by compression, as a percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "   0%".to_string();
    }
    let kept = compressed.saturating_mul(100) / uncompressed;
    format!("{:>4}%", 100u64.saturating_sub(kept))
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
