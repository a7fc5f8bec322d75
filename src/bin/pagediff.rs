//! pagediff
//!
//! Decode B-tree pages from a database image, or diff the same pages
//! across two images.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use memvfs::config::DEFAULT_PAGE_SIZE;
use memvfs::page::{diff_pages, Change, DecodedPage, PageCodec};
use memvfs::{Result, VfsError};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

/// Page decoder / differ
#[derive(Parser, Debug)]
#[command(name = "pagediff")]
#[command(about = "Decode and diff B-tree pages of a database image")]
#[command(version)]
struct Args {
    /// Page size in bytes
    #[arg(short = 's', long, default_value_t = DEFAULT_PAGE_SIZE, global = true)]
    page_size: usize,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode pages of a database image
    Decode {
        /// Database image
        file: PathBuf,

        /// Only this page index (default: every page)
        #[arg(short, long)]
        page: Option<u64>,
    },

    /// Diff pages between two database images
    Diff {
        /// Older image
        old: PathBuf,

        /// Newer image
        new: PathBuf,

        /// Only this page index (default: every page of the newer image)
        #[arg(short, long)]
        page: Option<u64>,
    },
}

#[derive(Serialize)]
struct PageReport<T> {
    page_index: u64,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct ChangeList {
    changes: Vec<Change>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,memvfs=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("pagediff failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = memvfs::Config::builder().page_size(args.page_size).build();
    config.validate()?;
    let codec = PageCodec::new(config.page_size);

    match &args.command {
        Commands::Decode { file, page } => decode(&codec, file, *page, args.json),
        Commands::Diff { old, new, page } => diff(&codec, old, new, *page, args.json),
    }
}

fn decode(codec: &PageCodec, file: &Path, page: Option<u64>, json: bool) -> Result<()> {
    let image = std::fs::read(file)?;

    for index in page_indices(&image, codec.page_size(), page) {
        let bytes = page_slice(&image, codec.page_size(), index)?;
        match codec.decode(index, bytes) {
            Ok(decoded) if json => print_json(&PageReport {
                page_index: index,
                body: decoded,
            })?,
            Ok(decoded) => print_page(index, &decoded),
            Err(e) if page.is_none() => tracing::warn!(page = index, error = %e, "skipping page"),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn diff(codec: &PageCodec, old: &Path, new: &Path, page: Option<u64>, json: bool) -> Result<()> {
    let old_image = std::fs::read(old)?;
    let new_image = std::fs::read(new)?;

    for index in page_indices(&new_image, codec.page_size(), page) {
        let changes = match diff_page(codec, &old_image, &new_image, index) {
            Ok(changes) => changes,
            Err(e) if page.is_none() => {
                tracing::warn!(page = index, error = %e, "skipping page");
                continue;
            }
            Err(e) => return Err(e),
        };

        if json {
            print_json(&PageReport {
                page_index: index,
                body: ChangeList { changes },
            })?;
        } else if !changes.is_empty() {
            println!("page {}:", index);
            for change in &changes {
                println!("  {}", change);
            }
        }
    }

    Ok(())
}

fn diff_page(codec: &PageCodec, old_image: &[u8], new_image: &[u8], index: u64) -> Result<Vec<Change>> {
    let new_page = codec.decode(index, page_slice(new_image, codec.page_size(), index)?)?;

    // Pages past the end of the old image were never seen
    let old_page = match page_slice(old_image, codec.page_size(), index) {
        Ok(bytes) => Some(codec.decode(index, bytes)?),
        Err(_) => None,
    };

    Ok(diff_pages(old_page.as_ref(), &new_page))
}

fn page_indices(image: &[u8], page_size: usize, page: Option<u64>) -> Vec<u64> {
    match page {
        Some(index) => vec![index],
        None => (0..(image.len() / page_size) as u64).collect(),
    }
}

fn page_slice(image: &[u8], page_size: usize, index: u64) -> Result<&[u8]> {
    let start = usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(page_size))
        .ok_or(VfsError::OffsetOverflow {
            offset: index,
            len: page_size as u64,
        })?;

    let end = start.checked_add(page_size).unwrap_or(usize::MAX);
    image.get(start..end).ok_or_else(|| {
        VfsError::Corrupt(format!(
            "page {} is past the end of a {}-byte image",
            index,
            image.len()
        ))
    })
}

fn print_page(index: u64, page: &DecodedPage) {
    let h = &page.header;
    println!(
        "page {}: type={:?} cells={} freeblock={} content_start={} fragmented={} right_most={}",
        index,
        h.page_type,
        h.cell_count,
        h.first_freeblock,
        h.cell_content_start,
        h.fragmented_free_bytes,
        h.right_most_pointer
    );

    for (i, cell) in page.cells.iter().enumerate() {
        match &cell.payload {
            Some(p) if p.has_overflow() => println!(
                "  [{}] @{} len={} rowid={} payload={} inline={} overflow={} -> page {}",
                i,
                cell.offset,
                cell.length,
                p.rowid,
                p.length,
                p.initial.len(),
                p.overflow_bytes,
                p.overflow_page
            ),
            Some(p) => println!(
                "  [{}] @{} len={} rowid={} payload={}",
                i, cell.offset, cell.length, p.rowid, p.length
            ),
            None => println!("  [{}] @{} len={}", i, cell.offset, cell.length),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).map_err(std::io::Error::from)?;
    println!("{}", line);
    Ok(())
}
