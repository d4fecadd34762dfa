//! Main entry point for the pinch CLI application.
//!
//! Lists, measures and extracts entries of ZIP archives that live behind an
//! HTTP URL or on the local filesystem.

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use pinch::{Archive, Cli, HttpRangeSource, LocalFileSource, RangeSource};

/// Application entry point.
///
/// Parses command-line arguments and dispatches on whether the archive is a
/// local file or an HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.is_http_url() {
        // Remote archive via HTTP Range requests
        let source = Arc::new(HttpRangeSource::new(&cli.archive, cli.http_options())?);
        let archive = Archive::with_options(source.clone(), cli.archive_options());

        process_archive(&archive, &cli).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() && !cli.length {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
    } else {
        let source = LocalFileSource::open(Path::new(&cli.archive))
            .await
            .with_context(|| format!("cannot open {}", cli.archive))?;
        let archive = Archive::with_options(source, cli.archive_options());
        process_archive(&archive, &cli).await?;
    }

    Ok(())
}

/// Run the action selected on the command line.
async fn process_archive<S: RangeSource>(archive: &Archive<S>, cli: &Cli) -> Result<()> {
    if cli.length {
        println!("{}", archive.resource_length().await?);
        return Ok(());
    }

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        return list_entries(archive, cli.verbose).await;
    }

    if cli.entries.is_empty() {
        bail!("no entries given; use -l to list the archive");
    }

    let show_names = cli.pipe && cli.entries.len() > 1;
    for name in &cli.entries {
        extract_entry(archive, name, cli, show_names).await?;
    }

    Ok(())
}

/// List entries of the archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just entry names, one per line
/// - Verbose format (`-v`): Size, compression ratio and timestamp per entry
async fn list_entries<S: RangeSource>(archive: &Archive<S>, verbose: bool) -> Result<()> {
    if !verbose {
        for name in archive.list_entries().await? {
            println!("{}", String::from_utf8_lossy(&name));
        }
        return Ok(());
    }

    let index = archive.entries().await?;

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in index.iter() {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        let compressed = entry.compressed_size as u64;
        let uncompressed = entry.uncompressed_size as u64;

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            uncompressed,
            compressed,
            ratio(compressed, uncompressed),
            year,
            month,
            day,
            hour,
            minute,
            entry.name_lossy()
        );

        if !entry.is_directory() {
            total_uncompressed += uncompressed;
            total_compressed += compressed;
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

/// Extract a single entry.
///
/// - Pipe mode (`-p`): stream decoded chunks to stdout as they arrive
/// - Otherwise write to a file under the current or `-d` directory,
///   honoring `-j`, `-n` and `-o`
async fn extract_entry<S: RangeSource>(
    archive: &Archive<S>,
    name: &str,
    cli: &Cli,
    show_name: bool,
) -> Result<()> {
    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_name {
            stdout
                .write_all(format!("--- {} ---\n", name).as_bytes())
                .await?;
        }

        let mut chunks = archive.fetch_entry_streaming(name).await?;
        while let Some(chunk) = chunks.next().await {
            stdout.write_all(&chunk?).await?;
        }
        stdout.flush().await?;
        return Ok(());
    }

    let output_path = output_path(name, cli);

    if name.ends_with('/') {
        if !cli.junk_paths {
            fs::create_dir_all(&output_path).await?;
        }
        return Ok(());
    }

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", name);
    }

    let data = archive.fetch_entry(name).await?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut file = fs::File::create(&output_path).await?;
    file.write_all(&data).await?;

    Ok(())
}

/// Where an entry is written, given `-d` and `-j`.
fn output_path(name: &str, cli: &Cli) -> PathBuf {
    let file_name = if cli.junk_paths {
        Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string())
    } else {
        name.to_string()
    };

    match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
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
