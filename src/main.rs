//! bulkxfer CLI - Parallel bulk transfers for object storage
//!
//! Drives the transfer manager against a filesystem-backed object store.

use clap::Parser;
use bulkxfer::config::{
    parse_size, CliArgs, Commands, OutputFormat, ParallelDownloadConfig, ParallelUploadConfig, PrefixMismatch,
    TransferManagerConfig,
};
use bulkxfer::core::{BatchSummary, TransferManager, TransferResult};
use bulkxfer::error::{Result, XferError};
use bulkxfer::progress::ProgressReporter;
use bulkxfer::storage::{BlobInfo, StorageOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging; RUST_LOG wins over -v/-q
    let default_level = match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every item succeeded or was skipped
fn run(args: CliArgs) -> Result<bool> {
    let storage_options = StorageOptions::local(&args.store);

    match &args.command {
        Commands::Download {
            bucket,
            objects,
            prefix,
            dir,
            strip_prefix,
            strict_prefix,
            skip_if_exists,
        } => {
            let blobs = if objects.is_empty() {
                let listing_prefix = prefix.as_deref().unwrap_or("");
                storage_options.service()?.list(bucket, listing_prefix)?
            } else {
                objects.iter().map(|name| BlobInfo::of(bucket.as_str(), name.as_str())).collect()
            };

            let config = ParallelDownloadConfig::builder()
                .bucket_name(bucket.as_str())
                .download_directory(dir)
                .strip_prefix(strip_prefix.as_str())
                .prefix_mismatch(if *strict_prefix {
                    PrefixMismatch::Fail
                } else {
                    PrefixMismatch::Keep
                })
                .skip_if_exists(*skip_if_exists)
                .build()?;

            let (manager, progress) = build_manager(&args, storage_options)?;
            let start = Instant::now();
            let results = manager.download_blobs(blobs, &config).download_results()?;
            report(&args, &results, start, progress.as_ref(), |r| r.input().id.to_string())
        }

        Commands::Upload {
            bucket,
            files,
            dir,
            prefix,
            skip_if_exists,
        } => {
            let files = if files.is_empty() {
                let base = dir
                    .as_deref()
                    .ok_or_else(|| XferError::config("upload needs files or --dir"))?;
                collect_files(base)?
            } else {
                files.clone()
            };

            let mut builder = ParallelUploadConfig::builder()
                .bucket_name(bucket.as_str())
                .prefix(prefix.as_str())
                .skip_if_exists(*skip_if_exists);
            if let Some(dir) = dir {
                builder = builder.upload_directory(dir);
            }
            let config = builder.build()?;

            let (manager, progress) = build_manager(&args, storage_options)?;
            let start = Instant::now();
            let results = manager.upload_files(files, &config).upload_results()?;
            report(&args, &results, start, progress.as_ref(), |r| r.input().display().to_string())
        }

        Commands::List { bucket, prefix } => {
            let blobs = storage_options.service()?.list(bucket, prefix)?;
            match args.output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&blobs)?),
                OutputFormat::Text => {
                    for blob in &blobs {
                        println!(
                            "{:>12}  {}",
                            humansize::format_size(blob.size.unwrap_or(0), humansize::BINARY),
                            blob.id
                        );
                    }
                }
            }
            Ok(true)
        }
    }
}

fn build_manager(args: &CliArgs, storage_options: StorageOptions) -> Result<(TransferManager, Option<ProgressReporter>)> {
    let mut builder = TransferManagerConfig::builder()
        .storage_options(storage_options)
        .per_worker_buffer_size(
            parse_size(&args.buffer_size).map_err(|e| XferError::config(format!("Invalid buffer size: {}", e)))?
                as usize,
        )
        .bandwidth_limit(
            args.bandwidth_limit
                .as_deref()
                .map(parse_size)
                .transpose()
                .map_err(|e| XferError::config(format!("Invalid bandwidth limit: {}", e)))?,
        )
        .checksum(args.verify);
    if args.workers > 0 {
        builder = builder.max_workers(args.workers);
    }
    let config = builder.build()?;

    if args.verbose > 0 && args.output_format == OutputFormat::Text {
        print_config(&config);
    }

    let manager = TransferManager::new(config)?;
    if args.progress && !args.quiet {
        let progress = ProgressReporter::new();
        Ok((manager.with_progress(progress.clone()), Some(progress)))
    } else {
        Ok((manager, None))
    }
}

/// Every regular file below `base`, as paths relative to it
fn collect_files(base: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(base).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
            match e.into_io_error() {
                Some(io) => XferError::io(path, io),
                None => XferError::config(format!("filesystem loop at {}", path.display())),
            }
        })?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(base) {
                files.push(relative.to_path_buf());
            }
        }
    }
    debug!("Found {} files under {}", files.len(), base.display());
    Ok(files)
}

#[derive(Serialize)]
struct Report<'a, R> {
    summary: &'a BatchSummary,
    results: &'a [R],
}

fn report<R>(
    args: &CliArgs,
    results: &[R],
    start: Instant,
    progress: Option<&ProgressReporter>,
    describe: impl Fn(&R) -> String,
) -> Result<bool>
where
    R: TransferResult + Serialize,
{
    let summary = BatchSummary::from_results(results).with_elapsed(start.elapsed());

    if let Some(progress) = progress {
        let message = format!("{} of {} objects done", summary.succeeded + summary.skipped, summary.total);
        progress.finish(&message, summary.is_success());
    }

    match args.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&Report { summary: &summary, results })?);
        }
        OutputFormat::Text => {
            for result in results {
                if let Some(cause) = result.cause() {
                    eprintln!("{:<15} {} - {}", result.status().as_str(), describe(result), cause);
                } else if args.verbose > 0 {
                    println!("{:<15} {}", result.status().as_str(), describe(result));
                }
            }
            if !args.quiet {
                summary.print_summary();
            }
        }
    }

    Ok(summary.is_success())
}

fn print_config(config: &TransferManagerConfig) {
    println!("=== Configuration ===");
    println!("Workers:          {}", config.max_workers());
    println!(
        "Buffer per worker: {}",
        humansize::format_size(config.per_worker_buffer_size() as u64, humansize::BINARY)
    );
    match config.bandwidth_limit() {
        Some(limit) => println!("Bandwidth limit:  {}/s", humansize::format_size(limit, humansize::BINARY)),
        None => println!("Bandwidth limit:  none"),
    }
    match config.checksum() {
        Some(algorithm) => println!("Checksum:         {}", algorithm.name()),
        None => println!("Checksum:         off"),
    }
    println!();
}
