//! Command-line settings for bulkxfer
//!
//! Defines the CLI arguments, subcommands and the value types shared with
//! the library configuration.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// bulkxfer - Parallel bulk transfers between object storage and local disk
#[derive(Parser, Debug, Clone)]
#[command(name = "bulkxfer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel bulk downloads and uploads for object storage")]
#[command(long_about = r#"
bulkxfer moves many objects at once between an object store and local disk.

Every object is transferred by a bounded pool of workers, each with its own
fixed-size buffer. A failing object never stops the rest of the batch; every
object gets its own status (SUCCESS, SKIPPED, FAILED_TO_START, FAILED).

Examples:
  bulkxfer --store /srv/store download photos --prefix 2024/ -d ./photos
  bulkxfer --store /srv/store download photos a.jpg b.jpg --skip-if-exists
  bulkxfer --store /srv/store upload backups -d ./data --prefix nightly/
  bulkxfer --store /srv/store list photos --prefix 2024/
"#)]
pub struct CliArgs {
    /// Root directory of the object store (one directory per bucket)
    #[arg(long, env = "BULKXFER_STORE", value_name = "PATH")]
    pub store: PathBuf,

    /// Number of parallel workers (0 = 2 x CPU count)
    #[arg(short = 'w', long, default_value = "0", value_name = "NUM")]
    pub workers: usize,

    /// Buffer size per worker (e.g., 64K, 1M, 16M)
    #[arg(short = 'b', long, default_value = "16M", value_name = "SIZE")]
    pub buffer_size: String,

    /// Bandwidth limit shared by all workers (e.g., 100M = 100MB/s)
    #[arg(long, value_name = "RATE")]
    pub bandwidth_limit: Option<String>,

    /// Report a digest of every transferred object
    #[arg(long, value_enum, value_name = "ALGO")]
    pub verify: Option<HashAlgorithm>,

    /// Show progress bars
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output format for reports
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Download objects from a bucket into a local directory
    #[command(name = "download")]
    Download {
        /// Bucket to read from
        bucket: String,

        /// Object names; when empty, every object under --prefix is downloaded
        #[arg(value_name = "OBJECT")]
        objects: Vec<String>,

        /// List the bucket under this prefix to pick the objects
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        /// Local directory to download into
        #[arg(short = 'd', long, default_value = ".", value_name = "DIR")]
        dir: PathBuf,

        /// Remove this prefix from object names to form local paths
        #[arg(long, default_value = "", value_name = "PREFIX")]
        strip_prefix: String,

        /// Fail objects whose name does not start with --strip-prefix
        #[arg(long)]
        strict_prefix: bool,

        /// Skip objects whose destination file already exists
        #[arg(long)]
        skip_if_exists: bool,
    },

    /// Upload local files into a bucket
    #[command(name = "upload")]
    Upload {
        /// Bucket to write to
        bucket: String,

        /// Files to upload; when empty, every file below --dir is uploaded
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Base directory; object names are file paths relative to it
        #[arg(short = 'd', long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Prepended to every object name
        #[arg(long, default_value = "", value_name = "PREFIX")]
        prefix: String,

        /// Skip files whose object already exists
        #[arg(long)]
        skip_if_exists: bool,
    },

    /// List objects in a bucket
    #[command(name = "list")]
    List {
        /// Bucket to list
        bucket: String,

        /// Only list objects under this prefix
        #[arg(long, default_value = "", value_name = "PREFIX")]
        prefix: String,
    },
}

/// Hash algorithm for integrity verification
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// XXHash3 - Ultra fast, non-cryptographic (128-bit)
    #[default]
    #[value(name = "xxhash3")]
    XXHash3,
    /// XXHash64 - Fast, non-cryptographic (64-bit)
    #[value(name = "xxhash64")]
    XXHash64,
    /// BLAKE3 - Fast and cryptographically secure
    #[value(name = "blake3")]
    Blake3,
    /// SHA-256 - Standard cryptographic hash
    #[value(name = "sha256")]
    Sha256,
}

impl HashAlgorithm {
    /// Get the output size in bytes
    pub fn output_size(&self) -> usize {
        match self {
            Self::XXHash3 => 16,
            Self::XXHash64 => 8,
            Self::Blake3 => 32,
            Self::Sha256 => 32,
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::XXHash3 => "XXHash3",
            Self::XXHash64 => "XXHash64",
            Self::Blake3 => "BLAKE3",
            Self::Sha256 => "SHA-256",
        }
    }
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("TB") || size.ends_with('T') {
        let num = size.trim_end_matches(|c| c == 'T' || c == 'B');
        (num, 1024u64 * 1024 * 1024 * 1024)
    } else if size.ends_with("GB") || size.ends_with('G') {
        let num = size.trim_end_matches(|c| c == 'G' || c == 'B');
        (num, 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        let num = size.trim_end_matches(|c| c == 'M' || c == 'B');
        (num, 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        let num = size.trim_end_matches(|c| c == 'K' || c == 'B');
        (num, 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;
    if num < 0.0 {
        return Err(format!("Negative size: {}", num_str));
    }

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("16m").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5G").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1M").is_err());
    }

    #[test]
    fn test_hash_algorithm() {
        assert_eq!(HashAlgorithm::XXHash3.output_size(), 16);
        assert_eq!(HashAlgorithm::Blake3.output_size(), 32);
        assert_eq!(HashAlgorithm::XXHash3.name(), "XXHash3");
    }

    #[test]
    fn test_download_command_parses() {
        let args = CliArgs::try_parse_from([
            "bulkxfer",
            "--store",
            "/srv/store",
            "-w",
            "4",
            "download",
            "photos",
            "a.jpg",
            "b.jpg",
            "--skip-if-exists",
            "--strip-prefix",
            "2024/",
        ])
        .unwrap();

        assert_eq!(args.workers, 4);
        assert_eq!(args.buffer_size, "16M");
        match args.command {
            Commands::Download {
                bucket,
                objects,
                skip_if_exists,
                strip_prefix,
                strict_prefix,
                ..
            } => {
                assert_eq!(bucket, "photos");
                assert_eq!(objects, vec!["a.jpg", "b.jpg"]);
                assert!(skip_if_exists);
                assert!(!strict_prefix);
                assert_eq!(strip_prefix, "2024/");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_upload_command_parses() {
        let args = CliArgs::try_parse_from([
            "bulkxfer",
            "--store",
            "/srv/store",
            "--verify",
            "blake3",
            "upload",
            "backups",
            "--dir",
            "/data",
            "--prefix",
            "nightly/",
        ])
        .unwrap();

        assert_eq!(args.verify, Some(HashAlgorithm::Blake3));
        match args.command {
            Commands::Upload { bucket, files, dir, prefix, skip_if_exists } => {
                assert_eq!(bucket, "backups");
                assert!(files.is_empty());
                assert_eq!(dir, Some(PathBuf::from("/data")));
                assert_eq!(prefix, "nightly/");
                assert!(!skip_if_exists);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
