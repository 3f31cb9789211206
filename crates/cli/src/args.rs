use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Dropzone ingestion toolkit")]
pub struct Cli {
    /// Emit logs as JSON lines (same as LOG_FORMAT=json).
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a workbook into .a360 manifest batch files
    Convert(ConvertArgs),
    /// Poll a directory and convert new or changed workbooks
    Watch(WatchArgs),
    /// Export a retention schedule sheet to JSON
    Retention(RetentionArgs),
    /// Blob store operations
    #[command(subcommand)]
    Blob(BlobCommand),
    /// Assessment scan migration
    #[command(subcommand)]
    Scans(ScansCommand),
}

#[derive(Args)]
pub struct LayoutArgs {
    /// Sheet layout JSON; built-in defaults when omitted
    #[arg(long, env = "DROPZONE_LAYOUT")]
    pub layout: Option<PathBuf>,

    /// Where batch files are written
    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Workbook to convert (.xlsx)
    pub input: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Convert even when the registry says this content was converted
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Directory to poll for .xlsx files
    pub dir: PathBuf,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Seconds between polls
    #[arg(long, default_value_t = 10)]
    pub interval: u64,
}

#[derive(Args)]
pub struct RetentionArgs {
    /// Retention schedule workbook
    pub input: PathBuf,

    /// Sheet holding the schedule
    #[arg(long, default_value = dropzone_core::retention::DEFAULT_SHEET)]
    pub sheet: String,

    /// Policy JSON overriding the built-in rules
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Output file; defaults to output.json in --output-dir
    #[arg(long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum BlobCommand {
    /// List blobs, optionally under a prefix
    List {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Upload a local file (overwrites)
    Upload {
        path: PathBuf,
        /// Blob name; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Download one blob into a directory
    Download {
        name: String,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Print every blob under a prefix as JSON
    Folder { prefix: String },
    /// Download a blob in ranges, merge, and print its SHA-256
    Chunked {
        name: String,
        /// Assembly directory; defaults to BLOB_STAGING_DIR
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AuthArg {
    Basic,
    Json,
}

#[derive(Args)]
pub struct ScanServerArgs {
    /// Management server host; expands to https://HOST:8083/SecureSphere/api/v1
    #[arg(long, env = "SCAN_HOST", required_unless_present = "base_url")]
    pub host: Option<String>,

    /// Full API root, overriding --host
    #[arg(long, env = "SCAN_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "SCAN_USERNAME")]
    pub username: String,

    #[arg(long, env = "SCAN_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, value_enum, default_value = "basic")]
    pub auth: AuthArg,

    /// Reject self-signed certificates
    #[arg(long)]
    pub verify_tls: bool,

    /// Collection path relative to the API root
    #[arg(long, default_value = dropzone_scans::config::DEFAULT_SCANS_PATH)]
    pub scans_path: String,
}

#[derive(Subcommand)]
pub enum ScansCommand {
    /// Fetch scans whose name contains a keyword, with details
    Export {
        #[command(flatten)]
        server: ScanServerArgs,

        #[arg(long, default_value = "DataRetention")]
        keyword: String,

        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,
    },
    /// Create scans from a JSON file (one definition or an array)
    Import {
        #[command(flatten)]
        server: ScanServerArgs,

        file: PathBuf,
    },
}
