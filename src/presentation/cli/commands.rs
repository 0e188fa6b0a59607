//! CLI commands using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ios-triage - iOS backup and filesystem triage
///
/// Decrypts encrypted iOS backups, extracts artifacts from backups and
/// filesystem dumps, and checks them against indicators of compromise.
#[derive(Parser)]
#[command(name = "ios-triage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forensic triage of iOS backups and filesystem dumps", long_about = None)]
pub struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decrypt an encrypted iTunes backup
    DecryptBackup {
        /// Folder where the decrypted backup is written
        #[arg(short, long)]
        destination: PathBuf,

        /// Backup password (or set IOS_TRIAGE_BACKUP_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,

        /// File holding the raw decryption key, takes precedence over --password
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Path to the backup folder
        backup_path: PathBuf,
    },

    /// Extract the decryption key of an iTunes backup
    ExtractKey {
        /// Backup password (or set IOS_TRIAGE_BACKUP_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,

        /// Key file to write (printed only when unset)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Path to the backup folder
        backup_path: PathBuf,
    },

    /// Extract artifacts from an iTunes backup
    CheckBackup {
        #[command(flatten)]
        check: CheckArgs,

        /// Path to the (decrypted) backup folder
        #[arg(required_unless_present = "list_modules")]
        backup_path: Option<PathBuf>,
    },

    /// Extract artifacts from a full filesystem dump
    CheckFs {
        #[command(flatten)]
        check: CheckArgs,

        /// Path to the filesystem dump
        #[arg(required_unless_present = "list_modules")]
        dump_path: Option<PathBuf>,
    },

    /// Compare stored JSON results to provided indicators
    CheckIocs {
        /// Indicators files (STIX 2)
        #[arg(short, long, required_unless_present = "list_modules")]
        iocs: Vec<PathBuf>,

        /// Print the list of available modules and exit
        #[arg(short, long)]
        list_modules: bool,

        /// Name of a single module to run instead of all
        #[arg(short, long)]
        module: Option<String>,

        /// Folder holding JSON results of a previous run
        #[arg(required_unless_present = "list_modules")]
        folder: Option<PathBuf>,
    },
}

/// Options shared by the extraction commands
#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Indicators files (STIX 2)
    #[arg(short, long)]
    pub iocs: Vec<PathBuf>,

    /// Folder where JSON results and timelines are stored
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Avoid running time/resource consuming features
    #[arg(short, long)]
    pub fast: bool,

    /// Print the list of available modules and exit
    #[arg(short, long)]
    pub list_modules: bool,

    /// Name of a single module to run instead of all
    #[arg(short, long)]
    pub module: Option<String>,
}
