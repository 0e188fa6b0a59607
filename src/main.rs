use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ios_triage::domain::repositories::SourceKind;
use ios_triage::presentation::cli::{handlers, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    print_banner();

    match cli.command {
        Commands::DecryptBackup {
            destination,
            password,
            key_file,
            backup_path,
        } => handlers::decrypt_backup(&backup_path, &destination, password, key_file),
        Commands::ExtractKey {
            password,
            key_file,
            backup_path,
        } => handlers::extract_key(&backup_path, password, key_file.as_deref()),
        Commands::CheckBackup { check, backup_path } => {
            handlers::check_source(&check, backup_path.as_deref(), SourceKind::Backup)
        }
        Commands::CheckFs { check, dump_path } => {
            handlers::check_source(&check, dump_path.as_deref(), SourceKind::FileSystem)
        }
        Commands::CheckIocs {
            iocs,
            list_modules,
            module,
            folder,
        } => handlers::check_iocs(&iocs, list_modules, module.as_deref(), folder.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn print_banner() {
    eprintln!();
    eprintln!(
        "{} {}",
        style("ios-triage").cyan().bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    eprintln!();
}
