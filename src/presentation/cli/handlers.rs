//! Command handlers
//!
//! Each handler maps one subcommand onto the application layer and prints a
//! styled summary. Errors bubble up as `anyhow` with context attached.

use super::credentials::{self, Credential, CredentialSources};
use super::{CheckArgs, ProgressReporter};
use crate::application::dto::{ModuleReport, ModuleStatus, RunOptions};
use crate::application::{check_stored_results, BackupDecryptionEngine, ExecutionDriver};
use crate::domain::repositories::{IndicatorSet, SourceKind};
use crate::domain::services::ModuleRegistry;
use crate::infrastructure::indicators::StixIndicators;
use crate::infrastructure::modules::builtin_registry;
use anyhow::{bail, Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `decrypt-backup`
pub fn decrypt_backup(
    backup_path: &Path,
    destination: &Path,
    password: Option<String>,
    key_file: Option<PathBuf>,
) -> Result<()> {
    let mut engine = BackupDecryptionEngine::open(backup_path)
        .with_context(|| format!("Failed to open backup at {}", backup_path.display()))?;

    let sources = CredentialSources::from_env(key_file, password);
    unlock(&mut engine, sources)?;

    let reporter = ProgressReporter::for_decryption();
    let summary = engine
        .process_backup(destination, Some(reporter.callback()))
        .context("Failed to decrypt backup")?;
    reporter.finish("Backup decrypted");

    println!();
    println!("{}", style("Decryption Summary:").cyan().bold());
    println!("Files decrypted:  {}", style(summary.decrypted).green().bold());
    println!("Plists copied:    {}", summary.plists_copied);
    if summary.missing > 0 {
        println!("Missing files:    {}", style(summary.missing).yellow());
    }
    if !summary.failures.is_empty() {
        println!("Failed files:     {}", style(summary.failures.len()).yellow());
        for failure in &summary.failures {
            warn!(
                file_id = %failure.file_id,
                "Failed to decrypt {}::{}: {}",
                failure.domain,
                failure.relative_path,
                failure.error
            );
        }
    }
    println!("Output folder:    {}", summary.destination.display());
    println!("Elapsed:          {:.2}s", summary.duration.as_secs_f64());

    Ok(())
}

/// `extract-key`
pub fn extract_key(
    backup_path: &Path,
    password: Option<String>,
    key_file: Option<&Path>,
) -> Result<()> {
    let mut engine = BackupDecryptionEngine::open(backup_path)
        .with_context(|| format!("Failed to open backup at {}", backup_path.display()))?;

    unlock(&mut engine, CredentialSources::from_env(None, password))?;

    let key = engine.extract_key().context("Failed to extract key")?;
    println!("{} {}", style("Decryption key:").green().bold(), key);

    if let Some(path) = key_file {
        engine
            .write_key(path)
            .with_context(|| format!("Failed to write key file {}", path.display()))?;
        println!("Key written to {}", path.display());
    }

    Ok(())
}

/// `check-backup` and `check-fs`
pub fn check_source(args: &CheckArgs, source: Option<&Path>, kind: SourceKind) -> Result<()> {
    let registry = builtin_registry().context("Invalid module registry")?;

    if args.list_modules {
        list_modules(&registry, Some(kind));
        return Ok(());
    }

    let Some(source) = source else {
        bail!("A source path is required unless --list-modules is given");
    };
    validate_module(&registry, args.module.as_deref())?;

    let indicators = load_indicators(&args.iocs)?;
    let options = RunOptions::new()
        .with_output(args.output.clone())
        .only(args.module.clone())
        .fast(args.fast);

    info!("Checking {} at {}", kind_label(kind), source.display());
    let summary = ExecutionDriver::new(&registry)
        .run_all(
            source,
            kind,
            indicators.as_ref().map(|i| i as &dyn IndicatorSet),
            &options,
        )
        .context("Failed to store results")?;

    print_reports(&summary.modules);
    println!();
    println!("Records extracted: {}", style(summary.total_results()).green().bold());
    println!("Timeline events:   {}", summary.timeline.len());
    if indicators.is_some() {
        print_detected(summary.total_detected());
    }
    if let Some(output) = &args.output {
        println!("Output folder:     {}", output.display());
    }

    Ok(())
}

/// `check-iocs`
pub fn check_iocs(
    iocs: &[PathBuf],
    list: bool,
    module: Option<&str>,
    folder: Option<&Path>,
) -> Result<()> {
    let registry = builtin_registry().context("Invalid module registry")?;

    if list {
        list_modules(&registry, None);
        return Ok(());
    }

    let Some(folder) = folder else {
        bail!("A results folder is required unless --list-modules is given");
    };
    validate_module(&registry, module)?;

    let Some(indicators) = load_indicators(iocs)? else {
        bail!("No indicators provided");
    };

    let reports = check_stored_results(&registry, folder, &indicators, module)
        .with_context(|| format!("Failed to check results in {}", folder.display()))?;

    print_reports(&reports);
    let detected = reports
        .iter()
        .map(|r| match r.status {
            ModuleStatus::Completed {
                detected: Some(d), ..
            } => d,
            _ => 0,
        })
        .sum();
    println!();
    print_detected(detected);

    Ok(())
}

fn unlock(engine: &mut BackupDecryptionEngine, sources: CredentialSources) -> Result<()> {
    let (credential, notices) = credentials::resolve(sources);
    credentials::log_notices(&notices);

    match credential {
        Credential::KeyFile(path) => engine
            .unlock_with_key_file(&path)
            .with_context(|| format!("Failed to unlock backup with key file {}", path.display())),
        Credential::Password(password) => engine
            .unlock_with_password(&password)
            .context("Failed to unlock backup with password"),
        Credential::Prompt => {
            let password = credentials::prompt_password()?;
            engine
                .unlock_with_password(&password)
                .context("Failed to unlock backup with password")
        }
    }
}

fn load_indicators(paths: &[PathBuf]) -> Result<Option<StixIndicators>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let indicators = StixIndicators::load(paths).context("Failed to load indicators")?;
    info!("Loaded a total of {} unique indicators", indicators.len());
    Ok(Some(indicators))
}

fn validate_module(registry: &ModuleRegistry, module: Option<&str>) -> Result<()> {
    if let Some(name) = module {
        if registry.find_by_name(name).is_none() {
            bail!(
                "Unknown module {}; available: {}",
                name,
                registry.names().join(", ")
            );
        }
    }
    Ok(())
}

fn list_modules(registry: &ModuleRegistry, kind: Option<SourceKind>) {
    println!("{}", style("Available modules:").cyan().bold());
    for descriptor in registry.iter() {
        if kind.is_some_and(|k| !descriptor.modes.supports(k)) {
            continue;
        }
        println!("  - {}", descriptor.name);
    }
}

fn print_reports(reports: &[ModuleReport]) {
    println!();
    println!("{}", style("Module Summary:").cyan().bold());
    println!(
        "{:<24} {:>8} {:>9}  {}",
        style("MODULE").bold(),
        style("RESULTS").bold(),
        style("DETECTED").bold(),
        style("STATUS").bold()
    );
    println!("{}", "-".repeat(60));

    for report in reports {
        let (results, detected, status) = match &report.status {
            ModuleStatus::Completed { results, detected } => (
                results.to_string(),
                detected.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                style("ok".to_string()).green(),
            ),
            ModuleStatus::NotSupported => {
                ("-".into(), "-".into(), style("not supported".to_string()).dim())
            }
            ModuleStatus::ArtifactNotFound => {
                ("-".into(), "-".into(), style("not found".to_string()).dim())
            }
            ModuleStatus::Failed { error } => {
                ("-".into(), "-".into(), style(format!("failed: {}", error)).red())
            }
        };
        println!("{:<24} {:>8} {:>9}  {}", report.name, results, detected, status);
    }
}

fn print_detected(detected: usize) {
    if detected > 0 {
        println!(
            "{} {}",
            style("Detected indicators:").red().bold(),
            style(detected).red().bold()
        );
    } else {
        println!("Detected indicators: {}", style(0).green());
    }
}

fn kind_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Backup => "backup",
        SourceKind::FileSystem => "filesystem dump",
        SourceKind::Snapshot => "stored results",
    }
}
