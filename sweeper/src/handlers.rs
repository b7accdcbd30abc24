use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use sweeper_core::config::{AnalysisConfig, expand_path};
use sweeper_core::error::RemovalError;
use sweeper_core::liveness::{self, AssetSet, Liveness};
use sweeper_core::registry::AssetRegistry;
use sweeper_core::remove::FailurePolicy;
use sweeper_core::report::{ReportData, ReportFormat, generate_report, save_report};
use sweeper_core::{Session, UsageReport, discover_mods, remove_assets};
use sweeper_scanner::{CancelToken, LivenessEvidence, LookupPolicy, ProgressCallback};
use tracing::Level;

/// Install the log subscriber. `-v` shows per-edge decisions, `-q` only
/// warnings and errors.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Which part of a classification to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Used,
    Unused,
    All,
    Dead,
    Candidates,
}

impl Selection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "used" => Some(Selection::Used),
            "unused" => Some(Selection::Unused),
            "all" => Some(Selection::All),
            "dead" => Some(Selection::Dead),
            "candidates" => Some(Selection::Candidates),
            _ => None,
        }
    }
}

/// Pick one set out of a classification, optionally narrowed by a
/// case-insensitive substring.
pub fn select_assets(liveness: &Liveness, selection: Selection, filter: Option<&str>) -> AssetSet {
    let set = match selection {
        Selection::Used => liveness.used.clone(),
        Selection::Unused => liveness.unused.clone(),
        Selection::All => liveness.all(),
        Selection::Dead => liveness.dead_dependencies.clone(),
        Selection::Candidates => liveness.candidates(),
    };
    match filter {
        Some(needle) => set.filter_containing(needle),
        None => set,
    }
}

/// Layer command line flags over a config loaded from file.
pub fn apply_overrides(mut config: AnalysisConfig, args: &ArgMatches) -> AnalysisConfig {
    if let Some(depth) = args.get_one::<usize>("max-depth") {
        config.max_depth = *depth;
    }
    if let Some(workers) = args.get_one::<usize>("workers") {
        config.workers = (*workers).max(1);
    }
    if let Some(prefixes) = args.get_many::<String>("include") {
        config.include.extend(prefixes.cloned());
    }
    if let Some(prefixes) = args.get_many::<String>("exclude") {
        config.exclude.extend(prefixes.cloned());
    }
    if args.get_flag("ignore-exclusions") {
        config.honor_exclusions = false;
    }
    if args.get_flag("external-only") {
        config.skip_internal_assets = true;
    }
    if args.get_flag("strict") {
        config.lookup_policy = LookupPolicy::Fail;
    }
    match args.get_one::<String>("evidence").map(|s| s.as_str()) {
        Some("referencers") => config.evidence = LivenessEvidence::Referencers,
        Some("subtree") => config.evidence = LivenessEvidence::Subtree,
        _ => {}
    }
    config
}

pub fn load_config(args: &ArgMatches) -> Result<AnalysisConfig> {
    let path = args
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(sweeper_core::config::DEFAULT_CONFIG_PATH);
    let config = AnalysisConfig::load_or_default(path)?;
    Ok(apply_overrides(config, args))
}

fn registry_path(args: &ArgMatches) -> PathBuf {
    let db = args
        .get_one::<String>("db")
        .map(|s| s.as_str())
        .unwrap_or(sweeper_core::config::DEFAULT_REGISTRY_PATH);
    expand_path(db)
}

fn open_registry(args: &ArgMatches) -> Result<Arc<AssetRegistry>> {
    let path = registry_path(args);
    if !AssetRegistry::exists(&path) {
        bail!(
            "No registry at {}. Run `sweeper init` and `sweeper import` first.",
            path.display()
        );
    }
    let registry = AssetRegistry::open(&path)
        .with_context(|| format!("Failed to open registry {}", path.display()))?;
    Ok(Arc::new(registry))
}

fn mod_path(args: &ArgMatches) -> Result<String> {
    args.get_one::<String>("mod")
        .cloned()
        .context("--mod is required")
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Cancelling...", "!".yellow().bold());
            handle.cancel();
        }
    });
    token
}

fn build_session(
    args: &ArgMatches,
    registry: Arc<AssetRegistry>,
    config: &AnalysisConfig,
) -> Result<Session<AssetRegistry>> {
    let mod_path = mod_path(args)?;
    Ok(Session::new(registry, config.context(&mod_path))
        .with_workers(config.workers)
        .with_cancel_token(cancel_on_ctrl_c())
        .with_progress_bars(!args.get_flag("quiet")))
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn print_config(config: &AnalysisConfig, scope: &str) {
    println!("{} Module: {}", "→".blue(), scope.bright_white());
    println!("{} Max depth: {}", "→".blue(), config.max_depth);
    println!("{} Workers: {}", "→".blue(), config.workers);
    if !config.honor_exclusions {
        println!("{} Exclusions: {}", "→".blue(), "ignored".yellow());
    }
    println!();
}

fn emit_report(data: &ReportData, args: &ArgMatches) -> Result<()> {
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);
    let content = generate_report(data, format).context("Failed to render report")?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn load_usage_report(args: &ArgMatches) -> Result<UsageReport> {
    let raw = args
        .get_one::<String>("report")
        .map(|s| s.as_str())
        .unwrap_or(sweeper_core::config::DEFAULT_REPORT_PATH);
    let path = expand_path(raw);
    UsageReport::load(&path).context("Export the usage report as CSV or point --report at it")
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  SWEEPER INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let force = args.get_flag("force");
    let db_path = registry_path(args);
    let config_path = expand_path(
        args.get_one::<String>("config")
            .map(|s| s.as_str())
            .unwrap_or(sweeper_core::config::DEFAULT_CONFIG_PATH),
    );

    for dir in [db_path.parent(), config_path.parent()].into_iter().flatten() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    if AssetRegistry::exists(&db_path) {
        let overwrite = force || {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "Registry already exists at {}",
                db_path.display().to_string().bright_white()
            );
            let response = print_prompt("Would you like to overwrite it? [y/N]:")?;
            response == "y" || response == "yes"
        };
        if overwrite {
            AssetRegistry::drop(&db_path)
                .with_context(|| format!("Failed to remove {}", db_path.display()))?;
            println!("{} Existing registry removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing registry", "→".blue());
        }
    }

    if !AssetRegistry::exists(&db_path) {
        println!("{} Creating registry...", "→".blue());
        AssetRegistry::open(&db_path)
            .with_context(|| format!("Failed to create registry {}", db_path.display()))?;
    }

    if force || !config_path.exists() {
        let defaults = serde_json::to_string_pretty(&AnalysisConfig::default())?;
        fs::write(&config_path, defaults)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Registry: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!(
        "{} Config: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub fn handle_import(args: &ArgMatches) -> Result<()> {
    let manifest = args
        .get_one::<PathBuf>("MANIFEST")
        .context("A manifest path is required")?;
    let registry = open_registry(args)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Importing {}", manifest.display()));

    let added = registry
        .import_edges(manifest)
        .with_context(|| format!("Failed to import {}", manifest.display()))?;
    spinner.finish_and_clear();

    println!(
        "{} {} new dependencies ({} assets, {} dependencies total)",
        "✓".green().bold(),
        added.to_string().cyan(),
        registry.asset_count()?.to_string().cyan(),
        registry.dependency_count()?.to_string().cyan()
    );
    Ok(())
}

pub fn handle_mods(args: &ArgMatches) -> Result<()> {
    let project = args
        .get_one::<PathBuf>("PROJECT")
        .context("A project root is required")?;
    let mods = discover_mods(project)
        .with_context(|| format!("No Mods directory under {}", project.display()))?;

    if mods.is_empty() {
        println!("{} No mods found", "→".blue());
    }
    for m in mods {
        println!("  {}", m.bright_white());
    }
    Ok(())
}

pub async fn handle_graph(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let registry = open_registry(args)?;
    let session = build_session(args, registry.clone(), &config)?;
    let root = session.context().scope.root().to_string();
    if !args.get_flag("quiet") {
        print_config(&config, &root);
    }

    let scan = session.scan_module().await.context("Module scan failed")?;
    emit_report(&ReportData::new(&root, &root, scan), args)
}

pub async fn handle_unused(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let registry = open_registry(args)?;
    let session = build_session(args, registry.clone(), &config)?;
    let root = session.context().scope.root().to_string();
    let path = args.get_one::<String>("path").cloned().unwrap_or_else(|| root.clone());
    if !args.get_flag("quiet") {
        print_config(&config, &root);
    }

    let scan = session
        .scan_path(&path)
        .await
        .with_context(|| format!("Scan of {} failed", path))?;
    emit_report(&ReportData::new(&root, &path, scan), args)
}

pub async fn handle_classify(args: &ArgMatches) -> Result<()> {
    let report = load_usage_report(args)?;
    let config = load_config(args)?;
    let registry = open_registry(args)?;
    let session = build_session(args, registry.clone(), &config)?;
    let root = session.context().scope.root().to_string();
    let path = args.get_one::<String>("path").cloned().unwrap_or_else(|| root.clone());

    let scan = session
        .scan_for_liveness(&path)
        .await
        .with_context(|| format!("Scan of {} failed", path))?;
    let liveness = liveness::classify(
        &report,
        &session.context().scope,
        &scan.unreachable,
        &scan.graph,
    );

    let selection = args
        .get_one::<String>("show")
        .and_then(|s| Selection::from_str(s))
        .unwrap_or(Selection::Candidates);
    let filter = args.get_one::<String>("filter").map(|s| s.as_str());
    let selected = select_assets(&liveness, selection, filter);

    println!(
        "{} {} used, {} unused, {} dead dependencies",
        "✓".green().bold(),
        liveness.used.len().to_string().green(),
        liveness.unused.len().to_string().yellow(),
        liveness.dead_dependencies.len().to_string().red()
    );
    println!();
    for asset in &selected {
        println!("  {}", asset);
    }

    if args.get_one::<PathBuf>("output").is_some() {
        emit_report(&ReportData::new(&root, &path, scan).with_liveness(liveness), args)?;
    }
    Ok(())
}

pub async fn handle_remove(args: &ArgMatches) -> Result<()> {
    let report = load_usage_report(args)?;
    let config = load_config(args)?;
    let registry = open_registry(args)?;
    let session = build_session(args, registry.clone(), &config)?;

    let root = session.context().scope.root().to_string();
    let path = args.get_one::<String>("path").cloned().unwrap_or(root);

    let scan = session
        .scan_for_liveness(&path)
        .await
        .with_context(|| format!("Scan of {} failed", path))?;
    if scan.cancelled {
        bail!(
            "Scan cancelled after {} of {} assets; nothing was removed",
            scan.scanned,
            scan.total
        );
    }
    let liveness = liveness::classify(
        &report,
        &session.context().scope,
        &scan.unreachable,
        &scan.graph,
    );
    let filter = args.get_one::<String>("filter").map(|s| s.as_str());
    let candidates = select_assets(&liveness, Selection::Candidates, filter).to_vec();

    if candidates.is_empty() {
        println!("{} Nothing to remove", "✓".green().bold());
        return Ok(());
    }

    println!("{}", "REMOVAL CANDIDATES".bright_blue().bold());
    for asset in &candidates {
        println!("  {} {}", "•".yellow(), asset);
    }
    println!();

    if args.get_flag("dry-run") {
        println!("{} Dry run, nothing deleted", "→".blue());
        return Ok(());
    }

    if !args.get_flag("yes") {
        let response = print_prompt(&format!("Delete {} assets? [y/N]:", candidates.len()))?;
        if response != "y" && response != "yes" {
            println!("{} Removal cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let policy = if args.get_flag("continue-on-error") {
        FailurePolicy::Continue
    } else {
        FailurePolicy::FailFast
    };

    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    let bar = pb.clone();
    let progress: ProgressCallback = Arc::new(move |completed: usize, _total: usize, asset: String| {
        bar.set_position(completed as u64);
        bar.set_message(asset);
    });

    let result = remove_assets(
        registry.as_ref(),
        &candidates,
        session.cancel_token(),
        Some(progress),
        policy,
    );

    match result {
        Ok(outcome) => {
            pb.finish_and_clear();
            println!(
                "{} Deleted {} of {} assets",
                "✓".green().bold(),
                outcome.deleted_count.to_string().cyan(),
                candidates.len()
            );
            if outcome.cancelled {
                println!(
                    "{} Cancelled, {} assets left untouched:",
                    "!".yellow().bold(),
                    outcome.remaining.len()
                );
                for asset in &outcome.remaining {
                    println!("  {}", asset);
                }
            }
            for (asset, error) in &outcome.failures {
                println!("  {} {}: {}", "✗".red(), asset, error);
            }
            Ok(())
        }
        Err(RemovalError::DeleteFailed {
            source,
            deleted_count,
            remaining,
        }) => {
            pb.abandon();
            bail!(
                "{} (after {} deletions, {} not attempted)",
                source,
                deleted_count,
                remaining.len()
            )
        }
    }
}
