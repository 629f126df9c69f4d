use anyhow::{Context, Result};
use clap::Parser;
use classist::cli::{Cli, Commands, OutputFormat, rewrite_args_for_implicit_search};
use classist::config::{Preferences, ScanConfig, resolve_prefs_path, resolve_root};
use classist::walker::ScanReport;
use classist::{QueryMode, ScanController, ScanState};
use serde::Serialize;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.verbose);

    let prefs_path = resolve_prefs_path(&cli)?;
    let mut prefs = Preferences::load(&prefs_path).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "Ignoring unreadable preferences");
        Preferences::default()
    });
    let root = resolve_root(&cli, &prefs)?;

    let controller = ScanController::new(ScanConfig::from_cli(&cli));
    controller
        .start(&root)
        .with_context(|| format!("Cannot scan {}", root.display()))?;
    remember_root(&mut prefs, &prefs_path, &root);

    let state = controller.wait();
    if state != ScanState::Completed {
        anyhow::bail!(
            "Scan of {} ended as {state:?}: {}",
            root.display(),
            controller.failure().unwrap_or_default()
        );
    }
    let report = controller.report().unwrap_or_default();

    match cli.command.clone() {
        Commands::Search { pattern } => {
            let result = list_classes(&controller, &report, QueryMode::Pattern(pattern))?;
            emit(&result, cli.format, render_classes)?;
        }
        Commands::Duplicates => {
            let result = list_classes(&controller, &report, QueryMode::DuplicatesOnly)?;
            emit(&result, cli.format, render_classes)?;
        }
        Commands::Which { class_name } => {
            let class_name = normalize_class_name(&class_name);
            let archives: Vec<String> = controller
                .archives_for(&class_name)
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            if archives.is_empty() {
                anyhow::bail!("Class {class_name} not found (scanned: {})", report.root);
            }
            let result = WhichResult {
                class_name,
                archives,
            };
            emit(&result, cli.format, render_which)?;
        }
        Commands::Stats => {
            let duplicates = controller.query(&QueryMode::DuplicatesOnly)?.len();
            let result = StatsResult {
                report,
                duplicates,
            };
            emit(&result, cli.format, render_stats)?;
        }
    }

    Ok(())
}

fn parse_cli() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    Cli::parse_from(rewrite_args_for_implicit_search(args))
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The root is stored absolute; the next run may start in another directory.
fn remember_root(prefs: &mut Preferences, prefs_path: &Path, root: &Path) {
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    prefs.last_root = Some(absolute);
    if let Err(e) = prefs.save(prefs_path) {
        warn!(error = %format!("{e:#}"), "Failed to remember scanned directory");
    }
}

fn normalize_class_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s
        .strip_prefix("import")
        .filter(|r| r.starts_with(char::is_whitespace))
    {
        s = rest.trim();
    }
    if s.ends_with(';') {
        s = s.trim_end_matches(';').trim();
    }
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Serialize)]
struct ClassHit {
    class_name: String,
    archives: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClassListResult {
    root: String,
    query: String,
    results: usize,
    duration_ms: u64,
    classes: Vec<ClassHit>,
}

#[derive(Debug, Serialize)]
struct WhichResult {
    class_name: String,
    archives: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatsResult {
    #[serde(flatten)]
    report: ScanReport,
    duplicates: usize,
}

fn list_classes(
    controller: &ScanController,
    report: &ScanReport,
    mode: QueryMode,
) -> Result<ClassListResult> {
    let names = controller.query(&mode)?;
    let classes: Vec<ClassHit> = names
        .into_iter()
        .map(|class_name| {
            let archives = controller
                .archives_for(&class_name)
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            ClassHit {
                class_name,
                archives,
            }
        })
        .collect();

    let query = match mode {
        QueryMode::Pattern(pattern) => pattern,
        QueryMode::DuplicatesOnly => "duplicates".to_string(),
    };

    Ok(ClassListResult {
        root: report.root.clone(),
        query,
        results: classes.len(),
        duration_ms: report.duration_ms,
        classes,
    })
}

fn emit<T: Serialize>(value: &T, format: OutputFormat, text: fn(&T) -> String) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Text => text(value),
    };
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn render_classes(result: &ClassListResult) -> String {
    let mut out = format!("Results ({})\n", result.results);
    for hit in &result.classes {
        out.push_str(&hit.class_name);
        out.push('\n');
        for archive in &hit.archives {
            out.push_str(&format!("    {archive}\n"));
        }
    }
    out
}

fn render_which(result: &WhichResult) -> String {
    let mut out = String::new();
    for archive in &result.archives {
        out.push_str(archive);
        out.push('\n');
    }
    out
}

fn render_stats(result: &StatsResult) -> String {
    let report = &result.report;
    let mut out = String::new();
    out.push_str(&format!("root: {}\n", report.root));
    out.push_str(&format!("classes: {}\n", report.classes_indexed));
    out.push_str(&format!("duplicates: {}\n", result.duplicates));
    out.push_str(&format!("archives_read: {}\n", report.archives_read));
    out.push_str(&format!("archives_failed: {}\n", report.archives_failed.len()));
    for failure in &report.archives_failed {
        out.push_str(&format!("- {}: {}\n", failure.path, failure.error));
    }
    out.push_str(&format!("entries_skipped: {}\n", report.entries_skipped));
    out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
    out
}
