//! tbit-reconcile
//!
//! Command-line front end for TBiT import rules:
//! - Validating a rules directory and showing which rule a URI selects
//! - Resolving one authority URI into an entity record
//! - Batch import into a JSON-lines record file
//! - Rewriting project URIs after a base-URI change

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use tbit_rdfmap::{RuleRegistry, UriRebase};
use tbit_resolve::{
    ImportRun, JsonLinesSink, KnowledgeSource, MemorySource, ReconcileConfig, Resolver,
    RetryingSource, SkipReason, SourceEntity, SparqlHttpSource,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Replacements shown by `rebase --dry-run`.
const DRY_RUN_SAMPLE: usize = 10;

#[derive(Parser)]
#[command(name = "tbit-reconcile")]
#[command(
    author,
    version,
    about = "Reconcile Wikidata/GND authority URIs into TBiT entities"
)]
struct Cli {
    /// Run configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rules directory (overrides `import.rules_dir`)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate every rule, then list them.
    Check,

    /// Show the rule selected for a URI.
    Match {
        uri: String,
    },

    /// Resolve one URI and print the entity record as JSON.
    Resolve {
        uri: String,
        /// Answer queries from a fixture JSON file instead of the endpoint
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Keep attributes the rule's filters would remove
        #[arg(long)]
        no_filters: bool,
    },

    /// Import a list of URIs (one per line) into a JSON-lines file.
    Import {
        uris: PathBuf,
        /// Output records (JSON lines); existing records are kept
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Worker threads (overrides `import.workers`)
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        no_filters: bool,
    },

    /// Rewrite URIs under an old base to a new base.
    Rebase {
        old_base: String,
        new_base: String,
        uris: PathBuf,
        /// Only preview a sample of replacements
        #[arg(long)]
        dry_run: bool,
        /// Write rewritten URIs here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::default(),
    };
    let rules_dir = cli
        .rules
        .clone()
        .or_else(|| config.import.rules_dir.clone())
        .unwrap_or_else(|| PathBuf::from("rules"));
    debug!(rules_dir = %rules_dir.display(), "using rules directory");

    match cli.command {
        Commands::Check => cmd_check(&rules_dir),
        Commands::Match { uri } => cmd_match(&rules_dir, &uri),
        Commands::Resolve {
            uri,
            fixture,
            no_filters,
        } => cmd_resolve(&config, &rules_dir, &uri, fixture.as_deref(), !no_filters),
        Commands::Import {
            uris,
            out,
            fixture,
            workers,
            no_filters,
        } => cmd_import(
            &config,
            &rules_dir,
            &uris,
            &out,
            fixture.as_deref(),
            workers.unwrap_or(config.import.workers),
            !no_filters,
        ),
        Commands::Rebase {
            old_base,
            new_base,
            uris,
            dry_run,
            out,
        } => cmd_rebase(&old_base, &new_base, &uris, dry_run, out.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Helpers
// ============================================================================

fn load_rules(rules_dir: &Path) -> Result<RuleRegistry> {
    RuleRegistry::load_dir(rules_dir)
        .with_context(|| format!("failed to load rules from {}", rules_dir.display()))
}

fn read_uri_list(path: &Path) -> Result<Vec<String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Fixture source when given, else the configured endpoint; retried either way.
fn open_source(
    config: &ReconcileConfig,
    fixture: Option<&Path>,
) -> Result<RetryingSource<Box<dyn KnowledgeSource>>> {
    let inner: Box<dyn KnowledgeSource> = match fixture {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let source = MemorySource::from_fixture_json(&text)
                .with_context(|| format!("invalid fixture {}", path.display()))?;
            Box::new(source)
        }
        None => Box::new(SparqlHttpSource::new(
            &config.source.endpoint,
            config.timeout(),
            &config.source.user_agent,
        )?),
    };
    Ok(RetryingSource::new(inner, config.retry_policy()))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_check(rules_dir: &Path) -> Result<()> {
    let registry = load_rules(rules_dir)?;
    println!(
        "{} {} rule(s) in {}",
        "ok".green().bold(),
        registry.len(),
        rules_dir.display()
    );
    for (i, rule) in registry.rules().iter().enumerate() {
        let names: Vec<&str> = rule.attributes().iter().map(|a| a.name.as_str()).collect();
        println!(
            "  {} {} {} {}",
            format!("{:>2}.", i + 1).dimmed(),
            rule.target_type().model_name().bold(),
            rule.source_pattern().as_str().cyan(),
            rule.origin_label().dimmed()
        );
        println!("      {} {}", "→".cyan(), names.join(", "));
        if !rule.filters().is_empty() {
            println!(
                "      {} drop [{}], full dates [{}]",
                "→".yellow(),
                rule.filters().drop.join(", "),
                rule.filters().full_dates.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_match(rules_dir: &Path, uri: &str) -> Result<()> {
    let registry = load_rules(rules_dir)?;
    let rule = registry.match_uri(uri)?;
    println!(
        "{} {} → {}",
        "match".green().bold(),
        uri,
        rule.target_type().to_string().bold()
    );
    println!("  {} pattern {}", "→".cyan(), rule.source_pattern().as_str());
    println!("  {} rule {}", "→".cyan(), rule.origin_label());
    println!(
        "  {} {} attribute(s), {} quer(y/ies)",
        "→".yellow(),
        rule.attributes().len(),
        rule.queries().len()
    );
    Ok(())
}

fn cmd_resolve(
    config: &ReconcileConfig,
    rules_dir: &Path,
    uri: &str,
    fixture: Option<&Path>,
    apply_filters: bool,
) -> Result<()> {
    let registry = load_rules(rules_dir)?;
    let rule = registry.match_uri(uri)?;
    let resolver =
        Resolver::new(open_source(config, fixture)?).with_locales(config.locale_preference());

    let mut entity = resolver.resolve(rule, &SourceEntity::new(uri))?;
    if apply_filters {
        entity.apply_filters(rule.filters());
    }
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

fn cmd_import(
    config: &ReconcileConfig,
    rules_dir: &Path,
    uris_path: &Path,
    out: &Path,
    fixture: Option<&Path>,
    workers: usize,
    apply_filters: bool,
) -> Result<()> {
    let registry = load_rules(rules_dir)?;
    let uris = read_uri_list(uris_path)?;
    println!(
        "{} {} URI(s) from {}",
        "Importing".green().bold(),
        uris.len(),
        uris_path.display()
    );

    let resolver =
        Resolver::new(open_source(config, fixture)?).with_locales(config.locale_preference());
    let sink = JsonLinesSink::open(out)?;
    let report = ImportRun::new(&registry, &resolver)
        .workers(workers)
        .apply_filters(apply_filters)
        .run(&uris, &sink)?;

    println!("  {} {}", "→".cyan(), out.display());
    println!(
        "  {} {} created, {} existing, {} skipped",
        "→".yellow(),
        report.created(),
        report.existing(),
        report.skipped.len()
    );
    for (reason, count) in report.skipped_by_reason() {
        println!("    {} {count}", format!("{reason}:").yellow());
    }
    for skipped in &report.skipped {
        let label = match skipped.reason {
            SkipReason::SourceUnavailable => "retry later".yellow(),
            _ => "skipped".red(),
        };
        eprintln!("{} {}: {}", label.bold(), skipped.uri, skipped.detail);
    }
    Ok(())
}

fn cmd_rebase(
    old_base: &str,
    new_base: &str,
    uris_path: &Path,
    dry_run: bool,
    out: Option<&Path>,
) -> Result<()> {
    let rebase = UriRebase::new(old_base, new_base)?;
    if rebase.is_noop() {
        println!(
            "{} {} already lies under {}; nothing to do",
            "info:".yellow().bold(),
            rebase.new_base(),
            rebase.old_domain()
        );
        return Ok(());
    }

    let uris = read_uri_list(uris_path)?;
    let summary = rebase.apply_all(uris.iter().map(String::as_str));
    eprintln!(
        "{} {} of {} URI(s) under {}",
        "Rebasing".green().bold(),
        summary.rewritten.len(),
        uris.len(),
        rebase.old_domain()
    );

    if dry_run {
        for (old, new) in summary.rewritten.iter().take(DRY_RUN_SAMPLE) {
            println!("  {} {} {}", old, "→".cyan(), new);
        }
        if summary.rewritten.len() > DRY_RUN_SAMPLE {
            println!(
                "  {} {} more",
                "…".dimmed(),
                summary.rewritten.len() - DRY_RUN_SAMPLE
            );
        }
        return Ok(());
    }

    let mut output = String::new();
    for uri in &uris {
        output.push_str(&rebase.rebase(uri).unwrap_or_else(|| uri.clone()));
        output.push('\n');
    }
    match out {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => print!("{output}"),
    }
    Ok(())
}
