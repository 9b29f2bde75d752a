//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use docscout_core::pipeline::{
    ProgressReporter, ResearchConfig, ResearchOutcome, run_research,
};
use docscout_shared::{
    AppConfig, ArchPattern, BundleStatus, FetchConfig, ResearchRequest, cache_db_path,
    config_file_path, expand_path, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocScout — turn a (domain, pattern) request into validated reference knowledge.
#[derive(Parser)]
#[command(
    name = "docscout",
    version,
    about = "Research framework documentation into a validated, structured bundle.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the research pipeline for a product domain and architecture pattern.
    Research {
        /// Product domain being researched (free text, e.g. "contact-manager").
        domain: String,

        /// Architecture pattern (see `docscout patterns`); unrecognized
        /// names fall back to core-framework-only research.
        #[arg(short, long, default_value = "unknown")]
        pattern: String,

        /// Output directory for the bundle (defaults to the configured
        /// output root plus the domain slug).
        #[arg(short, long)]
        out: Option<String>,

        /// Maximum concurrent fetches.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Maximum concurrent fetches per host.
        #[arg(long)]
        per_host: Option<u32>,

        /// Per-request timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Retry attempts for transient fetch failures.
        #[arg(long)]
        retries: Option<u32>,

        /// URL cache TTL in hours.
        #[arg(long)]
        cache_ttl: Option<u64>,

        /// Maximum supplemental resolve passes.
        #[arg(long)]
        max_passes: Option<u32>,

        /// Overall completeness threshold (0–1).
        #[arg(long)]
        threshold: Option<f64>,

        /// Per-category floor for critical categories (0–1).
        #[arg(long)]
        critical_floor: Option<f64>,

        /// Overall run timeout in seconds.
        #[arg(long)]
        run_timeout: Option<u64>,

        /// Bypass the URL cache entirely.
        #[arg(long)]
        no_cache: bool,
    },

    /// List the architecture patterns with dedicated target sets.
    Patterns,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docscout=info",
        1 => "docscout=debug",
        _ => "docscout=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command. The returned exit code follows the pipeline
/// contract: 0 = complete, 1 = incomplete-but-written, 2 = fatal error.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Research {
            domain,
            pattern,
            out,
            concurrency,
            per_host,
            timeout,
            retries,
            cache_ttl,
            max_passes,
            threshold,
            critical_floor,
            run_timeout,
            no_cache,
        } => {
            let overrides = ResearchOverrides {
                out,
                concurrency,
                per_host,
                timeout,
                retries,
                cache_ttl,
                max_passes,
                threshold,
                critical_floor,
                run_timeout,
                no_cache,
            };
            cmd_research(&domain, &pattern, overrides).await
        }
        Command::Patterns => cmd_patterns(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Flag overrides for the research command.
struct ResearchOverrides {
    out: Option<String>,
    concurrency: Option<u32>,
    per_host: Option<u32>,
    timeout: Option<u64>,
    retries: Option<u32>,
    cache_ttl: Option<u64>,
    max_passes: Option<u32>,
    threshold: Option<f64>,
    critical_floor: Option<f64>,
    run_timeout: Option<u64>,
    no_cache: bool,
}

// ---------------------------------------------------------------------------
// research
// ---------------------------------------------------------------------------

async fn cmd_research(
    domain: &str,
    pattern_name: &str,
    overrides: ResearchOverrides,
) -> Result<ExitCode> {
    let app_config = load_config()?;

    let pattern = ArchPattern::parse_lossy(pattern_name);
    if pattern == ArchPattern::Unknown && pattern_name != "unknown" {
        warn!(
            pattern = pattern_name,
            "unrecognized pattern, researching core framework only"
        );
    }

    let output_dir = resolve_output_dir(&app_config, domain, overrides.out.as_deref())?;
    let config = build_research_config(&app_config, domain, pattern, output_dir, &overrides)?;

    let progress = CliProgress::new();
    let outcome = run_research(&config, &progress).await?;

    print_outcome(&outcome);

    match outcome.status() {
        BundleStatus::Complete => Ok(ExitCode::SUCCESS),
        BundleStatus::Incomplete => Ok(ExitCode::from(1)),
    }
}

fn resolve_output_dir(
    config: &AppConfig,
    domain: &str,
    out_flag: Option<&str>,
) -> Result<PathBuf> {
    match out_flag {
        Some(path) => Ok(expand_path(path)?),
        None => {
            let root = expand_path(&config.defaults.output_dir)?;
            Ok(root.join(slugify(domain)))
        }
    }
}

fn build_research_config(
    app_config: &AppConfig,
    domain: &str,
    pattern: ArchPattern,
    output_dir: PathBuf,
    overrides: &ResearchOverrides,
) -> Result<ResearchConfig> {
    let mut fetch = FetchConfig::from(app_config);
    if let Some(v) = overrides.concurrency {
        fetch.concurrency = v;
    }
    if let Some(v) = overrides.per_host {
        fetch.per_host_concurrency = v;
    }
    if let Some(v) = overrides.timeout {
        fetch.timeout_secs = v;
    }
    if let Some(v) = overrides.retries {
        fetch.max_retries = v;
    }
    if let Some(v) = overrides.cache_ttl {
        fetch.cache_ttl_hours = v;
    }
    fetch.use_cache = !overrides.no_cache;

    let mut validation = app_config.validation.clone();
    if let Some(v) = overrides.max_passes {
        validation.max_supplemental_passes = v;
    }
    if let Some(v) = overrides.threshold {
        if !(0.0..=1.0).contains(&v) {
            return Err(eyre!("--threshold must be between 0 and 1, got {v}"));
        }
        validation.completeness_threshold = v;
    }
    if let Some(v) = overrides.critical_floor {
        if !(0.0..=1.0).contains(&v) {
            return Err(eyre!("--critical-floor must be between 0 and 1, got {v}"));
        }
        validation.critical_floor = v;
    }

    Ok(ResearchConfig {
        request: ResearchRequest {
            domain: domain.to_string(),
            pattern,
        },
        output_dir,
        fetch,
        validation,
        run_timeout_secs: overrides
            .run_timeout
            .unwrap_or(app_config.defaults.run_timeout_secs),
        cache_path: if overrides.no_cache {
            None
        } else {
            Some(cache_db_path()?)
        },
        table: None,
    })
}

/// Lowercase, filesystem-safe slug for the default bundle directory name.
fn slugify(domain: &str) -> String {
    let mut slug: String = domain
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "bundle".to_string()
    } else {
        trimmed.to_string()
    }
}

fn print_outcome(outcome: &ResearchOutcome) {
    let bundle = &outcome.bundle;
    let coverage = bundle.coverage.as_ref();

    println!();
    println!("Research bundle: {}", outcome.bundle_dir.display());
    println!("  status:  {}", bundle.status());
    if let Some(report) = coverage {
        println!("  overall: {:.2}", report.overall_score);
        for cat in &report.categories {
            println!("  {:<18} {:.2}", format!("{}:", cat.category), cat.score);
        }
    }
    println!(
        "  {} patterns, {} gotchas from {} targets ({} supplemental passes)",
        bundle.patterns.len(),
        bundle.gotchas.len(),
        bundle.targets.len(),
        bundle.supplemental_passes
    );

    if bundle.status() == BundleStatus::Incomplete {
        if let Some(report) = coverage {
            let missing: Vec<String> = report
                .categories
                .iter()
                .filter(|c| !c.missing_signals.is_empty())
                .map(|c| format!("{} ({})", c.category, c.missing_signals.join(", ")))
                .collect();
            if !missing.is_empty() {
                println!("  missing: {}", missing.join("; "));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// patterns / config
// ---------------------------------------------------------------------------

fn cmd_patterns() -> Result<ExitCode> {
    for pattern in ArchPattern::KNOWN {
        println!("{pattern}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Created {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show() -> Result<ExitCode> {
    let config = load_config()?;
    let path = config_file_path()?;
    println!("# resolved from {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Progress display
// ---------------------------------------------------------------------------

/// Spinner-based progress display for interactive runs.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .expect("valid progress template"),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn fetched(&self, summary: &docscout_core::pipeline::FetchSummary) {
        self.bar.println(format!(
            "  fetched {} ok, {} failed ({} from cache)",
            summary.fetched_ok, summary.failed, summary.cache_hits
        ));
    }

    fn done(&self, _outcome: &ResearchOutcome) {
        self.bar.finish_and_clear();
    }
}
