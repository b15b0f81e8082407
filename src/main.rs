//! callvis CLI entry point

use clap::{Parser, builder::NonEmptyStringValueParser};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::UsageError;
use config::{FileConfig, Settings};

#[derive(Parser, Debug)]
#[command(name = "callvis")]
#[command(version, about = "Interactive call graph visualization", long_about = None)]
pub struct Cli {
    /// Import path of the entry package
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    pub package: String,

    /// Call graph exported by the analyzer (JSON)
    #[arg(long, env = "CALLVIS_GRAPH")]
    pub graph: Option<PathBuf>,

    /// Function or package to focus on
    #[arg(long)]
    pub focus: Option<String>,

    /// Grouping: pkg, type, pkg,type or none
    #[arg(long)]
    pub group: Option<String>,

    /// Keep only packages with these path prefixes (comma separated)
    #[arg(long)]
    pub limit: Option<String>,

    /// Drop packages with these path prefixes (comma separated)
    #[arg(long)]
    pub ignore: Option<String>,

    /// Keep only packages with these path prefixes, checked first (comma separated)
    #[arg(long)]
    pub include: Option<String>,

    /// Omit standard library packages
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub nostd: Option<bool>,

    /// Omit unexported functions not reached from the focus
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub nointer: Option<bool>,

    /// Include test functions
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub tests: Option<bool>,

    /// How far unexported callees of the focus are kept: direct or transitive
    #[arg(long)]
    pub retention: Option<String>,

    /// Write `<FILE>.gv` and `<FILE>.<FORMAT>` and exit instead of serving
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Image format passed to the layout engine (svg, png, ...; gv skips it)
    #[arg(long)]
    pub format: Option<String>,

    /// Directory for cached artifacts
    #[arg(long, env = "CALLVIS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Minimum edge length
    #[arg(long)]
    pub minlen: Option<u32>,

    /// Minimum space between nodes
    #[arg(long)]
    pub nodesep: Option<f64>,

    /// Node shape
    #[arg(long)]
    pub nodeshape: Option<String>,

    /// Node style
    #[arg(long)]
    pub nodestyle: Option<String>,

    /// Rank direction: LR, RL, TB or BT
    #[arg(long)]
    pub rankdir: Option<String>,

    /// Address to serve on
    #[arg(long)]
    pub http: Option<String>,

    /// Where render triggers redirect to
    #[arg(long)]
    pub viewer_url: Option<String>,

    /// Do not open a browser after the first render
    #[arg(long)]
    pub skip_browser: bool,

    /// Graphviz dot executable
    #[arg(long, env = "CALLVIS_DOT")]
    pub dot: Option<PathBuf>,

    /// Layout engine timeout in seconds
    #[arg(long)]
    pub dot_timeout: Option<u64>,

    /// Config file (defaults to ./callvis.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Option flags given on the command line, as `key=value` overrides.
    pub fn option_overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                overrides.push((key, value));
            }
        };
        push("focus", self.focus.clone());
        push("group", self.group.clone());
        push("limit", self.limit.clone());
        push("ignore", self.ignore.clone());
        push("include", self.include.clone());
        push("nostd", self.nostd.map(|b| b.to_string()));
        push("nointer", self.nointer.map(|b| b.to_string()));
        push("tests", self.tests.map(|b| b.to_string()));
        push("retention", self.retention.clone());
        push("minlen", self.minlen.map(|v| v.to_string()));
        push("nodesep", self.nodesep.map(|v| v.to_string()));
        push("nodeshape", self.nodeshape.clone());
        push("nodestyle", self.nodestyle.clone());
        push("rankdir", self.rankdir.clone());
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up CALLVIS_* and RUST_LOG from .env before clap reads the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("callvis={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("callvis v{}", env!("CARGO_PKG_VERSION"));

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, file)?;

    if let Err(err) = commands::run(settings).await {
        if let Some(usage) = err.downcast_ref::<UsageError>() {
            eprintln!("error: {usage}");
            std::process::exit(2);
        }
        return Err(err);
    }
    Ok(())
}
