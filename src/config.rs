//! Launch settings: built-in defaults, then `callvis.toml`, then CLI flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use callvis_artifacts::{DEFAULT_TIMEOUT, OutputTarget};
use callvis_core::Options;
use serde::Deserialize;

use crate::Cli;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "callvis.toml";
pub const DEFAULT_GRAPH_FILE: &str = "callgraph.json";
pub const DEFAULT_HTTP: &str = "127.0.0.1:7878";
pub const DEFAULT_VIEWER_URL: &str = "/artifact";
pub const DEFAULT_FORMAT: &str = "svg";

/// Contents of a `callvis.toml` file. Every key is optional.
///
/// ```toml
/// graph = "callgraph.json"
/// cache_dir = ".callvis-cache"
/// http = "127.0.0.1:7878"
///
/// [options]
/// focus = "main"
/// ignore = ["github.com/acme/vendor"]
///
/// [options.style]
/// rankdir = "TB"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub graph: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub format: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub http: Option<String>,
    pub viewer_url: Option<String>,
    pub skip_browser: Option<bool>,
    pub dot: Option<PathBuf>,
    /// Seconds.
    pub dot_timeout: Option<u64>,
    pub options: Option<Options>,
}

impl FileConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid config file")
    }

    /// Load `explicit` (which must exist) or the default file if present.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(FileConfig::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// How the process runs after the first render.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Write the artifact files and exit.
    Batch,
    /// Serve the control endpoints on `host:port`.
    Serve { host: String, port: u16 },
}

/// Fully resolved launch settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub entry: String,
    pub graph: PathBuf,
    pub options: Options,
    pub output: OutputTarget,
    pub cache_dir: Option<PathBuf>,
    pub mode: Mode,
    pub viewer_url: String,
    pub skip_browser: bool,
    pub dot: PathBuf,
    pub dot_timeout: Duration,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> anyhow::Result<Self> {
        let mut options = file.options.unwrap_or_default();
        let overrides = cli.option_overrides();
        options
            .apply_overrides(overrides.iter().map(|(k, v)| (*k, v.as_str())))
            .context("invalid command-line option")?;
        options.validate().context("invalid option in config file")?;

        let output_base = cli.file.clone().or(file.file);
        let mode = match &output_base {
            Some(_) => Mode::Batch,
            None => {
                let http = cli
                    .http
                    .clone()
                    .or(file.http)
                    .unwrap_or_else(|| DEFAULT_HTTP.to_string());
                let (host, port) = parse_http(&http)?;
                Mode::Serve { host, port }
            }
        };

        let format = cli
            .format
            .clone()
            .or(file.format)
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string());

        Ok(Settings {
            entry: cli.package.clone(),
            graph: cli
                .graph
                .clone()
                .or(file.graph)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GRAPH_FILE)),
            options,
            output: OutputTarget::new(output_base, format),
            cache_dir: cli.cache_dir.clone().or(file.cache_dir),
            mode,
            viewer_url: cli
                .viewer_url
                .clone()
                .or(file.viewer_url)
                .unwrap_or_else(|| DEFAULT_VIEWER_URL.to_string()),
            skip_browser: cli.skip_browser || file.skip_browser.unwrap_or(false),
            dot: cli.dot.clone().or(file.dot).unwrap_or_else(|| PathBuf::from("dot")),
            dot_timeout: cli
                .dot_timeout
                .or(file.dot_timeout)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// Split `host:port`; a bare `:port` binds to localhost.
fn parse_http(value: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .with_context(|| format!("expected host:port for --http, got {value:?}"))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in --http {value:?}"))?;
    let host = if host.is_empty() { "127.0.0.1" } else { host };
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use callvis_core::{GroupMode, RankDir, Retention};
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("callvis").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&cli(&["app"]), FileConfig::default()).unwrap();
        assert_eq!(settings.entry, "app");
        assert_eq!(settings.graph, PathBuf::from(DEFAULT_GRAPH_FILE));
        assert_eq!(settings.options, Options::default());
        assert_eq!(
            settings.mode,
            Mode::Serve {
                host: "127.0.0.1".into(),
                port: 7878
            }
        );
        assert_eq!(settings.output.format, "svg");
        assert_eq!(settings.dot_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::parse(
            r#"
            graph = "from-file.json"
            format = "png"
            dot_timeout = 5

            [options]
            focus = "lib"
            nostd = false

            [options.style]
            rankdir = "TB"
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(
            &cli(&["app", "--focus", "main", "--group", "pkg,type", "--format", "svg"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.graph, PathBuf::from("from-file.json"));
        assert_eq!(settings.output.format, "svg");
        assert_eq!(settings.dot_timeout, Duration::from_secs(5));
        assert_eq!(settings.options.focus, "main");
        assert_eq!(settings.options.group, GroupMode::PackageType);
        assert!(!settings.options.nostd);
        assert_eq!(settings.options.style.rankdir, RankDir::TopBottom);
    }

    #[test]
    fn test_bool_flags() {
        let settings = Settings::resolve(
            &cli(&["app", "--nostd=false", "--nointer", "--tests", "--retention", "transitive"]),
            FileConfig::default(),
        )
        .unwrap();
        assert!(!settings.options.nostd);
        assert!(settings.options.nointer);
        assert!(settings.options.tests);
        assert_eq!(settings.options.retention, Retention::Transitive);
    }

    #[test]
    fn test_file_flag_selects_batch() {
        let settings = Settings::resolve(&cli(&["app", "--file", "out/graph"]), FileConfig::default()).unwrap();
        assert_eq!(settings.mode, Mode::Batch);
        assert_eq!(settings.output.image_path(), Some(PathBuf::from("out/graph.svg")));
    }

    #[test]
    fn test_prefix_lists() {
        let settings = Settings::resolve(
            &cli(&["app", "--ignore", "fmt, net/http", "--limit", "github.com/acme"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(settings.options.ignore, vec!["fmt", "net/http"]);
        assert_eq!(settings.options.limit, vec!["github.com/acme"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::resolve(&cli(&["app", "--group", "bogus"]), FileConfig::default()).is_err());
        assert!(Settings::resolve(&cli(&["app", "--http", "nope"]), FileConfig::default()).is_err());
        assert!(FileConfig::parse("unknown_key = 1").is_err());
    }

    #[test]
    fn test_unknown_option_keys_rejected() {
        assert!(FileConfig::parse("[options]\nnointr = false\n").is_err());
        assert!(FileConfig::parse("[options.style]\nrankdr = \"TB\"\n").is_err());

        let config = FileConfig::parse("[options]\nnointer = false\n").unwrap();
        assert!(!config.options.unwrap().nointer);
    }

    #[test]
    fn test_parse_http() {
        assert_eq!(parse_http(":9000").unwrap(), ("127.0.0.1".to_string(), 9000));
        assert_eq!(parse_http("0.0.0.0:80").unwrap(), ("0.0.0.0".to_string(), 80));
        assert!(parse_http("localhost:http").is_err());
    }

    #[test]
    fn test_empty_package_rejected() {
        let err = Cli::try_parse_from(["callvis", ""]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = Cli::try_parse_from(["callvis"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
