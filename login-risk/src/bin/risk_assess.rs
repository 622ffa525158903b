//! Assess a single login from a JSON request
//!
//! The request is `{ "device": {...}, "context": {...} }`, read from stdin
//! when no file is given. Exits with status 2 when the assessment is
//! refused because of invalid signals.

use anyhow::Context;
use clap::Parser;
use login_risk::{DeviceInfo, EngineConfig, Error, RiskContext, RiskEngine};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Request {
    device: DeviceInfo,
    #[serde(default)]
    context: RiskContext,
}

#[derive(Parser, Debug)]
#[command(
    name = "risk-assess",
    version,
    about = "Score a login attempt and print the risk assessment as JSON"
)]
struct Args {
    /// Engine configuration file (TOML); defaults to RISK_ENGINE_* variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request file (JSON); reads stdin when omitted or `-`
    request: Option<PathBuf>,
}

impl Args {
    fn request_path(&self) -> Option<&Path> {
        self.request.as_deref().filter(|path| path.as_os_str() != "-")
    }
}

/// `RUST_LOG` when set and valid, `info` otherwise
fn env_filter() -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr);

    if std::env::var("RISK_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::from_env().context("loading configuration from environment")?,
    };
    let engine = RiskEngine::new(config).context("building risk engine")?;

    let body = match args.request_path() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body).context("reading stdin")?;
            body
        }
    };
    let request: Request = serde_json::from_str(&body).context("parsing request")?;

    match engine.assess(&request.device, &request.context) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ Error::InvalidSignals { .. }) => {
            tracing::error!(error = %err, "assessment refused");
            eprintln!("{}", err);
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err.into()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parses_config_and_request() {
        let args = Args::try_parse_from(["risk-assess", "--config", "engine.toml", "req.json"])
            .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(args.request_path(), Some(Path::new("req.json")));

        let short = Args::try_parse_from(["risk-assess", "-c", "engine.toml"]).unwrap();
        assert_eq!(short.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(short.request_path(), None);
    }

    #[test]
    fn test_dash_reads_stdin() {
        let args = Args::try_parse_from(["risk-assess", "-"]).unwrap();
        assert_eq!(args.request_path(), None);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["risk-assess", "--verbose"]).is_err());
        assert!(Args::try_parse_from(["risk-assess", "--config"]).is_err());
    }

    fn max_level(directives: Option<&str>) -> Option<LevelFilter> {
        filter_from(directives).max_level_hint()
    }

    #[test]
    fn test_unset_filter_defaults_to_info() {
        assert_eq!(max_level(None), Some(LevelFilter::INFO));
        assert_eq!(max_level(Some("login_risk=loud")), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_verbose_directive_is_not_capped() {
        assert_eq!(max_level(Some("trace")), Some(LevelFilter::TRACE));
        assert_eq!(max_level(Some("login_risk=debug")), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_quiet_directive_is_honored() {
        assert_eq!(max_level(Some("warn")), Some(LevelFilter::WARN));
    }
}
