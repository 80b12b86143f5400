use anyhow::{bail, Context, Result};
use healthperm::infra::session_store::SessionStore as FileSessionStore;
use healthperm_app::{load_scenario, run_scenario};
use healthperm_runtime::{load_engine_config, AsyncSessionStore, EngineConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
Usage:
  healthperm run <scenario.yaml> [--config <engine.yaml>] [--checkpoint] [-v]
  healthperm check-config <engine.yaml>";

struct RunArgs {
    scenario: String,
    config: Option<String>,
    checkpoint: bool,
    verbose: bool,
}

fn parse_run_args(args: &[String]) -> Result<RunArgs> {
    let mut parsed = RunArgs {
        scenario: String::new(),
        config: None,
        checkpoint: false,
        verbose: false,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                parsed.config = Some(path.clone());
            }
            "--checkpoint" => parsed.checkpoint = true,
            "-v" | "--verbose" => parsed.verbose = true,
            other if other.starts_with('-') => bail!("Unknown flag: {}\n{}", other, USAGE),
            other => parsed.scenario = other.to_string(),
        }
    }
    if parsed.scenario.is_empty() {
        bail!("Missing scenario path\n{}", USAGE);
    }
    Ok(parsed)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("HEALTHPERM_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_engine_config(path).with_context(|| format!("Failed to load {}", path)),
        None => Ok(EngineConfig::default()),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    init_tracing(args.verbose);
    let config = load_config(args.config.as_deref())?;
    let scenario = load_scenario(&args.scenario)?;

    let sessions = if args.checkpoint {
        let files = FileSessionStore::new(&config.sessions_dir).with_context(|| {
            format!("Failed to open sessions dir {}", config.sessions_dir.display())
        })?;
        Some(AsyncSessionStore::new(Arc::new(files)))
    } else {
        None
    };

    info!("Running scenario {} for {}", args.scenario, scenario.app);
    let report = run_scenario(
        &scenario,
        &config,
        sessions.as_ref().map(|s| s as &dyn healthperm_runtime::SessionStore),
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("run") => run(parse_run_args(&args[1..])?).await,
        Some("check-config") => {
            let path = args.get(1).context("Missing config path")?;
            let config = load_engine_config(path)?;
            println!(
                "ok: personal_health_records={} activity_intensity={} lock_timeout_ms={} sessions_dir={}",
                config.feature_toggles.personal_health_records,
                config.feature_toggles.activity_intensity,
                config.lock_timeout_ms,
                config.sessions_dir.display()
            );
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}
