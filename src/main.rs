use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};

use judge_engine::{Engine, EngineConfig, ExecutionRequest, RunMode};

#[derive(Parser, Debug)]
#[command(name = "judge")]
#[command(about = "Judge a submission against its test cases and print the verdict as JSON", long_about = None)]
struct Cli {
    /// Which test cases to use: visible ones only (run) or all of them (submit)
    #[arg(value_enum)]
    mode: RunMode,

    /// Path to the JSON request, or `-` to read it from stdin
    path: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_engine=info".parse()?),
        )
        .init();

    let config = EngineConfig::from_env()?;
    let engine = Engine::new(config).context("Failed to initialize engine")?;
    info!(
        "Loaded languages: {}",
        engine.languages().supported().join(", ")
    );

    let mut request = read_request(&cli.path)?;
    request.test_cases = cli.mode.select(&request.test_cases);

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler; never cancel
            std::future::pending::<()>().await;
        }
    };

    match engine.execute_with_cancel(&request, cancel).await {
        Ok(verdict) => {
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Failed to judge submission: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_request(path: &str) -> Result<ExecutionRequest> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };

    serde_json::from_str(&content).context("Failed to parse execution request")
}
