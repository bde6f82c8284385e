//! llm-bridge binary.
//!
//! Stages, loads and drives a single on-device language model from the
//! command line.

use clap::Parser;
use llm_bridge::{
    cli::{handle_chat, handle_generate, handle_stage, Commands, LoggingArgs},
    BridgeConfig, ConfigArgs,
};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = cli.logging.get_effective_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.parse().unwrap_or(Level::WARN).into())
                .parse_lossy(cli.logging.log_filter.as_deref().unwrap_or("")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = BridgeConfig::load(&cli.config)?;
    info!(
        asset = %config.model.asset_name,
        bundle_dir = %config.storage.bundle_dir.display(),
        data_dir = %config.storage.data_dir().display(),
        "llm-bridge starting up"
    );

    match cli.command {
        Commands::Stage => handle_stage(&config).await,
        Commands::Generate(cmd) => {
            let engine = engine(&config)?;
            handle_generate(engine, &config, &cmd.prompt, cmd.json).await
        }
        Commands::Chat => {
            let engine = engine(&config)?;
            handle_chat(engine, &config).await
        }
    }
}

#[cfg(feature = "llamacpp")]
fn engine(config: &BridgeConfig) -> anyhow::Result<llm_bridge::engine::LlamaCppEngine> {
    Ok(llm_bridge::engine::LlamaCppEngine::new(config.engine.clone())?)
}

#[cfg(not(feature = "llamacpp"))]
fn engine(_config: &BridgeConfig) -> anyhow::Result<NoEngine> {
    anyhow::bail!("no inference backend compiled in; rebuild with `--features llamacpp`")
}

/// Placeholder engine type for builds without a backend.
#[cfg(not(feature = "llamacpp"))]
enum NoEngine {}

#[cfg(not(feature = "llamacpp"))]
impl llm_bridge::InferenceEngine for NoEngine {
    type Handle = ();

    fn load(&mut self, _: &std::path::Path, _: usize) -> Result<(), llm_bridge::EngineError> {
        match *self {}
    }

    fn generate(&mut self, _: &mut (), _: &str) -> Result<String, llm_bridge::EngineError> {
        match *self {}
    }

    fn release(&mut self, _: ()) -> Result<(), llm_bridge::EngineError> {
        match *self {}
    }
}
