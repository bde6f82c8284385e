use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::bridge::{ModelBridge, ModelService};
use crate::config::BridgeConfig;
use crate::engine::InferenceEngine;
use crate::error::BridgeError;
use crate::history::GenerationHistory;
use crate::staging::{AssetStager, DirectoryBundle};

const CHAT_HELP: &str = "\
Commands:
  /history   show recent generations (newest first)
  /load      load the model
  /unload    release the model
  /state     show the lifecycle state
  /help      show this help
  /quit      exit
Anything else is sent to the model as a prompt.
";

/// Stage the configured asset without loading it.
pub async fn handle_stage(config: &BridgeConfig) -> Result<()> {
    let bundle = Arc::new(DirectoryBundle::new(&config.storage.bundle_dir));
    let stager = AssetStager::new(bundle, config.storage.data_dir())
        .with_size_verification(config.storage.verify_size);
    let asset = config.model.asset_name.clone();

    let path = tokio::task::spawn_blocking(move || stager.ensure_staged(&asset))
        .await
        .context("staging task failed")?
        .map_err(BridgeError::from)?;

    println!("{}", path.display());
    Ok(())
}

/// Load, generate once, release.
pub async fn handle_generate<E: InferenceEngine>(
    engine: E,
    config: &BridgeConfig,
    prompt: &str,
    json: bool,
) -> Result<()> {
    let service = ModelService::from_config(engine, config).context("failed to start worker")?;
    let bridge = service.bridge();

    let outcome = match bridge.load_model().await {
        Ok(status) => {
            info!(%status, "Model ready");
            bridge.generate_text(prompt).await
        }
        Err(err) => Err(err),
    };
    service.shutdown().await;

    match outcome {
        Ok(result) if json => println!("{}", serde_json::to_string_pretty(&result)?),
        Ok(result) => {
            println!("{}", result.text);
            eprintln!("({} ms)", result.inference_time_ms);
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&err)?);
            }
            return Err(err.into());
        }
    }
    Ok(())
}

/// Interactive chat on stdin/stdout.
pub async fn handle_chat<E: InferenceEngine>(engine: E, config: &BridgeConfig) -> Result<()> {
    let service = ModelService::from_config(engine, config).context("failed to start worker")?;
    let bridge = service.bridge();
    let mut history = GenerationHistory::new(config.history.limit);

    let stdin = BufReader::new(io::stdin());
    let result = tokio::select! {
        result = run_chat(&bridge, &mut history, stdin, io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, releasing model");
            Ok(())
        }
    };

    service.shutdown().await;
    result.context("chat session failed")
}

/// Drive a chat session over arbitrary line input and text output.
///
/// The model is loaded up front. Bridge failures are printed and the loop
/// continues; only I/O errors end the session early.
pub async fn run_chat<B, R, W>(
    bridge: &B,
    history: &mut GenerationHistory,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    B: ModelBridge + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(b"Loading model...\n").await?;
    load(bridge, &mut output).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(command = line.starts_with('/'), "Chat input");

        match line {
            "/quit" | "/exit" => break,
            "/help" => output.write_all(CHAT_HELP.as_bytes()).await?,
            "/state" => {
                let state = bridge.state();
                output.write_all(format!("state: {state}\n").as_bytes()).await?;
            }
            "/load" => load(bridge, &mut output).await?,
            "/unload" => match bridge.unload_model().await {
                Ok(status) => output.write_all(format!("{status}\n").as_bytes()).await?,
                Err(err) => report(&err, &mut output).await?,
            },
            "/history" => {
                if history.is_empty() {
                    output.write_all(b"No generations yet\n").await?;
                }
                for entry in history.iter() {
                    let text = format!(
                        "#{} [{}] {} ms\n> {}\n{}\n",
                        entry.id,
                        entry.timestamp.format("%H:%M:%S"),
                        entry.inference_time_ms,
                        entry.input,
                        entry.output
                    );
                    output.write_all(text.as_bytes()).await?;
                }
            }
            prompt => match bridge.generate_text(prompt).await {
                Ok(result) => {
                    let text = format!("{}\n({} ms)\n", result.text, result.inference_time_ms);
                    output.write_all(text.as_bytes()).await?;
                    history.record(prompt, &result);
                }
                Err(err) => report(&err, &mut output).await?,
            },
        }
        output.flush().await?;
    }

    output.flush().await
}

async fn load<B, W>(bridge: &B, output: &mut W) -> std::io::Result<()>
where
    B: ModelBridge + ?Sized,
    W: AsyncWrite + Unpin,
{
    match bridge.load_model().await {
        Ok(status) => output.write_all(format!("{status}\n").as_bytes()).await,
        Err(err) => report(&err, output).await,
    }
}

async fn report<W: AsyncWrite + Unpin>(err: &BridgeError, output: &mut W) -> std::io::Result<()> {
    let mut text = format!("error [{}]: {}\n", err.kind, err.message);
    if err.is_retryable() {
        text.push_str("(this may succeed if retried)\n");
    }
    output.write_all(text.as_bytes()).await
}
