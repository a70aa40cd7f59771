use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gifmill_core::{StandardEffects, StyleTransfer};
use gifmill_service::{FsBlobStore, GifService, JobRequest, LocalTempFiles, ServiceConfig, UploadResponse};
use tokio_util::sync::CancellationToken;

type LocalService = GifService<FsBlobStore, LocalTempFiles>;

/// Turn still images into animated GIFs
#[derive(Parser, Debug)]
#[command(name = "gifmill", author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one job request (JSON file, or `-` for stdin) and print the response
    Run { request: String },
    /// Store a source image and print its reference
    Put { image: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_micros()
        .init();

    let args = Args::parse();
    let config = ServiceConfig::load().context("Failed to load configuration")?;
    log::debug!("Configuration: {:?}", config);

    // Shared by every job and disposed before exit
    let styles = StyleTransfer::new();
    let engine = Arc::new(StandardEffects::with_style_transfer(styles.clone()));
    let service = GifService::from_config(&config, engine)?;

    let result = match args.command {
        Command::Run { request } => run(&service, &request).await,
        Command::Put { image } => put(&service, &image).await.map(|()| true),
    };

    styles.dispose();
    drop(service);

    if !result? {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns whether the job succeeded.
async fn run(service: &LocalService, source: &str) -> Result<bool> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read request from stdin")?;
        text
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))?
    };
    let request: JobRequest = serde_json::from_str(&text).context("Invalid request JSON")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling job");
            on_interrupt.cancel();
        }
    });

    let response = service.handle_with_cancellation(&request, cancel).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}

async fn put(service: &LocalService, image: &Path) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let extension = image
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "img".to_string());

    let id = service.upload(&extension, bytes).await?;
    let response = UploadResponse {
        success: true,
        source_image_ref: id.into_string(),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
