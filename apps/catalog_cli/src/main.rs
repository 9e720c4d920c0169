use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use catalog_core::{
    CatalogClient, DownloadRequest, LoadOutcome, MutationOutcome, RestGateway,
};
use clap::{Parser, Subcommand};
use shared::domain::{CatalogItem, ItemId};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::load_settings;
use console::{ChannelDownloads, ConsoleNotifier};

#[derive(Parser, Debug)]
#[command(name = "catalog", about = "Browse, like and download published 3D models")]
struct Args {
    /// Backend base url; overrides catalog.toml and the environment.
    #[arg(long)]
    base_url: Option<String>,
    /// Account id of the signed-in viewer.
    #[arg(long)]
    viewer: Option<String>,
    /// Print items as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List public models, newest first.
    List,
    /// Filter by title, author or tag.
    Search { query: String },
    /// Like the model, or unlike it if already liked.
    Like { id: ItemId },
    /// Count a view of the model.
    View { id: ItemId },
    /// Count a download and save the file.
    Download {
        id: ItemId,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(viewer) = args.viewer {
        settings.viewer_id = Some(viewer);
    }
    let viewer = settings.viewer()?;
    let gateway =
        RestGateway::new(settings.gateway_config()?).context("failed to build catalog gateway")?;

    let (download_tx, mut download_rx) = mpsc::unbounded_channel();
    let client = CatalogClient::new(
        Arc::new(gateway),
        Arc::new(ConsoleNotifier),
        Arc::new(ChannelDownloads::new(download_tx)),
    );

    if let LoadOutcome::Failed(err) = client.load(viewer).await {
        bail!("could not load catalog: {err}");
    }

    match args.command {
        Command::List => print_items(&client.snapshot(), args.json)?,
        Command::Search { query } => print_items(&client.search(&query), args.json)?,
        Command::Like { id } => {
            settle(id, client.toggle_like(id).await)?;
            print_item(&client, id, args.json)?;
        }
        Command::View { id } => {
            settle(id, client.record_view(id).await)?;
            print_item(&client, id, args.json)?;
        }
        Command::Download { id, out } => {
            settle(id, client.record_download(id).await)?;
            let request = download_rx
                .recv()
                .await
                .context("download was counted but no transfer was started")?;
            let dir = out.unwrap_or_else(|| settings.download_dir.clone());
            let path = fetch_file(&request, &dir).await?;
            println!("saved {}", path.display());
        }
    }

    Ok(())
}

/// Turns a mutation outcome into the process result. Failures have already
/// been shown through the notifier.
fn settle(id: ItemId, outcome: MutationOutcome) -> Result<()> {
    match outcome {
        MutationOutcome::Committed => Ok(()),
        MutationOutcome::Skipped => bail!("model {id} is not in the catalog"),
        MutationOutcome::Failed(err) => Err(err.into()),
    }
}

fn print_item(client: &CatalogClient, id: ItemId, json: bool) -> Result<()> {
    let item = client
        .store()
        .get(id)
        .with_context(|| format!("model {id} is not in the catalog"))?;
    print_items(std::slice::from_ref(&item), json)
}

fn print_items(items: &[CatalogItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("no models found");
    }
    for item in items {
        let liked = if item.is_liked_by_viewer { " (liked)" } else { "" };
        let owned = if item.is_owned_by_viewer { " [yours]" } else { "" };
        println!(
            "{}  {}{owned} by {}  likes={}{liked} downloads={} views={}",
            item.id,
            item.title,
            item.author_label(),
            item.likes_count,
            item.downloads_count,
            item.views_count,
        );
        if !item.tags.is_empty() {
            println!("    tags: {}", item.tags.join(", "));
        }
    }
    Ok(())
}

async fn fetch_file(request: &DownloadRequest, dir: &Path) -> Result<PathBuf> {
    let bytes = reqwest::get(&request.url)
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("failed to fetch {}", request.url))?
        .bytes()
        .await
        .with_context(|| format!("failed to read {}", request.url))?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create '{}'", dir.display()))?;
    let path = dir.join(safe_filename(&request.suggested_filename));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    info!(item_id = %request.item_id, bytes = bytes.len(), "download: saved {}", path.display());
    Ok(path)
}

fn safe_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "model.glb".to_string()
    } else {
        trimmed.to_string()
    }
}
