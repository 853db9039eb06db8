use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use client_core::{
    listing::{filter_items, format_relative, load_listing, CategoryFilter, TimeRange},
    load_settings, ClientError, DraftField, HttpLostFoundClient, LostFoundApi, SubmissionWorkflow,
    UploadedFile, WorkflowPhase,
};
use shared::domain::LostItemId;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lostfound", about = "Report and browse found items")]
struct Cli {
    /// Backend base URL (overrides lostfound.toml and APP__BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a photo, review the suggested details, and report the item
    Report(ReportArgs),
    /// List reported items
    List(ListArgs),
    /// Show one reported item
    Show { id: i64 },
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Create straight from the photo, skipping the review step
    #[arg(long, conflicts_with_all = ["title", "description", "category"])]
    direct: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, default_value = "All")]
    category: String,
    #[arg(long, default_value = "all")]
    since: TimeRange,
    #[arg(long)]
    json: bool,
}

fn user_facing(err: ClientError) -> anyhow::Error {
    anyhow!(err.user_message())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }
    if let Some(secs) = cli.timeout_secs {
        settings.request_timeout_secs = secs;
    }
    let client = Arc::new(HttpLostFoundClient::new(&settings).map_err(user_facing)?);
    info!(backend = client.base_url(), "lostfound: using backend");

    match cli.command {
        Command::Report(args) => report(client, args).await,
        Command::List(args) => list(&client, args).await,
        Command::Show { id } => show(&client, LostItemId(id)).await,
    }
}

async fn read_photo(path: &Path) -> Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read photo '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("photo path '{}' has no file name", path.display()))?;
    Ok(UploadedFile::new(file_name, bytes))
}

async fn report(client: Arc<HttpLostFoundClient>, args: ReportArgs) -> Result<()> {
    let photo = read_photo(&args.file).await?;

    if args.direct {
        let created = client
            .create_item_from_file(photo, args.location.as_deref())
            .await
            .map_err(user_facing)?;
        println!("Item reported (id: {})", created.id);
        return Ok(());
    }

    let workflow = SubmissionWorkflow::new(client);
    workflow.select_file(photo).await.map_err(user_facing)?;
    workflow.wait_for_analysis().await;

    let snapshot = workflow.snapshot().await;
    if snapshot.phase != WorkflowPhase::ReadyToEdit {
        let reason = snapshot
            .last_error
            .unwrap_or_else(|| format!("photo pipeline stopped while {}", snapshot.phase));
        bail!(reason);
    }
    if let Some(warning) = &snapshot.last_error {
        eprintln!("warning: {warning}");
    }
    if let Some(analysis) = &snapshot.analysis {
        eprintln!(
            "suggested: {} [{}]{}",
            analysis.title,
            snapshot.draft.category,
            analysis
                .confidence
                .map(|c| format!(" ({:.1}% confident)", c * 100.0))
                .unwrap_or_default()
        );
    }

    let overrides = [
        (DraftField::Title, args.title),
        (DraftField::Description, args.description),
        (DraftField::Category, args.category),
        (DraftField::FoundLocation, args.location),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            workflow.edit_field(field, value).await.map_err(user_facing)?;
        }
    }

    let id = workflow.submit().await.map_err(user_facing)?;
    println!("Item reported (id: {id})");
    Ok(())
}

async fn list(client: &HttpLostFoundClient, args: ListArgs) -> Result<()> {
    let items = load_listing(client).await.map_err(user_facing)?;
    let now = Utc::now();
    let category = CategoryFilter::parse(&args.category);
    let shown = filter_items(&items, &category, args.since, now);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No reported items match your filters.");
        return Ok(());
    }
    for item in shown {
        println!(
            "#{:<4} {:<28} {:<16} {:<20} {}",
            item.id.0,
            item.title,
            item.category,
            item.found_location,
            format_relative(item.added_at, now)
        );
    }
    Ok(())
}

async fn show(client: &HttpLostFoundClient, id: LostItemId) -> Result<()> {
    let Some(item) = client.fetch_item(id).await.map_err(user_facing)? else {
        bail!("no lost item with id {id}");
    };

    println!("#{} {}", item.id, item.title);
    println!("  category:    {}", item.category);
    if !item.found_location.is_empty() {
        println!("  location:    {}", item.found_location);
    }
    println!("  reported:    {}", item.added_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  description: {}", item.description);
    if let Some(object_name) = &item.object_name {
        println!("  detected:    {object_name}");
    }
    if let Some(confidence) = item.confidence {
        println!("  confidence:  {:.1}%", confidence * 100.0);
    }
    if let Some(filename) = &item.filename {
        println!("  photo:       {}", client.image_url(filename));
    }
    Ok(())
}
