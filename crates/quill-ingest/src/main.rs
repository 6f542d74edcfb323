//! CLI entry point for the quill-ingest job client.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use quill_api::{ApiClient, ApiConfig};
use quill_core::config::{load_section, DEFAULT_FILE_PREFIX};
use quill_core::events::Notifier;
use quill_core::SourceDocument;

use quill_ingest::{import_controls, open_imported, ImportJobClient, ImportOverrides, IngestConfig};

#[derive(Parser)]
#[command(name = "quill-ingest")]
#[command(about = "Turn a document into a playable game through the admin backend")]
struct Cli {
    /// Document to upload (pdf, docx, txt, md).
    #[arg(short, long)]
    file: PathBuf,

    /// Title to set on the imported game.
    #[arg(long)]
    title: Option<String>,

    /// Author to set on the imported game.
    #[arg(long)]
    author: Option<String>,

    /// Cover image URL to set on the imported game.
    #[arg(long)]
    cover: Option<String>,

    /// Config file prefix (default: quill).
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX)]
    config: String,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let api_config: ApiConfig = load_section(&cli.config, "api")?;
    let ingest_config: IngestConfig = load_section(&cli.config, "ingest")?;
    let client = Arc::new(ApiClient::new(&api_config)?);
    tracing::info!(base_url = %client.base_url(), "Admin backend configured");

    let document = SourceDocument::read(&cli.file)?;

    let (handle, controls) = import_controls();
    handle.set_overrides(ImportOverrides {
        title: cli.title,
        author: cli.author,
        cover_url: cli.cover,
    });

    let job = ImportJobClient::new(client.clone(), ingest_config);
    let run = job.run(&document, controls);
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, cancelling import");
            handle.cancel();
            (&mut run).await
        }
    };

    if outcome.game_id().is_none() {
        anyhow::bail!("{}", outcome.user_message());
    }
    println!("{}", outcome.user_message());

    let editor = open_imported(client, &outcome, Notifier::disabled()).await?;
    print!("{}", editor.flow());
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
