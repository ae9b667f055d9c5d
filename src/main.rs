use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};

use plex_recommendations::{
    config::Config,
    logging::init_tracing,
    models::theme::select_themes,
    services::{
        providers::{LanguageModel, MediaServer, OmbiClient, OpenAiClient, PlexClient, RequestService},
        Workflow, WorkflowOptions,
    },
};

/// Builds Plex collections from language-model recommendations
#[derive(Parser)]
#[command(name = "plex-recommendations")]
#[command(about = "Recommend titles from Plex watch history, curate collections and request what is missing", long_about = None)]
struct Cli {
    /// Path to the ini config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for CSV reports (overrides [OUTPUT] DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only run this theme; repeat for several
    #[arg(short, long = "theme", value_name = "ID")]
    themes: Vec<String>,

    /// Print the available themes and exit
    #[arg(long)]
    list_themes: bool,

    /// Look everything up and write reports, but change nothing in Plex or Ombi
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.list_themes {
        let (config, _) = Config::read(cli.config.as_deref())?;
        for theme in config.themes()? {
            println!("{:<22} {} ({})", theme.id, theme.collection_name, theme.media_type);
        }
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    let themes = select_themes(config.themes()?, &cli.themes)?;
    let timeout = config.http_timeout();

    let plex: Arc<dyn MediaServer> = Arc::new(
        PlexClient::connect(&config.plex, timeout)
            .await
            .context("Could not connect to Plex")?,
    );
    let model: Arc<dyn LanguageModel> =
        Arc::new(OpenAiClient::new(&config.gpt, config.retry_policy(), timeout)?);
    let requests: Option<Arc<dyn RequestService>> = match config.ombi() {
        Some(ombi) => Some(Arc::new(OmbiClient::new(ombi, timeout)?) as Arc<dyn RequestService>),
        None => {
            tracing::info!("Ombi not configured; missing titles will not be requested");
            None
        }
    };

    let options = WorkflowOptions {
        dry_run: cli.dry_run,
        ..WorkflowOptions::from_config(&config)
    };

    let summary = Workflow::new(plex, model, requests, options)
        .run(&themes)
        .await
        .context("Recommendation run aborted")?;

    let updated = summary.updated_collections();
    if updated.is_empty() {
        println!("No collections were updated.");
    } else {
        println!("Updated collections:");
        for name in updated {
            println!("- {}", name);
        }
    }

    for failure in &summary.failures {
        eprintln!("Theme '{}' failed: {}", failure.theme_id, failure.error);
    }

    Ok(())
}
