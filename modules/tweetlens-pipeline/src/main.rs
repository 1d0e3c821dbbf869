use std::sync::Arc;

use anyhow::{Context, Result};
use apify_client::ApifyClient;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use tweetlens_common::{ArchiveBackend, Config};
use tweetlens_pipeline::feed::ApifyFeed;
use tweetlens_pipeline::object_store::{GcsStore, LocalStore};
use tweetlens_pipeline::repository::{self, PgRepository};
use tweetlens_pipeline::traits::ObjectStore;
use tweetlens_pipeline::{Annotator, AnnotatorSettings, Archiver, Pipeline, PipelineSettings};

#[derive(Parser)]
#[command(name = "tweetlens", about = "Annotate recent posts from tracked accounts and store them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingest pipeline once (default)
    Run,
    /// Apply database migrations
    Migrate,
    /// Print stored posts for a date range as JSON lines
    Recent {
        /// First day, YYYY-MM-DD (UTC)
        #[arg(long)]
        start: NaiveDate,
        /// Last day, YYYY-MM-DD (UTC, inclusive)
        #[arg(long)]
        end: NaiveDate,
        /// Only this author
        #[arg(long)]
        author: Option<String>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("tweetlens=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = Config::from_env().context("Invalid configuration")?;
    config.log_redacted();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Migrate => {
            let mut conn = PgRepository::from_config(&config).connect().await?;
            repository::migrate(&mut conn).await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::Recent { start, end, author } => {
            let repo = PgRepository::from_config(&config);
            let mut conn = repo.connect().await?;
            let rows =
                repository::annotated_between(&mut conn, repo.table(), start, end, author.as_deref())
                    .await?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
            Ok(())
        }
    }
}

/// One pipeline invocation. Wiring failures and run failures are logged; the
/// process still exits cleanly so the scheduler never sees a crash.
async fn run(config: &Config) -> Result<()> {
    info!("Tweetlens run starting");

    let pipeline = match build_pipeline(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Failed to set up pipeline");
            return Ok(());
        }
    };

    let outcome = pipeline.run().await;
    info!(completed = outcome.is_completed(), "Tweetlens run finished");
    Ok(())
}

async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let model = OpenAi::new(&config.openai_api_key)
        .with_timeout(config.llm_timeout);
    let annotator = Annotator::new(
        Arc::new(model),
        AnnotatorSettings {
            model: config.openai_model.clone(),
            temperature: config.openai_temperature,
            timeout: config.llm_timeout,
            ..Default::default()
        },
    );

    let apify = ApifyClient::with_timeout(config.apify_api_token.clone(), config.feed_timeout)
        .context("Failed to build Apify client")?;

    let store: Arc<dyn ObjectStore> = match &config.archive_backend {
        ArchiveBackend::Gcs { credentials_path } => {
            info!(credentials = %credentials_path.display(), "Using GCS archive");
            Arc::new(GcsStore::connect().await?)
        }
        ArchiveBackend::Local { root } => {
            info!(root = %root.display(), "Using local archive");
            Arc::new(LocalStore::new(root))
        }
    };
    let archiver = Archiver::new(store, &config.archive_bucket, &config.archive_prefix, config.archive_timeout);

    Ok(Pipeline::new(
        Arc::new(ApifyFeed::new(apify)),
        annotator,
        archiver,
        Arc::new(PgRepository::from_config(config)),
        PipelineSettings::from_config(config),
    ))
}
