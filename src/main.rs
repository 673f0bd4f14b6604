//! Daily AI News Digest — Binary Entrypoint
//! Wires configuration, the item store, and the external collaborators, then
//! runs the pipeline once and exits 0 iff delivery succeeded.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_digest::config::Settings;
use ai_news_digest::enrich::{article::ArticleFetcher, transcript::TranscriptFetcher};
use ai_news_digest::llm::openai::OpenAiClient;
use ai_news_digest::notify::email::EmailSender;
use ai_news_digest::pipeline::Pipeline;
use ai_news_digest::sources::build_adapters;
use ai_news_digest::store::ItemStore;

#[derive(Debug, Parser)]
#[command(
    name = "ai-news-digest",
    about = "Aggregate, summarize, and email a daily AI news digest."
)]
struct Cli {
    /// Trailing window of content to consider, in hours.
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// How many ranked articles the email includes.
    #[arg(long, default_value_t = 10)]
    top_n: usize,

    /// Path to the sources/profile TOML (defaults to config/sources.toml).
    #[arg(long)]
    sources: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.sources.as_deref())?;

    let store = ItemStore::connect(&settings.database_url).await?;

    let http = reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; ai-news-digest/0.1)")
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .build()?;

    let adapters = build_adapters(&settings, &http);
    let openai = Arc::new(OpenAiClient::from_settings(&settings));
    let delivery = Arc::new(EmailSender::from_settings(&settings.smtp)?);

    let pipeline = Pipeline::new(
        store,
        adapters,
        Arc::new(ArticleFetcher::new(http.clone())),
        Arc::new(TranscriptFetcher::new(http.clone())),
        openai.clone(),
        openai,
        delivery,
        settings.profile.clone(),
        settings.smtp.recipients.clone(),
        settings.transcript_concurrency,
    );

    let report = pipeline.run(cli.hours, cli.top_n).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    std::process::exit(if report.success { 0 } else { 1 });
}
