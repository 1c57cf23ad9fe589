//! Command-line host: search every configured source and print the outcomes
//! as JSON.
//!
//! The TOML file holds both the aggregator settings and the `[[sources]]`
//! list. All tracing output goes to stderr so stdout stays valid JSON.

use std::path::PathBuf;

use clap::Parser;
use multisource_search::{AggregatorConfig, SearchAggregator, SourceCatalog};
use tracing_subscriber::EnvFilter;

/// Search many content sources at once.
#[derive(Parser)]
#[command(name = "msearch", version, about)]
struct Cli {
    /// Path to a TOML file with aggregator settings and `[[sources]]`.
    #[arg(short, long)]
    config: PathBuf,

    /// 1-based result page passed through to every source.
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Query text. Multiple words are joined with spaces.
    #[arg(required = true)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("multisource_search=info,msearch=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = AggregatorConfig::from_file(&cli.config)?;
    let catalog = SourceCatalog::from_file(&cli.config)?;
    if catalog.is_empty() {
        anyhow::bail!("no [[sources]] configured in {}", cli.config.display());
    }

    let aggregator = SearchAggregator::new(config)?;
    let query = cli.query.join(" ");

    tracing::info!(sources = catalog.len(), page = cli.page, "searching");
    let outcomes = aggregator.aggregate(&query, &catalog.sources, cli.page).await;

    let failed = outcomes.iter().filter(|o| o.is_error()).count();
    tracing::info!(sources = outcomes.len(), failed, "search finished");

    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}
