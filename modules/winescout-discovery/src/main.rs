use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use brightdata_client::SerpClient;
use winescout_cache::{CacheStore, MemoryBackend, PgBackend, TtlPolicy};
use winescout_common::{Config, WineIdentity};
use winescout_discovery::{BrightDataSerp, CircuitBreaker, DiscoveryEngine, SearchClient};

#[derive(Parser, Debug)]
#[command(
    name = "winescout",
    about = "Discover and rank third-party rating evidence for a wine"
)]
struct Args {
    /// Producer / winery name
    #[arg(long)]
    producer: String,
    /// Distinguishing range or cuvée name ("Gran Reserva")
    #[arg(long)]
    range: Option<String>,
    /// Grape variety
    #[arg(long)]
    variety: Option<String>,
    /// Country of origin (drives market-aware source selection)
    #[arg(long)]
    country: Option<String>,
    /// Wine region
    #[arg(long)]
    region: Option<String>,
    /// Wine type (red, white, sparkling, ...)
    #[arg(long = "wine-type")]
    wine_type: Option<String>,
    /// Vintage year
    #[arg(long)]
    vintage: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("winescout=info".parse()?))
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    config.log_redacted();

    let ttl = TtlPolicy::new(config.short_ttl_domains.clone());
    let cache = match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url).await?;
            let backend = PgBackend::new(pool);
            backend.migrate().await?;
            Arc::new(CacheStore::new(Arc::new(backend), ttl))
        }
        None => {
            info!("No DATABASE_URL set, using in-memory cache");
            Arc::new(CacheStore::new(Arc::new(MemoryBackend::default()), ttl))
        }
    };

    let serp = SerpClient::new(
        &config.brightdata_api_key,
        &config.serp_zone,
        Duration::from_secs(config.serp_timeout_secs),
    );
    let search = Arc::new(SearchClient::new(Arc::new(BrightDataSerp::new(serp)), cache));
    let breaker = Arc::new(CircuitBreaker::new());
    let engine = DiscoveryEngine::new(config, search, breaker);

    let wine = WineIdentity {
        producer: args.producer,
        range: args.range,
        variety: args.variety,
        country: args.country,
        region: args.region,
        wine_type: args.wine_type,
        vintage: args.vintage,
    };

    let outcome = engine.discover(&wine).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
