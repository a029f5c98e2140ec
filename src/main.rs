use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use news_etl::apis::NewsFeedClient;
use news_etl::config::{optional_env, NewsFlowConfig, StorageConfig};
use news_etl::constants::{DEFAULT_STORAGE_CONFIG_PATH, NEWS_OBJECT_STORE_PREFIX, STORAGE_CONFIG_ENV};
use news_etl::db::PostgresNewsSink;
use news_etl::gateway::ObjectStoreClient;
use news_etl::logging;
use news_etl::metrics;
use news_etl::metrics_push;
use news_etl::pipeline::NewsIngestFlow;

#[derive(Parser)]
#[command(name = "news_etl")]
#[command(about = "Batch news ingest into Parquet on object storage and Postgres")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the news feed once and store it (Parquet batch + Postgres upsert)
    Ingest,
    /// Print where a data type is stored under the configured storage mode
    StoragePath {
        /// Logical data type, e.g. token_unlocks
        data_type: String,
        /// Storage config file (defaults to NEWS_ETL_STORAGE_CONFIG or storage/storage_config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

async fn run_ingest() -> anyhow::Result<()> {
    let config = NewsFlowConfig::from_env()?;
    let feed = NewsFeedClient::with_timeout(&config.news_api_url, config.news_api_timeout)?;
    let objects = Arc::new(ObjectStoreClient::from_env(NEWS_OBJECT_STORE_PREFIX)?);
    let sink = Arc::new(PostgresNewsSink::new(&config.database_url));

    let flow = NewsIngestFlow::new(feed, objects, &config.bucket, &config.prefix, sink);
    let report = flow.run().await?;

    println!("\n📊 News ingest results:");
    println!("   Run: {}", report.run_id);
    println!("   Fetched: {}", report.fetched);
    println!("   Inserted: {}", report.inserted);
    println!("   Already present: {}", report.skipped);
    println!("   Parquet object: {}/{}", config.bucket, report.object_key);
    Ok(())
}

fn storage_config_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| optional_env(STORAGE_CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest => {
            info!("🚀 Running news ingest");
            let result = run_ingest().await;
            // failed runs are pushed too, so the stage failure counters reach the gateway
            metrics_push::push_if_configured("news_ingest").await;
            if let Err(e) = result {
                error!("News ingest failed: {:#}", e);
                return Err(e);
            }
        }
        Commands::StoragePath { data_type, config } => {
            let path = storage_config_path(config);
            let storage = StorageConfig::load(&path)?;
            println!("{}", storage.path_for(&data_type)?);
        }
    }
    Ok(())
}
