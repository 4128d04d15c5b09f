use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod cache;
mod db;
mod error;
mod feed;
mod mask;
mod models;
mod normalize;
mod performance;
mod query;
mod report;
mod series;

use crate::aggregate::{aggregate_program, IndicatorCounts};
use crate::feed::{FeedCaches, FeedClient, FeedConfig};
use crate::models::{IndicatorRecord, PeriodFilter};
use crate::query::QueryKey;

#[derive(Parser)]
#[command(name = "grito-indicators")]
#[command(about = "Indicator and fundraising dashboards for Clube do Grito programs", long_about = None)]
struct Cli {
    /// Postgres instance mirroring the indicator records
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed records
    Seed,
    /// Import raw indicator records from a JSON or CSV file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the monthly series of one program
    Series {
        #[arg(long)]
        program: String,
        #[arg(long)]
        year: i32,
        /// Read records from a file instead of the database
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        hide_values: bool,
    },
    /// Generate the consolidated dashboard
    Report {
        /// `YYYY` or `YYYY-MM`
        #[arg(long)]
        period: String,
        #[arg(long)]
        departamento: Option<String>,
        #[arg(long)]
        hide_values: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to this path instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Read records from a file instead of the database
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        feed: FeedArgs,
    },
}

#[derive(Args)]
struct FeedArgs {
    /// Base URL of the external program and financial API
    #[arg(long, env = "GRITO_FEED_URL")]
    feed_url: Option<String>,
    #[arg(long, env = "GRITO_FEED_TIMEOUT_SECS", default_value_t = 10)]
    feed_timeout_secs: u64,
    /// Cache lifetime for feed responses; 0 keeps them for the whole run
    #[arg(long, env = "GRITO_CACHE_TTL_SECS", default_value_t = 300)]
    cache_ttl_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let database_url = cli.database_url.as_deref();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(database_url).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} new records).");
        }
        Commands::Import { file } => {
            let raws = db::load_raw_records(&file)?;
            let pool = connect(database_url).await?;
            let summary = db::import_records(&pool, &raws).await?;
            println!(
                "Inserted {} records from {} ({} duplicates, {} rejected).",
                summary.inserted,
                file.display(),
                summary.duplicates,
                summary.rejected.len()
            );
        }
        Commands::Series {
            program,
            year,
            file,
            hide_values,
        } => {
            let filter = PeriodFilter::Year(year);
            let records =
                load_records(database_url, file.as_deref(), &filter, Some(program.as_str())).await?;
            let series = series::build_series(&records, &program, year);
            let counts = IndicatorCounts::from_records(&records, &program);
            let performance =
                mask::masked_program(&aggregate_program(&program, &series, counts), !hide_values);

            println!(
                "{program} {year}: average performance {} across {} indicators",
                mask::format_percent(performance.average_performance),
                performance.total_indicators
            );
            for point in &series {
                println!(
                    "- {}: target {} realized {} ({})",
                    point.month,
                    mask::mask_number(point.target, !hide_values),
                    mask::mask_number(point.realized, !hide_values),
                    mask::format_percent(point.performance_pct)
                );
            }
        }
        Commands::Report {
            period,
            departamento,
            hide_values,
            format,
            out,
            file,
            feed,
        } => {
            let query = QueryKey::parse(&period, departamento.as_deref())
                .map_err(anyhow::Error::msg)
                .context("invalid --period")?;
            let records = load_records(database_url, file.as_deref(), &query.period, None).await?;

            let dashboard = match feed.client()? {
                Some(client) => {
                    let (catalog, financial) =
                        tokio::try_join!(client.programs(&query), client.financial(&query))
                            .context("failed to fetch the external feeds")?;
                    report::build_dashboard(&query, &records, Some(&*catalog), Some(&*financial))
                }
                None => {
                    warn!("GRITO_FEED_URL not set; indicator counts come from the records alone");
                    report::build_dashboard(&query, &records, None, None)
                }
            };

            let visible = !hide_values;
            let rendered = match format {
                OutputFormat::Markdown => report::render_markdown(&dashboard, visible),
                OutputFormat::Json => report::render_json(&dashboard, visible)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

impl FeedArgs {
    fn client(&self) -> anyhow::Result<Option<FeedClient>> {
        let Some(base_url) = self.feed_url.as_deref() else {
            return Ok(None);
        };
        let ttl = (self.cache_ttl_secs > 0).then(|| StdDuration::from_secs(self.cache_ttl_secs));
        let config = FeedConfig {
            base_url: base_url.to_string(),
            timeout: StdDuration::from_secs(self.feed_timeout_secs),
        };
        let client = FeedClient::new(config, Arc::new(FeedCaches::new(ttl)))?;
        Ok(Some(client))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_records(
    database_url: Option<&str>,
    file: Option<&Path>,
    filter: &PeriodFilter,
    program: Option<&str>,
) -> anyhow::Result<Vec<IndicatorRecord>> {
    match file {
        Some(path) => {
            let raws = db::load_raw_records(path)?;
            let batch = normalize::normalize_batch(&raws);
            if !batch.rejected.is_empty() {
                warn!(rejected = batch.rejected.len(), "some records could not be attributed");
            }
            info!(records = batch.records.len(), file = %path.display(), "records loaded");
            Ok(batch.records)
        }
        None => {
            let pool = connect(database_url).await?;
            let records = db::fetch_records(&pool, filter, program).await?;
            info!(records = records.len(), period = %filter, "records loaded");
            Ok(records)
        }
    }
}
