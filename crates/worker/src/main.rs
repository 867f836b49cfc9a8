use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketlens_core::domain::records::AssetType;
use marketlens_core::service::{AnalysisService, AnalyzeRequest, AnalyzeResponse};
use marketlens_core::storage::{MemoryStore, PgStore, Repository};

mod watchlist;

#[derive(Debug, Parser)]
#[command(name = "marketlens_worker")]
struct Args {
    /// Symbol or asset name to analyze. Repeatable; merged with WATCHLIST.
    #[arg(long = "symbol")]
    symbols: Vec<String>,

    /// stock, crypto or all.
    #[arg(long, default_value = "all")]
    asset_type: String,

    /// News window: 7d, 30d or 90d. Anything else means 7d.
    #[arg(long, default_value = "7d")]
    time_range: String,

    /// Ask the news feed for more articles.
    #[arg(long)]
    deep_search: bool,

    /// Render and store an HTML report for each successful analysis.
    #[arg(long)]
    report: bool,

    /// Use the in-memory store instead of Postgres.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let asset_type = AssetType::parse(&args.asset_type)
        .with_context(|| format!("invalid --asset-type: {}", args.asset_type))?;
    let env_watchlist = std::env::var("WATCHLIST").ok();
    let symbols = watchlist::build_watchlist(
        &args.symbols,
        env_watchlist.as_deref(),
        &watchlist::WatchlistOptions::from_env(),
    )?;

    let repo: Arc<dyn Repository> = if args.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        marketlens_core::storage::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let service = AnalysisService::from_settings(&settings, repo)?;

    tracing::info!(
        symbols = symbols.len(),
        asset_type = asset_type.as_str(),
        dry_run = args.dry_run,
        "batch analysis starting"
    );

    let mut failures = 0usize;
    for symbol in &symbols {
        let req = AnalyzeRequest {
            symbol: symbol.clone(),
            asset_type,
            price_limit: None,
            deep_search_enabled: args.deep_search,
            time_range: Some(args.time_range.clone()),
        };

        match run_one(&service, req, args.report).await {
            Ok(summary) => println!("{summary}"),
            Err(err) => {
                failures += 1;
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(%symbol, error = %format!("{err:#}"), "analysis failed");
            }
        }
    }

    tracing::info!(
        total = symbols.len(),
        failures,
        "batch analysis finished"
    );

    anyhow::ensure!(
        failures < symbols.len(),
        "every analysis in the batch failed ({failures} symbols)"
    );
    Ok(())
}

async fn run_one(
    service: &AnalysisService,
    req: AnalyzeRequest,
    with_report: bool,
) -> anyhow::Result<serde_json::Value> {
    let resp = service.analyze(req).await?;

    let report_path = if with_report {
        let generated = service.generate_report(resp.query.id).await?;
        Some(generated.report.file_path)
    } else {
        None
    };

    Ok(summarize(&resp, report_path))
}

fn summarize(resp: &AnalyzeResponse, report_path: Option<String>) -> serde_json::Value {
    let a = &resp.analysis_result;
    serde_json::json!({
        "symbol": a.symbol,
        "query_id": resp.query.id,
        "asset_class": resp.asset_class,
        "price": a.price,
        "price_change_percent": a.price_change,
        "sentiment_score": a.sentiment_score,
        "recommendation": a.recommendation,
        "risk_level": a.risk_level,
        "news_count": a.news_count,
        "key_insights": a.key_insights,
        "report_path": report_path,
    })
}

fn init_sentry(settings: &marketlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
