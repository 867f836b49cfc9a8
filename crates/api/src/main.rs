use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketlens_core::domain::records::{
    AnalysisRecord, AssetType, ChartAnalysis, NewsArticle, Report,
};
use marketlens_core::market::MarketData;
use marketlens_core::service::{
    AnalysisService, AnalyzeRequest, AnalyzeResponse, ChartRequest, ServiceError,
};
use marketlens_core::storage::{MemoryStore, PgStore, Repository};

const DEFAULT_LATEST_LIMIT: usize = 10;
const MAX_LATEST_LIMIT: usize = 100;

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

    let repo = connect_repository(&settings).await;
    tracing::info!(backend = repo.backend_name(), "repository ready");

    let service = AnalysisService::from_settings(&settings, repo)?;
    let state = AppState {
        service: Arc::new(service),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Postgres when reachable and migrated; otherwise an in-memory store so the API still serves.
async fn connect_repository(
    settings: &marketlens_core::config::Settings,
) -> Arc<dyn Repository> {
    let degraded = || -> Arc<dyn Repository> { Arc::new(MemoryStore::new()) };

    match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match marketlens_core::storage::migrate(&pool).await {
                Ok(()) => Arc::new(PgStore::new(pool)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    degraded()
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                degraded()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            degraded()
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/analyze", post(analyze))
        .route("/api/analyze-chart", post(analyze_chart))
        .route("/api/generate-report", post(generate_report))
        .route("/api/search-assets", get(search_assets))
        .route("/api/assets-under-price", get(assets_under_price))
        .route("/api/translate", post(translate))
        .route("/api/news", get(latest_news))
        .route("/api/news/:symbol", get(news_for_symbol))
        .route("/api/analyses/latest", get(latest_analyses))
        .route("/api/reports/:query_id", get(reports_for_query))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    service: Arc<AnalysisService>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                message,
            },
        }
    }

    /// `ServiceError`s map to client errors. Anything else is a 500 and goes to Sentry.
    fn from_anyhow(err: anyhow::Error, context: &str) -> Self {
        match err.downcast_ref::<ServiceError>() {
            Some(ServiceError::InvalidInput(msg)) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid input", Some(msg.clone()))
            }
            Some(e @ ServiceError::AssetNotFound { .. }) => {
                ApiError::new(StatusCode::NOT_FOUND, "Asset not found", Some(e.to_string()))
            }
            Some(e @ ServiceError::QueryNotFound(_)) => {
                ApiError::new(StatusCode::NOT_FOUND, "Query not found", Some(e.to_string()))
            }
            Some(e @ ServiceError::NoAnalysisResults(_)) => ApiError::new(
                StatusCode::NOT_FOUND,
                "No analysis results found",
                Some(e.to_string()),
            ),
            None => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "{context}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, context, None)
            }
        }
    }

    fn bad_json(rej: JsonRejection) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            Some(rej.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(req) = body.map_err(ApiError::bad_json)?;
    let resp = state
        .service
        .analyze(req)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to perform analysis"))?;
    Ok(Json(resp))
}

async fn analyze_chart(
    State(state): State<AppState>,
    body: Result<Json<ChartRequest>, JsonRejection>,
) -> Result<Json<ChartAnalysis>, ApiError> {
    let Json(req) = body.map_err(ApiError::bad_json)?;
    let chart = state
        .service
        .analyze_chart(req)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to analyze chart"))?;
    Ok(Json(chart))
}

#[derive(Debug, Deserialize)]
struct ReportRequest {
    #[serde(default, alias = "queryId")]
    query_id: Option<i64>,
}

async fn generate_report(
    State(state): State<AppState>,
    body: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(ApiError::bad_json)?;
    let Some(query_id) = req.query_id else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Query ID is required",
            None,
        ));
    };

    let generated = state
        .service
        .generate_report(query_id)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to generate report"))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        generated.rendered.file_name
    );
    Ok((
        [
            (header::CONTENT_TYPE, generated.rendered.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        generated.rendered.body,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
struct AssetQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default, alias = "maxPrice")]
    max_price: Option<String>,
    #[serde(default, alias = "assetType")]
    asset_type: Option<String>,
}

impl AssetQuery {
    fn asset_type(&self) -> AssetType {
        self.asset_type
            .as_deref()
            .and_then(AssetType::parse)
            .unwrap_or_default()
    }
}

async fn search_assets(
    State(state): State<AppState>,
    Query(params): Query<AssetQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let q = params.q.clone().unwrap_or_default();
    let found = state
        .service
        .search_assets(&q, params.asset_type())
        .map_err(|e| ApiError::from_anyhow(e, "Failed to search assets"))?;
    Ok(Json(found))
}

/// Never fails: a missing or unparsable bound yields an empty list.
async fn assets_under_price(
    State(state): State<AppState>,
    Query(params): Query<AssetQuery>,
) -> Json<Vec<MarketData>> {
    let Some(max_price) = params
        .max_price
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
    else {
        return Json(Vec::new());
    };
    Json(
        state
            .service
            .assets_under_price(max_price, params.asset_type()),
    )
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "targetLanguage")]
    target_language: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    translated_text: String,
}

async fn translate(
    State(state): State<AppState>,
    body: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let Json(req) = body.map_err(ApiError::bad_json)?;
    let translated_text = state
        .service
        .translate(
            req.text.as_deref().unwrap_or_default(),
            req.target_language.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to translate text"))?;
    Ok(Json(TranslateResponse { translated_text }))
}

async fn news_for_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    let news = state
        .service
        .news_for_symbol(&symbol)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to fetch news"))?;
    Ok(Json(news))
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    #[serde(default)]
    limit: Option<usize>,
}

impl LatestQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LATEST_LIMIT).clamp(1, MAX_LATEST_LIMIT)
    }
}

async fn latest_analyses(
    State(state): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<Vec<AnalysisRecord>>, ApiError> {
    let limit = params.limit();
    let rows = state
        .service
        .latest_analyses(limit)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to fetch analyses"))?;
    Ok(Json(rows))
}

async fn latest_news(
    State(state): State<AppState>,
    Query(params): Query<LatestQuery>,
) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    let news = state
        .service
        .latest_news(params.limit())
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to fetch news"))?;
    Ok(Json(news))
}

async fn reports_for_query(
    State(state): State<AppState>,
    Path(query_id): Path<i64>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let reports = state
        .service
        .reports_for_query(query_id)
        .await
        .map_err(|e| ApiError::from_anyhow(e, "Failed to fetch reports"))?;
    Ok(Json(reports))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use marketlens_core::config::Settings;
    use marketlens_core::llm::neutral::NeutralClassifier;
    use marketlens_core::market::http::HttpMarketDataProvider;

    fn state() -> AppState {
        let settings = Settings::default();
        let market = HttpMarketDataProvider::from_settings(&settings).unwrap();
        AppState {
            service: Arc::new(AnalysisService::new(
                Arc::new(market),
                None,
                Arc::new(NeutralClassifier),
                Arc::new(MemoryStore::new()),
                std::env::temp_dir().join("marketlens-api-test"),
            )),
        }
    }

    #[test]
    fn service_errors_map_to_client_statuses() {
        let cases = [
            (
                ServiceError::InvalidInput("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::AssetNotFound {
                    symbol: "ZZZ".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (ServiceError::QueryNotFound(1), StatusCode::NOT_FOUND),
            (ServiceError::NoAnalysisResults(1), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            let api = ApiError::from_anyhow(anyhow::Error::new(err), "ctx");
            assert_eq!(api.status, status);
            assert!(api.body.message.is_some());
        }
    }

    #[test]
    fn other_errors_are_internal() {
        let api = ApiError::from_anyhow(anyhow::anyhow!("db down"), "Failed to fetch news");
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.error, "Failed to fetch news");
        assert!(api.body.message.is_none());
    }

    #[test]
    fn asset_not_found_message_names_symbol() {
        let api = ApiError::from_anyhow(
            anyhow::Error::new(ServiceError::AssetNotFound {
                symbol: "ZZZ".to_string(),
            }),
            "ctx",
        );
        assert_eq!(api.body.error, "Asset not found");
        assert!(api.body.message.unwrap().contains("\"ZZZ\""));
    }

    #[tokio::test]
    async fn assets_under_price_is_empty_on_bad_input() {
        let Json(out) = assets_under_price(State(state()), Query(AssetQuery::default())).await;
        assert!(out.is_empty());

        let params = AssetQuery {
            max_price: Some("cheap".to_string()),
            ..Default::default()
        };
        let Json(out) = assets_under_price(State(state()), Query(params)).await;
        assert!(out.is_empty());

        let params = AssetQuery {
            max_price: Some("10".to_string()),
            asset_type: Some("crypto".to_string()),
            ..Default::default()
        };
        let Json(out) = assets_under_price(State(state()), Query(params)).await;
        let symbols: Vec<_> = out.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ADA", "DOT"]);
    }

    #[tokio::test]
    async fn generate_report_requires_query_id() {
        let res = generate_report(State(state()), Ok(Json(ReportRequest { query_id: None }))).await;
        let err = res.err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let req = ReportRequest { query_id: Some(7) };
        let res = generate_report(State(state()), Ok(Json(req))).await;
        assert_eq!(res.err().unwrap().status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reports_for_unknown_query_is_not_found() {
        let res = reports_for_query(State(state()), Path(99)).await;
        assert_eq!(res.err().unwrap().status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn latest_news_clamps_limit() {
        assert_eq!(LatestQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(LatestQuery { limit: Some(5_000) }.limit(), MAX_LATEST_LIMIT);
        assert_eq!(LatestQuery { limit: None }.limit(), DEFAULT_LATEST_LIMIT);

        let params = LatestQuery { limit: None };
        let Json(news) = latest_news(State(state()), Query(params)).await.unwrap();
        assert!(news.is_empty());
    }

    #[test]
    fn translate_response_uses_snake_case() {
        let v = serde_json::to_value(TranslateResponse {
            translated_text: "bonjour".to_string(),
        })
        .unwrap();
        assert_eq!(v["translated_text"], "bonjour");
    }

    #[tokio::test]
    async fn search_requires_query_text() {
        let res = search_assets(State(state()), Query(AssetQuery::default())).await;
        assert_eq!(res.err().unwrap().status, StatusCode::BAD_REQUEST);

        let params = AssetQuery {
            q: Some("bit".to_string()),
            ..Default::default()
        };
        let Json(found) = search_assets(State(state()), Query(params)).await.unwrap();
        assert_eq!(found, vec!["BTC".to_string()]);
    }
}
