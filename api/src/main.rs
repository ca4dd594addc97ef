use std::net::SocketAddr;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod error;
mod extract;
mod recompute;
mod routes;
mod state;
mod storage;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vitalis API",
        version = "0.1.0",
        description = "Daily body metrics (BMI/BMR/TDEE), acknowledgment gating, and personalized plan generation."
    ),
    paths(
        routes::health::health_check,
        routes::metrics::today_metrics,
        routes::metrics::acknowledge_metrics,
        routes::plan::generate_plan,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::metrics::TodayMetricsResponse,
        routes::metrics::AcknowledgeRequest,
        routes::plan::GeneratePlanRequest,
        routes::plan::PlanResponse,
        vitalis_core::error::ApiError,
        vitalis_core::ack::Acknowledgment,
        vitalis_core::metrics::MetricsSnapshot,
        vitalis_core::metrics::MetricsExplanations,
        vitalis_core::metrics::Gender,
        vitalis_core::metrics::ActivityLevel,
        vitalis_core::plan::PlanTargets,
        vitalis_core::plan::PlanDiff,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalis_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState { db: pool.clone() };

    // Daily metrics recompute batch
    recompute::spawn(pool, recompute::schedule_from_env());

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::metrics::router())
        .merge(routes::plan::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Vitalis API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
