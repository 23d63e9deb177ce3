mod assets;
mod config;
mod graphql;
mod map;
mod refresh;
mod sim;

use std::path::Path;
use std::sync::Arc;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::http::HeaderValue;
use axum::{extract::State, response::Html, routing::get, Router};
use fleetwatch_engine::catalog::Fleet;
use fleetwatch_engine::{AlarmFeed, Dashboard};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use graphql::{Schema, SharedAlarms};
use map::HeadlessMap;
use refresh::SharedDashboard;
use sim::{SimulatedAlarms, SimulatedTelemetry};

async fn graphql_handler(State(schema): State<Schema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphiql() -> Html<String> {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

const CACHE_1DAY: &str = "public, max-age=86400, must-revalidate";

/// Static files from `dir` with a fixed cache policy.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

fn build_app(schema: Schema, assets_dir: &Path) -> Router {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/", get(serve_index))
        .with_state(schema)
        .nest("/static", cached_static_router(assets_dir, CACHE_1DAY))
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let loaded_assets = match assets::Assets::load(&config.assets_dir) {
        Ok(assets) => assets,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load assets");
            std::process::exit(1);
        }
    };

    let telemetry = SimulatedTelemetry::new(&loaded_assets.vehicles);
    let alarms: SharedAlarms = Arc::new(AlarmFeed::new(SimulatedAlarms::new(
        &loaded_assets.vehicles,
    )));
    let dashboard: SharedDashboard = Arc::new(Mutex::new(Dashboard::new(
        Fleet::new(loaded_assets.vehicles),
        HeadlessMap::new(config.viewport_width_px, config.viewport_height_px),
    )));

    let cancel = CancellationToken::new();
    let refresh_task = refresh::spawn_refresh_loop(
        Arc::clone(&dashboard),
        telemetry,
        config.refresh_interval,
        cancel.clone(),
    );
    let listener_task = refresh::spawn_alarm_listener(alarms.subscribe(), cancel.clone());
    if config.alarm_poll_autostart {
        alarms.start();
    }

    let schema = graphql::build_schema(Arc::clone(&dashboard), Arc::clone(&alarms));
    let app = build_app(schema, &config.assets_dir);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("Server running at http://localhost:{}", config.port);
    tracing::info!("GraphiQL playground at http://localhost:{}/graphql", config.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    cancel.cancel();
    alarms.stop();
    let _ = refresh_task.await;
    let _ = listener_task.await;

    let mut dash = dashboard.lock();
    dash.teardown();
    dash.map_mut().close();
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

async fn serve_index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>FleetWatch</title></head>
<body>
<h1>FleetWatch</h1>
<p>Live fleet map service. Visit <a href="/graphql">GraphiQL</a> to explore the API.</p>
</body>
</html>"#,
    )
}
