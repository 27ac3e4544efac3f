use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::event_log::{self, EventLog, LogBook};
use crate::plugins::notifiers::EmailConfig;
use crate::plugins::traits::{NotifierPlugin, TrackerPlugin};
use crate::product_manager::ProductManager;
use crate::scheduler::ProductScheduler;

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod templates;

pub use handlers::{
    // Products
    list_products, create_product, delete_product,
    // Scraper
    scraper_status, start_scraper, stop_scraper,
    // Logs and checks
    get_logs, check_url,
    // Pages
    dashboard_page, serve_app_js, health_check,
};
pub use responses::*;

/// Everything the handlers share. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<RwLock<ProductManager>>,
    pub scheduler: Arc<Mutex<ProductScheduler>>,
    pub logs: Arc<RwLock<LogBook>>,
    pub event_log: EventLog,
    pub tracker: Arc<dyn TrackerPlugin>,
    /// Credentials from flags or environment, used for blank form fields.
    pub default_email: EmailConfig,
}

impl AppState {
    /// Wires the scheduler and the log pane together. Must be called inside a tokio runtime:
    /// it spawns the task that drains worker log entries into the pane.
    pub fn new(
        config: &AppConfig,
        products: ProductManager,
        tracker: Arc<dyn TrackerPlugin>,
        notifier: Arc<dyn NotifierPlugin>,
        default_email: EmailConfig,
    ) -> Self {
        let (event_log, receiver) = event_log::channel();
        let logs = Arc::new(RwLock::new(LogBook::default()));
        event_log::spawn_drain(receiver, Arc::clone(&logs));

        let products = Arc::new(RwLock::new(products));
        let scheduler = ProductScheduler::new(
            Arc::clone(&tracker),
            notifier,
            Arc::clone(&products),
            config.scheduler.clone(),
            event_log.clone(),
        );

        Self {
            products,
            scheduler: Arc::new(Mutex::new(scheduler)),
            logs,
            event_log,
            tracker,
            default_email,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/static/app.js", get(serve_app_js))
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(CompressionLayer::new())
                .layer(axum::middleware::from_fn(middleware::security_headers)),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:index", delete(delete_product))
        .route("/scraper", get(scraper_status))
        .route("/scraper/start", post(start_scraper))
        .route("/scraper/stop", post(stop_scraper))
        .route("/logs", get(get_logs))
        .route("/check", post(check_url))
        .layer(axum::middleware::from_fn(middleware::request_logging))
}

/// Serves the dashboard until Ctrl-C. The polling worker is told to stop on the way out;
/// in-flight page fetches are not waited for.
pub async fn serve(config: &AppConfig, state: AppState) -> anyhow::Result<()> {
    let scheduler = Arc::clone(&state.scheduler);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(scheduler))
        .await?;

    tracing::info!("Dashboard stopped");
    Ok(())
}

async fn shutdown_signal(scheduler: Arc<Mutex<ProductScheduler>>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown requested");
    scheduler.lock().await.stop();
}
