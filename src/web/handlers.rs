use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::models::{parse_target_price, PriceCheck, TrackedProduct, INVALID_PRICE_MESSAGE};
use crate::plugins::notifiers::EmailConfig;
use crate::utils::error::{AppError, Result};

use super::templates::{DashboardTemplate, HtmlTemplate};
use super::{
    ApiResponse, AppState, HealthResponse, HttpError, LogsResponse, ProductView, ScraperStatus,
};

const APP_JS: &str = include_str!("../../static/app.js");

/// Target price as typed in a form field, or as a JSON number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl PriceInput {
    pub fn resolve(&self) -> Result<f64> {
        match self {
            PriceInput::Number(price) if price.is_finite() && *price >= 0.0 => Ok(*price),
            PriceInput::Number(_) => Err(AppError::Validation(INVALID_PRICE_MESSAGE.to_string())),
            PriceInput::Text(text) => parse_target_price(text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub url: String,
    pub target_price: PriceInput,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub after: Option<u64>,
}

// Pages

/// GET / - dashboard page
pub async fn dashboard_page(State(state): State<AppState>) -> HtmlTemplate<DashboardTemplate> {
    let products = ProductView::list(state.products.read().await.products());
    let running = state.scheduler.lock().await.is_running();

    HtmlTemplate(DashboardTemplate {
        products,
        running,
        sender: state.default_email.sender.clone(),
        receiver: state.default_email.receiver.clone(),
        password_preset: !state.default_email.password.is_empty(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /static/app.js
pub async fn serve_app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], APP_JS)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let products = state.products.read().await.len();
    let scraper = state.scheduler.lock().await.state();
    Json(HealthResponse::healthy(scraper, products))
}

// Products

pub async fn list_products(State(state): State<AppState>) -> Json<ApiResponse<Vec<ProductView>>> {
    let products = state.products.read().await;
    Json(ApiResponse::success(ProductView::list(products.products())))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<ProductRequest>,
) -> std::result::Result<(StatusCode, Json<ApiResponse<ProductView>>), HttpError> {
    let target_price = request.target_price.resolve()?;
    let product = TrackedProduct::new(request.url, target_price)?;

    let view = {
        let mut products = state.products.write().await;
        products.add(product.clone())?;
        ProductView::new(products.len() - 1, &product)
    };

    state.event_log.info("Product added successfully.");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(view))))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> std::result::Result<Json<ApiResponse<ProductView>>, HttpError> {
    let removed = state.products.write().await.remove(index)?;

    state.event_log.info("Product removed.");
    Ok(Json(ApiResponse::success(ProductView::new(index, &removed))))
}

// Scraper

pub async fn scraper_status(State(state): State<AppState>) -> Json<ApiResponse<ScraperStatus>> {
    Json(ApiResponse::success(current_status(&state).await))
}

/// Blank fields fall back to the credentials the server was started with.
pub async fn start_scraper(
    State(state): State<AppState>,
    Json(request): Json<EmailConfig>,
) -> std::result::Result<Json<ApiResponse<ScraperStatus>>, HttpError> {
    let email = merge_email(&request, &state.default_email);
    if !email.is_complete() {
        tracing::warn!("Starting without complete email settings; alerts will not be sent");
    }

    state.scheduler.lock().await.start(email).await?;
    Ok(Json(ApiResponse::success(current_status(&state).await)))
}

pub async fn stop_scraper(
    State(state): State<AppState>,
) -> std::result::Result<Json<ApiResponse<ScraperStatus>>, HttpError> {
    if !state.scheduler.lock().await.stop() {
        return Err(HttpError::conflict("Scraper is not running."));
    }
    Ok(Json(ApiResponse::success(current_status(&state).await)))
}

// Logs

pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<ApiResponse<LogsResponse>> {
    let logs = state.logs.read().await;
    let entries = logs.since(query.after.unwrap_or(0));
    Json(ApiResponse::success(LogsResponse {
        entries,
        last_seq: logs.last_seq(),
    }))
}

// One-off check

pub async fn check_url(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> std::result::Result<Json<ApiResponse<PriceCheck>>, HttpError> {
    // Same URL rules as adding a product; the price is irrelevant here.
    let product = TrackedProduct::new(request.url, 0.0)?;

    tracing::info!(url = %product.url, tracker = state.tracker.name(), "One-off price check");
    let check = state.tracker.check(&product.url).await;
    Ok(Json(ApiResponse::success(check)))
}

async fn current_status(state: &AppState) -> ScraperStatus {
    let products = state.products.read().await.len();
    ScraperStatus {
        state: state.scheduler.lock().await.state(),
        products,
    }
}

fn merge_email(request: &EmailConfig, defaults: &EmailConfig) -> EmailConfig {
    fn pick<'a>(value: &'a str, fallback: &'a str) -> &'a str {
        if value.trim().is_empty() { fallback } else { value }
    }

    EmailConfig::new(
        pick(&request.sender, &defaults.sender),
        pick(&request.receiver, &defaults.receiver),
        pick(&request.password, &defaults.password),
    )
}
