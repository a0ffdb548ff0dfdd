use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Form, State},
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use demo_dash_core::DashboardState;
use log::info;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub type ApiState = Arc<DashboardState>;

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/status", get(status_handler))
        .route("/toggle_demo", post(toggle_demo_handler))
        .route("/start_bot", post(start_bot_handler))
        .route("/toggle_sniper", post(toggle_sniper_handler))
        .route("/save_risk", post(save_risk_handler))
        .route("/get_risk", get(get_risk_handler))
        .route("/save_filters", post(save_filters_handler))
        .route("/get_filters", get(get_filters_handler))
        .route("/get_trades", get(get_trades_handler))
        .route("/get_wallets", get(get_wallets_handler))
        .route("/get_logs", get(get_logs_handler))
        .route("/update_tokens", post(update_tokens_handler))
        .route("/tokens", get(tokens_handler))
        .route("/test_rpc", get(test_rpc_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.status().await)
}

async fn toggle_demo_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let status = state.toggle_demo().await?;
    info!("Demo mode toggled: {}", status.demo);
    Ok(Json(status))
}

async fn start_bot_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.toggle_bot().await;
    info!("Bot toggled: running={}", status.running);
    Json(status)
}

async fn toggle_sniper_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let enabled = state.toggle_sniper().await;
    info!("Sniper toggled: enabled={}", enabled);
    Json(json!({ "enabled": enabled }))
}

async fn save_risk_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(&body)?;
    let take_profit = int_field(&body, "take_profit")?;
    let stop_loss = int_field(&body, "stop_loss")?;
    let risk = state.save_risk(take_profit, stop_loss).await?;
    Ok(Json(json!({ "message": "Risk settings saved", "risk": risk })))
}

async fn get_risk_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.risk().await)
}

async fn save_filters_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(&body)?;
    let marketcap = int_field(&body, "marketcap")?;
    let liquidity = int_field(&body, "liquidity")?;
    let filters = state.save_filters(marketcap, liquidity).await?;
    Ok(Json(json!({ "message": "Filters saved", "filters": filters })))
}

async fn get_filters_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.filters().await)
}

async fn get_trades_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.trades().await)
}

async fn get_wallets_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.wallets().await)
}

async fn get_logs_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.logs().await)
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    #[serde(default)]
    token_addresses: String,
}

async fn update_tokens_handler(
    State(state): State<ApiState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let tokens = state.update_tokens(&form.token_addresses).await?;
    info!("Token list replaced ({} tokens)", tokens.len());
    Ok(Redirect::to("/"))
}

async fn tokens_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.tokens().await)
}

async fn test_rpc_handler(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.test_rpc().await?))
}

/// An empty body counts as `{}`; anything else must be a JSON object.
fn parse_body(raw: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(ApiError::BadRequest("request body must be a JSON object".to_string())),
        Err(e) => Err(ApiError::BadRequest(format!("invalid JSON body: {}", e))),
    }
}

/// Read an optional integer field that may arrive as a number or a numeric
/// string.
fn int_field(body: &Map<String, Value>, key: &str) -> Result<Option<i64>, ApiError> {
    let invalid = || ApiError::BadRequest(format!("{} must be an integer", key));
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => Ok(Some(v)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Some(f as i64))
                .ok_or_else(invalid),
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
