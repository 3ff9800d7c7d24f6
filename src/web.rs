use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

const WEBAPP_PAGE: &str = "static/index.html";

/// Сопутствующий веб-сервер: проверка живости и статичная страница
/// веб-приложения.
pub async fn serve(bind_addr: &str) -> Result<()> {
    let app = Router::new()
        .route("/", get(health))
        .route("/webapp", get(webapp));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("не удалось открыть порт {}", bind_addr))?;
    info!(addr = bind_addr, "веб-сервер запущен");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn webapp() -> Result<Html<String>, (StatusCode, &'static str)> {
    match tokio::fs::read_to_string(WEBAPP_PAGE).await {
        Ok(body) => Ok(Html(body)),
        Err(_) => Err((StatusCode::NOT_FOUND, "страница веб-приложения не найдена")),
    }
}
