use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use pagerel::{DocumentRef, DocumentSummary, EngineConfig, RecommendationEngine, RelatedSection, SledStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct RelatedParams {
    pub document_id: String,
    #[serde(default = "default_page")]
    pub page_number: u32,
    /// Selected text to query with instead of the stored page.
    pub q: Option<String>,
}
fn default_page() -> u32 { 1 }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResponse {
    pub document_id: String,
    pub page_number: u32,
    pub took_s: f64,
    pub results: Vec<RelatedSection>,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    pub pages: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub id: String,
    pub pages_indexed: usize,
    pub total_documents: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page_number: u32,
    pub text: String,
    pub keywords: Vec<String>,
}

#[derive(Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub pages: Vec<PageView>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine<SledStore>>,
    pub admin_token: Option<String>,
}

pub fn build_app(store_dir: &str, config: EngineConfig) -> Result<Router> {
    let engine = RecommendationEngine::new(SledStore::open(store_dir)?, config);
    engine.open();
    tracing::info!(documents = engine.count(), store_dir, "corpus opened");
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine: Arc::new(engine), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/documents", get(list_handler).post(ingest_handler))
        .route("/documents/:id", get(document_handler).delete(remove_handler))
        .route("/related", get(related_handler))
        .route("/admin/clear", post(clear_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn related_handler(State(state): State<AppState>, Query(params): Query<RelatedParams>) -> Json<RelatedResponse> {
    let start = std::time::Instant::now();
    let results = state.engine.find_related_sections(&params.document_id, params.page_number, params.q.as_deref());
    Json(RelatedResponse {
        document_id: params.document_id,
        page_number: params.page_number,
        took_s: start.elapsed().as_secs_f64(),
        results,
    })
}

pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, String)> {
    let IngestRequest { id, name, pages } = req;
    let engine = Arc::clone(&state.engine);
    let doc = DocumentRef::new(id.clone(), name);
    // feature extraction and the corpus save are CPU and disk bound
    let (pages_indexed, total_documents) = blocking(move || {
        let indexed = engine.add_document(&doc, &pages);
        (indexed, engine.count())
    })
    .await?;
    let status = if pages_indexed == 0 { StatusCode::UNPROCESSABLE_ENTITY } else { StatusCode::CREATED };
    Ok((status, Json(IngestResponse { id, pages_indexed, total_documents })))
}

pub async fn list_handler(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    Json(state.engine.list_documents())
}

pub async fn document_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DocumentView>, (StatusCode, String)> {
    let entry = state.engine.document(&id).ok_or((StatusCode::NOT_FOUND, format!("document {id} not found")))?;
    Ok(Json(DocumentView {
        summary: DocumentSummary::from(&entry),
        pages: entry
            .pages
            .into_iter()
            .map(|p| PageView { page_number: p.page_number, text: p.text, keywords: p.keywords })
            .collect(),
    }))
}

// --- Admin endpoints ---
async fn remove_handler(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let engine = Arc::clone(&state.engine);
    let doc_id = id.clone();
    if blocking(move || engine.remove_document(&doc_id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("document {id} not found")))
    }
}

async fn clear_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let engine = Arc::clone(&state.engine);
    let total = blocking(move || {
        engine.clear();
        engine.count()
    })
    .await?;
    Ok(Json(serde_json::json!({ "totalDocuments": total })))
}

/// Run an engine write off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, (StatusCode, String)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "engine task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "engine task failed".to_string())
    })
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").map(|v| v.as_bytes()).unwrap_or_default();
    if bool::from(provided.ct_eq(required.as_bytes())) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
