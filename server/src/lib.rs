use anyhow::Result;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};
use wikisearch_core::docs::load_docs;
use wikisearch_core::engine::{EngineConfig, SearchEngine, SearchError};
use wikisearch_core::index::{Index, TitleIndex};
use wikisearch_core::tokenizer::Tokenizer;
use wikisearch_core::{DocId, DocMeta};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    pub strict: Option<bool>,
}
fn default_k() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub docs: Arc<HashMap<DocId, DocMeta>>,
}

/// Load the index and document metadata, then assemble the router. The engine
/// goes into axum state as a shared read-only value; loading happens here,
/// once, never from a request handler.
pub fn build_app(index_dir: &Path, stopwords_path: &Path) -> Result<Router> {
    let index = Index::load(index_dir, stopwords_path)?;
    let docs = load_docs(index_dir)?;
    let tokenizer = Tokenizer::new(index.stopwords.clone());
    let title_index = TitleIndex::build(&docs, &tokenizer);
    tracing::info!(
        terms = index.term_count(),
        docs = docs.len(),
        title_terms = title_index.term_count(),
        "search engine ready"
    );

    let engine = SearchEngine::new(index, title_index, EngineConfig::default());
    let state = AppState {
        engine: Arc::new(engine),
        docs: Arc::new(docs),
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/search", get(search_handler))
        .route("/api/v1/word/:term", get(word_handler))
        .route("/api/v1/doc/:doc_id", get(doc_handler))
        .route("/api/v1/stats", get(stats_handler))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let strict = params
        .strict
        .unwrap_or(state.engine.config().default_strict);

    let ranked = state
        .engine
        .search(&params.q, params.k, strict)
        .map_err(|err| match err {
            SearchError::InvalidLimit(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        })?;

    let results = ranked
        .into_iter()
        .map(|(doc_id, score)| {
            let meta = state.docs.get(&doc_id);
            SearchHit {
                doc_id,
                score,
                title: meta.map(|m| m.title.clone()),
                url: meta.and_then(|m| m.url.clone()),
                summary: meta.map(|m| m.summary.clone()),
            }
        })
        .collect::<Vec<_>>();

    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn word_handler(
    State(state): State<AppState>,
    UrlPath(term): UrlPath<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match state.engine.index().entry(&term) {
        Some(entry) => Ok(Json(serde_json::json!({ "term": term, "entry": entry }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("term {term:?} not in index") })),
        )),
    }
}

pub async fn doc_handler(
    State(state): State<AppState>,
    UrlPath(doc_id): UrlPath<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    match state.docs.get(&doc_id) {
        Some(meta) => Ok(Json(serde_json::json!({
            "doc_id": doc_id,
            "title": meta.title,
            "url": meta.url,
            "summary": meta.summary,
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("document {doc_id} not found") })),
        )),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.engine.metrics().stats();
    Json(serde_json::json!({
        "index": {
            "total_terms": state.engine.index().term_count(),
            "total_docs": state.engine.index().doc_count(),
        },
        "search": stats,
    }))
}
