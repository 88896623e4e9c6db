use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::state::ServerState;
use crate::aggregate::AggregatedResult;
use crate::client::GalleryClient;
use crate::highlight::StructuredDocument;
use crate::models::{ErrorResponse, Upload};
use crate::render::{self, DetailsPage};
use crate::settings;
use crate::view::{GalleryView, Selection};

const FETCH_UPLOADS_FAILED: &str = "Failed to fetch uploads.";
const FETCH_DETAILS_FAILED: &str = "Failed to fetch details.";
const DELETE_FAILED: &str = "Failed to delete image.";

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let client = GalleryClient::from_settings(&settings)?;
    let state = Arc::new(ServerState { settings, client });
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("viewer listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(gallery))
        .route("/details", get(details))
        .route("/api/details", get(api_details))
        .route("/uploads/:id/delete", post(delete_upload))
        .with_state(state)
        .layer(axum::middleware::from_fn(shared_read_cors))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Only the JSON endpoints are readable cross-origin. Pages and the delete
/// form stay same-origin.
async fn shared_read_cors(req: Request<Body>, next: Next) -> Response<Body> {
    if !is_shared_read(req.uri().path()) {
        return next.run(req).await;
    }
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        allow_cross_origin_reads(response.headers_mut());
        return response;
    }
    let mut response = next.run(req).await;
    allow_cross_origin_reads(response.headers_mut());
    response
}

fn is_shared_read(path: &str) -> bool {
    path == "/health" || path == "/api" || path.starts_with("/api/")
}

fn allow_cross_origin_reads(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,OPTIONS"),
    );
    headers.insert("access-control-max-age", HeaderValue::from_static("600"));
}

/// `/details?filename=..&filename=..&word=..&q=..&preview=..&zoom=..`
#[derive(Debug, Default, PartialEq)]
struct DetailsQuery {
    filenames: Vec<String>,
    word: Option<String>,
    search: Option<String>,
    preview: Option<String>,
    zoom: Option<f32>,
}

impl DetailsQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = DetailsQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "filename" if !value.trim().is_empty() => query.filenames.push(value),
                // highlight terms are passed on untouched
                "word" if !value.is_empty() => query.word = Some(value),
                "q" if !value.is_empty() => query.search = Some(value),
                "preview" if !value.trim().is_empty() => query.preview = Some(value),
                "zoom" => query.zoom = value.trim().parse().ok(),
                _ => {}
            }
        }
        query
    }
}

#[derive(Serialize)]
struct DetailsPayload {
    document: StructuredDocument,
    aggregated: AggregatedResult,
}

async fn gallery(State(state): State<Arc<ServerState>>) -> Response<Body> {
    let page = match state.client.list_uploads().await {
        Ok(uploads) => render::html_gallery(&uploads, |filename| {
            image_url(&state.client, filename)
        }),
        Err(err) => {
            warn!("{:#}", err);
            return error_page(StatusCode::BAD_GATEWAY, FETCH_UPLOADS_FAILED);
        }
    };
    match page {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            warn!("{:#}", err);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, FETCH_UPLOADS_FAILED)
        }
    }
}

async fn details(
    State(state): State<Arc<ServerState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response<Body> {
    let query = DetailsQuery::from_pairs(pairs);
    if query.filenames.is_empty() {
        return Redirect::to("/").into_response();
    }
    let view = match load_view(&state, &query).await {
        Ok(view) => view,
        Err(err) => {
            warn!("{:#}", err);
            return error_page(StatusCode::BAD_GATEWAY, FETCH_DETAILS_FAILED);
        }
    };
    let image_urls = view
        .selection
        .filenames()
        .iter()
        .map(|filename| image_url(&state.client, filename))
        .collect::<Vec<_>>();
    let page = DetailsPage {
        view: &view,
        image_urls: &image_urls,
        top_words: state.settings.top_words,
    };
    match render::html_details(&page) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            warn!("{:#}", err);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, FETCH_DETAILS_FAILED)
        }
    }
}

async fn api_details(
    State(state): State<Arc<ServerState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<DetailsPayload>, (StatusCode, Json<ErrorResponse>)> {
    let query = DetailsQuery::from_pairs(pairs);
    if query.filenames.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "filename is required".to_string(),
            }),
        ));
    }
    let mut view = load_view(&state, &query).await.map_err(|err| {
        warn!("{:#}", err);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: FETCH_DETAILS_FAILED.to_string(),
            }),
        )
    })?;
    let document = view.document();
    Ok(Json(DetailsPayload {
        document,
        aggregated: AggregatedResult {
            combined_text: std::mem::take(&mut view.ocr_text),
            combined_word_counts: std::mem::take(&mut view.top_words),
        },
    }))
}

async fn delete_upload(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response<Body> {
    match state.client.delete_upload(&id).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => {
            warn!("{:#}", err);
            error_page(StatusCode::BAD_GATEWAY, DELETE_FAILED)
        }
    }
}

async fn load_view(state: &ServerState, query: &DetailsQuery) -> Result<GalleryView> {
    let selection = Selection::from_uploads(
        query
            .filenames
            .iter()
            .map(|filename| Upload {
                filename: filename.clone(),
                ..Upload::default()
            })
            .collect(),
    );
    let mut view = GalleryView::default();
    view.open_details(selection);
    let results = state
        .client
        .fetch_ocr_many(&view.selection.filenames())
        .await?;
    view.apply_results(&results);
    if let Some(word) = query.word.as_deref() {
        view.select_word(word);
    }
    if let Some(search) = query.search.as_deref() {
        view.set_search(search);
    }
    let previewing = query
        .preview
        .as_deref()
        .is_some_and(|preview| view.open_preview(preview));
    if let (true, Some(zoom)) = (previewing, query.zoom) {
        view.set_zoom(zoom);
    }
    Ok(view)
}

fn image_url(client: &GalleryClient, filename: &str) -> String {
    client
        .image_url(filename)
        .map(String::from)
        .unwrap_or_default()
}

fn error_page(status: StatusCode, message: &str) -> Response<Body> {
    match render::html_error(message) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(_) => (status, message.to_string()).into_response(),
    }
}
