//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/sightings` | Create a sighting (201, `Location`) |
//! | `PUT` | `/api/sightings` | Replace a sighting |
//! | `GET` | `/api/sightings` | One page of sightings (`page`, `size`, `sort`) |
//! | `GET` | `/api/sightings/{id}` | Fetch one sighting |
//! | `DELETE` | `/api/sightings/{id}` | Delete a sighting (204) |
//! | `GET` | `/api/_search/sightings` | Free-text search (`query`, `page`, `size`, `sort`) |
//! | `GET` | `/health` | Version and index propagation counters |
//!
//! List and search responses carry `X-Total-Count`, `X-Total-Pages` and an
//! RFC 8288 `Link` header. Writes carry `X-{app}-alert` and `X-{app}-params`
//! headers naming the event and the affected id.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "idexists", "message": "a new sighting cannot already have an ID" } }
//! ```
//!
//! Request errors are 400, unknown ids 404, backend failures 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use sightings_core::error::Error;
use sightings_core::models::Sighting;
use sightings_core::page::{Page, PageRequest};
use sightings_core::sync::{PropagationStats, Synchronizer};
use sightings_core::validate::parse_sighting_json;

use crate::backend;
use crate::config::Config;

const ENTITY_NAME: &str = "sighting";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    sync: Arc<Synchronizer>,
}

/// Open the configured backends and serve on `[server].bind` until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let sync = backend::open(config).await?;
    run_server_with(config, Arc::new(sync)).await
}

/// Serve an already-built synchronizer.
pub async fn run_server_with(config: &Config, sync: Arc<Synchronizer>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(addr = %listener.local_addr()?, "sightings server listening");

    axum::serve(listener, router(config, sync)).await?;
    Ok(())
}

pub fn router(config: &Config, sync: Arc<Synchronizer>) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        sync,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route(
            "/api/sightings",
            get(handle_list).post(handle_create).put(handle_update),
        )
        .route("/api/sightings/{id}", get(handle_get).delete(handle_delete))
        .route("/api/_search/sightings", get(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Headers ============

/// `X-{app}-alert` / `X-{app}-params` pair for a write.
fn alert_headers(app: &str, action: &str, id: &str) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    let alert = header_name(&format!("x-{}-alert", app))?;
    let params = header_name(&format!("x-{}-params", app))?;
    headers.insert(
        alert,
        header_value(&format!("{}.{}.{}", app, ENTITY_NAME, action))?,
    );
    headers.insert(params, header_value(id)?);
    Ok(headers)
}

fn header_name(name: &str) -> Result<HeaderName, AppError> {
    HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
        .map_err(|e| internal(format!("invalid header name {}: {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|e| internal(format!("invalid header value: {}", e)))
}

/// Total count, total pages and `Link` headers for a page, with link
/// targets built from the request URL so other query parameters survive.
fn pagination_headers<T>(
    page: &Page<T>,
    uri: &Uri,
    request_headers: &HeaderMap,
) -> Result<HeaderMap, AppError> {
    let host = request_headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let base = Url::parse(&format!("http://{}{}", host, uri.path()))
        .map_err(|e| internal(format!("cannot build link base: {}", e)))?;
    let kept: Vec<(String, String)> = uri
        .query()
        .map(query_pairs)
        .unwrap_or_default()
        .into_iter()
        .filter(|(k, _)| k != "page" && k != "size")
        .collect();

    let summary = page.headers();
    let link = summary.link_header(|l| {
        let mut url = base.clone();
        url.query_pairs_mut()
            .extend_pairs(kept.iter())
            .append_pair("page", &l.page.to_string())
            .append_pair("size", &l.size.to_string());
        url.to_string()
    });

    let mut headers = HeaderMap::new();
    headers.insert(
        header_name(sightings_core::PaginationHeaders::TOTAL_COUNT)?,
        HeaderValue::from(summary.total_count),
    );
    headers.insert(
        header_name(sightings_core::PaginationHeaders::TOTAL_PAGES)?,
        HeaderValue::from(summary.total_pages),
    );
    headers.insert(header::LINK, header_value(&link)?);
    Ok(headers)
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    Url::parse(&format!("http://localhost/?{}", query))
        .map(|u| u.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

// ============ Query parameters ============

/// `page`, `size`, repeated `sort`, and (for search) `query`.
#[derive(Debug, Default)]
struct PageParams {
    page: Option<u32>,
    size: Option<u32>,
    sort: Vec<String>,
    query: Option<String>,
}

impl PageParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, Error> {
        let mut params = PageParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => params.page = Some(parse_number("page", &value)?),
                "size" => params.size = Some(parse_number("size", &value)?),
                "sort" => params.sort.push(value),
                "query" => params.query = Some(value),
                _ => {}
            }
        }
        Ok(params)
    }

    fn page_request(&self, config: &Config) -> Result<PageRequest, Error> {
        config
            .pagination
            .resolve(self.page, self.size, &self.sort)
    }
}

fn parse_number(name: &str, value: &str) -> Result<u32, Error> {
    value.trim().parse().map_err(|_| {
        Error::InvalidPage(format!(
            "{} must be a non-negative integer, got '{}'",
            name, value
        ))
    })
}

// ============ Handlers ============

async fn handle_create(
    State(state): State<AppState>,
    body: String,
) -> Result<Response, AppError> {
    let sighting = parse_sighting_json(&body)?;
    let saved = state.sync.create(&sighting).await?;
    let id = saved.id().unwrap_or_default().to_string();

    let mut headers = alert_headers(&state.config.server.application_name, "created", &id)?;
    headers.insert(
        header::LOCATION,
        header_value(&format!("/api/sightings/{}", id))?,
    );
    Ok((StatusCode::CREATED, headers, Json(saved)).into_response())
}

async fn handle_update(
    State(state): State<AppState>,
    body: String,
) -> Result<Response, AppError> {
    let sighting = parse_sighting_json(&body)?;
    let saved = state.sync.update(&sighting).await?;
    let id = saved.id().unwrap_or_default();

    let headers = alert_headers(&state.config.server.application_name, "updated", id)?;
    Ok((StatusCode::OK, headers, Json(saved)).into_response())
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Sighting>, AppError> {
    Ok(Json(state.sync.get(&id).await?))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    state.sync.delete(&id).await?;
    let headers = alert_headers(&state.config.server.application_name, "deleted", &id)?;
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

async fn handle_list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let params = PageParams::from_pairs(pairs)?;
    let request = params.page_request(&state.config)?;
    let page = state.sync.list_page(&request).await?;

    let headers = pagination_headers(&page, &uri, &request_headers)?;
    Ok((StatusCode::OK, headers, Json(page.content)).into_response())
}

async fn handle_search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    uri: Uri,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let params = PageParams::from_pairs(pairs)?;
    let request = params.page_request(&state.config)?;
    let raw = params.query.as_deref().unwrap_or_default();
    let page = state.sync.search(raw, &request).await?;

    let headers = pagination_headers(&page, &uri, &request_headers)?;
    Ok((StatusCode::OK, headers, Json(page.content)).into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    propagation: PropagationStats,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        propagation: state.sync.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_collect_repeated_sort() {
        let params = PageParams::from_pairs(vec![
            ("page".into(), "2".into()),
            ("size".into(), "5".into()),
            ("sort".into(), "occurredAt,desc".into()),
            ("sort".into(), "id".into()),
            ("query".into(), "notes:lizard".into()),
            ("cacheBuster".into(), "1".into()),
        ])
        .unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.size, Some(5));
        assert_eq!(params.sort, vec!["occurredAt,desc", "id"]);
        assert_eq!(params.query.as_deref(), Some("notes:lizard"));
    }

    #[test]
    fn non_numeric_page_is_invalid() {
        let err = PageParams::from_pairs(vec![("page".into(), "two".into())]).unwrap_err();
        assert_eq!(err.code(), "invalid_page");
    }

    #[test]
    fn alert_headers_use_application_name() {
        let headers = alert_headers("sightings", "created", "abc").unwrap();
        assert_eq!(headers["x-sightings-alert"], "sightings.sighting.created");
        assert_eq!(headers["x-sightings-params"], "abc");
    }

    #[test]
    fn error_status_follows_error_class() {
        let not_found = AppError::from(Error::NotFound("x".into()));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        let syntax = AppError::from(Error::QuerySyntax("bad".into()));
        assert_eq!(syntax.status, StatusCode::BAD_REQUEST);
        assert_eq!(syntax.code, "query_syntax");
        let storage = AppError::from(Error::Storage("down".into()));
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn link_header_preserves_query_and_replaces_paging() {
        let req = PageRequest::new(1, 2).unwrap();
        let page = Page::new(vec![(); 2], &req, 5);
        let uri: Uri = "/api/_search/sightings?query=notes%3Alizard&page=1&size=2"
            .parse()
            .unwrap();
        let mut request_headers = HeaderMap::new();
        request_headers.insert(header::HOST, HeaderValue::from_static("example.test:8080"));

        let headers = pagination_headers(&page, &uri, &request_headers).unwrap();
        assert_eq!(headers["x-total-count"], "5");
        assert_eq!(headers["x-total-pages"], "3");

        let link = headers[header::LINK].to_str().unwrap();
        assert!(link.starts_with(
            "<http://example.test:8080/api/_search/sightings?query=notes%3Alizard&page=2&size=2>; rel=\"next\""
        ));
        assert!(link.contains("page=0&size=2>; rel=\"prev\""));
        assert!(link.contains("page=2&size=2>; rel=\"last\""));
        assert!(link.ends_with("page=0&size=2>; rel=\"first\""));
    }
}
