use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use curation::{tags::PREDEFINED_TAGS, StatusSelection, ViewConfig};
use serde::Deserialize;
use server_api::{
    create_submission, get_opportunity, health, list_opportunities, view_opportunities, ApiContext,
};
use shared::{
    domain::{OpportunityId, SortMode},
    error::{ApiError, ErrorCode},
    protocol::{ListQuery, NewSubmission, Opportunity, Submission},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod admin;
mod app_state;
mod config;
mod ws;

use app_state::AppState;
use config::{load_settings, prepare_database_url, LoadedSettings};

pub(crate) type HttpError = (StatusCode, Json<ApiError>);
pub(crate) type HttpResult<T> = Result<Json<T>, HttpError>;

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    statuses: Option<String>,
    search: Option<String>,
    sort: Option<SortMode>,
    categories: Option<String>,
    include_archived: Option<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let LoadedSettings {
        settings,
        ignored_file,
    } = load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(reason) = ignored_file {
        warn!(%reason, "ignoring unreadable settings file");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let state = AppState::new(ApiContext { storage }, settings.event_channel_capacity);
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        public_url = settings.server_public_url.as_deref().unwrap_or("-"),
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tags", get(http_tags))
        .route("/opportunities", get(http_list_opportunities))
        .route("/opportunities/view", get(http_view_opportunities))
        .route("/opportunities/:id", get(http_get_opportunity))
        .route("/submissions", post(http_create_submission))
        .route("/ws", get(ws::ws_handler))
        .nest("/admin", admin::router())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

pub(crate) fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    health(&state.api).await.map_err(http_error)?;
    Ok("ok")
}

async fn http_tags() -> Json<Vec<&'static str>> {
    Json(PREDEFINED_TAGS.to_vec())
}

async fn http_list_opportunities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> HttpResult<Vec<Opportunity>> {
    let records = list_opportunities(&state.api, &query)
        .await
        .map_err(http_error)?;
    Ok(Json(records))
}

fn view_from_query(query: ViewQuery) -> Result<ViewConfig, ApiError> {
    let mut view = ViewConfig::public(Utc::now());
    if let Some(raw) = query.statuses.as_deref() {
        let statuses = StatusSelection::parse_list(raw)
            .map_err(|err| ApiError::validation(err.to_string()))?;
        view = view.with_statuses(statuses);
    }
    if let Some(search) = query.search {
        view = view.with_search(search);
    }
    if let Some(sort) = query.sort {
        view = view.with_sort(sort);
    }
    if let Some(raw) = query.categories.as_deref() {
        let categories = raw
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        view = view.with_categories(categories);
    }
    if let Some(include_archived) = query.include_archived {
        view = view.with_include_archived(include_archived);
    }
    Ok(view)
}

async fn http_view_opportunities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> HttpResult<Vec<Opportunity>> {
    let view = view_from_query(query).map_err(http_error)?;
    let records = view_opportunities(&state.api, &view)
        .await
        .map_err(http_error)?;
    Ok(Json(records))
}

async fn http_get_opportunity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<Opportunity> {
    let record = get_opportunity(&state.api, OpportunityId(id))
        .await
        .map_err(http_error)?;
    Ok(Json(record))
}

async fn http_create_submission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSubmission>,
) -> HttpResult<Submission> {
    let submission = create_submission(&state.api, &req)
        .await
        .map_err(http_error)?;
    state.submissions_changed().await;
    Ok(Json(submission))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
