use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::cli::ServeArgs;
use crate::display::DisplayOptions;
use crate::index::reviewers::{FilterState, SortState, parse_sort};
use crate::live::{LiveDirectory, LiveOptions};
use crate::store::{AvailabilityPolicy, source_from_args};

#[derive(Clone)]
pub struct AppState {
    directory: Arc<LiveDirectory>,
}

impl AppState {
    pub fn new(directory: Arc<LiveDirectory>) -> Self {
        Self { directory }
    }
}

pub async fn run(opts: ServeArgs) -> anyhow::Result<()> {
    let source = source_from_args(&opts.source).context("configure reviewer source")?;
    let policy = if opts.source.include_unavailable {
        AvailabilityPolicy::All
    } else {
        AvailabilityPolicy::AvailableOnly
    };

    let directory = Arc::new(LiveDirectory::new(source, policy));
    directory.start(LiveOptions {
        refresh_every: (opts.refresh_secs > 0).then(|| Duration::from_secs(opts.refresh_secs)),
        status_url: opts.status_url.clone(),
    });

    let app = router(AppState::new(Arc::clone(&directory)));

    let addr: SocketAddr = format!("{}:{}", opts.host, opts.port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    directory.shutdown();
    tracing::info!("Stopped");
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/stats", get(api_stats))
        .route("/api/filters/reviewers", get(api_reviewer_filters))
        .route("/api/reviewers/search", get(api_reviewer_search))
        .route("/api/notify", post(api_notify))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn api_stats(State(st): State<AppState>) -> impl IntoResponse {
    Json(st.directory.stats())
}

#[derive(Debug, Serialize)]
struct ReviewerFiltersResponse {
    specialties: Vec<String>,
    states: Vec<String>,
}

async fn api_reviewer_filters(State(st): State<AppState>) -> impl IntoResponse {
    let snapshot = st.directory.snapshot();
    Json(ReviewerFiltersResponse {
        specialties: snapshot.engine.all_specialties(),
        states: snapshot.engine.all_states(),
    })
}

/// Parsed from raw query pairs so `specialty`/`state` can repeat.
#[derive(Debug, Default)]
struct ReviewerSearchParams {
    filter: FilterState,
    sort: SortState,
    display: DisplayOptions,
}

impl ReviewerSearchParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut out = Self::default();
        let mut sort: Option<String> = None;
        let mut dir: Option<String> = None;
        for (key, value) in pairs {
            match key.as_str() {
                "q" => out.filter.search_text = value,
                // specialty names may themselves contain commas
                "specialty" => push_unique(&mut out.filter.selected_specialties, value.trim()),
                "state" => {
                    for part in flatten_list(&value) {
                        push_unique(&mut out.filter.selected_states, &part);
                    }
                }
                "sort" => sort = Some(value),
                "dir" => dir = Some(value),
                "reorder" => out.display.reorder_names = parse_flag(&value),
                "high_contrast" => out.display.high_contrast = parse_flag(&value),
                _ => {}
            }
        }
        out.sort = parse_sort(sort.as_deref(), dir.as_deref());
        out
    }
}

async fn api_reviewer_search(
    State(st): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let p = ReviewerSearchParams::from_pairs(pairs);
    let snapshot = st.directory.snapshot();
    Json(snapshot.engine.search(&p.filter, p.sort, p.display))
}

async fn api_notify(State(st): State<AppState>) -> impl IntoResponse {
    st.directory.notify_changed();
    StatusCode::ACCEPTED
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn flatten_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
