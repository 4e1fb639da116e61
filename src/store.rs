use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::cli::SourceArgs;
use crate::record::{RawReviewer, Reviewer};

const SELECT_COLUMNS: &str = "id,name,specialties,states,availability";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("data store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode reviewer rows: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can hand over the full reviewer table.
pub trait ReviewerSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<RawReviewer>, StoreError>>;
}

/// PostgREST-style endpoint: `GET {base}/rest/v1/{table}`.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestSource {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    async fn fetch_rows(&self) -> Result<Vec<RawReviewer>, StoreError> {
        let url = self.table_url();
        let request_err = |source: reqwest::Error| StoreError::Request {
            url: url.clone(),
            source,
        };
        let resp = self
            .client
            .get(&url)
            .query(&[("select", SELECT_COLUMNS), ("order", "name.asc")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(request_err)?;
        let status = resp.status();
        let body = resp.text().await.map_err(request_err)?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_rows(&body)
    }
}

impl ReviewerSource for RestSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<RawReviewer>, StoreError>> {
        Box::pin(self.fetch_rows())
    }
}

/// A JSON array of rows on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReviewerSource for FileSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<RawReviewer>, StoreError>> {
        Box::pin(async move {
            let body = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| StoreError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            parse_rows(&body)
        })
    }
}

pub fn source_from_args(args: &SourceArgs) -> anyhow::Result<Arc<dyn ReviewerSource>> {
    if let Some(path) = args.source_file.as_deref() {
        tracing::info!("Reading reviewers from {}", path);
        return Ok(Arc::new(FileSource::new(path)));
    }
    match (args.store_url.as_deref(), args.store_key.as_deref()) {
        (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
            tracing::info!("Reading reviewers from {} (table {})", url, args.table);
            Ok(Arc::new(RestSource::new(url, key, &args.table)))
        }
        _ => Err(anyhow!(
            "No reviewer source configured. Set --store-url and --store-key (or REVIEWER_STORE_URL / REVIEWER_STORE_KEY), or pass --source-file."
        )),
    }
}

/// A body that is valid JSON but not an array yields no rows.
pub fn parse_rows(body: &str) -> Result<Vec<RawReviewer>, StoreError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RawReviewer>, _>>()?),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityPolicy {
    /// Only rows flagged "available".
    #[default]
    AvailableOnly,
    All,
}

/// Normalize fetched rows, dropping unavailable ones (per `policy`) and rows
/// with no licensure state.
pub fn listable_reviewers(rows: Vec<RawReviewer>, policy: AvailabilityPolicy) -> Vec<Reviewer> {
    let fetched = rows.len();
    let out: Vec<Reviewer> = rows
        .into_iter()
        .filter(|r| policy == AvailabilityPolicy::All || r.is_available())
        .map(Reviewer::from_raw)
        .filter(|r| !r.states().is_empty())
        .collect();
    if out.len() < fetched {
        tracing::debug!("Dropped {} of {} fetched rows", fetched - out.len(), fetched);
    }
    out
}
