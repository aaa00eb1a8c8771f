//! Pinecone serverless index over its REST API.

use crate::models::{IndexRecord, QueryMatch};
use crate::vector_index::{IndexDescription, IndexError, VectorIndex};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const LIST_PAGE_SIZE: usize = 100;
const READY_POLL_ATTEMPTS: usize = 30;
/// Pinecone rejects larger `topK` values when metadata is requested.
pub const MAX_TOP_K_WITH_METADATA: usize = 1000;

/// Where a missing index gets created.
#[derive(Debug, Clone)]
pub struct ServerlessSpec {
    pub cloud: String,
    pub region: String,
}

pub struct PineconeIndex {
    client: Client,
    name: String,
    control_url: String,
    host: String,
    dimension: usize,
}

impl PineconeIndex {
    /// Looks the index up, creating a cosine index of `dimension` when it
    /// does not exist yet, and waits until it reports a host.
    pub async fn connect(
        api_key: &str,
        name: &str,
        dimension: usize,
        spec: &ServerlessSpec,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = build_client(api_key, timeout)?;

        let description = match describe_index(&client, CONTROL_PLANE_URL, name).await {
            Ok(description) => description,
            Err(IndexError::NotFound(_)) => {
                log::info!("Pinecone index {} not found, creating it ({} dims)", name, dimension);
                create_index(&client, CONTROL_PLANE_URL, name, dimension, spec).await?;
                wait_until_ready(&client, CONTROL_PLANE_URL, name).await?
            }
            Err(err) => return Err(err),
        };

        if description.dimension != dimension {
            log::warn!(
                "Pinecone index {} has dimension {}, embeddings are configured for {}",
                name,
                description.dimension,
                dimension
            );
        }

        let host = description
            .host
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Pinecone index {} has no host yet", name))?;

        log::info!("Connected to Pinecone index {} at {}", name, host);
        Ok(Self {
            client,
            name: name.to_string(),
            control_url: CONTROL_PLANE_URL.to_string(),
            host: normalize_host(&host),
            dimension: description.dimension,
        })
    }

    /// Uses a known data-plane host without any lookup, e.g. Pinecone Local
    /// at `http://localhost:5080`.
    pub fn with_hosts(
        api_key: &str,
        name: &str,
        dimension: usize,
        control_url: &str,
        host: &str,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            name: name.to_string(),
            control_url: control_url.trim_end_matches('/').to_string(),
            host: normalize_host(host),
            dimension,
        })
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self) -> Result<IndexDescription, IndexError> {
        let response = self
            .client
            .post(self.data_url("/describe_index_stats"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Pinecone describe_index_stats request failed")?;
        let stats: IndexStats = check(response, &self.name, "describe_index_stats")
            .await?
            .json()
            .await
            .context("failed to parse Pinecone index stats")?;

        Ok(IndexDescription {
            dimension: stats.dimension.unwrap_or(self.dimension),
            record_count: stats.total_vector_count,
        })
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        let body = UpsertRequest {
            vectors: records
                .into_iter()
                .map(|r| PineconeVector {
                    id: r.id,
                    values: r.values,
                    metadata: r.metadata,
                })
                .collect(),
        };
        let response = self
            .client
            .post(self.data_url("/vectors/upsert"))
            .json(&body)
            .send()
            .await
            .context("Pinecone upsert request failed")?;
        check(response, &self.name, "upsert").await?;

        log::debug!("Upserted {} vectors into {}", count, self.name);
        Ok(())
    }

    /// `top_k` is capped at [`MAX_TOP_K_WITH_METADATA`]. A broad ID query
    /// against a larger index therefore sees only part of it, and the
    /// unseen chunks are re-embedded and re-upserted under the same IDs.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, IndexError> {
        let body = QueryRequest::with_metadata(vector, top_k);
        if body.top_k < top_k {
            log::debug!("Capped Pinecone topK from {} to {}", top_k, body.top_k);
        }
        let response = self
            .client
            .post(self.data_url("/query"))
            .json(&body)
            .send()
            .await
            .context("Pinecone query request failed")?;
        let parsed: QueryResponse = check(response, &self.name, "query")
            .await?
            .json()
            .await
            .context("failed to parse Pinecone query response")?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| QueryMatch::from_metadata(m.score, &m.metadata))
            .collect())
    }

    async fn list_ids(&self) -> Result<Option<HashSet<String>>, IndexError> {
        let mut ids = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.data_url("/vectors/list"))
                .query(&[("limit", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &token {
                request = request.query(&[("paginationToken", token)]);
            }

            let response = request.send().await.context("Pinecone list request failed")?;
            // Pod-based indexes do not support listing.
            if response.status() == StatusCode::BAD_REQUEST
                || response.status() == StatusCode::NOT_IMPLEMENTED
            {
                log::debug!("Pinecone index {} cannot list vector IDs", self.name);
                return Ok(None);
            }
            let page: ListResponse = check(response, &self.name, "list")
                .await?
                .json()
                .await
                .context("failed to parse Pinecone list response")?;

            ids.extend(page.vectors.into_iter().map(|v| v.id));
            match page.pagination.and_then(|p| p.next) {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        Ok(Some(ids))
    }

    async fn delete_all(&self) -> Result<(), IndexError> {
        // The data-plane host stops resolving once the index is deleted, so
        // ask the control plane first.
        if let Err(IndexError::NotFound(name)) = describe_index(&self.client, &self.control_url, &self.name).await {
            return Err(IndexError::NotFound(name));
        }

        let response = self
            .client
            .post(self.data_url("/vectors/delete"))
            .json(&serde_json::json!({ "deleteAll": true }))
            .send()
            .await
            .context("Pinecone delete request failed")?;
        check(response, &self.name, "delete").await?;
        Ok(())
    }
}

fn build_client(api_key: &str, timeout: Duration) -> Result<Client, IndexError> {
    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("missing Pinecone API key").into());
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        "Api-Key",
        HeaderValue::from_str(api_key.trim()).context("invalid Pinecone API key")?,
    );
    headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let client = Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .context("failed to build Pinecone HTTP client")?;
    Ok(client)
}

async fn describe_index(client: &Client, control_url: &str, name: &str) -> Result<IndexModel, IndexError> {
    let response = client
        .get(format!("{}/indexes/{}", control_url, name))
        .send()
        .await
        .context("Pinecone describe_index request failed")?;
    let model = check(response, name, "describe_index")
        .await?
        .json()
        .await
        .context("failed to parse Pinecone index description")?;
    Ok(model)
}

async fn create_index(
    client: &Client,
    control_url: &str,
    name: &str,
    dimension: usize,
    spec: &ServerlessSpec,
) -> Result<(), IndexError> {
    let body = serde_json::json!({
        "name": name,
        "dimension": dimension,
        "metric": "cosine",
        "spec": {
            "serverless": {
                "cloud": spec.cloud,
                "region": spec.region,
            }
        }
    });
    let response = client
        .post(format!("{}/indexes", control_url))
        .json(&body)
        .send()
        .await
        .context("Pinecone create_index request failed")?;
    check(response, name, "create_index").await?;
    Ok(())
}

async fn wait_until_ready(client: &Client, control_url: &str, name: &str) -> Result<IndexModel, IndexError> {
    for _ in 0..READY_POLL_ATTEMPTS {
        let model = describe_index(client, control_url, name).await?;
        let ready = model.status.as_ref().map(|s| s.ready).unwrap_or(false);
        if ready && model.host.is_some() {
            return Ok(model);
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Err(anyhow::anyhow!("Pinecone index {} did not become ready", name).into())
}

async fn check(response: Response, name: &str, operation: &str) -> Result<Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(IndexError::NotFound(name.to_string()));
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(anyhow::anyhow!("Pinecone {} failed ({}): {}", operation, status, body).into())
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    dimension: usize,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Serialize)]
struct UpsertRequest {
    vectors: Vec<PineconeVector>,
}

#[derive(Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: HashMap<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

impl<'a> QueryRequest<'a> {
    fn with_metadata(vector: &'a [f32], top_k: usize) -> Self {
        Self {
            vector,
            top_k: top_k.min(MAX_TOP_K_WITH_METADATA),
            include_metadata: true,
            include_values: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedVector>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListedVector {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}
