//! JSON-over-HTTP client for the Rollbar API.
//!
//! Every response is a JSON envelope `{err, result}`; a non-zero `err` is a
//! domain failure independent of HTTP status, and non-2xx responses are
//! rejected as transport failures before JSON decoding is attempted. List
//! endpoints are page/limit paginated: pages are requested while the last
//! page came back full, and all pages are concatenated in order.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::query::{flatten_occurrences, OccurrenceQuery};
use super::types::{
    AccessToken, CreateAccessTokenParams, Environment, Item, ItemOccurrence,
    OccurrenceMetricsResult, Project,
};
use super::ApiError;

/// Production API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.rollbar.com/api/1";

/// Overall per-call timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection/TLS handshake timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list endpoints.
const PAGE_LIMIT: usize = 5000;

/// Access token request header.
const ACCESS_TOKEN_HEADER: &str = "X-Rollbar-Access-Token";

/// Response envelope wrapping every API payload.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    err: i64,
    result: Option<T>,
}

/// Nested payload of the batched item listing.
#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<Item>,
}

/// Nested payload of the environments listing.
#[derive(Debug, Deserialize)]
struct EnvironmentsPage {
    #[serde(default)]
    environments: Vec<Environment>,
}

/// Client for authenticated Rollbar API calls.
///
/// Account-level tokens are used for project listing and token
/// administration only; occurrence and item queries always use a
/// per-project read token supplied by the caller.
#[derive(Clone)]
pub struct RollbarClient {
    http: reqwest::Client,
    base_url: String,
    account_read_token: String,
    account_write_token: String,
}

impl std::fmt::Debug for RollbarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbarClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RollbarClient {
    /// Create a client with fixed call timeouts.
    ///
    /// # Errors
    /// Returns `ApiError::Transport` if the underlying HTTP client cannot be
    /// built.
    pub fn new(
        account_read_token: impl Into<String>,
        account_write_token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            account_read_token: account_read_token.into(),
            account_write_token: account_write_token.into(),
        })
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// List all projects of the account, following pagination to the end.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let mut projects: Vec<Project> = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/projects?page={}&limit={}",
                self.base_url, page, PAGE_LIMIT
            );
            let batch: Vec<Project> = self
                .call(Method::GET, &self.account_read_token, &url, None::<&()>)
                .await?;
            let full_page = batch.len() == PAGE_LIMIT;
            projects.extend(batch);
            if !full_page {
                break;
            }
            page += 1;
        }
        Ok(projects)
    }

    /// List the access tokens of a project.
    pub async fn list_access_tokens(&self, project_id: i64) -> Result<Vec<AccessToken>, ApiError> {
        let url = format!("{}/project/{}/access_tokens", self.base_url, project_id);
        self.call(Method::GET, &self.account_read_token, &url, None::<&()>)
            .await
    }

    /// Create an access token for a project, using the account write token.
    pub async fn create_access_token(
        &self,
        project_id: i64,
        params: &CreateAccessTokenParams,
    ) -> Result<AccessToken, ApiError> {
        let url = format!("{}/project/{}/access_tokens", self.base_url, project_id);
        self.call(Method::POST, &self.account_write_token, &url, Some(params))
            .await
    }

    /// Find the first enabled read-scoped token of a project.
    ///
    /// # Errors
    /// Returns `ApiError::ReadTokenNotFound` if no token qualifies.
    pub async fn read_token(&self, project_id: i64) -> Result<AccessToken, ApiError> {
        let tokens = self.list_access_tokens(project_id).await?;
        tokens
            .into_iter()
            .find(AccessToken::is_read_enabled)
            .ok_or(ApiError::ReadTokenNotFound)
    }

    /// Find a usable read token, creating one if none exists.
    pub async fn get_or_create_read_token(
        &self,
        project_id: i64,
    ) -> Result<AccessToken, ApiError> {
        match self.read_token(project_id).await {
            Err(ApiError::ReadTokenNotFound) => {
                tracing::debug!(project_id, "no read token found, creating one");
                self.create_access_token(project_id, &CreateAccessTokenParams::read_token())
                    .await
            }
            other => other,
        }
    }

    /// Run an occurrence aggregation query with a project read token.
    pub async fn occurrence_metrics(
        &self,
        project_token: &str,
        query: &OccurrenceQuery,
    ) -> Result<OccurrenceMetricsResult, ApiError> {
        let url = format!("{}/metrics/occurrences", self.base_url);
        self.call(Method::POST, project_token, &url, Some(query))
            .await
    }

    /// Query per-item occurrence counts over the trailing window and flatten
    /// the bucketed response into typed records.
    pub async fn item_occurrences(
        &self,
        project_token: &str,
        ago: Duration,
        limit: i64,
    ) -> Result<Vec<ItemOccurrence>, ApiError> {
        let query = OccurrenceQuery::item_window(ago, limit);
        let metrics = self.occurrence_metrics(project_token, &query).await?;
        flatten_occurrences(&metrics)
    }

    /// Fetch full item records for a set of ids in one batched request.
    pub async fn list_items_with_ids(
        &self,
        project_token: &str,
        ids: &[i64],
    ) -> Result<Vec<Item>, ApiError> {
        let url = format!("{}/items?ids={}", self.base_url, join_ids(ids));
        let page: ItemsPage = self
            .call(Method::GET, project_token, &url, None::<&()>)
            .await?;
        Ok(page.items)
    }

    /// Fetch a single item by id.
    pub async fn get_item(&self, project_token: &str, id: i64) -> Result<Item, ApiError> {
        let url = format!("{}/item/{}", self.base_url, id);
        self.call(Method::GET, project_token, &url, None::<&()>)
            .await
    }

    /// List the environments of a project, following pagination to the end.
    pub async fn list_environments(
        &self,
        project_token: &str,
    ) -> Result<Vec<Environment>, ApiError> {
        let mut environments: Vec<Environment> = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/environments?page={}&limit={}",
                self.base_url, page, PAGE_LIMIT
            );
            let batch: EnvironmentsPage = self
                .call(Method::GET, project_token, &url, None::<&()>)
                .await?;
            let full_page = batch.environments.len() == PAGE_LIMIT;
            environments.extend(batch.environments);
            if !full_page {
                break;
            }
            page += 1;
        }
        Ok(environments)
    }

    /// Execute one authenticated envelope call.
    async fn call<T, B>(
        &self,
        method: Method,
        token: &str,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCESS_TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%method, url, status = status.as_u16(), body, "HTTP call failed");
            return Err(ApiError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;
        if envelope.err != 0 {
            return Err(ApiError::Domain(envelope.err));
        }
        envelope
            .result
            .ok_or_else(|| ApiError::Decode("envelope is missing a result".to_string()))
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
