use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

use crate::error::CatalogError;

pub const DEFAULT_SERVER_URL: &str = "https://cloud.seatable.io";

/// Column key of the artwork image column. Known stable for this base;
/// falls back to the first column of type "image" if it ever disappears.
const IMAGE_COLUMN_KEY: &str = "Jcpv";

/// Short-lived session obtained by exchanging the long-lived API token.
/// Valid for one run; never persisted or refreshed.
#[derive(Debug, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub dtable_uuid: String,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub tables: Vec<Table>,
}

#[derive(Debug, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
pub struct Column {
    pub key: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub column_type: Option<String>,
}

impl Table {
    /// Locate the column holding image attachments: the known key first,
    /// then any column declared as an image column.
    pub fn image_column_key(&self) -> Option<String> {
        if self
            .columns
            .iter()
            .any(|c| c.key.as_deref() == Some(IMAGE_COLUMN_KEY))
        {
            return Some(IMAGE_COLUMN_KEY.to_string());
        }

        self.columns
            .iter()
            .find(|c| c.column_type.as_deref() == Some("image"))
            .and_then(|c| c.key.clone().or_else(|| c.name.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<Row>,
}

/// One row: opaque column key to cell value.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Deserialize)]
struct DownloadLinkResponse {
    download_link: String,
}

pub struct SeaTableClient {
    http: reqwest::blocking::Client,
    server_url: String,
    api_token: String,
}

impl SeaTableClient {
    /// Build a client from the environment. The API token is required
    /// runtime input, never compiled in.
    pub fn from_env() -> Result<Self> {
        let api_token = env::var("SEATABLE_API_TOKEN")
            .context("SEATABLE_API_TOKEN is not set (long-lived SeaTable API token)")?;
        let server_url =
            env::var("SEATABLE_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(&server_url, &api_token)
    }

    pub fn new(server_url: &str, api_token: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent("seatable-catalog/0.1")
            .build()?;
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Exchange the long-lived API token for a short-lived base token and
    /// the uuid of the base it is scoped to.
    pub fn authenticate(&self) -> Result<Session> {
        let url = format!("{}/api/v2.1/dtable/app-access-token/", self.server_url);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_token))
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;
        parse_json(response)
    }

    /// Fetch base metadata: tables and their column descriptors.
    pub fn fetch_metadata(&self, session: &Session) -> Result<Metadata> {
        let url = format!(
            "{}/api-gateway/api/v2/dtables/{}/metadata/",
            self.server_url, session.dtable_uuid
        );
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;
        let envelope: MetadataResponse = parse_json(response)?;
        Ok(envelope.metadata)
    }

    /// Fetch all rows visible under a named view. Unpaginated; the dataset
    /// is assumed to fit one response.
    pub fn fetch_rows(&self, session: &Session, table_name: &str, view_name: &str) -> Result<Vec<Row>> {
        let url = format!(
            "{}/api-gateway/api/v2/dtables/{}/rows/",
            self.server_url, session.dtable_uuid
        );
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .query(&[("table_name", table_name), ("view_name", view_name)])
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;
        let envelope: RowsResponse = parse_json(response)?;
        Ok(envelope.rows)
    }

    /// Exchange an asset-relative path for a temporary direct download URL.
    pub fn download_link(&self, relative_path: &str) -> Result<String> {
        let url = format!("{}/api/v2.1/dtable/app-download-link/", self.server_url);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_token))
            .query(&[("path", relative_path)])
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;
        let envelope: DownloadLinkResponse = parse_json(response)?;
        Ok(envelope.download_link)
    }

    /// Plain GET of a direct download URL, returning the response for
    /// streaming. No auth header; the link itself carries the grant.
    pub fn fetch_asset(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?;
        check_status(response)
    }
}

/// Any non-2xx response aborts the run: no retries, no partial output.
fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(CatalogError::RemoteRequestFailed {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    Ok(response)
}

fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T> {
    let response = check_status(response)?;
    let url = response.url().to_string();
    response
        .json()
        .with_context(|| format!("Failed to parse JSON: {}", url))
}
