//! PostgREST (Supabase REST) implementation of the remote data service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{RemoteDataService, RemoteError, RemoteResult, Table};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::util::compact_text;

const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PostgrestClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PostgrestClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            client,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(parse_api_error(status, &body))
    }
}

#[async_trait]
impl RemoteDataService for PostgrestClient {
    async fn select(&self, table: Table) -> RemoteResult<Vec<Value>> {
        let mut url = format!("{}?select=*", self.table_url(table));
        if table == Table::AuditLogs {
            url.push_str("&order=timestamp.desc");
        }

        let response = Self::send(self.request(Method::GET, &url)).await?;
        let rows = response.json::<Vec<Value>>().await?;
        Ok(rows)
    }

    async fn insert(&self, table: Table, data: &Value) -> RemoteResult<()> {
        let url = self.table_url(table);
        let request = self
            .request(Method::POST, &url)
            .header("Prefer", "return=minimal")
            .json(data);
        Self::send(request).await?;
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        data: &Value,
        match_field: &str,
        match_value: &Value,
    ) -> RemoteResult<()> {
        let url = format!(
            "{}?{}",
            self.table_url(table),
            match_filter(match_field, match_value)
        );
        let request = self
            .request(Method::PATCH, &url)
            .header("Prefer", "return=minimal")
            .json(data);
        Self::send(request).await?;
        Ok(())
    }

    async fn upsert(&self, table: Table, data: &Value) -> RemoteResult<()> {
        let url = self.table_url(table);
        let request = self
            .request(Method::POST, &url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(data);
        Self::send(request).await?;
        Ok(())
    }

    async fn delete(
        &self,
        table: Table,
        match_field: &str,
        match_value: &Value,
    ) -> RemoteResult<()> {
        let url = format!(
            "{}?{}",
            self.table_url(table),
            match_filter(match_field, match_value)
        );
        Self::send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn ping(&self) -> RemoteResult<()> {
        let url = format!("{}/rest/v1/", self.base_url);
        let response = self.request(Method::HEAD, &url).send().await?;
        if response.status().is_server_error() {
            return Err(RemoteError::classified(
                format!("remote unavailable (HTTP {})", response.status().as_u16()),
                None,
                Some(response.status().as_u16()),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> RemoteError {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message {
            let mut text = message.trim().to_string();
            if let Some(details) = payload.details.filter(|details| !details.trim().is_empty()) {
                text = format!("{text}: {}", details.trim());
            }
            if let Some(hint) = payload.hint.filter(|hint| !hint.trim().is_empty()) {
                text = format!("{text} (hint: {})", hint.trim());
            }
            return RemoteError::classified(text, payload.code, Some(status.as_u16()));
        }
    }

    let trimmed = compact_text(body);
    let message = if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    };
    RemoteError::classified(message, None, Some(status.as_u16()))
}

/// PostgREST horizontal filter `<field>=eq.<value>`
fn match_filter(field: &str, value: &Value) -> String {
    let value = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    format!(
        "{}=eq.{}",
        urlencoding::encode(field),
        urlencoding::encode(&value)
    )
}
