//! Transport seam between the list/detail/insight clients and the backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use shared::{
    domain::{RecordId, Resource},
    error::ApiError,
    protocol::{InsightRequest, InsightResponse, QueryDescriptor},
};
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

const INSIGHT_PATH: &str = "simulate-ai-insight";

/// Backend operations used by the clients. Collection and record bodies are
/// returned undecoded so callers can tell a structurally invalid page from a
/// transport failure.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn fetch_page(
        &self,
        resource: Resource,
        query: &QueryDescriptor,
    ) -> Result<Value, GatewayError>;

    async fn fetch_record(&self, resource: Resource, id: &RecordId) -> Result<Value, GatewayError>;

    async fn update_record(
        &self,
        resource: Resource,
        id: &RecordId,
        patch: &Value,
    ) -> Result<Value, GatewayError>;

    async fn request_insight(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError>;

    async fn request_insight_by_query(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from)?;
        Self::with_client(base_url, http)
    }

    pub fn with_client(base_url: &str, http: Client) -> Result<Self, GatewayError> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{segments...}/`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| GatewayError::InvalidBaseUrl {
                    url: self.base_url.to_string(),
                    reason: "cannot be a base".into(),
                })?;
            path.pop_if_empty();
            path.extend(segments);
            path.push("");
        }
        Ok(url)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %response.url(), "backend returned error status");
            return Err(ApiError::from_status(status.as_u16()).into());
        }
        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                GatewayError::Decode(err.to_string())
            } else {
                GatewayError::from(err)
            }
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("cannot be a base".into()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".into()));
    }
    Ok(url)
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn fetch_page(
        &self,
        resource: Resource,
        query: &QueryDescriptor,
    ) -> Result<Value, GatewayError> {
        let url = self.endpoint(&[resource.as_str()])?;
        debug!(%resource, page = query.page, size = query.size, "fetching collection page");
        let response = self
            .http
            .get(url)
            .query(&query.query_pairs())
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn fetch_record(&self, resource: Resource, id: &RecordId) -> Result<Value, GatewayError> {
        let id = id.to_string();
        let url = self.endpoint(&[resource.as_str(), &id])?;
        debug!(%resource, %id, "fetching record");
        let response = self.http.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn update_record(
        &self,
        resource: Resource,
        id: &RecordId,
        patch: &Value,
    ) -> Result<Value, GatewayError> {
        let id = id.to_string();
        let url = self.endpoint(&[resource.as_str(), &id])?;
        debug!(%resource, %id, "updating record");
        let response = self.http.put(url).json(patch).send().await?;
        Self::read_json(response).await
    }

    async fn request_insight(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError> {
        let url = self.endpoint(&[INSIGHT_PATH])?;
        let response = self.http.post(url).json(request).send().await?;
        Self::read_json(response).await
    }

    async fn request_insight_by_query(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError> {
        let url = self.endpoint(&[INSIGHT_PATH])?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("name", request.name.as_str()),
                ("entity_type", request.entity_type.as_str()),
            ])
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
