use std::sync::Arc;

use shared::{
    domain::Resource,
    protocol::{InsightRequest, InsightResponse},
};
use thiserror::Error;
use tracing::debug;

use crate::{error::GatewayError, gateway::ApiGateway};

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Please enter a name first")]
    EmptyName,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("confidence score {0} is outside 0..=1")]
    ConfidenceOutOfRange(f64),
}

#[derive(Clone)]
pub struct InsightClient {
    gateway: Arc<dyn ApiGateway>,
}

impl InsightClient {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Self {
        Self { gateway }
    }

    pub async fn generate(
        &self,
        resource: Resource,
        name: &str,
    ) -> Result<InsightResponse, InsightError> {
        let request = insight_request(resource, name)?;
        let response = self.gateway.request_insight(&request).await?;
        checked(response)
    }

    /// Same as [`InsightClient::generate`] over the query-string endpoint.
    pub async fn generate_by_query(
        &self,
        resource: Resource,
        name: &str,
    ) -> Result<InsightResponse, InsightError> {
        let request = insight_request(resource, name)?;
        let response = self.gateway.request_insight_by_query(&request).await?;
        checked(response)
    }
}

fn insight_request(resource: Resource, name: &str) -> Result<InsightRequest, InsightError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InsightError::EmptyName);
    }
    debug!(%resource, name, "requesting insight");
    Ok(InsightRequest {
        name: name.to_string(),
        entity_type: resource,
    })
}

fn checked(response: InsightResponse) -> Result<InsightResponse, InsightError> {
    if !(0.0..=1.0).contains(&response.confidence_score) {
        return Err(InsightError::ConfidenceOutOfRange(response.confidence_score));
    }
    Ok(response)
}

#[cfg(test)]
#[path = "tests/insight_tests.rs"]
mod tests;
