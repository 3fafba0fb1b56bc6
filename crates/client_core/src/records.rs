use std::{marker::PhantomData, sync::Arc};

use shared::domain::{Record, RecordId};
use thiserror::Error;
use tracing::info;

use crate::{error::GatewayError, gateway::ApiGateway};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid record payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("update contains no fields")]
    EmptyUpdate,
    #[error("'{field}' is not an editable {resource} field")]
    UnknownField { resource: &'static str, field: String },
}

/// Detail and edit operations for one record type.
pub struct RecordClient<R: Record> {
    gateway: Arc<dyn ApiGateway>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for RecordClient<R> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordClient<R> {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Self {
        Self {
            gateway,
            _record: PhantomData,
        }
    }

    pub async fn fetch(&self, id: &RecordId) -> Result<R, RecordError> {
        let body = self.gateway.fetch_record(R::RESOURCE, id).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn update(&self, id: &RecordId, update: &R::Update) -> Result<R, RecordError> {
        let patch = serde_json::to_value(update)?;
        if patch.as_object().is_some_and(|fields| fields.is_empty()) {
            return Err(RecordError::EmptyUpdate);
        }
        let body = self.gateway.update_record(R::RESOURCE, id, &patch).await?;
        let record: R = serde_json::from_value(body)?;
        info!(resource = %R::RESOURCE, %id, "record updated");
        Ok(record)
    }
}

/// Builds an update payload from `field=value` assignments, rejecting fields
/// the record type does not expose.
pub fn update_from_assignments<R: Record>(
    assignments: &[(String, String)],
) -> Result<R::Update, RecordError> {
    let mut fields = serde_json::Map::new();
    for (field, value) in assignments {
        let field = field.trim();
        if !R::FILTER_FIELDS.contains(&field) {
            return Err(RecordError::UnknownField {
                resource: R::RESOURCE.singular(),
                field: field.to_string(),
            });
        }
        fields.insert(field.to_string(), serde_json::Value::String(value.clone()));
    }
    if fields.is_empty() {
        return Err(RecordError::EmptyUpdate);
    }
    Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
}

#[cfg(test)]
#[path = "tests/records_tests.rs"]
mod tests;
