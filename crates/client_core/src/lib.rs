use std::{sync::Arc, time::Duration};

use shared::domain::Record;

pub mod controller;
pub mod error;
pub mod gateway;
pub mod insight;
pub mod list_state;
pub mod records;

pub use controller::{
    ListEvent, ListFailure, ListQueryController, ListSnapshot, ListView, LoadStatus, PageMeta,
    QueryOutcome, QueryTicket, NO_DATA_MESSAGE,
};
pub use error::GatewayError;
pub use gateway::{ApiGateway, HttpGateway, DEFAULT_API_BASE_URL};
pub use insight::{InsightClient, InsightError};
pub use list_state::{build_query_descriptor, ListState, ListStateError, PageSize};
pub use records::{update_from_assignments, RecordClient, RecordError};

/// Composition root: one explicitly constructed gateway shared by every
/// controller and client built from it.
#[derive(Clone)]
pub struct ArchiveClient {
    gateway: Arc<dyn ApiGateway>,
}

impl ArchiveClient {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn connect(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayError> {
        let gateway = match timeout {
            Some(timeout) => HttpGateway::with_timeout(base_url, timeout)?,
            None => HttpGateway::new(base_url)?,
        };
        Ok(Self::new(Arc::new(gateway)))
    }

    pub fn gateway(&self) -> Arc<dyn ApiGateway> {
        Arc::clone(&self.gateway)
    }

    /// A fresh controller per collection view; controllers share nothing but
    /// the gateway.
    pub fn list<R: Record>(&self, page_size: PageSize) -> Arc<ListQueryController<R>> {
        ListQueryController::with_page_size(self.gateway(), page_size)
    }

    pub fn records<R: Record>(&self) -> RecordClient<R> {
        RecordClient::new(self.gateway())
    }

    pub fn insights(&self) -> InsightClient {
        InsightClient::new(self.gateway())
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
