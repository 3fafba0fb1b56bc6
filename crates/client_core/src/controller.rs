//! List-query controller: owns one collection view's [`ListState`], issues
//! generation-tagged queries and reconciles their responses.
//!
//! Only the most recently issued query may change what is displayed. A
//! response for an older generation is dropped on arrival, whatever order the
//! network delivers it in.

use std::{marker::PhantomData, sync::Arc};

use serde_json::Value;
use shared::{
    domain::Record,
    protocol::{PageDecodeError, PageResult, QueryDescriptor},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    gateway::ApiGateway,
    list_state::{ListState, ListStateError, PageSize},
};

pub const NO_DATA_MESSAGE: &str = "No data available from the API";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListFailure {
    /// Network, HTTP status or decoding failure, with the raw message.
    #[error("{0}")]
    Transport(String),
    /// The response carried no `items` array.
    #[error("{}", NO_DATA_MESSAGE)]
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Error(ListFailure),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn failure(&self) -> Option<&ListFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    pub page: u32,
    pub size: u32,
    pub pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// What a view renders: status plus the rows and total of the last applied page.
#[derive(Debug, Clone)]
pub struct ListView<R> {
    pub status: LoadStatus,
    pub items: Vec<R>,
    pub total: u64,
    pub meta: Option<PageMeta>,
}

impl<R> Default for ListView<R> {
    fn default() -> Self {
        Self {
            status: LoadStatus::Idle,
            items: Vec::new(),
            total: 0,
            meta: None,
        }
    }
}

impl<R: Record> ListView<R> {
    /// Applies a collection response body. Missing `items` becomes the
    /// no-data error; rows that fail to decode become a transport error.
    pub fn reconcile(&mut self, body: Value) {
        match PageResult::<R>::from_body(body) {
            Ok(page) => self.apply_page(page),
            Err(PageDecodeError::MissingItems) => self.fail(ListFailure::NoData),
            Err(err @ PageDecodeError::Malformed(_)) => {
                self.fail(ListFailure::Transport(err.to_string()))
            }
        }
    }

    pub fn apply_page(&mut self, page: PageResult<R>) {
        if page.exceeds_page_size() {
            warn!(
                items = page.items.len(),
                size = page.size,
                "backend returned more rows than the page size"
            );
        }
        self.meta = Some(PageMeta {
            page: page.page,
            size: page.size,
            pages: page.page_count(),
            has_next: page.has_next,
            has_prev: page.has_prev,
        });
        self.total = page.total;
        self.items = page.items;
        self.status = LoadStatus::Ready;
    }

    /// Error replaces the data view entirely.
    pub fn fail(&mut self, failure: ListFailure) {
        self.items.clear();
        self.total = 0;
        self.meta = None;
        self.status = LoadStatus::Error(failure);
    }
}

/// A query issued against a particular state generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    generation: u64,
    descriptor: QueryDescriptor,
}

impl QueryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Applied(LoadStatus),
    Discarded { generation: u64, latest: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    StatusChanged { generation: u64, status: LoadStatus },
    StaleDiscarded { generation: u64, latest: u64 },
}

#[derive(Debug, Clone)]
pub struct ListSnapshot<R> {
    pub state: ListState,
    pub view: ListView<R>,
    pub generation: u64,
}

struct ControllerState<R> {
    list: ListState,
    view: ListView<R>,
    latest_generation: u64,
    last_descriptor: Option<QueryDescriptor>,
}

pub struct ListQueryController<R: Record> {
    gateway: Arc<dyn ApiGateway>,
    inner: Mutex<ControllerState<R>>,
    events: broadcast::Sender<ListEvent>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> ListQueryController<R> {
    pub fn new(gateway: Arc<dyn ApiGateway>) -> Arc<Self> {
        Self::with_page_size(gateway, PageSize::default())
    }

    pub fn with_page_size(gateway: Arc<dyn ApiGateway>, page_size: PageSize) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            gateway,
            inner: Mutex::new(ControllerState {
                list: ListState::new(page_size),
                view: ListView::default(),
                latest_generation: 0,
                last_descriptor: None,
            }),
            events,
            _record: PhantomData,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ListSnapshot<R> {
        let guard = self.inner.lock().await;
        ListSnapshot {
            state: guard.list.clone(),
            view: guard.view.clone(),
            generation: guard.latest_generation,
        }
    }

    pub async fn status(&self) -> LoadStatus {
        self.inner.lock().await.view.status.clone()
    }

    /// First fetch for a freshly shown view.
    pub async fn mount(&self) -> QueryTicket {
        self.mutate(|_| ()).await
    }

    pub async fn set_page(&self, page_index: u32) -> QueryTicket {
        self.mutate(|list| list.set_page(page_index)).await
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<QueryTicket, ListStateError> {
        let page_size = PageSize::new(page_size)?;
        Ok(self.mutate(|list| list.set_page_size(page_size)).await)
    }

    pub async fn set_filter(&self, field: &str, value: &str) -> QueryTicket {
        self.mutate(|list| list.set_filter(field, value)).await
    }

    pub async fn clear_filter(&self) -> QueryTicket {
        self.mutate(ListState::clear_filter).await
    }

    pub async fn set_sort(&self, field: &str) -> QueryTicket {
        self.mutate(|list| list.set_sort(field)).await
    }

    pub async fn clear_sort(&self) -> QueryTicket {
        self.mutate(ListState::clear_sort).await
    }

    pub async fn set_search_term(&self, term: &str) -> QueryTicket {
        self.mutate(|list| list.set_search_term(term)).await
    }

    /// Re-issues the last descriptor under a fresh generation.
    pub async fn retry(&self) -> QueryTicket {
        let mut guard = self.inner.lock().await;
        let descriptor = guard
            .last_descriptor
            .clone()
            .unwrap_or_else(|| guard.list.query_descriptor());
        self.issue(&mut guard, descriptor)
    }

    /// Runs a ticket against the gateway. The response is applied only if no
    /// newer ticket was issued in the meantime; errors never escape, they
    /// become the view's `Error` status.
    pub async fn execute(&self, ticket: QueryTicket) -> QueryOutcome {
        let response = self
            .gateway
            .fetch_page(R::RESOURCE, &ticket.descriptor)
            .await;

        let mut guard = self.inner.lock().await;
        let latest = guard.latest_generation;
        if ticket.generation != latest {
            debug!(
                resource = %R::RESOURCE,
                generation = ticket.generation,
                latest,
                "discarding stale page response"
            );
            let _ = self.events.send(ListEvent::StaleDiscarded {
                generation: ticket.generation,
                latest,
            });
            return QueryOutcome::Discarded {
                generation: ticket.generation,
                latest,
            };
        }

        match response {
            Ok(body) => guard.view.reconcile(body),
            Err(err) => {
                warn!(
                    resource = %R::RESOURCE,
                    generation = latest,
                    error = %err,
                    "page fetch failed"
                );
                guard.view.fail(ListFailure::Transport(err.to_string()));
            }
        }

        let status = guard.view.status.clone();
        if let LoadStatus::Ready = status {
            info!(
                resource = %R::RESOURCE,
                generation = latest,
                rows = guard.view.items.len(),
                total = guard.view.total,
                "page applied"
            );
        }
        let _ = self.events.send(ListEvent::StatusChanged {
            generation: latest,
            status: status.clone(),
        });
        QueryOutcome::Applied(status)
    }

    async fn mutate(&self, change: impl FnOnce(&mut ListState)) -> QueryTicket {
        let mut guard = self.inner.lock().await;
        change(&mut guard.list);
        let descriptor = guard.list.query_descriptor();
        self.issue(&mut guard, descriptor)
    }

    fn issue(&self, state: &mut ControllerState<R>, descriptor: QueryDescriptor) -> QueryTicket {
        state.latest_generation += 1;
        state.last_descriptor = Some(descriptor.clone());
        state.view.status = LoadStatus::Loading;
        debug!(
            resource = %R::RESOURCE,
            generation = state.latest_generation,
            query = ?descriptor.query_pairs(),
            "issued page query"
        );
        let _ = self.events.send(ListEvent::StatusChanged {
            generation: state.latest_generation,
            status: LoadStatus::Loading,
        });
        QueryTicket {
            generation: state.latest_generation,
            descriptor,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
