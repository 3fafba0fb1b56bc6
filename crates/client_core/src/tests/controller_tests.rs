use super::*;
use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{Person, RecordId, Resource, SortDirection},
    error::ApiError,
    protocol::{InsightRequest, InsightResponse},
};
use tokio::sync::oneshot;

use crate::error::GatewayError;

type Reply = Result<Value, GatewayError>;

/// Gateway whose page responses are released by the test, keyed by the query
/// they answer, so arrival order is under test control.
#[derive(Default)]
struct ScriptedGateway {
    pending: Mutex<Vec<(QueryDescriptor, oneshot::Receiver<Reply>)>>,
    seen: Mutex<Vec<QueryDescriptor>>,
}

impl ScriptedGateway {
    async fn respond_later(&self, descriptor: &QueryDescriptor) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.push((descriptor.clone(), rx));
        tx
    }

    async fn respond_now(&self, descriptor: &QueryDescriptor, reply: Reply) {
        let tx = self.respond_later(descriptor).await;
        tx.send(reply).expect("receiver alive");
    }

    async fn seen(&self) -> Vec<QueryDescriptor> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl ApiGateway for ScriptedGateway {
    async fn fetch_page(&self, _resource: Resource, query: &QueryDescriptor) -> Reply {
        self.seen.lock().await.push(query.clone());
        let rx = {
            let mut pending = self.pending.lock().await;
            let Some(index) = pending.iter().position(|(d, _)| d == query) else {
                return Err(GatewayError::Transport(format!("unexpected query {query:?}")));
            };
            pending.remove(index).1
        };
        rx.await
            .unwrap_or_else(|_| Err(GatewayError::Transport("responder dropped".into())))
    }

    async fn fetch_record(&self, _resource: Resource, _id: &RecordId) -> Reply {
        Err(GatewayError::Transport("not scripted".into()))
    }

    async fn update_record(&self, _resource: Resource, _id: &RecordId, _patch: &Value) -> Reply {
        Err(GatewayError::Transport("not scripted".into()))
    }

    async fn request_insight(
        &self,
        _request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError> {
        Err(GatewayError::Transport("not scripted".into()))
    }

    async fn request_insight_by_query(
        &self,
        _request: &InsightRequest,
    ) -> Result<InsightResponse, GatewayError> {
        Err(GatewayError::Transport("not scripted".into()))
    }
}

fn person(id: i64, name: &str) -> Value {
    json!({ "id": id, "name": name, "eye_color": "blue" })
}

fn page_body(names: &[&str], total: u64, page: u32) -> Value {
    let items: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| person(i as i64 + 1, name))
        .collect();
    json!({
        "items": items,
        "total": total,
        "page": page,
        "size": 15,
        "pages": total.div_ceil(15),
        "has_next": false,
        "has_prev": page > 1,
    })
}

fn names(view: &ListView<Person>) -> Vec<String> {
    view.items.iter().map(|p| p.name.clone()).collect()
}

fn controller(gateway: &Arc<ScriptedGateway>) -> Arc<ListQueryController<Person>> {
    ListQueryController::new(gateway.clone())
}

#[tokio::test]
async fn mount_moves_idle_to_loading_then_ready() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);
    assert_eq!(controller.status().await, LoadStatus::Idle);

    let ticket = controller.mount().await;
    assert_eq!(controller.status().await, LoadStatus::Loading);
    assert_eq!(ticket.descriptor().page, 1);
    assert_eq!(ticket.descriptor().size, 15);

    gateway
        .respond_now(ticket.descriptor(), Ok(page_body(&["Luke", "Leia"], 2, 1)))
        .await;
    let outcome = controller.execute(ticket).await;

    assert_eq!(outcome, QueryOutcome::Applied(LoadStatus::Ready));
    let snapshot = controller.snapshot().await;
    assert_eq!(names(&snapshot.view), vec!["Luke", "Leia"]);
    assert_eq!(snapshot.view.total, 2);
}

#[tokio::test]
async fn last_issued_response_wins_even_when_it_arrives_first() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let first = controller.set_filter("eye_color", "blue").await;
    let first_tx = gateway.respond_later(first.descriptor()).await;
    let second = controller.set_filter("eye_color", "red").await;
    let second_tx = gateway.respond_later(second.descriptor()).await;
    assert!(second.generation() > first.generation());

    let first_run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.execute(first).await }
    });
    let second_run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.execute(second).await }
    });

    second_tx
        .send(Ok(page_body(&["Owen Lars"], 1, 1)))
        .expect("send second");
    assert_eq!(
        second_run.await.expect("join second"),
        QueryOutcome::Applied(LoadStatus::Ready)
    );

    first_tx
        .send(Ok(page_body(&["Luke", "Leia"], 2, 1)))
        .expect("send first");
    assert_eq!(
        first_run.await.expect("join first"),
        QueryOutcome::Discarded {
            generation: 1,
            latest: 2
        }
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.view.status, LoadStatus::Ready);
    assert_eq!(names(&snapshot.view), vec!["Owen Lars"]);
    assert_eq!(snapshot.view.total, 1);
}

#[tokio::test]
async fn only_latest_of_concurrent_queries_is_applied() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let mut tickets = Vec::new();
    for (term, name) in [("l", "Luke"), ("le", "Leia"), ("lei", "Leia Organa")] {
        let ticket = controller.set_search_term(term).await;
        gateway
            .respond_now(ticket.descriptor(), Ok(page_body(&[name], 1, 1)))
            .await;
        tickets.push(ticket);
    }

    let outcomes = futures::future::join_all(
        tickets
            .into_iter()
            .rev()
            .map(|ticket| controller.execute(ticket)),
    )
    .await;

    assert_eq!(
        outcomes,
        vec![
            QueryOutcome::Applied(LoadStatus::Ready),
            QueryOutcome::Discarded {
                generation: 2,
                latest: 3
            },
            QueryOutcome::Discarded {
                generation: 1,
                latest: 3
            },
        ]
    );
    assert_eq!(names(&controller.snapshot().await.view), vec!["Leia Organa"]);
}

#[tokio::test]
async fn late_failure_of_superseded_query_is_ignored() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let stale = controller.set_search_term("luke").await;
    let stale_tx = gateway.respond_later(stale.descriptor()).await;
    let fresh = controller.set_search_term("leia").await;
    gateway
        .respond_now(fresh.descriptor(), Ok(page_body(&["Leia Organa"], 1, 1)))
        .await;

    let stale_run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.execute(stale).await }
    });
    controller.execute(fresh).await;

    stale_tx
        .send(Err(GatewayError::Api(ApiError::from_status(500))))
        .expect("send stale");
    assert!(matches!(
        stale_run.await.expect("join"),
        QueryOutcome::Discarded { .. }
    ));
    assert_eq!(controller.status().await, LoadStatus::Ready);
}

#[tokio::test]
async fn query_issued_while_loading_supersedes_unanswered_one() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let older = controller.mount().await;
    gateway
        .respond_now(older.descriptor(), Ok(page_body(&["Luke"], 1, 1)))
        .await;
    let _newer = controller.set_sort("name").await;

    assert!(matches!(
        controller.execute(older).await,
        QueryOutcome::Discarded { .. }
    ));
    assert_eq!(controller.status().await, LoadStatus::Loading);
    assert!(controller.snapshot().await.view.items.is_empty());
}

#[test]
fn reconcile_keeps_total_and_rows_unmodified() {
    let names_in: Vec<String> = (1..=15).map(|i| format!("Person {i}")).collect();
    let refs: Vec<&str> = names_in.iter().map(String::as_str).collect();
    let body = page_body(&refs, 42, 2);

    let mut view = ListView::<Person>::default();
    view.reconcile(body.clone());

    assert_eq!(view.status, LoadStatus::Ready);
    assert_eq!(view.total, 42);
    let expected: Vec<Person> =
        serde_json::from_value(body["items"].clone()).expect("decode expected rows");
    assert_eq!(view.items, expected);
    let meta = view.meta.expect("meta");
    assert_eq!(meta.page, 2);
    assert_eq!(meta.pages, 3);
}

#[test]
fn empty_collection_reconciles_to_zero_pages() {
    let mut view = ListView::<Person>::default();
    view.reconcile(json!({
        "items": [],
        "total": 0,
        "page": 1,
        "size": 15,
        "pages": 1,
        "has_next": false,
        "has_prev": false,
    }));

    assert_eq!(view.status, LoadStatus::Ready);
    assert_eq!(view.total, 0);
    assert_eq!(view.meta.expect("meta").pages, 0);
}

#[tokio::test]
async fn response_without_items_becomes_no_data_error() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let ticket = controller.mount().await;
    gateway.respond_now(ticket.descriptor(), Ok(json!({}))).await;
    let outcome = controller.execute(ticket).await;

    assert_eq!(
        outcome,
        QueryOutcome::Applied(LoadStatus::Error(ListFailure::NoData))
    );
    let snapshot = controller.snapshot().await;
    assert!(snapshot.view.items.is_empty());
    assert_eq!(snapshot.view.total, 0);
    assert_eq!(ListFailure::NoData.to_string(), NO_DATA_MESSAGE);
}

#[tokio::test]
async fn transport_failure_clears_rows_and_retry_recovers() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let ticket = controller.mount().await;
    gateway
        .respond_now(ticket.descriptor(), Ok(page_body(&["Luke"], 16, 1)))
        .await;
    controller.execute(ticket).await;

    let ticket = controller.set_page(1).await;
    gateway
        .respond_now(
            ticket.descriptor(),
            Err(GatewayError::Api(ApiError::from_status(503))),
        )
        .await;
    controller.execute(ticket.clone()).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(
        snapshot.view.status,
        LoadStatus::Error(ListFailure::Transport("HTTP error! status: 503".into()))
    );
    assert!(snapshot.view.items.is_empty());
    assert_eq!(snapshot.view.total, 0);

    let retry = controller.retry().await;
    assert_eq!(retry.descriptor(), ticket.descriptor());
    assert!(retry.generation() > ticket.generation());
    assert_eq!(controller.status().await, LoadStatus::Loading);

    gateway
        .respond_now(retry.descriptor(), Ok(page_body(&["Biggs"], 16, 2)))
        .await;
    controller.execute(retry).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.view.status, LoadStatus::Ready);
    assert_eq!(names(&snapshot.view), vec!["Biggs"]);
    assert_eq!(gateway.seen().await.len(), 3);
}

#[tokio::test]
async fn undecodable_rows_surface_as_transport_error() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let ticket = controller.mount().await;
    gateway
        .respond_now(ticket.descriptor(), Ok(json!({ "items": [{ "id": 1 }] })))
        .await;
    let outcome = controller.execute(ticket).await;

    let QueryOutcome::Applied(LoadStatus::Error(ListFailure::Transport(message))) = &outcome else {
        panic!("expected transport failure, got {outcome:?}");
    };
    assert!(message.contains("name"), "unexpected message: {message}");
}

#[tokio::test]
async fn controller_transitions_reset_page_and_toggle_sort() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);

    let ticket = controller.set_page(4).await;
    assert_eq!(ticket.descriptor().page, 5);

    let ticket = controller.set_sort("name").await;
    assert_eq!(ticket.descriptor().page, 1);
    assert_eq!(ticket.descriptor().sort_order, Some(SortDirection::Asc));

    let ticket = controller.set_sort("name").await;
    assert_eq!(ticket.descriptor().sort_order, Some(SortDirection::Desc));

    controller.set_page(2).await;
    let ticket = controller.set_page_size(50).await.expect("allowed size");
    assert_eq!(ticket.descriptor().page, 1);
    assert_eq!(ticket.descriptor().size, 50);
    assert_eq!(ticket.descriptor().sort_by.as_deref(), Some("name"));

    controller.set_page(2).await;
    let ticket = controller.clear_sort().await;
    assert_eq!(ticket.descriptor().page, 1);
    assert_eq!(ticket.descriptor().sort_by, None);
}

#[tokio::test]
async fn rejected_page_size_issues_nothing() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);
    let before = controller.snapshot().await.generation;

    let err = controller.set_page_size(20).await.expect_err("20 is not allowed");

    assert_eq!(err, ListStateError::PageSizeNotAllowed(20));
    assert_eq!(controller.snapshot().await.generation, before);
    assert_eq!(controller.status().await, LoadStatus::Idle);
}

#[tokio::test]
async fn subscribers_see_loading_ready_and_stale_events() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller(&gateway);
    let mut events = controller.subscribe();

    let stale = controller.mount().await;
    gateway
        .respond_now(stale.descriptor(), Ok(page_body(&["Luke"], 1, 1)))
        .await;
    let fresh = controller.set_filter("gender", "male").await;
    gateway
        .respond_now(fresh.descriptor(), Ok(page_body(&["Han"], 1, 1)))
        .await;
    controller.execute(fresh).await;
    controller.execute(stale).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            ListEvent::StatusChanged {
                generation: 1,
                status: LoadStatus::Loading
            },
            ListEvent::StatusChanged {
                generation: 2,
                status: LoadStatus::Loading
            },
            ListEvent::StatusChanged {
                generation: 2,
                status: LoadStatus::Ready
            },
            ListEvent::StaleDiscarded {
                generation: 1,
                latest: 2
            },
        ]
    );
}
