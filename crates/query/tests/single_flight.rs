#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kdeck_core::QueryKey;
use kdeck_exec::MockCluster;
use kdeck_query::{QueryClient, QueryState};

const GET_WEB: &str = "get deployment web";

fn setup() -> (Arc<MockCluster>, QueryClient) {
    let mock = Arc::new(MockCluster::demo());
    let client = QueryClient::new(mock.clone());
    (mock, client)
}

async fn yield_to_tasks() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn concurrent_subscribers_share_one_execution() {
    let (mock, client) = setup();
    mock.pause();
    let mut a = client.subscribe(QueryKey::new("default", GET_WEB));
    let mut b = client.subscribe(QueryKey::new("default", GET_WEB));
    yield_to_tasks().await;
    assert_eq!(mock.count(GET_WEB), 1);
    assert!(a.current().is_pending());
    assert!(b.current().is_pending());

    mock.resume();
    let (sa, sb) = futures::join!(a.settled(), b.settled());
    let (da, db) = (sa.data().cloned().unwrap(), sb.data().cloned().unwrap());
    assert!(Arc::ptr_eq(&da, &db));
    assert_eq!(da["spec"]["replicas"], 3);
    assert_eq!(client.executions(a.key()), 1);
    assert_eq!(client.len(), 1);
}

#[tokio::test]
async fn late_subscriber_gets_cached_data_without_refetch() {
    let (mock, client) = setup();
    let mut first = client.subscribe(QueryKey::new("default", GET_WEB));
    first.settled().await;

    let later = client.subscribe(QueryKey::new("default", GET_WEB));
    assert!(matches!(later.current(), QueryState::Resolved(_)));
    yield_to_tasks().await;
    assert_eq!(mock.count(GET_WEB), 1);
}

#[tokio::test]
async fn revalidate_burst_runs_one_follow_up() {
    let (mock, client) = setup();
    let mut h = client.subscribe(QueryKey::new("default", GET_WEB));
    h.settled().await;

    mock.pause();
    h.revalidate();
    h.revalidate();
    h.revalidate();
    yield_to_tasks().await;
    // one running (held by the pause), the rest folded into a single rerun
    assert_eq!(mock.count(GET_WEB), 2);
    assert!(h.current().is_refreshing());

    mock.resume();
    yield_to_tasks().await;
    let s = h.settled().await;
    assert!(matches!(s, QueryState::Resolved(_)));
    assert_eq!(mock.count(GET_WEB), 3);
    assert_eq!(client.executions(h.key()), 3);
}

#[tokio::test]
async fn never_more_than_one_execution_in_flight() {
    let mock = Arc::new(MockCluster::demo().with_latency(Duration::from_millis(15)));
    let client = QueryClient::new(mock.clone());
    let key = QueryKey::new("default", GET_WEB);
    let handles: Vec<_> = (0..8).map(|_| client.subscribe(key.clone())).collect();
    for h in handles.iter() {
        h.revalidate();
    }
    let mut h = handles[0].clone();
    h.settled().await;
    yield_to_tasks().await;
    // initial run plus exactly one coalesced follow-up
    assert_eq!(mock.count(GET_WEB), 2);
}

#[tokio::test]
async fn keys_differ_by_scope_and_command() {
    let (mock, client) = setup();
    let mut a = client.subscribe(QueryKey::new("default", GET_WEB));
    let mut b = client.subscribe(QueryKey::new("staging", GET_WEB));
    let mut c = client.subscribe(QueryKey::new("default", "get pods -l=app=web"));
    a.settled().await;
    b.settled().await;
    c.settled().await;
    assert_eq!(client.len(), 3);
    assert_eq!(mock.calls().len(), 3);
    assert!(matches!(b.current(), QueryState::Failed { .. }));
}
