#![forbid(unsafe_code)]

use std::sync::Arc;

use kdeck_core::{ExecError, MutationError, WorkloadKind};
use kdeck_exec::MockCluster;
use kdeck_view::{DeleteErrorPolicy, RecordingNavigator, ViewConfig, ViewContext, WorkloadRef, WorkloadView};
use serde_json::json;

fn setup(config: ViewConfig) -> (Arc<MockCluster>, Arc<RecordingNavigator>, ViewContext) {
    let mock = Arc::new(MockCluster::demo());
    let nav = Arc::new(RecordingNavigator::new());
    let ctx = ViewContext::new(mock.clone(), nav.clone()).with_config(config);
    (mock, nav, ctx)
}

#[tokio::test]
async fn delete_navigates_once_to_the_collection() {
    let (mock, nav, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    let outcome = view.delete_resource().wait().await.unwrap();
    assert_eq!(outcome.route, "/default/deployments");
    assert!(outcome.navigated);
    assert_eq!(nav.paths(), vec!["/default/deployments".to_string()]);
    assert!(mock.get("default", "deploy", "web").is_none());
}

#[tokio::test]
async fn delete_failure_is_only_logged_by_default() {
    let (mock, nav, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    mock.fail_once("delete deploy web", ExecError::Exit { code: Some(1), stderr: "forbidden".into() });
    let err = view.delete_resource().wait().await.unwrap_err();
    assert!(matches!(err, MutationError::Exec(_)));
    assert!(nav.paths().is_empty());

    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.notice, None);
    assert_eq!(panel.name, "web");
}

#[tokio::test]
async fn delete_failure_surfaces_when_configured() {
    let (mock, nav, ctx) = setup(ViewConfig::default().with_delete_errors(DeleteErrorPolicy::Surface));
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    mock.fail_once("delete deploy web", ExecError::Api("connection reset".into()));
    assert!(view.delete_resource().wait().await.is_err());
    assert!(nav.paths().is_empty());
    let panel = view.settle().await.into_ready().unwrap();
    assert!(panel.notice.unwrap().starts_with("delete failed"));
}

#[tokio::test]
async fn delete_after_unmount_does_not_navigate() {
    let (mock, nav, ctx) = setup(ViewConfig::default());
    let view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    mock.pause();
    let ticket = view.delete_resource();
    drop(view);
    mock.resume();
    let outcome = ticket.wait().await.unwrap();
    assert!(!outcome.navigated);
    assert!(nav.paths().is_empty());
}

#[tokio::test]
async fn routes_follow_the_workload_kind() {
    let (mock, nav, ctx) = setup(ViewConfig::default());
    mock.insert(
        "prod",
        "statefulset",
        json!({ "metadata": { "name": "db", "labels": { "app": "db" } }, "spec": { "replicas": 1 } }),
    )
    .unwrap();
    let mut view = WorkloadView::mount(ctx, WorkloadRef::new("prod", WorkloadKind::StatefulSet, "db"));
    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.replicas, Some(1));

    assert_eq!(view.request_edit(), "/prod/statefulsets/db/edit");
    let outcome = view.delete_resource().wait().await.unwrap();
    assert_eq!(outcome.route, "/prod/statefulsets");
    assert_eq!(nav.paths(), vec!["/prod/statefulsets/db/edit".to_string(), "/prod/statefulsets".to_string()]);
    assert_eq!(mock.count("delete sts db"), 1);
}
