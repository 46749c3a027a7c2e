#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kdeck_core::{ExecError, MutationError, ValidationError, ViewError};
use kdeck_exec::MockCluster;
use kdeck_view::{EditBuffer, RecordingNavigator, ReseedPolicy, ViewConfig, ViewContext, WorkloadRef, WorkloadView};
use serde_json::json;

const GET_WEB: &str = "get deployment web";

fn setup(config: ViewConfig) -> (Arc<MockCluster>, ViewContext) {
    let mock = Arc::new(MockCluster::demo());
    let ctx = ViewContext::new(mock.clone(), Arc::new(RecordingNavigator::new())).with_config(config);
    (mock, ctx)
}

fn scale_calls(mock: &MockCluster) -> usize {
    mock.calls().iter().filter(|c| c.command.starts_with("scale ")).count()
}

#[tokio::test]
async fn buffer_follows_fetch_then_scale_round_trip() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));

    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.replicas, Some(3));
    assert!(!panel.dirty);

    view.set_replicas(5);
    let panel = view.render().into_ready().unwrap();
    assert_eq!(panel.replicas, Some(5));
    assert!(panel.dirty);

    let ticket = view.save().unwrap();
    assert_eq!(ticket.command(), "scale deploy web --replicas=5");
    ticket.wait().await.unwrap();
    assert_eq!(mock.count("scale deploy web --replicas=5"), 1);

    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.desired, 5);
    assert_eq!(panel.replicas, Some(5));
    assert!(!panel.dirty);
    assert_eq!(view.buffer(), EditBuffer::Tracking(5));
    assert_eq!(mock.count(GET_WEB), 2);
}

#[tokio::test]
async fn input_typed_while_scale_runs_survives_completion() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    view.set_replicas(5);
    mock.pause();
    let ticket = view.save().unwrap();
    view.set_replicas(8);
    mock.resume();
    ticket.wait().await.unwrap();

    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.desired, 5);
    assert_eq!(panel.replicas, Some(8));
    assert!(panel.dirty);
    assert_eq!(view.buffer(), EditBuffer::Overridden { value: 8, source: Some(5) });
}

#[tokio::test]
async fn invalid_input_never_issues_a_command() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    assert_eq!(view.apply_scale(-1).unwrap_err(), ViewError::Validation(ValidationError::Negative(-1)));
    assert_eq!(
        view.apply_scale("abc").unwrap_err(),
        ViewError::Validation(ValidationError::NotANumber("abc".into()))
    );
    assert!(matches!(view.apply_scale(i64::MAX), Err(ViewError::Validation(ValidationError::OutOfRange(_)))));

    // typing garbage coerces to zero at input time
    view.set_replicas_text("abc");
    assert_eq!(view.buffer().value(), Some(0));
    assert!(view.render().ready().unwrap().dirty);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scale_calls(&mock), 0);
}

#[tokio::test]
async fn scale_failure_sets_notice_and_keeps_the_input() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    mock.fail_once("scale deploy web --replicas=5", ExecError::Exit { code: Some(1), stderr: "forbidden".into() });
    view.set_replicas_text(" 5 ");
    let err = view.save().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, MutationError::Exec(ExecError::Exit { .. })));

    let panel = view.settle().await.into_ready().unwrap();
    assert!(panel.notice.as_deref().unwrap_or("").contains("forbidden"));
    assert_eq!(panel.replicas, Some(5));
    assert_eq!(panel.desired, 3);
    // no revalidation after a failed scale
    assert_eq!(mock.count(GET_WEB), 1);
}

#[tokio::test]
async fn completion_after_unmount_is_discarded() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    mock.pause();
    let ticket = view.apply_scale(4).unwrap();
    drop(view);
    mock.resume();
    ticket.wait().await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.count(GET_WEB), 1);
    assert_eq!(mock.get("default", "deploy", "web").unwrap()["spec"]["replicas"], 4);
}

#[tokio::test]
async fn dropped_ticket_still_applies() {
    let (_mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    drop(view.apply_scale(2u32).unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.desired, 2);
    assert_eq!(panel.replicas, Some(2));
}

#[tokio::test]
async fn mid_edit_refetch_preserves_input_by_default() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    view.set_replicas(7);
    mock.update("default", "deploy", "web", |raw| raw["spec"]["replicas"] = json!(4));
    view.refresh();
    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.desired, 4);
    assert_eq!(panel.replicas, Some(7));
    assert!(panel.dirty);
}

#[tokio::test]
async fn mid_edit_refetch_clobbers_when_configured() {
    let (mock, ctx) = setup(ViewConfig::default().with_reseed(ReseedPolicy::Clobber));
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    view.set_replicas(7);
    mock.update("default", "deploy", "web", |raw| raw["spec"]["replicas"] = json!(4));
    view.refresh();
    let panel = view.settle().await.into_ready().unwrap();
    assert_eq!(panel.replicas, Some(4));
    assert!(!panel.dirty);
}

#[tokio::test]
async fn untouched_buffer_tracks_every_refetch() {
    let (mock, ctx) = setup(ViewConfig::default());
    let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
    view.settle().await;

    for n in [6, 1, 0] {
        mock.update("default", "deploy", "web", |raw| raw["spec"]["replicas"] = json!(n));
        view.refresh();
        let panel = view.settle().await.into_ready().unwrap();
        assert_eq!(panel.replicas, Some(n));
        assert!(!panel.dirty);
    }
}
