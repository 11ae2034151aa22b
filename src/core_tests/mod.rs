//! Scenarios exercising the activity context the way a worker and activity code use it together

use crate::{
    ActivityCollaboratorsBuilder, ActivityContextError, BatchingInvokerOptionsBuilder,
    BatchingServiceInvoker, Context, HeartbeatDetails, JsonDataConverter, ServiceInvoker,
    WorkerStopHandle,
    activity::test_help::{remote_task, t0},
    activity_info, activity_logger, encode_args, has_heartbeat_details, heartbeat_details,
    invoker::MockWorkerClient,
    protos::{Payloads, RecordActivityTaskHeartbeatResponse, WorkflowExecution},
    record_activity_heartbeat, stop_signal, with_activity_task, worker_stop_signal,
};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

/// What a worker does before running an activity body: a cancellable context, an invoker wired to
/// cancel it, and the environment attached on top.
fn start_activity(
    client: MockWorkerClient,
    heartbeat_details: Option<Payloads>,
) -> (Context, Arc<BatchingServiceInvoker>, WorkerStopHandle) {
    let (ctx, cancel_handle) = Context::background().with_cancel();
    let (stop_handle, stop) = stop_signal();
    let mut task = remote_task();
    task.heartbeat_details = heartbeat_details;
    let invoker = Arc::new(BatchingServiceInvoker::new(
        Arc::new(client),
        BatchingInvokerOptionsBuilder::default()
            .task_token(task.task_token.clone())
            .heartbeat_timeout(Duration::from_secs(5))
            .cancel_handle(cancel_handle)
            .worker_stop_signal(stop.clone())
            .build()
            .unwrap(),
    ));
    let ctx = with_activity_task(
        &ctx,
        task,
        ActivityCollaboratorsBuilder::default()
            .service_invoker(invoker.clone())
            .worker_stop_signal(stop)
            .build()
            .unwrap(),
    );
    (ctx, invoker, stop_handle)
}

#[tokio::test(start_paused = true)]
async fn fresh_remote_context_reports_task_identity() {
    let (ctx, _, _stop) = start_activity(MockWorkerClient::new(), None);
    let info = activity_info(&ctx).unwrap();
    assert_eq!(info.attempt, 1);
    assert_eq!(
        info.workflow_execution,
        WorkflowExecution {
            workflow_id: "order-42".to_string(),
            run_id: "run-7".to_string(),
        }
    );
    assert_eq!(info.deadline, Some(t0() + Duration::from_secs(12)));
    assert!(info.deadline >= info.started_time);
}

#[tokio::test(start_paused = true)]
async fn server_cancellation_reaches_the_activity_body() {
    let mut client = MockWorkerClient::new();
    client
        .expect_record_activity_heartbeat()
        .times(1)
        .returning(|_, _| {
            Ok(RecordActivityTaskHeartbeatResponse {
                cancel_requested: true,
            })
        });
    let (ctx, invoker, _stop) = start_activity(client, None);

    let body = tokio::spawn({
        let ctx = ctx.clone();
        async move {
            let mut processed = 0_u64;
            loop {
                processed += 1;
                // Heartbeat failures are never surfaced to the body
                record_activity_heartbeat(&ctx, (&processed).into()).await?;
                tokio::select! {
                    _ = ctx.cancelled() => return Ok::<_, ActivityContextError>(processed),
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    });
    let processed = tokio::time::timeout(Duration::from_secs(30), body)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(processed, 1);
    invoker.close(ctx, false).await;
}

#[tokio::test(start_paused = true)]
async fn retry_resumes_from_recorded_progress() {
    let recorded = Arc::new(Mutex::new(vec![]));
    let mut client = MockWorkerClient::new();
    let recorded_clone = recorded.clone();
    client
        .expect_record_activity_heartbeat()
        .returning(move |_, d| {
            recorded_clone.lock().push(d);
            Ok(RecordActivityTaskHeartbeatResponse::default())
        });

    // First attempt heartbeats twice within one batching window, then fails
    let (ctx, invoker, _stop) = start_activity(client, None);
    assert!(!has_heartbeat_details(&ctx).unwrap());
    record_activity_heartbeat(&ctx, HeartbeatDetails::values(&[&10_u64, &"page-1"]))
        .await
        .unwrap();
    record_activity_heartbeat(&ctx, HeartbeatDetails::values(&[&20_u64, &"page-2"]))
        .await
        .unwrap();
    invoker.close(ctx, true).await;

    let last = recorded.lock().last().cloned().flatten();
    assert_eq!(
        last,
        Some(encode_args(&JsonDataConverter, &[&20_u64, &"page-2"]).unwrap())
    );

    // The service hands the last details to the next attempt
    let (ctx, _, _stop) = start_activity(MockWorkerClient::new(), last);
    let (count, page): (u64, String) = heartbeat_details(&ctx).unwrap();
    assert_eq!((count, page.as_str()), (20, "page-2"));
}

#[tokio::test(start_paused = true)]
async fn worker_shutdown_is_visible_and_flushes_heartbeats() {
    let flushed = Arc::new(AtomicBool::new(false));
    let mut client = MockWorkerClient::new();
    let flushed_clone = flushed.clone();
    client
        .expect_record_activity_heartbeat()
        .returning(move |_, d| {
            if d.is_some() {
                flushed_clone.store(true, Ordering::SeqCst);
            }
            Ok(RecordActivityTaskHeartbeatResponse::default())
        });
    let (ctx, _, stop_handle) = start_activity(client, None);

    record_activity_heartbeat(&ctx, HeartbeatDetails::Nil)
        .await
        .unwrap();
    record_activity_heartbeat(&ctx, (&"almost done").into())
        .await
        .unwrap();
    assert!(!flushed.load(Ordering::SeqCst));

    let signal = worker_stop_signal(&ctx).unwrap();
    stop_handle.stop();
    signal.stopping().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(flushed.load(Ordering::SeqCst));
    // Shutting down is a hint, not a cancellation
    assert!(!ctx.is_cancelled());
    activity_logger(&ctx).unwrap().info("wrapping up before shutdown");
}
