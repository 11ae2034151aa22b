use super::{Client, ClientOptions, InvokerError, ServiceInvoker};
use crate::{
    context::{CancelHandle, Context},
    protos::{Payloads, RecordActivityTaskHeartbeatResponse},
    task_token::TaskToken,
    worker_stop::WorkerStopSignal,
};
use futures_util::{FutureExt, future::BoxFuture};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Bounds a heartbeat call when the activity has no heartbeat timeout
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// The RPCs the batching invoker needs from the service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WorkerClient: Send + Sync {
    /// Record a heartbeat for the activity attempt identified by `task_token`
    async fn record_activity_heartbeat(
        &self,
        task_token: TaskToken,
        details: Option<Payloads>,
    ) -> Result<RecordActivityTaskHeartbeatResponse, tonic::Status>;

    /// Get a client for workflow service calls with the provided options
    fn workflow_client(&self, options: ClientOptions) -> Arc<dyn Client>;
}

/// Per-activity configuration for a [BatchingServiceInvoker]
#[derive(Clone, Debug, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct BatchingInvokerOptions {
    /// Token of the attempt heartbeats are recorded for
    #[builder(setter(into))]
    pub task_token: TaskToken,
    /// The activity's heartbeat timeout. Batching windows last 80% of it, or 80% of
    /// `default_heartbeat_interval` when it is zero.
    #[builder(default)]
    pub heartbeat_timeout: Duration,
    /// Cancels the activity's context once the service reports it cancelled or gone
    pub cancel_handle: CancelHandle,
    /// A batching window ends early once this fires
    #[builder(default)]
    pub worker_stop_signal: WorkerStopSignal,
    /// Stands in for `heartbeat_timeout` when that is zero
    #[builder(default = "DEFAULT_HEARTBEAT_INTERVAL")]
    pub default_heartbeat_interval: Duration,
}

/// [ServiceInvoker] which throttles heartbeats to the service.
///
/// A heartbeat is sent immediately when no batching window is open. A successful send opens a
/// window lasting 80% of the heartbeat timeout (or of the default interval when the activity has
/// none), during which further heartbeats only replace the
/// pending details. When the window ends (or the worker starts shutting down) the latest pending
/// details, if any, are sent. Heartbeats requesting `skip_batching` are always sent immediately and
/// supersede whatever was pending.
///
/// When the service reports that the activity was cancelled, or that it no longer knows about it,
/// the activity's context is cancelled.
#[derive(Clone)]
pub struct BatchingServiceInvoker {
    inner: Arc<Inner>,
}

impl BatchingServiceInvoker {
    /// Create an invoker for one activity attempt
    pub fn new(client: Arc<dyn WorkerClient>, options: BatchingInvokerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                opts: options,
                state: Mutex::new(BatchState::default()),
                closed: CancellationToken::new(),
            }),
        }
    }
}

impl Debug for BatchingServiceInvoker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchingServiceInvoker")
            .field("task_token", &self.inner.opts.task_token)
            .field("heartbeat_timeout", &self.inner.opts.heartbeat_timeout)
            .field("closed", &self.inner.closed.is_cancelled())
            .finish()
    }
}

#[async_trait::async_trait]
impl ServiceInvoker for BatchingServiceInvoker {
    async fn heartbeat(
        &self,
        ctx: Context,
        details: Option<Payloads>,
        skip_batching: bool,
    ) -> Result<(), InvokerError> {
        self.inner.heartbeat(ctx, details, skip_batching).await
    }

    async fn close(&self, ctx: Context, flush_buffered_heartbeat: bool) {
        self.inner.close(ctx, flush_buffered_heartbeat).await
    }

    fn client(&self, options: ClientOptions) -> Arc<dyn Client> {
        self.inner.client.workflow_client(options)
    }
}

struct Inner {
    client: Arc<dyn WorkerClient>,
    opts: BatchingInvokerOptions,
    state: Mutex<BatchState>,
    closed: CancellationToken,
}

#[derive(Default)]
struct BatchState {
    window_open: bool,
    /// Latest details reported while the window was open. The inner option is the (possibly
    /// empty) details themselves.
    pending: Option<Option<Payloads>>,
}

impl Inner {
    async fn heartbeat(
        self: &Arc<Self>,
        ctx: Context,
        details: Option<Payloads>,
        skip_batching: bool,
    ) -> Result<(), InvokerError> {
        if self.closed.is_cancelled() {
            return Err(InvokerError::Closed);
        }
        let mut state = self.state.lock().await;
        if state.window_open && !skip_batching {
            state.pending = Some(details);
            return Ok(());
        }
        self.send(&mut state, ctx, details).await
    }

    async fn close(self: &Arc<Self>, ctx: Context, flush_buffered_heartbeat: bool) {
        let mut state = self.state.lock().await;
        self.closed.cancel();
        if !state.window_open {
            return;
        }
        let pending = state.pending.take();
        if let (true, Some(details)) = (flush_buffered_heartbeat, pending) {
            if let Err(e) = self.send(&mut state, ctx, details).await {
                debug!(task_token = %self.opts.task_token, error = %e,
                       "Flushing buffered heartbeat on close failed");
            }
        }
    }

    /// The heartbeat timeout, or the default interval when the activity has none
    fn effective_timeout(&self) -> Duration {
        if self.opts.heartbeat_timeout.is_zero() {
            self.opts.default_heartbeat_interval
        } else {
            self.opts.heartbeat_timeout
        }
    }

    // Boxed since the task flushing a window calls back in here. Callers hold the state lock for
    // the whole call, so sends never interleave.
    fn send<'a>(
        self: &'a Arc<Self>,
        state: &'a mut BatchState,
        ctx: Context,
        details: Option<Payloads>,
    ) -> BoxFuture<'a, Result<(), InvokerError>> {
        async move {
            // Whatever was pending is older than what goes out now
            state.pending = None;
            let timeout = self.effective_timeout();
            if ctx.is_cancelled() {
                return Err(InvokerError::ContextCancelled);
            }
            let rpc = self
                .client
                .record_activity_heartbeat(self.opts.task_token.clone(), details);
            let res = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(InvokerError::ContextCancelled),
                r = tokio::time::timeout(timeout, rpc) => match r {
                    Err(_) => Err(InvokerError::Timeout(timeout)),
                    Ok(Ok(RecordActivityTaskHeartbeatResponse { cancel_requested: true })) => {
                        Err(InvokerError::ActivityCanceled)
                    }
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(s)) => Err(InvokerError::Rpc(s)),
                },
            };

            let canceled = match &res {
                Err(InvokerError::ActivityCanceled) => true,
                // The activity or its workflow is gone, nothing left to heartbeat for
                Err(InvokerError::Rpc(s)) if s.code() == tonic::Code::NotFound => true,
                Err(InvokerError::Rpc(s)) => {
                    warn!(task_token = %self.opts.task_token, "Error when recording heartbeat: {:?}", s);
                    false
                }
                _ => false,
            };
            if canceled {
                debug!(task_token = %self.opts.task_token, "Activity cancelled during heartbeat");
                self.opts.cancel_handle.cancel();
            }
            if res.is_ok() || canceled {
                self.open_window(state, ctx);
            }
            res
        }
        .boxed()
    }

    fn open_window(self: &Arc<Self>, state: &mut BatchState, ctx: Context) {
        if state.window_open || self.closed.is_cancelled() {
            return;
        }
        state.window_open = true;
        let window = self.effective_timeout().mul_f64(0.8);
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(window) => {}
                _ = this.opts.worker_stop_signal.stopping() => {}
                _ = this.closed.cancelled() => {}
            }
            let mut state = this.state.lock().await;
            state.window_open = false;
            if this.closed.is_cancelled() {
                return;
            }
            if let Some(details) = state.pending.take() {
                if let Err(e) = this.send(&mut state, ctx, details).await {
                    debug!(task_token = %this.opts.task_token, error = %e,
                           "Sending batched heartbeat failed");
                }
            }
        });
    }
}
