//! The per-invocation activity environment, how it gets attached to a [Context], and the accessors
//! activity code uses to read it back.
//!
//! Attaching a task produces a new context; the context it was derived from is left untouched,
//! and attaching a second task to an already-attached context shadows the first one.
//!
//! ```
//! use temporal_activity_context::{
//!     Context, activity_info, protos::{ActivityTask, ActivityType}, with_activity_task,
//! };
//!
//! let task = ActivityTask {
//!     activity_id: "charge-1".to_string(),
//!     activity_type: Some(ActivityType::new("charge")),
//!     attempt: 1,
//!     ..Default::default()
//! };
//! let ctx = with_activity_task(&Context::background(), task, Default::default());
//! let info = activity_info(&ctx).unwrap();
//! assert_eq!(info.activity_type.name, "charge");
//! assert_eq!(info.attempt, 1);
//! assert!(!info.is_local);
//! ```

mod deadline;
mod heartbeat;

pub use deadline::compute_deadline;
pub use heartbeat::{HeartbeatDetails, record_activity_heartbeat};

use crate::{
    context::Context,
    converter::{DataConverter, EncodedValues, FromPayloads, default_data_converter},
    errors::ActivityContextError,
    invoker::ServiceInvoker,
    logging::Logger,
    propagation::ContextPropagator,
    protos::{ActivityTask, ActivityType, Header, Payloads, WorkflowExecution, WorkflowType},
    task_token::TaskToken,
    telemetry::{Tracer, metrics::MetricsScope},
    worker_stop::WorkerStopSignal,
};
use deadline::{deadline_from_task, duration_or_zero, timestamp_to_system_time};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Information about a running activity, as seen by activity code
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityInfo {
    /// Identifies this attempt to the service. Empty for local activities.
    pub task_token: TaskToken,
    /// Type of the workflow which scheduled the activity
    pub workflow_type: WorkflowType,
    /// Namespace of the workflow which scheduled the activity
    pub workflow_namespace: String,
    /// Execution of the workflow which scheduled the activity
    pub workflow_execution: WorkflowExecution,
    /// Unique within the scheduling workflow execution
    pub activity_id: String,
    #[allow(missing_docs)]
    pub activity_type: ActivityType,
    /// Task queue the activity was dispatched on
    pub task_queue: String,
    /// Maximum time between heartbeats. Zero means heartbeating is not required.
    pub heartbeat_timeout: Duration,
    /// When the activity was first scheduled
    pub scheduled_time: Option<SystemTime>,
    /// When this attempt started
    pub started_time: Option<SystemTime>,
    /// Time by which this attempt must complete. `None` if it could not be computed.
    pub deadline: Option<SystemTime>,
    /// Starts at 1 and increments for every retry. Never 0: an unset attempt is reported as 1.
    pub attempt: u32,
    /// True if the activity runs in the workflow worker's process without a server round trip
    pub is_local: bool,
}

/// Everything a running activity can reach through its context. Built once per task right before
/// the activity body runs and never changed afterwards.
pub(crate) struct ActivityEnvironment {
    pub(crate) info: ActivityInfo,
    pub(crate) heartbeat_details: Option<Payloads>,
    pub(crate) header: Header,
    pub(crate) data_converter: Arc<dyn DataConverter>,
    pub(crate) logger: Logger,
    pub(crate) metrics_scope: MetricsScope,
    pub(crate) tracer: Option<Tracer>,
    pub(crate) service_invoker: Option<Arc<dyn ServiceInvoker>>,
    pub(crate) worker_stop_signal: WorkerStopSignal,
    pub(crate) context_propagators: Vec<Arc<dyn ContextPropagator>>,
}

impl ActivityEnvironment {
    pub(crate) fn from_context(ctx: &Context) -> Result<&Self, ActivityContextError> {
        ctx.value::<Self>()
            .ok_or(ActivityContextError::MissingEnvironment)
    }

    fn attach(self, ctx: &Context) -> Context {
        ctx.with_value(self)
    }
}

impl Debug for ActivityEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityEnvironment")
            .field("info", &self.info)
            .field("has_heartbeat_details", &self.heartbeat_details.is_some())
            .field("has_service_invoker", &self.service_invoker.is_some())
            .field("context_propagators", &self.context_propagators.len())
            .finish_non_exhaustive()
    }
}

/// Worker-owned collaborators handed to every remote activity the worker runs. Anything not
/// supplied falls back to a harmless default: no service invoker (heartbeats are logged and
/// dropped), a logger rooted at the current span, a no-op metrics scope, the JSON converter and a
/// stop signal which never fires.
#[derive(Clone, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct ActivityCollaborators {
    /// Used to send heartbeats to the service
    #[builder(setter(strip_option), default)]
    pub service_invoker: Option<Arc<dyn ServiceInvoker>>,
    /// Base logger, enriched with the activity's identity before being exposed
    #[builder(default)]
    pub logger: Logger,
    /// Metrics recorded by activity code go here
    #[builder(default)]
    pub metrics_scope: MetricsScope,
    /// Encodes heartbeat details and decodes those of previous attempts
    #[builder(default = "default_data_converter()")]
    pub data_converter: Arc<dyn DataConverter>,
    /// Fires when the worker begins a graceful shutdown
    #[builder(default)]
    pub worker_stop_signal: WorkerStopSignal,
    /// Exposed to activity code for carrying context across further calls
    #[builder(default)]
    pub context_propagators: Vec<Arc<dyn ContextPropagator>>,
    /// Tracer activity code may create its own spans with
    #[builder(setter(strip_option), default)]
    pub tracer: Option<Tracer>,
}

impl Default for ActivityCollaborators {
    fn default() -> Self {
        Self {
            service_invoker: None,
            logger: Logger::default(),
            metrics_scope: MetricsScope::default(),
            data_converter: default_data_converter(),
            worker_stop_signal: WorkerStopSignal::default(),
            context_propagators: vec![],
            tracer: None,
        }
    }
}

/// Attach the environment for a task delivered by the service, returning the new context.
/// Does no I/O.
pub fn with_activity_task(
    ctx: &Context,
    task: ActivityTask,
    collaborators: ActivityCollaborators,
) -> Context {
    let ActivityTask {
        task_token,
        workflow_namespace,
        workflow_type,
        workflow_execution,
        activity_type,
        activity_id,
        header,
        heartbeat_details,
        scheduled_time,
        started_time,
        attempt,
        schedule_to_close_timeout,
        start_to_close_timeout,
        heartbeat_timeout,
        task_queue,
    } = task;
    let deadline = deadline_from_task(
        scheduled_time.as_ref(),
        started_time.as_ref(),
        schedule_to_close_timeout.as_ref(),
        start_to_close_timeout.as_ref(),
    );
    let info = ActivityInfo {
        task_token: TaskToken(task_token),
        workflow_type: workflow_type.unwrap_or_default(),
        workflow_namespace,
        workflow_execution: workflow_execution.unwrap_or_default(),
        activity_id,
        activity_type: activity_type.unwrap_or_default(),
        task_queue,
        heartbeat_timeout: duration_or_zero(heartbeat_timeout.as_ref()),
        scheduled_time: timestamp_to_system_time(scheduled_time.as_ref()),
        started_time: timestamp_to_system_time(started_time.as_ref()),
        deadline,
        // Tasks that never went through the service's retry machinery carry attempt 0
        attempt: attempt.max(1),
        is_local: false,
    };
    let ActivityCollaborators {
        service_invoker,
        logger,
        metrics_scope,
        data_converter,
        worker_stop_signal,
        context_propagators,
        tracer,
    } = collaborators;

    ActivityEnvironment {
        logger: logger.for_activity(&info),
        info,
        heartbeat_details,
        header: header.unwrap_or_default(),
        data_converter,
        metrics_scope,
        tracer,
        service_invoker,
        worker_stop_signal,
        context_propagators,
    }
    .attach(ctx)
}

/// The parts of the owning workflow's info a local activity inherits
#[derive(Clone, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct WorkflowInfo {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub task_queue: String,
    pub namespace: String,
}

/// A local activity scheduled in-process by a running workflow
#[derive(Clone, Debug)]
pub struct LocalActivityTask {
    /// Info of the workflow that scheduled this local activity
    pub workflow_info: WorkflowInfo,
    /// Unique within the scheduling workflow execution
    pub activity_id: String,
    #[allow(missing_docs)]
    pub activity_type: ActivityType,
    /// Starts at 1 and increments for every retry
    pub attempt: u32,
    /// Headers set by the scheduling workflow
    pub header: Option<Header>,
    /// When the workflow scheduled the activity
    pub scheduled_time: SystemTime,
    /// When this attempt started
    pub started_time: SystemTime,
    /// Zero means only the start-to-close timeout bounds the attempt
    pub schedule_to_close_timeout: Duration,
    /// Bounds this attempt, measured from `started_time`
    pub start_to_close_timeout: Duration,
}

impl LocalActivityTask {
    /// A first attempt scheduled and started now, with no timeouts set
    pub fn new(
        workflow_info: WorkflowInfo,
        activity_id: impl Into<String>,
        activity_type: ActivityType,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            workflow_info,
            activity_id: activity_id.into(),
            activity_type,
            attempt: 1,
            header: None,
            scheduled_time: now,
            started_time: now,
            schedule_to_close_timeout: Duration::ZERO,
            start_to_close_timeout: Duration::ZERO,
        }
    }
}

/// Attach the environment for a local activity, returning the new context. When no base context
/// is given the environment is attached to a fresh background context.
///
/// Local activities have no task token and no service invoker, so heartbeating them does nothing.
/// Their stop signal never fires.
pub fn with_local_activity_task(
    ctx: Option<&Context>,
    task: LocalActivityTask,
    logger: Logger,
    metrics_scope: MetricsScope,
    data_converter: Arc<dyn DataConverter>,
) -> Context {
    let LocalActivityTask {
        workflow_info,
        activity_id,
        activity_type,
        attempt,
        header,
        scheduled_time,
        started_time,
        schedule_to_close_timeout,
        start_to_close_timeout,
    } = task;
    let info = ActivityInfo {
        task_token: TaskToken::default(),
        workflow_type: workflow_info.workflow_type,
        workflow_namespace: workflow_info.namespace,
        workflow_execution: workflow_info.workflow_execution,
        activity_id,
        activity_type,
        task_queue: workflow_info.task_queue,
        heartbeat_timeout: Duration::ZERO,
        scheduled_time: Some(scheduled_time),
        started_time: Some(started_time),
        deadline: compute_deadline(
            scheduled_time,
            started_time,
            schedule_to_close_timeout,
            start_to_close_timeout,
        ),
        attempt: attempt.max(1),
        is_local: true,
    };
    let env = ActivityEnvironment {
        logger: logger.for_activity(&info),
        info,
        heartbeat_details: None,
        header: header.unwrap_or_default(),
        data_converter,
        metrics_scope,
        tracer: None,
        service_invoker: None,
        worker_stop_signal: WorkerStopSignal::default(),
        context_propagators: vec![],
    };
    match ctx {
        Some(ctx) => env.attach(ctx),
        None => env.attach(&Context::background()),
    }
}

/// Info about the activity running under `ctx`
pub fn activity_info(ctx: &Context) -> Result<ActivityInfo, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.info.clone())
}

/// True if a previous attempt of this activity recorded heartbeat details
pub fn has_heartbeat_details(ctx: &Context) -> Result<bool, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?
        .heartbeat_details
        .is_some())
}

/// Decode the details recorded by the last heartbeat of a previous attempt. `T` is usually a tuple
/// with one element per recorded value, see [FromPayloads].
///
/// Returns [ActivityContextError::NoData] if there are no such details.
pub fn heartbeat_details<T: FromPayloads>(ctx: &Context) -> Result<T, ActivityContextError> {
    let env = ActivityEnvironment::from_context(ctx)?;
    let payloads = env
        .heartbeat_details
        .as_ref()
        .ok_or(ActivityContextError::NoData)?;
    EncodedValues::new(payloads, env.data_converter.as_ref())
        .get()
        .map_err(ActivityContextError::Decoding)
}

/// Logger already carrying the activity's identifying fields
pub fn activity_logger(ctx: &Context) -> Result<Logger, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.logger.clone())
}

/// Metrics scope for recording activity-specific metrics
pub fn activity_metrics_scope(ctx: &Context) -> Result<MetricsScope, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.metrics_scope.clone())
}

/// Signal which fires when the worker running this activity begins a graceful shutdown. Firing
/// does not cancel the activity, it is a hint to wrap up before the worker's grace period ends.
pub fn worker_stop_signal(ctx: &Context) -> Result<WorkerStopSignal, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?
        .worker_stop_signal
        .clone())
}

/// The converter heartbeat details are encoded with
pub fn activity_data_converter(
    ctx: &Context,
) -> Result<Arc<dyn DataConverter>, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.data_converter.clone())
}

/// Headers delivered with the task
pub fn activity_headers(ctx: &Context) -> Result<&Header, ActivityContextError> {
    Ok(&ActivityEnvironment::from_context(ctx)?.header)
}

/// Tracer for creating spans from activity code, if the worker was configured with one
pub fn activity_tracer(ctx: &Context) -> Result<Option<Tracer>, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.tracer.clone())
}

/// Propagators configured on the worker, in the order they should be applied
pub fn context_propagators(
    ctx: &Context,
) -> Result<&[Arc<dyn ContextPropagator>], ActivityContextError> {
    Ok(&ActivityEnvironment::from_context(ctx)?.context_propagators)
}

/// True if the activity is running as a local activity
pub fn is_local_activity(ctx: &Context) -> Result<bool, ActivityContextError> {
    Ok(ActivityEnvironment::from_context(ctx)?.info.is_local)
}

#[cfg(test)]
pub(crate) mod test_help {
    use super::*;
    use crate::protos::Payload;
    use prost_types::Timestamp;
    use std::collections::HashMap;

    pub(crate) fn t0() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn pb_secs(seconds: i64) -> prost_types::Duration {
        prost_types::Duration { seconds, nanos: 0 }
    }

    /// A first-attempt task scheduled at [t0], started two seconds later, with a 30s
    /// schedule-to-close, 10s start-to-close and 5s heartbeat timeout.
    pub(crate) fn remote_task() -> ActivityTask {
        ActivityTask {
            task_token: vec![1, 2, 3],
            workflow_namespace: "payments".to_string(),
            workflow_type: Some(WorkflowType::new("checkout")),
            workflow_execution: Some(WorkflowExecution::new("order-42", "run-7")),
            activity_type: Some(ActivityType::new("charge")),
            activity_id: "act-1".to_string(),
            header: Some(Header {
                fields: HashMap::from([("tenant".to_string(), Payload::default())]),
            }),
            heartbeat_details: None,
            scheduled_time: Some(Timestamp::from(t0())),
            started_time: Some(Timestamp::from(t0() + Duration::from_secs(2))),
            attempt: 1,
            schedule_to_close_timeout: Some(pb_secs(30)),
            start_to_close_timeout: Some(pb_secs(10)),
            heartbeat_timeout: Some(pb_secs(5)),
            task_queue: "payments-tq".to_string(),
        }
    }

    pub(crate) fn workflow_info() -> WorkflowInfo {
        WorkflowInfo {
            workflow_execution: WorkflowExecution::new("order-42", "run-7"),
            workflow_type: WorkflowType::new("checkout"),
            task_queue: "payments-tq".to_string(),
            namespace: "payments".to_string(),
        }
    }
}
