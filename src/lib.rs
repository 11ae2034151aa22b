#![warn(missing_docs)] // error if there are missing docs

//! This crate provides the execution context Temporal activities run under.
//!
//! When a worker receives an activity task it attaches an immutable activity environment to a
//! [Context] with [with_activity_task] (or [with_local_activity_task] for local activities) and
//! runs the activity body with the resulting context. Activity code then reads its
//! [ActivityInfo], logger, metrics scope and worker stop signal through the accessor functions,
//! and reports liveness with [record_activity_heartbeat].
//!
//! Everything the context needs from the Temporal service goes through the [ServiceInvoker]
//! trait. [BatchingServiceInvoker] is the implementation workers use in production; tests can
//! substitute their own.

#[macro_use]
extern crate tracing;
#[cfg(test)]
#[macro_use]
extern crate assert_matches;

mod activity;
mod context;
mod converter;
mod errors;
mod invoker;
mod logging;
mod propagation;
#[allow(missing_docs)]
pub mod protos;
mod task_token;
pub mod telemetry;
mod worker_stop;

#[cfg(test)]
mod core_tests;

pub use activity::{
    ActivityCollaborators, ActivityCollaboratorsBuilder, ActivityCollaboratorsBuilderError,
    ActivityInfo, HeartbeatDetails, LocalActivityTask, WorkflowInfo, activity_data_converter,
    activity_headers, activity_info, activity_logger, activity_metrics_scope, activity_tracer,
    compute_deadline, context_propagators, has_heartbeat_details, heartbeat_details,
    is_local_activity, record_activity_heartbeat, with_activity_task, with_local_activity_task,
    worker_stop_signal,
};
pub use context::{CancelHandle, Context};
pub use converter::{
    DataConverter, EncodedValues, FromPayloads, JsonDataConverter, PayloadConversionError,
    decode_payload, default_data_converter, encode_args,
};
pub use errors::ActivityContextError;
pub use invoker::{
    BatchingInvokerOptions, BatchingInvokerOptionsBuilder, BatchingInvokerOptionsBuilderError,
    BatchingServiceInvoker, Client, ClientOptions, ClientOptionsBuilder, ClientOptionsBuilderError,
    DEFAULT_HEARTBEAT_INTERVAL, InvokerError, ServiceInvoker, WorkerClient,
};
pub use logging::Logger;
pub use propagation::ContextPropagator;
pub use task_token::TaskToken;
pub use telemetry::telemetry_init;
pub use worker_stop::{WorkerStopHandle, WorkerStopSignal, stop_signal};
