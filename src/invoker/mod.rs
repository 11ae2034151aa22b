//! The seam between activity code and the Temporal service. Everything the activity context needs
//! from the service goes through [ServiceInvoker], so activities can be unit tested against a fake
//! implementation without a live server.

mod batching;

pub use batching::{
    BatchingInvokerOptions, BatchingInvokerOptionsBuilder, BatchingInvokerOptionsBuilderError,
    BatchingServiceInvoker, DEFAULT_HEARTBEAT_INTERVAL, WorkerClient,
};
#[cfg(test)]
pub(crate) use batching::MockWorkerClient;

use crate::{context::Context, protos::Payloads};
use std::{fmt::Debug, sync::Arc, time::Duration};
use url::Url;

/// Abstracts calls to the Temporal service made on behalf of one running activity.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ServiceInvoker: Send + Sync {
    /// Record a heartbeat carrying `details`. Implementations may buffer the heartbeat unless
    /// `skip_batching` is set. Returns [InvokerError::ActivityCanceled] if the activity has been
    /// cancelled or no longer exists.
    async fn heartbeat(
        &self,
        ctx: Context,
        details: Option<Payloads>,
        skip_batching: bool,
    ) -> Result<(), InvokerError>;

    /// Stop accepting heartbeats. If `flush_buffered_heartbeat` is set, any buffered heartbeat is
    /// sent first.
    async fn close(&self, ctx: Context, flush_buffered_heartbeat: bool);

    /// Get a client for talking to the service with the provided options
    fn client(&self, options: ClientOptions) -> Arc<dyn Client>;
}

/// Errors reported by a [ServiceInvoker]. Heartbeat dispatch from activity code only ever logs
/// these.
#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    /// The activity was cancelled, or it (or its workflow) no longer exists
    #[error("Activity was cancelled or no longer exists")]
    ActivityCanceled,
    /// Unhandled error when calling the temporal server
    #[error("Unhandled error when calling the temporal server: {0:?}")]
    Rpc(#[from] tonic::Status),
    /// The heartbeat call did not complete within its timeout
    #[error("Heartbeat did not complete within {0:?}")]
    Timeout(Duration),
    /// The context the heartbeat was made under was cancelled before the call completed
    #[error("Context cancelled before the heartbeat completed")]
    ContextCancelled,
    /// The invoker has been closed
    #[error("Invoker is closed")]
    Closed,
}

/// Options for connecting to the service
#[derive(Clone, Debug, derive_builder::Builder)]
#[builder(setter(into))]
#[non_exhaustive]
pub struct ClientOptions {
    /// The URL of the Temporal server to connect to
    pub target_url: Url,
    /// The namespace requests are made in
    #[builder(default = "\"default\".to_string()")]
    pub namespace: String,
    /// A human-readable string that can identify this process
    #[builder(default)]
    pub identity: String,
}

/// A connection to the service, as handed out by [ServiceInvoker::client]
pub trait Client: Send + Sync + Debug {
    /// The options this client was created with
    fn options(&self) -> &ClientOptions;
}
