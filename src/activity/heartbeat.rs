use super::ActivityEnvironment;
use crate::{
    context::Context,
    converter::{DataConverter, PayloadConversionError, encode_args},
    errors::ActivityContextError,
    protos::Payloads,
};

/// Progress reported with a heartbeat.
///
/// [HeartbeatDetails::Absent] and [HeartbeatDetails::Nil] both report liveness without a payload.
/// Anything in [HeartbeatDetails::Values] is encoded with the activity's data converter, one
/// payload per value, and handed to the next attempt if this one fails.
#[derive(Clone, Default)]
pub enum HeartbeatDetails<'a> {
    /// No details were given
    #[default]
    Absent,
    /// A single explicitly empty detail
    Nil,
    /// Values to encode, in order
    Values(Vec<&'a (dyn erased_serde::Serialize + Sync)>),
}

impl<'a> HeartbeatDetails<'a> {
    /// Details made of `values`, in order. An empty slice is the same as [HeartbeatDetails::Absent].
    pub fn values(values: &[&'a (dyn erased_serde::Serialize + Sync)]) -> Self {
        if values.is_empty() {
            Self::Absent
        } else {
            Self::Values(values.to_vec())
        }
    }

    fn encode(
        self,
        converter: &dyn DataConverter,
    ) -> Result<Option<Payloads>, PayloadConversionError> {
        match self {
            Self::Absent | Self::Nil => Ok(None),
            Self::Values(v) if v.is_empty() => Ok(None),
            Self::Values(v) => encode_args(converter, &v).map(Some),
        }
    }
}

impl<'a, T> From<Option<&'a T>> for HeartbeatDetails<'a>
where
    T: serde::Serialize + Sync,
{
    fn from(value: Option<&'a T>) -> Self {
        match value {
            Some(v) => Self::Values(vec![v as &(dyn erased_serde::Serialize + Sync)]),
            None => Self::Nil,
        }
    }
}

impl<'a, T> From<&'a T> for HeartbeatDetails<'a>
where
    T: serde::Serialize + Sync,
{
    fn from(value: &'a T) -> Self {
        Self::Values(vec![value as &(dyn erased_serde::Serialize + Sync)])
    }
}

/// Report that the activity running under `ctx` is still alive, along with optional progress.
///
/// Heartbeating a local activity does nothing. For remote activities the details are encoded and
/// handed to the service invoker, which decides whether to send them right away or fold them into
/// a later heartbeat. Failures reported by the invoker, including the activity having been
/// cancelled, are logged at debug level and otherwise ignored: cancellation reaches activity code
/// through its context.
///
/// Fails only if the details cannot be encoded, or `ctx` is not an activity context. An encoding
/// failure is a bug in the calling activity and should be propagated out of it with `?`.
pub async fn record_activity_heartbeat(
    ctx: &Context,
    details: HeartbeatDetails<'_>,
) -> Result<(), ActivityContextError> {
    let env = ActivityEnvironment::from_context(ctx)?;
    if env.info.is_local {
        return Ok(());
    }
    let payloads = details
        .encode(env.data_converter.as_ref())
        .map_err(ActivityContextError::Encoding)?;
    let Some(invoker) = env.service_invoker.as_ref() else {
        env.logger
            .debug("No service invoker attached, dropping heartbeat");
        return Ok(());
    };
    if let Err(err) = invoker.heartbeat(ctx.clone(), payloads, false).await {
        env.logger
            .in_scope(|| debug!(error = %err, "RecordActivityHeartbeat with error"));
    }
    Ok(())
}
