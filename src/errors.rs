use crate::converter::PayloadConversionError;

/// Errors returned by the activity context accessors and heartbeat dispatch
#[derive(thiserror::Error, Debug)]
pub enum ActivityContextError {
    /// The context was not produced by attaching an activity task. Accessors and heartbeating are
    /// only meaningful inside running activity code.
    #[error("Context has no activity environment attached")]
    MissingEnvironment,
    /// There are no heartbeat details from a previous attempt to decode
    #[error("No heartbeat details are available")]
    NoData,
    /// Heartbeat details could not be encoded by the data converter
    #[error("Failed to encode heartbeat details: {0}")]
    Encoding(#[source] PayloadConversionError),
    /// Heartbeat details from a previous attempt could not be decoded into the requested type
    #[error("Failed to decode heartbeat details: {0}")]
    Decoding(#[source] PayloadConversionError),
}
