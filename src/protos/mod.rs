//! Wire-level message types exchanged with the Temporal service while an activity runs. These
//! mirror the upstream `temporal.api` definitions for the handful of messages the activity
//! context needs, so they encode identically.

use std::collections::HashMap;

/// Identifies an activity type.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct ActivityType {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Identifies a workflow type.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct WorkflowType {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// Identity of a specific workflow run.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct WorkflowExecution {
    #[prost(string, tag = "1")]
    pub workflow_id: String,
    #[prost(string, tag = "2")]
    pub run_id: String,
}

/// A single serialized value along with metadata describing its encoding.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    #[prost(map = "string, bytes", tag = "1")]
    pub metadata: HashMap<String, Vec<u8>>,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// An ordered list of payloads, used for multi-value inputs and heartbeat details.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payloads {
    #[prost(message, repeated, tag = "1")]
    pub payloads: Vec<Payload>,
}

/// Headers propagated alongside a task.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(map = "string, message", tag = "1")]
    pub fields: HashMap<String, Payload>,
}

/// An activity task as delivered by the service in response to a poll.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActivityTask {
    /// Opaque token identifying this attempt. Must be echoed back on heartbeat and completion.
    #[prost(bytes = "vec", tag = "1")]
    pub task_token: Vec<u8>,
    #[prost(string, tag = "2")]
    pub workflow_namespace: String,
    #[prost(message, optional, tag = "3")]
    pub workflow_type: Option<WorkflowType>,
    #[prost(message, optional, tag = "4")]
    pub workflow_execution: Option<WorkflowExecution>,
    #[prost(message, optional, tag = "5")]
    pub activity_type: Option<ActivityType>,
    #[prost(string, tag = "6")]
    pub activity_id: String,
    #[prost(message, optional, tag = "7")]
    pub header: Option<Header>,
    /// Details from the last heartbeat of a previous attempt, if there was one.
    #[prost(message, optional, tag = "9")]
    pub heartbeat_details: Option<Payloads>,
    #[prost(message, optional, tag = "10")]
    pub scheduled_time: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "12")]
    pub started_time: Option<::prost_types::Timestamp>,
    /// Starts at 1 and is incremented for every retry.
    #[prost(uint32, tag = "13")]
    pub attempt: u32,
    #[prost(message, optional, tag = "14")]
    pub schedule_to_close_timeout: Option<::prost_types::Duration>,
    #[prost(message, optional, tag = "15")]
    pub start_to_close_timeout: Option<::prost_types::Duration>,
    #[prost(message, optional, tag = "16")]
    pub heartbeat_timeout: Option<::prost_types::Duration>,
    #[prost(string, tag = "20")]
    pub task_queue: String,
}

/// Response to recording an activity heartbeat.
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct RecordActivityTaskHeartbeatResponse {
    /// Set when the workflow has requested cancellation of the activity.
    #[prost(bool, tag = "1")]
    pub cancel_requested: bool,
}

impl Payloads {
    /// Returns true if there are no payloads
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl From<Vec<Payload>> for Payloads {
    fn from(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }
}

impl ActivityType {
    /// Create an activity type from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl WorkflowType {
    /// Create a workflow type from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl WorkflowExecution {
    /// Create a workflow execution reference from a workflow id and run id
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_types_compare_by_value() {
        assert_eq!(ActivityType::new("charge"), ActivityType::new("charge"));
        assert_ne!(ActivityType::new("charge"), ActivityType::new("refund"));
    }

    #[test]
    fn empty_payloads() {
        assert!(Payloads::default().is_empty());
        assert!(!Payloads::from(vec![Payload::default()]).is_empty());
    }
}
