use prost_types::{Duration as PbDuration, Timestamp};
use std::time::{Duration, SystemTime};

/// Compute the absolute time by which an activity attempt must complete.
///
/// The start-to-close deadline (`started + start_to_close`) always applies. A non-zero
/// schedule-to-close timeout adds a second deadline (`scheduled + schedule_to_close`) and the
/// earlier of the two wins. Returns `None` only if either sum cannot be represented.
pub fn compute_deadline(
    scheduled: SystemTime,
    started: SystemTime,
    schedule_to_close: Duration,
    start_to_close: Duration,
) -> Option<SystemTime> {
    let start_to_close_deadline = started.checked_add(start_to_close)?;
    if schedule_to_close > Duration::ZERO {
        let schedule_to_close_deadline = scheduled.checked_add(schedule_to_close)?;
        Some(schedule_to_close_deadline.min(start_to_close_deadline))
    } else {
        Some(start_to_close_deadline)
    }
}

/// Deadline for a task as delivered over the wire. Both timestamps must be present; absent (or
/// negative) timeouts count as zero.
pub(crate) fn deadline_from_task(
    scheduled: Option<&Timestamp>,
    started: Option<&Timestamp>,
    schedule_to_close: Option<&PbDuration>,
    start_to_close: Option<&PbDuration>,
) -> Option<SystemTime> {
    let scheduled = SystemTime::try_from(*scheduled?).ok()?;
    let started = SystemTime::try_from(*started?).ok()?;
    compute_deadline(
        scheduled,
        started,
        duration_or_zero(schedule_to_close),
        duration_or_zero(start_to_close),
    )
}

pub(crate) fn duration_or_zero(d: Option<&PbDuration>) -> Duration {
    d.and_then(|d| Duration::try_from(*d).ok())
        .unwrap_or_default()
}

pub(crate) fn timestamp_to_system_time(ts: Option<&Timestamp>) -> Option<SystemTime> {
    ts.and_then(|ts| SystemTime::try_from(*ts).ok())
}
