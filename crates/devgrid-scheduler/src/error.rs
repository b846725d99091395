//! Scheduler error types.

use thiserror::Error;

/// Protocol errors detected by the coordinator-side registry.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("device already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("device busy: {device} is running {container}")]
    DeviceBusy { device: String, container: String },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
