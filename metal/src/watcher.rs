//! Waiting for asynchronous cluster operations
//!
//! Cluster mutations return immediately while the platform keeps working.
//! [`wait_for_operation`] follows the cluster's status stream until the
//! operation succeeds, reconnecting whenever the stream drops mid-body.

use async_trait::async_trait;
use futures::StreamExt;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tfplug::Context;

use crate::api::cluster::{ClusterStatus, WatchStatusRequest};
use crate::api::{ApiError, Client, MessageStream};

/// Operation kinds reported in the status stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Reconcile,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "Create",
            OperationType::Reconcile => "Reconcile",
            OperationType::Delete => "Delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STATE_PROCESSING: &str = "Processing";
pub const STATE_SUCCEEDED: &str = "Succeeded";
pub const STATE_ERROR: &str = "Error";
pub const STATE_FAILED: &str = "Failed";
pub const STATE_PENDING: &str = "Pending";
pub const STATE_ABORTED: &str = "Aborted";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cluster watch status failed: {0}")]
    Rpc(#[from] ApiError),

    #[error("expected operation type of {expected:?}, got {got:?}")]
    UnexpectedOperation { expected: Vec<String>, got: String },

    #[error("status stream ended in state {state:?} before the operation succeeded")]
    Incomplete { state: String },

    #[error("operation did not finish before the deadline")]
    DeadlineExceeded,

    #[error("waiting for the operation was cancelled")]
    Cancelled,
}

/// Anything that can open a cluster status stream
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn watch_status(
        &self,
        request: &WatchStatusRequest,
    ) -> Result<MessageStream<ClusterStatus>, ApiError>;
}

#[async_trait]
impl StatusSource for Client {
    async fn watch_status(
        &self,
        request: &WatchStatusRequest,
    ) -> Result<MessageStream<ClusterStatus>, ApiError> {
        self.cluster().watch_status(request).await
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Bound on the whole wait, reconnects included
    pub timeout: Duration,
    pub reconnect_delay: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Block until the cluster reports `Succeeded` for one of `whitelist`
///
/// Updates of other operation types are skipped until a whitelisted one shows
/// up. After that, a foreign operation that has made progress fails the wait.
/// The mutation that started the operation is never rolled back here.
pub async fn wait_for_operation<S>(
    ctx: &Context,
    source: &S,
    request: &WatchStatusRequest,
    whitelist: &[OperationType],
    options: &WatchOptions,
) -> Result<(), WatchError>
where
    S: StatusSource + ?Sized,
{
    let watch = follow_status(source, request, whitelist, options.reconnect_delay);

    tokio::select! {
        result = tokio::time::timeout(options.timeout, watch) => {
            result.unwrap_or(Err(WatchError::DeadlineExceeded))
        }
        _ = ctx.cancelled() => {
            if ctx.deadline().is_some_and(|deadline| Instant::now() >= deadline) {
                Err(WatchError::DeadlineExceeded)
            } else {
                Err(WatchError::Cancelled)
            }
        }
    }
}

async fn follow_status<S>(
    source: &S,
    request: &WatchStatusRequest,
    whitelist: &[OperationType],
    reconnect_delay: Duration,
) -> Result<(), WatchError>
where
    S: StatusSource + ?Sized,
{
    let mut tracker = StatusTracker::new(whitelist);

    loop {
        let mut stream = source.watch_status(request).await?;

        let mut dropped = false;
        while let Some(message) = stream.next().await {
            match message {
                Ok(status) => {
                    if tracker.observe(&status)? {
                        return Ok(());
                    }
                }
                Err(e) if e.is_unexpected_eof() => {
                    dropped = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "cluster status stream failed");
                    return Err(e.into());
                }
            }
        }

        if !dropped {
            return Err(WatchError::Incomplete {
                state: tracker.last_state.unwrap_or_default(),
            });
        }

        tracing::debug!(?reconnect_delay, "cluster status stream dropped, reconnecting");
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Per-update decisions of the watch, kept across reconnects
struct StatusTracker<'a> {
    whitelist: &'a [OperationType],
    seen_valid: bool,
    last_state: Option<String>,
}

impl<'a> StatusTracker<'a> {
    fn new(whitelist: &'a [OperationType]) -> Self {
        Self {
            whitelist,
            seen_valid: false,
            last_state: None,
        }
    }

    fn allows(&self, operation_type: &str) -> bool {
        self.whitelist.iter().any(|t| t.as_str() == operation_type)
    }

    /// Ok(true) once the operation is done
    fn observe(&mut self, status: &ClusterStatus) -> Result<bool, WatchError> {
        tracing::debug!(
            progress = status.progress,
            r#type = %status.operation_type,
            state = %status.state,
            "waiting for cluster status change"
        );
        self.last_state = Some(status.state.clone());

        if status.state == STATE_SUCCEEDED {
            return Ok(true);
        }

        let allowed = self.allows(&status.operation_type);
        if !allowed && !self.seen_valid {
            return Ok(false);
        }
        self.seen_valid = true;

        if !allowed && status.progress > 0 {
            return Err(WatchError::UnexpectedOperation {
                expected: self.whitelist.iter().map(|t| t.to_string()).collect(),
                got: status.operation_type.clone(),
            });
        }

        Ok(false)
    }
}
