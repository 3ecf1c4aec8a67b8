//! Terminal results of a dispatch invocation

use std::fmt;

/// Why an invocation ended without attempting delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The trigger carried no document snapshot
    MissingRecord,
    /// `status` was not exactly `"active"`
    Inactive { status: Option<String> },
    /// The record has no usable `userId`
    MissingUserId,
    /// No profile exists for the triggering user
    UnknownUser { user_id: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRecord => write!(f, "no record data"),
            SkipReason::Inactive { status: Some(status) } => write!(f, "status is {:?}", status),
            SkipReason::Inactive { status: None } => write!(f, "no status"),
            SkipReason::MissingUserId => write!(f, "no userId"),
            SkipReason::UnknownUser { user_id } => write!(f, "user {} not found", user_id),
        }
    }
}

/// Result of handling one emergency record
///
/// Every variant is terminal; none is retried or reported upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Preconditions not met, nothing was sent
    Skipped(SkipReason),
    /// No contact resolved to a push token
    NoRecipients {
        contacts: usize,
        lookup_failures: usize,
    },
    /// The multicast was handed to the push service
    Delivered {
        success_count: usize,
        failure_count: usize,
        lookup_failures: usize,
    },
    /// The push service rejected the whole request
    SendFailed { reason: String },
    /// Reading the triggering user failed
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            DispatchOutcome::NoRecipients {
                contacts,
                lookup_failures,
            } => write!(
                f,
                "no recipients ({} contacts, {} lookup failures)",
                contacts, lookup_failures
            ),
            DispatchOutcome::Delivered {
                success_count,
                failure_count,
                ..
            } => write!(f, "delivered ({} ok, {} failed)", success_count, failure_count),
            DispatchOutcome::SendFailed { reason } => write!(f, "send failed: {}", reason),
            DispatchOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
