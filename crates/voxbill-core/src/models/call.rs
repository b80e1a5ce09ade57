//! Call record model
//!
//! Usage records written by the call-handling layer at call termination.
//! Immutable once created except for the billed flag, which the invoice
//! generator sets exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Call completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Call was answered and carries billable duration
    #[default]
    Answered,
    /// Destination was busy
    Busy,
    /// Call setup failed
    Failed,
    /// Rang out without answer
    NoAnswer,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Answered => write!(f, "answered"),
            CallStatus::Busy => write!(f, "busy"),
            CallStatus::Failed => write!(f, "failed"),
            CallStatus::NoAnswer => write!(f, "no_answer"),
        }
    }
}

impl CallStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "answered" => Some(CallStatus::Answered),
            "busy" => Some(CallStatus::Busy),
            "failed" => Some(CallStatus::Failed),
            "no_answer" => Some(CallStatus::NoAnswer),
            _ => None,
        }
    }

    /// Only answered calls are ever billed
    #[inline]
    pub fn is_billable(&self) -> bool {
        matches!(self, CallStatus::Answered)
    }
}

/// Call record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier
    pub id: i64,

    /// Call identifier from the call-handling layer
    pub call_uuid: String,

    /// Owning account
    pub account_id: i32,

    /// Caller number (CLI)
    pub caller_number: String,

    /// Called number (dialed digits)
    pub called_number: String,

    /// Call start timestamp
    pub start_time: DateTime<Utc>,

    /// Duration in seconds
    pub duration_secs: i32,

    /// Cost computed at call time from the account's rates
    pub cost: Decimal,

    /// Completion status
    pub status: CallStatus,

    /// Whether this record has been included in an invoice
    pub billed: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Duration in minutes as a decimal
    pub fn minutes(&self) -> Decimal {
        Decimal::from(self.duration_secs) / Decimal::from(60)
    }

    /// Duration for display as mm:ss
    pub fn duration_display(&self) -> String {
        let mins = self.duration_secs / 60;
        let secs = self.duration_secs % 60;
        format!("{:02}:{:02}", mins, secs)
    }
}

impl Default for CallRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            call_uuid: Uuid::new_v4().to_string(),
            account_id: 0,
            caller_number: String::new(),
            called_number: String::new(),
            start_time: now,
            duration_secs: 0,
            cost: Decimal::ZERO,
            status: CallStatus::Answered,
            billed: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_only_answered_is_billable() {
        assert!(CallStatus::Answered.is_billable());
        assert!(!CallStatus::Busy.is_billable());
        assert!(!CallStatus::Failed.is_billable());
        assert!(!CallStatus::NoAnswer.is_billable());
    }

    #[test]
    fn test_minutes() {
        let record = CallRecord {
            duration_secs: 90,
            ..Default::default()
        };
        assert_eq!(record.minutes(), dec!(1.5));
    }

    #[test]
    fn test_duration_display() {
        let record = CallRecord {
            duration_secs: 125,
            ..Default::default()
        };
        assert_eq!(record.duration_display(), "02:05");
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(CallStatus::from_str("no_answer"), Some(CallStatus::NoAnswer));
        assert_eq!(CallStatus::NoAnswer.to_string(), "no_answer");
        assert_eq!(CallStatus::from_str("ANSWERED"), Some(CallStatus::Answered));
    }
}
