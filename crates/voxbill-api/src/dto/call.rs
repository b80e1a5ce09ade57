//! Call record DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use voxbill_core::models::CallRecord;

/// Call record ingestion request, written at call termination
///
/// The cost is computed server-side from the account's rates; the
/// call-handling layer only reports what happened.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CallRecordCreateRequest {
    /// Call identifier from the PBX (generated when absent)
    pub call_uuid: Option<String>,

    /// Owning account
    pub account_id: i32,

    /// Caller number
    #[validate(length(min = 1, max = 30, message = "Caller number is required"))]
    pub caller_number: String,

    /// Dialed number
    #[validate(length(min = 1, max = 30, message = "Called number is required"))]
    pub called_number: String,

    /// Call start timestamp (defaults to now)
    pub start_time: Option<DateTime<Utc>>,

    /// Duration in seconds
    #[validate(range(min = 0, max = 86400))]
    pub duration_secs: i32,

    /// Completion status: answered, busy, failed, no_answer
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

/// Call record list query
#[derive(Debug, Clone, Deserialize)]
pub struct CallListParams {
    /// Filter by account
    pub account_id: Option<i32>,

    /// Records starting at or after this time
    pub start_date: Option<DateTime<Utc>>,

    /// Records starting at or before this time
    pub end_date: Option<DateTime<Utc>>,
}

/// Call record response
#[derive(Debug, Clone, Serialize)]
pub struct CallRecordResponse {
    pub id: i64,
    pub call_uuid: String,
    pub account_id: i32,
    pub caller_number: String,
    pub called_number: String,
    pub start_time: DateTime<Utc>,
    pub duration_secs: i32,
    pub cost: Decimal,
    pub status: String,
    pub billed: bool,
}

impl From<CallRecord> for CallRecordResponse {
    fn from(record: CallRecord) -> Self {
        Self {
            id: record.id,
            call_uuid: record.call_uuid,
            account_id: record.account_id,
            caller_number: record.caller_number,
            called_number: record.called_number,
            start_time: record.start_time,
            duration_secs: record.duration_secs,
            cost: record.cost,
            status: record.status.to_string(),
            billed: record.billed,
        }
    }
}
