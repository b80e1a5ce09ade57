//! Capacity and call-event DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use voxbill_core::models::ChannelInfo;

/// Call start/end event from the call-handling layer
#[derive(Debug, Clone, Deserialize)]
pub struct CallEventRequest {
    /// The account originating the call
    pub account_id: i32,
}

/// Admission decision
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionResponse {
    /// Whether the call may proceed
    pub admitted: bool,
}

/// Channel information response
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfoResponse {
    pub holder_id: i32,
    pub holder_role: String,
    pub max_channels: i32,
    pub active_channels: i32,
    pub available_channels: i32,
    pub utilization_percent: Decimal,
    pub pooled: bool,
}

impl From<ChannelInfo> for ChannelInfoResponse {
    fn from(info: ChannelInfo) -> Self {
        Self {
            holder_id: info.holder_id,
            holder_role: info.holder_role.to_string(),
            max_channels: info.max_channels,
            active_channels: info.active_channels,
            available_channels: info.available_channels,
            utilization_percent: info.utilization_percent,
            pooled: info.pooled,
        }
    }
}
