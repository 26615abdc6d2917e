//! Assembly-task lifecycle statuses
//!
//! Status flow: NEW → IN_TECHNICAL_SUPPLY | IN_HANGING_SUPPLY →
//! IN_FINAL_SUPPLY → SENT_TO_1C → DELIVERED, with the fictitious/blocked
//! side states written by the move and shipment flows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    InTechnicalSupply,
    InHangingSupply,
    InFinalSupply,
    SentTo1c,
    Delivered,
    FictitiousDelivered,
    PartiallyShipped,
    BlockedAlreadyDelivered,
    BlockedCanceled,
    BlockedInvalidStatus,
    ShippedWithBlock,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::InTechnicalSupply => "IN_TECHNICAL_SUPPLY",
            OrderStatus::InHangingSupply => "IN_HANGING_SUPPLY",
            OrderStatus::InFinalSupply => "IN_FINAL_SUPPLY",
            OrderStatus::SentTo1c => "SENT_TO_1C",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::FictitiousDelivered => "FICTITIOUS_DELIVERED",
            OrderStatus::PartiallyShipped => "PARTIALLY_SHIPPED",
            OrderStatus::BlockedAlreadyDelivered => "BLOCKED_ALREADY_DELIVERED",
            OrderStatus::BlockedCanceled => "BLOCKED_CANCELED",
            OrderStatus::BlockedInvalidStatus => "BLOCKED_INVALID_STATUS",
            OrderStatus::ShippedWithBlock => "SHIPPED_WITH_BLOCK",
        }
    }

    /// Block status for an order that failed move pre-validation, keyed by the
    /// supplierStatus WB reported:
    /// - `complete` -> BLOCKED_ALREADY_DELIVERED
    /// - `cancel` -> BLOCKED_CANCELED
    /// - anything else (including the error placeholder) -> BLOCKED_INVALID_STATUS
    pub fn from_blocked_supplier_status(supplier_status: &str) -> OrderStatus {
        match supplier_status {
            "complete" => OrderStatus::BlockedAlreadyDelivered,
            "cancel" => OrderStatus::BlockedCanceled,
            _ => OrderStatus::BlockedInvalidStatus,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "IN_TECHNICAL_SUPPLY" => Ok(OrderStatus::InTechnicalSupply),
            "IN_HANGING_SUPPLY" => Ok(OrderStatus::InHangingSupply),
            "IN_FINAL_SUPPLY" => Ok(OrderStatus::InFinalSupply),
            "SENT_TO_1C" => Ok(OrderStatus::SentTo1c),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "FICTITIOUS_DELIVERED" => Ok(OrderStatus::FictitiousDelivered),
            "PARTIALLY_SHIPPED" => Ok(OrderStatus::PartiallyShipped),
            "BLOCKED_ALREADY_DELIVERED" => Ok(OrderStatus::BlockedAlreadyDelivered),
            "BLOCKED_CANCELED" => Ok(OrderStatus::BlockedCanceled),
            "BLOCKED_INVALID_STATUS" => Ok(OrderStatus::BlockedInvalidStatus),
            "SHIPPED_WITH_BLOCK" => Ok(OrderStatus::ShippedWithBlock),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_roundtrip_all_statuses() {
        let statuses = [
            OrderStatus::New,
            OrderStatus::InTechnicalSupply,
            OrderStatus::InHangingSupply,
            OrderStatus::InFinalSupply,
            OrderStatus::SentTo1c,
            OrderStatus::Delivered,
            OrderStatus::FictitiousDelivered,
            OrderStatus::PartiallyShipped,
            OrderStatus::BlockedAlreadyDelivered,
            OrderStatus::BlockedCanceled,
            OrderStatus::BlockedInvalidStatus,
            OrderStatus::ShippedWithBlock,
        ];
        for status in statuses {
            assert_eq!(OrderStatus::from_str(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_blocked_status_mapping() {
        assert_eq!(
            OrderStatus::from_blocked_supplier_status("complete"),
            OrderStatus::BlockedAlreadyDelivered
        );
        assert_eq!(
            OrderStatus::from_blocked_supplier_status("cancel"),
            OrderStatus::BlockedCanceled
        );
        assert_eq!(
            OrderStatus::from_blocked_supplier_status("error"),
            OrderStatus::BlockedInvalidStatus
        );
        assert_eq!(
            OrderStatus::from_blocked_supplier_status("new"),
            OrderStatus::BlockedInvalidStatus
        );
    }
}
