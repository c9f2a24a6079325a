//! Order status vocabulary and the fulfillment transition table.
//!
//! Fulfillment status (where the parcel is) and payment status (where the
//! money is) are orthogonal; refund progress is a third axis. Only the
//! fulfillment axis has admin-driven transitions worth a table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where the money is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Where the parcel is. Serialized capitalized, matching the admin UI and the
/// stored records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum FulfillmentStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Refund progress, orthogonal to fulfillment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    None,
    Requested,
    Processed,
}

impl FulfillmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FulfillmentStatus::Cancelled)
    }
}

/// Validates a fulfillment transition. Forward-only among
/// Processing → Shipped → Delivered (skipping Shipped is still forward);
/// Cancelled is reachable from everything except itself; Cancelled admits no
/// exits. Repeating the current non-terminal status is a no-op success.
pub fn is_valid_transition(from: FulfillmentStatus, to: FulfillmentStatus) -> bool {
    use FulfillmentStatus::*;

    match (from, to) {
        (Cancelled, _) => false,
        (_, Cancelled) => true,
        (Processing, Shipped) => true,
        (Processing, Delivered) => true,
        (Shipped, Delivered) => true,
        _ if from == to => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use FulfillmentStatus::*;

    #[test]
    fn forward_transitions_allowed() {
        assert!(is_valid_transition(Processing, Shipped));
        assert!(is_valid_transition(Shipped, Delivered));
        assert!(is_valid_transition(Processing, Delivered));
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(!is_valid_transition(Delivered, Processing));
        assert!(!is_valid_transition(Delivered, Shipped));
        assert!(!is_valid_transition(Shipped, Processing));
    }

    #[test]
    fn cancel_reachable_from_everything_but_itself() {
        assert!(is_valid_transition(Processing, Cancelled));
        assert!(is_valid_transition(Shipped, Cancelled));
        assert!(is_valid_transition(Delivered, Cancelled));
        assert!(!is_valid_transition(Cancelled, Cancelled));
    }

    #[test]
    fn cancelled_is_terminal() {
        for to in [Processing, Shipped, Delivered, Cancelled] {
            assert!(!is_valid_transition(Cancelled, to));
        }
    }

    #[test]
    fn same_status_is_noop() {
        assert!(is_valid_transition(Processing, Processing));
        assert!(is_valid_transition(Shipped, Shipped));
        assert!(is_valid_transition(Delivered, Delivered));
    }

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(FulfillmentStatus::Processing.to_string(), "Processing");
        assert_eq!(
            FulfillmentStatus::from_str("Shipped").unwrap(),
            FulfillmentStatus::Shipped
        );
        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
        assert_eq!(
            PaymentStatus::from_str("refunded").unwrap(),
            PaymentStatus::Refunded
        );
        assert_eq!(RefundStatus::None.to_string(), "none");
        assert_eq!(
            RefundStatus::from_str("requested").unwrap(),
            RefundStatus::Requested
        );
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(FulfillmentStatus::from_str("Pending").is_err());
        assert!(FulfillmentStatus::from_str("processing").is_err());
    }
}
