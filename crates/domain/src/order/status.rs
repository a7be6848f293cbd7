//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an order.
///
/// Allowed transitions:
/// ```text
/// pending ──┬──► confirmed ──► processing ──► shipped ──► out_for_delivery ──► delivered
///           │        │              │            │                │                │
///           │        └──────────────┴──► cancelled◄──┐            └──► returned ◄──┘
///           ├──► payment_failed ──► pending          │                    │
///           │        └──────────────► cancelled ◄────┘                    ▼
///           └──► cancelled                                            refunded
/// ```
/// `cancelled` and `refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, payment not yet confirmed. The only initial status.
    #[default]
    Pending,

    /// The payment gateway reported a failed charge.
    PaymentFailed,

    /// Payment confirmed, order accepted.
    Confirmed,

    /// Order is being picked and packed.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// On the last-mile vehicle.
    OutForDelivery,

    /// Delivered to the customer.
    Delivered,

    /// Order was cancelled (terminal).
    Cancelled,

    /// A post-delivery return was accepted.
    Returned,

    /// Refund issued for a returned order (terminal).
    Refunded,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Pending,
        OrderStatus::PaymentFailed,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns the status name in wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Parses a wire-format status name.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        OrderStatus::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns the statuses reachable from `current` in a single step.
pub fn allowed_transitions(current: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match current {
        Pending => &[Confirmed, PaymentFailed, Cancelled],
        PaymentFailed => &[Pending, Cancelled],
        Confirmed => &[Processing, Cancelled],
        Processing => &[Shipped, Cancelled],
        Shipped => &[OutForDelivery, Delivered],
        OutForDelivery => &[Delivered, Returned],
        Delivered => &[Returned],
        Cancelled => &[],
        Returned => &[Refunded],
        Refunded => &[],
    }
}

/// Returns true iff the policy allows moving from `current` to `next`.
///
/// Every status write in the system consults this; a denied transition
/// must fail the operation with [`super::OrderError::InvalidTransition`]
/// rather than silently applying the change.
pub fn is_valid_transition(current: OrderStatus, next: OrderStatus) -> bool {
    allowed_transitions(current).contains(&next)
}
