//! Order aggregate and related types.

mod aggregate;
mod number;
mod status;
mod value_objects;

pub use aggregate::{NewOrder, Order};
pub use number::OrderNumberGenerator;
pub use status::{OrderStatus, allowed_transitions, is_valid_transition};
pub use value_objects::{
    Actor, Address, AddressType, Cancellation, Metadata, OrderItem, OrderSource,
    Payment, PaymentMethod, PaymentStatus, Pricing, ProductSnapshot, RefundStatus, ReturnRequest,
    ReturnStatus, StatusHistoryEntry, Tracking,
};

use common::Money;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order must contain at least one item.
    #[error("Order must contain at least one item")]
    NoItems,

    /// An item quantity was zero.
    #[error("Invalid quantity for product {product_id}: must be at least 1")]
    InvalidQuantity { product_id: String },

    /// A pricing component was negative.
    #[error("Invalid pricing: {component} is negative ({amount})")]
    NegativePricing { component: &'static str, amount: Money },

    /// The pricing breakdown does not add up.
    #[error("Inconsistent pricing: total {total} != subtotal {subtotal} + tax {tax} + shipping {shipping} - discount {discount}")]
    InconsistentPricing {
        subtotal: Money,
        tax: Money,
        shipping: Money,
        discount: Money,
        total: Money,
    },

    /// The requested status change is not allowed by the policy.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order cannot be cancelled in its current state.
    #[error("Order cannot be cancelled in {status} status")]
    CannotCancel { status: OrderStatus },

    /// The order cannot be returned.
    #[error("Order cannot be returned: {reason}")]
    CannotReturn { reason: String },

    /// Payment was already confirmed for this order.
    #[error("Payment already completed for this order")]
    PaymentAlreadyCompleted,
}
