//! Domain layer for the order-fulfillment workflow.
//!
//! This crate is pure: it owns the order aggregate, its status state
//! machine, and the order-number generator, but performs no I/O.
//! Persistence and cache invalidation are the caller's job; every
//! mutating aggregate method only changes the in-memory value and
//! appends to the status history.

pub mod order;

pub use order::{
    Actor, Address, AddressType, Cancellation, Metadata, NewOrder, Order, OrderError, OrderItem,
    OrderNumberGenerator, OrderSource, OrderStatus, Payment, PaymentMethod, PaymentStatus, Pricing,
    ProductSnapshot, RefundStatus, ReturnRequest, ReturnStatus, StatusHistoryEntry, Tracking,
    allowed_transitions, is_valid_transition,
};
