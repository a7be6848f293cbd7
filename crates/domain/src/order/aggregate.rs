//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    Actor, Address, Cancellation, Metadata, OrderError, OrderItem, OrderStatus, Payment,
    PaymentMethod, PaymentStatus, Pricing, RefundStatus, ReturnRequest, ReturnStatus,
    StatusHistoryEntry, Tracking, is_valid_transition,
};

/// Input for creating a new order from a cart snapshot.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub metadata: Metadata,
}

/// Order aggregate root.
///
/// All lifecycle mutations go through methods on this type so that every
/// change is policy-checked and appended to the status history. Methods
/// never perform I/O; the caller persists the mutated value and
/// invalidates caches afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    email: String,
    items: Vec<OrderItem>,
    pricing: Pricing,
    shipping_address: Address,
    billing_address: Option<Address>,
    payment: Payment,
    status: OrderStatus,
    tracking: Tracking,
    cancellation: Option<Cancellation>,
    return_request: Option<ReturnRequest>,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Persisted version for optimistic concurrency; owned by the store.
    version: i64,
}

impl Order {
    /// Creates a new order in `pending` status with one seeded history
    /// entry.
    ///
    /// Validates that the order has at least one item, that every
    /// quantity is at least 1, and that the pricing breakdown is
    /// non-negative and internally consistent. Pricing comes from the
    /// cart snapshot and is fixed from here on.
    pub fn create(input: NewOrder) -> Result<Order, OrderError> {
        if input.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &input.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                });
            }
        }
        input.pricing.validate()?;

        let now = Utc::now();
        let mut tracking = Tracking::default();
        tracking.status_history.push(StatusHistoryEntry {
            status: OrderStatus::Pending,
            timestamp: now,
            description: "Order placed".to_string(),
            updated_by: Actor::System,
        });

        Ok(Order {
            id: OrderId::new(),
            order_number: input.order_number,
            user_id: input.user_id,
            email: input.email,
            items: input.items,
            pricing: input.pricing,
            shipping_address: input.shipping_address,
            billing_address: input.billing_address,
            payment: Payment::new(input.payment_method),
            status: OrderStatus::Pending,
            tracking,
            cancellation: None,
            return_request: None,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Moves the order to `next`, consulting the transition policy.
    ///
    /// Reaching `delivered` stamps the actual-delivery timestamp, which
    /// anchors the return window.
    pub fn update_status(
        &mut self,
        next: OrderStatus,
        by: Actor,
        note: Option<String>,
    ) -> Result<(), OrderError> {
        if !is_valid_transition(self.status, next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        let description = note
            .unwrap_or_else(|| format!("Order status changed from {} to {}", self.status, next));

        if next == OrderStatus::Delivered {
            self.tracking.actual_delivery = Some(now);
        }

        self.status = next;
        self.push_history(next, now, description, by);
        Ok(())
    }

    /// Records a completed charge from the payment gateway.
    ///
    /// When the order is still in `pending` (or retrying after
    /// `payment_failed`) the status is forced to `confirmed` without the
    /// generic transition check; "payment confirmed" is a cross-cutting
    /// event, and this is the single documented bypass. If the order has
    /// already moved ahead the payment is recorded and the lifecycle
    /// status is left untouched.
    pub fn confirm_payment(
        &mut self,
        transaction_id: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Result<(), OrderError> {
        if self.payment.is_completed() {
            return Err(OrderError::PaymentAlreadyCompleted);
        }

        let now = Utc::now();
        self.payment.status = PaymentStatus::Completed;
        self.payment.transaction_id = Some(transaction_id.into());
        self.payment.paid_at = Some(now);
        self.payment.details = details;

        match self.status {
            OrderStatus::Pending | OrderStatus::PaymentFailed => {
                self.status = OrderStatus::Confirmed;
                self.push_history(
                    OrderStatus::Confirmed,
                    now,
                    "Payment confirmed, order accepted".to_string(),
                    Actor::PaymentGateway,
                );
            }
            current => {
                self.push_history(
                    current,
                    now,
                    "Payment recorded for order already in progress".to_string(),
                    Actor::PaymentGateway,
                );
            }
        }

        Ok(())
    }

    /// Records a failed charge and moves the order to `payment_failed`.
    ///
    /// Retrying the charge is allowed afterwards: `payment_failed` can
    /// transition back to `pending`.
    pub fn fail_payment(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if !is_valid_transition(self.status, OrderStatus::PaymentFailed) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::PaymentFailed,
            });
        }

        let now = Utc::now();
        self.payment.status = PaymentStatus::Failed;
        self.status = OrderStatus::PaymentFailed;
        self.push_history(
            OrderStatus::PaymentFailed,
            now,
            format!("Payment failed: {}", reason.into()),
            Actor::PaymentGateway,
        );
        Ok(())
    }

    /// Cancels the order, recording an immutable cancellation sub-record.
    ///
    /// A refund obligation is recorded (not executed) as `pending` for
    /// the full total when payment had completed, else `not_initiated`.
    pub fn cancel(&mut self, reason: impl Into<String>, by: Actor) -> Result<(), OrderError> {
        if !self.can_cancel() {
            return Err(OrderError::CannotCancel {
                status: self.status,
            });
        }

        let now = Utc::now();
        let reason = reason.into();
        let paid = self.payment.is_completed();

        self.cancellation = Some(Cancellation {
            cancelled_at: now,
            cancelled_by: by,
            reason: reason.clone(),
            refund_status: if paid {
                RefundStatus::Pending
            } else {
                RefundStatus::NotInitiated
            },
            refund_amount: if paid {
                self.pricing.total
            } else {
                Money::zero()
            },
        });
        self.status = OrderStatus::Cancelled;
        self.push_history(
            OrderStatus::Cancelled,
            now,
            format!("Order cancelled: {reason}"),
            by,
        );
        Ok(())
    }

    /// Requests a post-delivery return.
    ///
    /// Allowed only while the order is `delivered`, within `window` of
    /// the actual delivery timestamp, and at most once. The lifecycle
    /// status stays `delivered`; it advances to `returned` when the
    /// return is processed through [`Order::update_status`].
    pub fn initiate_return(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), OrderError> {
        if !self.can_return(now, window) {
            let reason = if self.return_request.is_some() {
                "return already requested".to_string()
            } else if self.status != OrderStatus::Delivered {
                format!("order is in {} status", self.status)
            } else {
                format!("return window of {} days has passed", window.num_days())
            };
            return Err(OrderError::CannotReturn { reason });
        }

        let reason = reason.into();
        self.return_request = Some(ReturnRequest {
            requested_at: now,
            reason: reason.clone(),
            status: ReturnStatus::Requested,
            refund_initiated: false,
            refund_amount: self.pricing.total,
        });
        self.push_history(
            self.status,
            now,
            format!("Return requested: {reason}"),
            Actor::User,
        );
        Ok(())
    }

    /// Records carrier details once a shipment exists.
    pub fn set_tracking(
        &mut self,
        carrier: impl Into<String>,
        tracking_number: impl Into<String>,
        tracking_url: Option<String>,
        estimated_delivery: Option<DateTime<Utc>>,
    ) {
        self.tracking.carrier = Some(carrier.into());
        self.tracking.tracking_number = Some(tracking_number.into());
        self.tracking.tracking_url = tracking_url;
        self.tracking.estimated_delivery = estimated_delivery;
        self.updated_at = Utc::now();
    }

    fn push_history(
        &mut self,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
        description: String,
        updated_by: Actor,
    ) {
        self.tracking.status_history.push(StatusHistoryEntry {
            status,
            timestamp,
            description,
            updated_by,
        });
        self.updated_at = timestamp;
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Total quantity across all line items.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn tracking(&self) -> &Tracking {
        &self.tracking
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn return_request(&self) -> Option<&ReturnRequest> {
        self.return_request.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// Sets the persisted version. Called by the store after a
    /// successful write; application code never touches this.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    /// Returns true while the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        ) && !self.is_cancelled()
    }

    /// Returns true if a return may be requested at `now`.
    pub fn can_return(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.status != OrderStatus::Delivered || self.return_request.is_some() {
            return false;
        }
        match self.tracking.actual_delivery {
            Some(delivered_at) => now.signed_duration_since(delivered_at) <= window,
            None => false,
        }
    }

    pub fn is_payment_pending(&self) -> bool {
        self.payment.is_pending()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
