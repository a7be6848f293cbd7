//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};

/// Kind of address in a customer's address book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    #[default]
    Home,
    Work,
    Other,
}

/// A shipping or billing address, captured verbatim at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub address_type: AddressType,
}

/// Denormalized product attributes frozen at order time so the order
/// renders correctly even if the catalog entry later changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductSnapshot {
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
}

/// A line item on an order.
///
/// The unit price is the price the customer saw in the cart; it is never
/// recomputed from live catalog prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image: Option<String>,
    #[serde(default)]
    pub snapshot: ProductSnapshot,
}

impl OrderItem {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The pricing breakdown captured from the cart at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl Pricing {
    /// Validates that every component is non-negative and that
    /// `total == subtotal + tax + shipping - discount`.
    pub fn validate(&self) -> Result<(), OrderError> {
        for (component, amount) in [
            ("subtotal", self.subtotal),
            ("tax", self.tax),
            ("shipping", self.shipping),
            ("discount", self.discount),
            ("total", self.total),
        ] {
            if amount.is_negative() {
                return Err(OrderError::NegativePricing { component, amount });
            }
        }

        let computed = self.subtotal + self.tax + self.shipping - self.discount;
        if computed != self.total {
            return Err(OrderError::InconsistentPricing {
                subtotal: self.subtotal,
                tax: self.tax,
                shipping: self.shipping,
                discount: self.discount,
                total: self.total,
            });
        }

        Ok(())
    }
}

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Upi,
    Netbanking,
    Wallet,
    /// Cash on delivery: the order is eligible for confirmation without
    /// an upfront charge.
    Cod,
}

impl PaymentMethod {
    pub fn is_cod(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

/// Gateway-side state of the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Payment sub-record on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Raw gateway payload, kept for audit.
    pub details: Option<serde_json::Value>,
}

impl Payment {
    /// Creates the initial payment record for a new order.
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            paid_at: None,
            details: None,
        }
    }

    /// Returns true while the charge has not settled either way.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        )
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Who performed a mutation on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    Admin,
    System,
    PaymentGateway,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::User => "user",
            Actor::Admin => "admin",
            Actor::System => "system",
            Actor::PaymentGateway => "payment_gateway",
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the append-only status history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub updated_by: Actor,
}

/// Shipment tracking sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Tracking {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusHistoryEntry>,
}

/// State of a refund obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    NotInitiated,
    Pending,
    Completed,
    Failed,
}

/// Cancellation sub-record. Set at most once; presence means the order
/// was cancelled and the record is never unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Actor,
    pub reason: String,
    /// `pending` when payment had completed (money must flow back),
    /// `not_initiated` otherwise.
    pub refund_status: RefundStatus,
    pub refund_amount: Money,
}

/// Progress of a post-delivery return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Requested,
    Approved,
    Rejected,
    PickedUp,
    Completed,
}

/// Return sub-record, mirroring [`Cancellation`] for post-delivery flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub requested_at: DateTime<Utc>,
    pub reason: String,
    pub status: ReturnStatus,
    pub refund_initiated: bool,
    pub refund_amount: Money,
}

/// Channel an order came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    #[default]
    Web,
    Mobile,
    Admin,
}

/// Free-form order metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub source: OrderSource,
    pub coupon_code: Option<String>,
    pub customer_note: Option<String>,
}
