//! Order Model
//!
//! Created when an offer is accepted. Carries the financial breakdown
//! computed at creation and an append-only timeline of events.

use serde::{Deserialize, Serialize};

/// Shipment status (externally validated enum; transitions are
/// unconditional, monotonicity is the caller's contract)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    AwaitingShipment,
    Shipped,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::AwaitingShipment => "AWAITING_SHIPMENT",
            ShipmentStatus::Shipped => "SHIPPED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
        }
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub offer_id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Accepted offer amount
    pub amount: f64,
    pub application_fee_amount: f64,
    pub tax_amount: f64,
    pub escrow_amount: f64,
    /// 'ACTIVE' | 'COMPLETED'
    pub status: String,
    /// 'AWAITING_SHIPMENT' | 'SHIPPED' | 'IN_TRANSIT' | 'DELIVERED'
    pub shipment_status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Timeline event row (append-only)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderEvent {
    pub id: i64,
    pub order_id: String,
    pub event: String,
    /// JSON detail, stored as text
    pub detail: String,
    pub created_at: i64,
}

/// Order with its timeline (detail view)
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithTimeline {
    #[serde(flatten)]
    pub order: Order,
    pub timeline: Vec<OrderEvent>,
}
