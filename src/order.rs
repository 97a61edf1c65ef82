//! Orders, their line items and payments, and the order status lifecycle
use std::fmt;

use crate::error::MarketError;
use crate::pricing::CommissionRate;
use crate::types::{Currency, TimeStamp};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Processing,
    #[n(2)]
    Confirmed,
    #[n(3)]
    Shipped,
    #[n(4)]
    Delivered,
    #[n(5)]
    Cancelled,
    #[n(6)]
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Next state on the happy path. `None` for terminal states.
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded => None,
        }
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_refund(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address copied onto the order at settlement time.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    #[n(0)]
    pub street: String,
    #[n(1)]
    pub city: String,
    #[n(2)]
    pub state: String,
    #[n(3)]
    pub postal_code: String,
    #[n(4)]
    pub country: String,
}

/// One entry in an order's audit trail.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    #[n(0)]
    pub from: OrderStatus,
    #[n(1)]
    pub to: OrderStatus,
    #[n(2)]
    pub actor_id: String,
    #[n(3)]
    pub at: TimeStamp,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_number: String,
    #[n(2)]
    pub buyer_id: String,
    #[n(3)]
    pub status: OrderStatus,
    #[n(4)]
    pub subtotal: u64,
    #[n(5)]
    pub commission: u64,
    #[n(6)]
    pub total: u64,
    #[n(7)]
    pub currency: Currency,
    #[n(8)]
    pub shipping_address: Address,
    #[n(9)]
    pub billing_address: Address,
    #[n(10)]
    pub cart_digest: String,
    #[n(11)]
    pub created_at: TimeStamp,
    #[n(12)]
    pub updated_at: TimeStamp,
    #[n(13)]
    pub history: Vec<StatusChange>,
}

impl Order {
    fn check_expected(&self, expected: OrderStatus) -> Result<(), MarketError> {
        if self.status != expected {
            return Err(MarketError::Conflict(format!(
                "order {} is {}, expected {}",
                self.id, self.status, expected
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: OrderStatus, actor_id: &str) {
        let at = TimeStamp::new();
        self.history.push(StatusChange {
            from: self.status,
            to,
            actor_id: actor_id.to_string(),
            at,
        });
        self.status = to;
        self.updated_at = at;
    }

    fn invalid(&self, to: &str) -> MarketError {
        MarketError::InvalidTransition {
            entity: "order",
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Moves one step along the happy path. `expected` is the status the
    /// caller last saw; a mismatch means somebody else got there first.
    pub fn advance(&mut self, expected: OrderStatus, actor_id: &str) -> Result<OrderStatus, MarketError> {
        self.check_expected(expected)?;
        let next = self.status.next().ok_or_else(|| self.invalid("next"))?;
        self.transition(next, actor_id);
        Ok(next)
    }

    pub fn cancel(&mut self, expected: OrderStatus, actor_id: &str) -> Result<(), MarketError> {
        self.check_expected(expected)?;
        if !self.status.can_cancel() {
            return Err(self.invalid(OrderStatus::Cancelled.as_str()));
        }
        self.transition(OrderStatus::Cancelled, actor_id);
        Ok(())
    }

    pub fn refund(&mut self, expected: OrderStatus, actor_id: &str) -> Result<(), MarketError> {
        self.check_expected(expected)?;
        if !self.status.can_refund() {
            return Err(self.invalid(OrderStatus::Refunded.as_str()));
        }
        self.transition(OrderStatus::Refunded, actor_id);
        Ok(())
    }
}

/// Frozen at settlement. Later price or rate edits never touch it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderLineItem {
    #[n(0)]
    pub order_id: String,
    #[n(1)]
    pub line_no: u32,
    #[n(2)]
    pub product_id: String,
    #[n(3)]
    pub supplier_id: String,
    #[n(4)]
    pub product_name: String,
    #[n(5)]
    pub unit_price: u64,
    #[n(6)]
    pub quantity: u32,
    #[n(7)]
    pub subtotal: u64,
    #[n(8)]
    pub commission_rate: CommissionRate,
    #[n(9)]
    pub commission: u64,
    #[n(10)]
    pub supplier_payout: u64,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
    #[n(2)]
    Failed,
    #[n(3)]
    Refunded,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[n(0)]
    Card,
    #[n(1)]
    BankTransfer,
    #[n(2)]
    CashOnDelivery,
    #[n(3)]
    Wallet,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    #[n(0)]
    pub order_id: String,
    #[n(1)]
    pub gateway: String,
    #[n(2)]
    pub amount: u64,
    #[n(3)]
    pub currency: Currency,
    #[n(4)]
    pub status: PaymentStatus,
    #[n(5)]
    pub method: PaymentMethod,
    #[n(6)]
    pub created_at: TimeStamp,
}
