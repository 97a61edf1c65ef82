//! Turning a buyer's cart into an order
//!
//! Everything here is pure. [`SettlementRequest`] is assembled and validated
//! up front, then [`price_cart`] runs inside the store transaction against the
//! product and supplier rows read there, so the prices and rates frozen onto
//! the line items are the ones that were current at commit time.
use std::collections::HashSet;

use crate::catalog::{Cart, CartLine, Product};
use crate::error::ValidationError;
use crate::order::{Address, Order, OrderLineItem, OrderStatus, Payment, PaymentMethod, PaymentStatus};
use crate::pricing::{line_subtotal, resolve_unit_price, Buyer, BuyerClass, CommissionRate};
use crate::supplier::Supplier;
use crate::types::{Currency, TimeStamp};

impl Address {
    pub fn new(street: &str, city: &str, state: &str, postal_code: &str, country: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            postal_code: postal_code.to_string(),
            country: country.to_string(),
        }
    }

    /// Every field is required; reports the first blank one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(ValidationError::MissingAddressField(*name)),
            None => Ok(()),
        }
    }
}

/// Checkout input. The cart lines are the snapshot the buyer was shown; the
/// store refuses to settle if the stored cart no longer matches them.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    buyer: Buyer,
    lines: Vec<CartLine>,
    shipping_address: Option<Address>,
    billing_address: Option<Address>,
    payment_method: PaymentMethod,
}

impl SettlementRequest {
    pub fn new(buyer: Buyer) -> Self {
        Self {
            buyer,
            lines: vec![],
            shipping_address: None,
            billing_address: None,
            payment_method: PaymentMethod::Card,
        }
    }
    pub fn set_lines(mut self, lines: Vec<CartLine>) -> Self {
        self.lines = lines;
        self
    }
    pub fn set_shipping_address(mut self, address: Address) -> Self {
        self.shipping_address = Some(address);
        self
    }
    pub fn set_billing_address(mut self, address: Address) -> Self {
        self.billing_address = Some(address);
        self
    }
    pub fn set_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn buyer(&self) -> &Buyer {
        &self.buyer
    }
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }
    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Input checks that need no stored state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lines.is_empty() {
            return Err(ValidationError::EmptyCart);
        }
        if let Some(line) = self.lines.iter().find(|l| l.quantity == 0) {
            return Err(ValidationError::InvalidQuantity(line.product_id.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(line) = self.lines.iter().find(|l| !seen.insert(l.product_id.as_str())) {
            return Err(ValidationError::DuplicateCartLine(line.product_id.clone()));
        }
        self.shipping_address
            .as_ref()
            .ok_or(ValidationError::MissingAddressField("street"))?
            .validate()?;
        if let Some(billing) = &self.billing_address {
            billing.validate()?;
        }
        Ok(())
    }

    pub fn shipping_address(&self) -> Address {
        self.shipping_address.clone().unwrap_or_default()
    }

    /// Billing falls back to the shipping address.
    pub fn billing_address(&self) -> Address {
        self.billing_address
            .clone()
            .unwrap_or_else(|| self.shipping_address())
    }

    /// sha256 over the encoded cart snapshot, kept on the order for audit.
    pub fn cart_digest(&self) -> String {
        let cart = Cart {
            lines: self.lines.clone(),
        };
        // encoding into a Vec cannot fail
        let bytes = minicbor::to_vec(&cart).unwrap_or_default();
        crate::utils::digest(&bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub supplier_id: String,
    pub product_name: String,
    pub unit_price: u64,
    pub quantity: u32,
    pub subtotal: u64,
    pub commission_rate: CommissionRate,
    pub commission: u64,
    pub supplier_payout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub currency: Currency,
    pub lines: Vec<PricedLine>,
    pub subtotal: u64,
    /// Sum of the per-line commissions, each at the owning supplier's rate.
    pub commission: u64,
}

impl PricedCart {
    /// No tax or shipping is charged, so the total is the subtotal.
    pub fn total(&self) -> u64 {
        self.subtotal
    }
}

/// Prices each line for `buyer_class` and splits it at the supplier's own
/// commission rate. `rows` pairs every cart line with its product and the
/// product's owning supplier.
pub fn price_cart(
    buyer_class: BuyerClass,
    rows: &[(CartLine, Product, Supplier)],
) -> Result<PricedCart, ValidationError> {
    let (_, first, _) = rows.first().ok_or(ValidationError::EmptyCart)?;
    let currency = first.currency;

    let mut lines = Vec::with_capacity(rows.len());
    let mut subtotal: u64 = 0;
    let mut commission: u64 = 0;

    for (line, product, supplier) in rows {
        if line.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(line.product_id.clone()));
        }
        if product.currency != currency {
            return Err(ValidationError::MixedCurrency(
                currency.code().to_string(),
                product.currency.code().to_string(),
            ));
        }
        if !supplier.is_approved() {
            return Err(ValidationError::SupplierNotApproved(supplier.id.clone()));
        }

        let unit_price = resolve_unit_price(product, buyer_class);
        let line_total = line_subtotal(&product.id, unit_price, line.quantity)?;
        let split = supplier.commission_rate.split(line_total);

        subtotal = subtotal
            .checked_add(line_total)
            .ok_or_else(|| ValidationError::AmountOverflow(product.id.clone()))?;
        commission += split.commission;

        lines.push(PricedLine {
            product_id: product.id.clone(),
            supplier_id: supplier.id.clone(),
            product_name: product.name.clone(),
            unit_price,
            quantity: line.quantity,
            subtotal: line_total,
            commission_rate: supplier.commission_rate,
            commission: split.commission,
            supplier_payout: split.payout,
        });
    }

    Ok(PricedCart {
        currency,
        lines,
        subtotal,
        commission,
    })
}

/// The rows a successful settlement writes, apart from the cart removal and
/// stock updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRecords {
    pub order: Order,
    pub line_items: Vec<OrderLineItem>,
    pub payment: Payment,
}

pub fn build_records(
    request: &SettlementRequest,
    priced: &PricedCart,
    order_id: &str,
    order_number: &str,
    gateway: &str,
    now: TimeStamp,
) -> SettlementRecords {
    let order = Order {
        id: order_id.to_string(),
        order_number: order_number.to_string(),
        buyer_id: request.buyer().id.clone(),
        status: OrderStatus::Pending,
        subtotal: priced.subtotal,
        commission: priced.commission,
        total: priced.total(),
        currency: priced.currency,
        shipping_address: request.shipping_address(),
        billing_address: request.billing_address(),
        cart_digest: request.cart_digest(),
        created_at: now,
        updated_at: now,
        history: vec![],
    };

    let line_items = priced
        .lines
        .iter()
        .enumerate()
        .map(|(line_no, line)| OrderLineItem {
            order_id: order_id.to_string(),
            line_no: line_no as u32,
            product_id: line.product_id.clone(),
            supplier_id: line.supplier_id.clone(),
            product_name: line.product_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            subtotal: line.subtotal,
            commission_rate: line.commission_rate,
            commission: line.commission,
            supplier_payout: line.supplier_payout,
        })
        .collect();

    let payment = Payment {
        order_id: order_id.to_string(),
        gateway: gateway.to_string(),
        amount: priced.total(),
        currency: priced.currency,
        status: PaymentStatus::Completed,
        method: request.payment_method(),
        created_at: now,
    };

    SettlementRecords {
        order,
        line_items,
        payment,
    }
}
