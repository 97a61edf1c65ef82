//! Unit price resolution and commission arithmetic
//!
//! Amounts are integer minor units (cents). Rates are basis points, so
//! `10_000` is 100% and the split of a line is always exact: the payout is
//! whatever is left after the platform's rounded share.
use crate::catalog::Product;
use crate::error::ValidationError;

const MAX_BASIS_POINTS: u16 = 10_000;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuyerClass {
    #[n(0)]
    Retail,
    #[n(1)]
    Wholesale,
    #[n(2)]
    SupplierStaff,
    #[n(3)]
    PlatformOperator,
}

/// Identity handed in by the session provider for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub id: String,
    pub class: BuyerClass,
}

impl Buyer {
    pub fn new(id: impl Into<String>, class: BuyerClass) -> Self {
        Self {
            id: id.into(),
            class,
        }
    }
}

/// Wholesale buyers pay the wholesale tier when the product has one; every
/// other buyer class pays retail.
pub fn resolve_unit_price(product: &Product, buyer_class: BuyerClass) -> u64 {
    match (buyer_class, product.wholesale_price) {
        (BuyerClass::Wholesale, Some(wholesale)) => wholesale,
        _ => product.retail_price,
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommissionRate(#[n(0)] u16);

impl CommissionRate {
    pub const TEN_PERCENT: CommissionRate = CommissionRate(1_000);

    pub fn from_basis_points(bps: u16) -> Result<Self, ValidationError> {
        if bps > MAX_BASIS_POINTS {
            return Err(ValidationError::CommissionOutOfRange(format!(
                "{}",
                f64::from(bps) / 100.0
            )));
        }
        Ok(Self(bps))
    }

    /// Accepts a percentage in `[0, 100]`, kept to two decimal places.
    pub fn from_percent(percent: f64) -> Result<Self, ValidationError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ValidationError::CommissionOutOfRange(percent.to_string()));
        }
        Ok(Self((percent * 100.0).round() as u16))
    }

    pub fn basis_points(&self) -> u16 {
        self.0
    }

    pub fn percent(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Splits a line subtotal into the platform's commission and the
    /// supplier's payout. Commission rounds half up to the nearest cent.
    pub fn split(&self, subtotal: u64) -> CommissionSplit {
        let commission = (u128::from(subtotal) * u128::from(self.0) + 5_000) / 10_000;
        // commission <= subtotal because the rate is at most 100%
        let commission = commission as u64;
        CommissionSplit {
            commission,
            payout: subtotal - commission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission: u64,
    pub payout: u64,
}

/// `unit_price * quantity`, refusing to wrap.
pub fn line_subtotal(product_id: &str, unit_price: u64, quantity: u32) -> Result<u64, ValidationError> {
    unit_price
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| ValidationError::AmountOverflow(product_id.to_string()))
}
