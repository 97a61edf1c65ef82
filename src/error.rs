//! Error taxonomy shared by every marketplace operation

/// Coarse category the caller uses to decide between fixing input,
/// retrying, or reloading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Persistence,
    Conflict,
    NotFound,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Product {0} appears on more than one cart line")]
    DuplicateCartLine(String),
    #[error("Address field '{0}' is missing")]
    MissingAddressField(&'static str),
    #[error("Quantity for product {0} must be at least 1")]
    InvalidQuantity(String),
    #[error("Commission rate {0}% is outside [0, 100]")]
    CommissionOutOfRange(String),
    #[error("A rejection reason is required")]
    EmptyRejectionReason,
    #[error("Retail price must be greater than zero")]
    ZeroRetailPrice,
    #[error("Wholesale price {wholesale} must be below retail price {retail}")]
    WholesaleNotBelowRetail { retail: u64, wholesale: u64 },
    #[error("Cart mixes currencies {0:?} and {1:?}")]
    MixedCurrency(String, String),
    #[error("Supplier {0} is not approved to sell")]
    SupplierNotApproved(String),
    #[error("Amount overflowed while pricing product {0}")]
    AmountOverflow(String),
    #[error("Business name must not be empty")]
    EmptyBusinessName,
    #[error("Invalid configuration value for {0}: {1}")]
    InvalidConfig(&'static str, String),
}

impl ValidationError {
    /// Input field the message refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyCart => "cart",
            ValidationError::DuplicateCartLine(_) => "cart",
            ValidationError::MissingAddressField(field) => *field,
            ValidationError::InvalidQuantity(_) => "quantity",
            ValidationError::CommissionOutOfRange(_) => "commission_rate",
            ValidationError::EmptyRejectionReason => "reason",
            ValidationError::ZeroRetailPrice => "retail_price",
            ValidationError::WholesaleNotBelowRetail { .. } => "wholesale_price",
            ValidationError::MixedCurrency(_, _) => "currency",
            ValidationError::SupplierNotApproved(_) => "cart",
            ValidationError::AmountOverflow(_) => "quantity",
            ValidationError::EmptyBusinessName => "business_name",
            ValidationError::InvalidConfig(field, _) => *field,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Persistence failed: {0}")]
    Persistence(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::Persistence(_) => ErrorKind::Persistence,
            MarketError::Conflict(_) | MarketError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            MarketError::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        MarketError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<sled::Error> for MarketError {
    fn from(err: sled::Error) -> Self {
        MarketError::Persistence(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<MarketError>> for MarketError {
    fn from(err: sled::transaction::TransactionError<MarketError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(storage) => storage.into(),
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_report_as_conflicts() {
        let err = MarketError::InvalidTransition {
            entity: "order",
            from: "delivered".into(),
            to: "cancelled".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn validation_errors_name_their_field() {
        let err = ValidationError::MissingAddressField("postal_code");
        assert_eq!(err.field(), "postal_code");
        assert_eq!(
            MarketError::from(err).kind(),
            ErrorKind::Validation
        );
    }
}
