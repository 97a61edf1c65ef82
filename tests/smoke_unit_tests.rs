//! Smoke screen unit tests for the marketplace components
//!
//! Each module below exercises one component through the public API, apart
//! from the end to end scenarios. They mostly cover the happy path.

use chrono::{Datelike, Timelike};
use marketplace_settlement::{
    catalog::{Cart, Product},
    config::MarketConfig,
    error::{ErrorKind, MarketError, ValidationError},
    order::OrderStatus,
    pricing::{BuyerClass, CommissionRate, resolve_unit_price},
    types::{Currency, TimeStamp},
    utils::{digest, new_order_number, new_uuid_to_bech32},
};

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Ids carry the human readable prefix they were created with
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("order_").unwrap();
        assert!(encoded.starts_with("order_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("supplier_").unwrap();
        let id2 = new_uuid_to_bech32("supplier_").unwrap();
        assert_ne!(id1, id2);
    }

    /// `ORD-YYYYMMDD-` followed by 12 upper-case hex digits
    #[test]
    fn order_number_shape() {
        let at = TimeStamp::new_with(2025, 3, 9, 10, 0, 0);
        let number = new_order_number(&at);

        assert!(number.starts_with("ORD-20250309-"));
        let tail = number.trim_start_matches("ORD-20250309-");
        assert_eq!(tail.len(), 12);
        assert!(tail.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn order_numbers_differ_within_the_same_instant() {
        let at = TimeStamp::new();
        assert_ne!(new_order_number(&at), new_order_number(&at));
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest(b"cart"), digest(b"cart"));
        assert_ne!(digest(b"cart"), digest(b"carts"));
        assert_eq!(digest(b"cart").len(), 64);
    }
}

// TIMESTAMP TESTS
mod timestamp_tests {
    use super::*;

    #[test]
    fn new_with_keeps_the_fields() {
        let ts = TimeStamp::new_with(2024, 6, 15, 14, 30, 45).to_datetime_utc();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month(), 6);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 30);
        assert_eq!(ts.second(), 45);
    }

    #[test]
    fn day_arithmetic_orders_correctly() {
        let now = TimeStamp::new();
        assert!(now.minus_days(1) < now);
        assert!(now < now.plus_days(1));
    }
}

// PRICING TESTS
mod pricing_tests {
    use super::*;

    fn product(retail: u64, wholesale: Option<u64>) -> Product {
        Product {
            id: "product_1".into(),
            supplier_id: "supplier_1".into(),
            name: "Shea butter".into(),
            retail_price: retail,
            wholesale_price: wholesale,
            currency: Currency::NGN,
            stock: 1,
        }
    }

    #[test]
    fn wholesale_buyers_get_the_wholesale_price() {
        let p = product(1_000, Some(800));
        assert_eq!(resolve_unit_price(&p, BuyerClass::Wholesale), 800);
        assert_eq!(resolve_unit_price(&p, BuyerClass::Retail), 1_000);
        assert_eq!(resolve_unit_price(&p, BuyerClass::PlatformOperator), 1_000);
    }

    #[test]
    fn ten_percent_split() {
        let split = CommissionRate::TEN_PERCENT.split(17_500);
        assert_eq!(split.commission, 1_750);
        assert_eq!(split.payout, 15_750);
    }

    #[test]
    fn percent_bounds() {
        assert!(CommissionRate::from_percent(0.0).is_ok());
        assert!(CommissionRate::from_percent(100.0).is_ok());
        assert!(CommissionRate::from_percent(150.0).is_err());
        assert!(CommissionRate::from_percent(-1.0).is_err());
        assert!(CommissionRate::from_percent(f64::NAN).is_err());
    }

    #[test]
    fn percent_keeps_two_decimals() {
        let rate = CommissionRate::from_percent(12.5).unwrap();
        assert_eq!(rate.basis_points(), 1_250);
        assert_eq!(rate.percent(), 12.5);
    }
}

// CATALOG TESTS
mod catalog_tests {
    use super::*;

    #[test]
    fn cart_merges_repeat_additions() {
        let mut cart = Cart::default();
        cart.add("product_1", 1);
        cart.add("product_2", 1);
        cart.add("product_1", 2);

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.lines[0].quantity, 3);
        assert!(cart.remove("product_2"));
        assert!(!cart.remove("product_2"));
    }
}

// ORDER STATUS TESTS
mod order_status_tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_next() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.next().is_none());
        }
    }

    #[test]
    fn display_uses_snake_case_names() {
        assert_eq!(OrderStatus::Processing.to_string(), "processing");
        assert_eq!(OrderStatus::Refunded.to_string(), "refunded");
    }
}

// ERROR TESTS
mod error_tests {
    use super::*;

    #[test]
    fn validation_errors_name_their_field() {
        let err = MarketError::from(ValidationError::MissingAddressField("postal_code"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("postal_code"));
    }

    #[test]
    fn default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.default_commission, CommissionRate::TEN_PERCENT);
        assert_eq!(config.report_window_days, 7);
        assert!(config.order_number_attempts > 0);
    }
}
