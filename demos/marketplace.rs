//! Walks one supplier through verification, settles a cart and prints the
//! resulting revenue report.
//!
//! Run with `cargo run --example marketplace`. The database is
//! created under a temp dir unless `MARKET_DB_PATH` is set.

use std::sync::Arc;

use anyhow::Context;
use marketplace_settlement::{
    MarketConfig, MarketService,
    order::{Address, OrderStatus, PaymentMethod},
    pricing::{Buyer, BuyerClass},
    settlement::SettlementRequest,
    supplier::{DocumentType, KycStatus},
    types::Currency,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let temp_dir = tempfile::tempdir()?;
    let mut config = MarketConfig::from_env()?;
    if std::env::var_os("MARKET_DB_PATH").is_none() {
        config.db_path = temp_dir.path().join("marketplace.db");
    }

    let db = sled::open(&config.db_path).context("could not open the database: ")?;
    let service = MarketService::new(Arc::new(db), config)?;

    // supplier onboarding
    let supplier = service.register_supplier("user_ada", "Ada's Adire", Some("RC-88231".into()))?;
    for document_type in DocumentType::REQUIRED {
        service.submit_kyc_document(&supplier.id, document_type, "s3://kyc/ada/scan.pdf")?;
    }
    service.set_supplier_kyc_status(&supplier.id, KycStatus::UnderReview, None, "ops_tunde")?;
    service.set_supplier_kyc_status(&supplier.id, KycStatus::Approved, None, "ops_tunde")?;

    let wrap = service.create_product(&supplier.id, "Adire wrap", 4_500, Some(3_800), Currency::NGN, 40)?;
    let tote = service.create_product(&supplier.id, "Tote bag", 2_000, None, Currency::NGN, 15)?;

    // checkout
    let buyer = Buyer::new("buyer_kemi", BuyerClass::Wholesale);
    service.add_to_cart(&buyer.id, &wrap.id, 10)?;
    let cart = service.add_to_cart(&buyer.id, &tote.id, 5)?;

    let request = SettlementRequest::new(buyer)
        .set_lines(cart.lines)
        .set_shipping_address(Address::new("3 Awolowo Rd", "Ikoyi", "Lagos", "101233", "NG"))
        .set_payment_method(PaymentMethod::Wallet);
    let order = service.settle(request)?;
    println!(
        "settled {} total={} commission={}",
        order.order_number, order.total, order.commission
    );

    let mut status = order.status;
    while status != OrderStatus::Delivered {
        status = service.advance_order_status(&order.id, status, "ops_tunde")?.status;
        println!("  {} -> {status}", order.order_number);
    }

    let report = service.aggregate_revenue(None, 5)?;
    println!(
        "last {} days: {} orders, gross={} commission={} payouts={}",
        service.config().report_window_days,
        report.order_count,
        report.gross,
        report.commission,
        report.payouts
    );
    for entry in report.supplier_ranking {
        println!("  {} earned {} over {} units", entry.supplier_id, entry.payout, entry.units);
    }

    service.store().flush()?;

    Ok(())
}
