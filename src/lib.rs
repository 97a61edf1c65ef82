//! Settlement core for a multi-vendor marketplace
//!
//! Buyers settle carts drawn from many suppliers into a single order. The
//! platform keeps a per-supplier commission on every line and tracks orders
//! and supplier verification through explicit state machines. All state lives
//! in sled; [`service::MarketService`] is the entry point.

pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod order;
pub mod pricing;
pub mod revenue;
pub mod service;
pub mod settlement;
pub mod store;
pub mod supplier;
pub mod types;
pub mod utils;

pub use config::MarketConfig;
pub use error::{ErrorKind, MarketError, MarketResult, ValidationError};
pub use service::MarketService;
