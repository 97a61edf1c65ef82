//! Runtime configuration loaded from the environment
use std::env;
use std::path::PathBuf;

use crate::error::ValidationError;
use crate::pricing::CommissionRate;

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub db_path: PathBuf,
    /// Rate given to newly registered suppliers until an operator changes it.
    pub default_commission: CommissionRate,
    /// Recorded on every payment row.
    pub payment_gateway: String,
    pub report_window_days: i64,
    pub order_number_attempts: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("marketplace.db"),
            default_commission: CommissionRate::TEN_PERCENT,
            payment_gateway: "manual".to_string(),
            report_window_days: 7,
            order_number_attempts: 5,
        }
    }
}

impl MarketConfig {
    /// Reads `MARKET_*` variables (after loading `.env` when present), falling
    /// back to [`MarketConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, ValidationError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let get_env = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let db_path = get_env("MARKET_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let default_commission = match get_env("MARKET_DEFAULT_COMMISSION_PERCENT") {
            Some(raw) => {
                let percent = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| ValidationError::InvalidConfig("default_commission", e.to_string()))?;
                CommissionRate::from_percent(percent)?
            }
            None => defaults.default_commission,
        };

        let payment_gateway = get_env("MARKET_PAYMENT_GATEWAY").unwrap_or(defaults.payment_gateway);

        let report_window_days = match get_env("MARKET_REPORT_WINDOW_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or(ValidationError::InvalidConfig("report_window_days", raw))?,
            None => defaults.report_window_days,
        };

        let order_number_attempts = match get_env("MARKET_ORDER_NUMBER_ATTEMPTS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ValidationError::InvalidConfig("order_number_attempts", raw))?,
            None => defaults.order_number_attempts,
        };

        tracing::info!(
            db_path = %db_path.display(),
            default_commission_bps = default_commission.basis_points(),
            %payment_gateway,
            "marketplace configuration loaded"
        );

        Ok(Self {
            db_path,
            default_commission,
            payment_gateway,
            report_window_days,
            order_number_attempts,
        })
    }
}
