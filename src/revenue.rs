//! Read-side revenue rollups over settled orders
use std::collections::{BTreeMap, HashMap};

use crate::order::{Order, OrderLineItem, OrderStatus};
use crate::types::TimeStamp;

/// Half-open window `[start, end)` over order creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: TimeStamp,
    pub end: TimeStamp,
}

impl DateRange {
    pub fn new(start: TimeStamp, end: TimeStamp) -> Self {
        Self { start, end }
    }

    /// The last `days` days up to now.
    pub fn trailing_days(days: i64) -> Self {
        let end = TimeStamp::new();
        Self {
            start: end.minus_days(days),
            end,
        }
    }

    pub fn contains(&self, at: &TimeStamp) -> bool {
        self.start <= *at && *at < self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::trailing_days(7)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierPayout {
    pub supplier_id: String,
    pub payout: u64,
    pub units: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevenueReport {
    pub gross: u64,
    pub commission: u64,
    pub payouts: u64,
    pub order_count: u64,
    pub orders_by_status: BTreeMap<OrderStatus, u64>,
    /// Highest payout first; ties go to the lower supplier id.
    pub supplier_ranking: Vec<SupplierPayout>,
}

/// Sums every line item whose order was created inside `range`. Line items
/// belonging to orders outside the range (or to unknown orders) are skipped.
pub fn aggregate(
    range: &DateRange,
    orders: &[Order],
    line_items: &[OrderLineItem],
    top_n: usize,
) -> RevenueReport {
    let mut report = RevenueReport::default();

    let in_range: HashMap<&str, &Order> = orders
        .iter()
        .filter(|o| range.contains(&o.created_at))
        .map(|o| (o.id.as_str(), o))
        .collect();

    for order in in_range.values() {
        *report.orders_by_status.entry(order.status).or_default() += 1;
    }
    report.order_count = in_range.len() as u64;

    let mut per_supplier: HashMap<&str, SupplierPayout> = HashMap::new();
    for item in line_items
        .iter()
        .filter(|i| in_range.contains_key(i.order_id.as_str()))
    {
        report.gross += item.subtotal;
        report.commission += item.commission;
        report.payouts += item.supplier_payout;

        let entry = per_supplier
            .entry(item.supplier_id.as_str())
            .or_insert_with(|| SupplierPayout {
                supplier_id: item.supplier_id.clone(),
                payout: 0,
                units: 0,
            });
        entry.payout += item.supplier_payout;
        entry.units += u64::from(item.quantity);
    }

    let mut ranking: Vec<SupplierPayout> = per_supplier.into_values().collect();
    ranking.sort_by(|a, b| {
        b.payout
            .cmp(&a.payout)
            .then_with(|| a.supplier_id.cmp(&b.supplier_id))
    });
    ranking.truncate(top_n);
    report.supplier_ranking = ranking;

    report
}
