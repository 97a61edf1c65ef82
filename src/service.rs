//! Service layer API for settlement, order and supplier workflows
//!
//! Every operation is one synchronous request. Callers pass identity
//! (buyer id and class, operator id) explicitly; nothing is read from
//! ambient session state.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{Cart, Product};
use crate::config::MarketConfig;
use crate::error::{MarketError, MarketResult, ValidationError};
use crate::notify::{NotificationKind, Notifier, TracingNotifier};
use crate::order::{Order, OrderLineItem, OrderStatus, Payment};
use crate::pricing::{self, BuyerClass, CommissionRate};
use crate::revenue::{self, DateRange, RevenueReport};
use crate::settlement::SettlementRequest;
use crate::store::{MarketStore, SettleAbort};
use crate::supplier::{DocumentReview, DocumentStatus, DocumentType, KycDocument, KycStatus, Supplier};
use crate::types::{Currency, TimeStamp};
use crate::utils;

fn new_id(hrp: &str) -> MarketResult<String> {
    utils::new_uuid_to_bech32(hrp).map_err(|e| MarketError::Persistence(format!("id generation failed: {e}")))
}

pub struct MarketService {
    store: MarketStore,
    config: MarketConfig,
    notifier: Arc<dyn Notifier>,
    // serialises settlement per buyer
    buyer_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MarketService {
    pub fn new(instance: Arc<sled::Db>, config: MarketConfig) -> MarketResult<Self> {
        Ok(Self {
            store: MarketStore::new(instance)?,
            config,
            notifier: Arc::new(TracingNotifier),
            buyer_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Opens (or creates) the database at `config.db_path`.
    pub fn open(config: MarketConfig) -> MarketResult<Self> {
        let db = sled::open(&config.db_path)?;
        Self::new(Arc::new(db), config)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    fn buyer_lock(&self, buyer_id: &str) -> Arc<Mutex<()>> {
        self.buyer_locks
            .lock()
            .entry(buyer_id.to_string())
            .or_default()
            .clone()
    }

    /// Drops the map entry once nobody but the map and `lock` hold it.
    fn release_buyer_lock(&self, buyer_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.buyer_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(buyer_id);
        }
    }

    fn send(&self, user_id: &str, title: &str, message: &str, kind: NotificationKind) {
        if let Err(err) = self.notifier.notify(user_id, title, message, kind) {
            warn!(%user_id, ?kind, error = %err, "notification failed, state change kept");
        }
    }

    // catalog and cart

    pub fn register_supplier(
        &self,
        user_id: &str,
        business_name: &str,
        registration_number: Option<String>,
    ) -> MarketResult<Supplier> {
        if business_name.trim().is_empty() {
            return Err(ValidationError::EmptyBusinessName.into());
        }
        let now = TimeStamp::new();
        let supplier = Supplier {
            id: new_id("supplier_")?,
            user_id: user_id.to_string(),
            business_name: business_name.trim().to_string(),
            registration_number,
            kyc_status: KycStatus::Pending,
            commission_rate: self.config.default_commission,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_supplier(&supplier)?;
        info!(supplier_id = %supplier.id, %user_id, "supplier registered");
        Ok(supplier)
    }

    pub fn create_product(
        &self,
        supplier_id: &str,
        name: &str,
        retail_price: u64,
        wholesale_price: Option<u64>,
        currency: Currency,
        stock: u32,
    ) -> MarketResult<Product> {
        let product = Product {
            id: new_id("product_")?,
            supplier_id: supplier_id.to_string(),
            name: name.to_string(),
            retail_price,
            wholesale_price,
            currency,
            stock,
        };
        self.update_product(&product)?;
        Ok(product)
    }

    /// Supplier edit. Wholesale must stay below retail.
    pub fn update_product(&self, product: &Product) -> MarketResult<()> {
        product.validate()?;
        self.store.supplier(&product.supplier_id)?;
        self.store.put_product(product)?;
        debug!(product_id = %product.id, "product saved");
        Ok(())
    }

    pub fn product(&self, product_id: &str) -> MarketResult<Product> {
        self.store.product(product_id)
    }

    /// Only products of approved suppliers can be bought.
    pub fn is_purchasable(&self, product_id: &str) -> MarketResult<bool> {
        let product = self.store.product(product_id)?;
        let (supplier, _) = self.store.supplier(&product.supplier_id)?;
        Ok(supplier.is_approved())
    }

    /// Same rule used when the cart is displayed and when it settles.
    pub fn resolve_unit_price(&self, product_id: &str, buyer_class: BuyerClass) -> MarketResult<u64> {
        let product = self.store.product(product_id)?;
        Ok(pricing::resolve_unit_price(&product, buyer_class))
    }

    pub fn cart(&self, buyer_id: &str) -> MarketResult<Cart> {
        self.store.cart(buyer_id).map(|(cart, _)| cart)
    }

    pub fn add_to_cart(&self, buyer_id: &str, product_id: &str, quantity: u32) -> MarketResult<Cart> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(product_id.to_string()).into());
        }
        self.store.product(product_id)?;
        let (mut cart, raw) = self.store.cart(buyer_id)?;
        cart.add(product_id, quantity);
        self.store.swap_cart(buyer_id, raw, &cart)?;
        Ok(cart)
    }

    pub fn remove_from_cart(&self, buyer_id: &str, product_id: &str) -> MarketResult<Cart> {
        let (mut cart, raw) = self.store.cart(buyer_id)?;
        if cart.remove(product_id) {
            self.store.swap_cart(buyer_id, raw, &cart)?;
        }
        Ok(cart)
    }

    // settlement

    /// Converts the buyer's cart into a pending order with its line items and
    /// a completed payment, clearing the cart. All of it commits or none of it
    /// does; on any error the cart is left as it was.
    #[tracing::instrument(skip_all, fields(buyer_id = %request.buyer().id))]
    pub fn settle(&self, request: SettlementRequest) -> MarketResult<Order> {
        request.validate()?;

        let buyer_id = request.buyer().id.clone();
        let lock = self.buyer_lock(&buyer_id);
        let result = {
            let _guard = lock.lock();
            self.settle_locked(&request)
        };
        self.release_buyer_lock(&buyer_id, lock);
        result
    }

    fn settle_locked(&self, request: &SettlementRequest) -> MarketResult<Order> {
        let order_id = new_id("order_")?;
        for attempt in 1..=self.config.order_number_attempts {
            let now = TimeStamp::new();
            let order_number = utils::new_order_number(&now);

            match self.store.commit_settlement(
                request,
                &order_id,
                &order_number,
                &self.config.payment_gateway,
                now,
            ) {
                Ok(records) => {
                    info!(
                        order_id = %records.order.id,
                        order_number = %records.order.order_number,
                        lines = records.line_items.len(),
                        total = records.order.total,
                        commission = records.order.commission,
                        "order settled"
                    );
                    return Ok(records.order);
                }
                Err(SettleAbort::OrderNumberTaken) => {
                    debug!(attempt, %order_number, "order number already used, retrying");
                }
                Err(SettleAbort::Market(err)) => {
                    warn!(error = %err, "settlement rolled back");
                    return Err(err);
                }
            }
        }

        Err(MarketError::Conflict(format!(
            "no unique order number after {} attempts",
            self.config.order_number_attempts
        )))
    }

    // order lifecycle

    pub fn order(&self, order_id: &str) -> MarketResult<Order> {
        self.store.order(order_id).map(|(order, _)| order)
    }

    pub fn order_by_number(&self, order_number: &str) -> MarketResult<Order> {
        let order_id = self
            .store
            .order_id_for_number(order_number)?
            .ok_or_else(|| MarketError::not_found("order", order_number))?;
        self.order(&order_id)
    }

    pub fn order_line_items(&self, order_id: &str) -> MarketResult<Vec<OrderLineItem>> {
        self.store.line_items(order_id)
    }

    pub fn payment(&self, order_id: &str) -> MarketResult<Payment> {
        self.store.payment(order_id)
    }

    /// Moves the order one step along pending → processing → confirmed →
    /// shipped → delivered. `expected` is the status the operator saw.
    #[tracing::instrument(skip(self))]
    pub fn advance_order_status(
        &self,
        order_id: &str,
        expected: OrderStatus,
        actor_id: &str,
    ) -> MarketResult<Order> {
        let (mut order, raw) = self.store.order(order_id)?;
        let next = order.advance(expected, actor_id)?;
        self.store.swap_order(raw, &order)?;
        info!(%next, "order advanced");
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub fn cancel_order(&self, order_id: &str, expected: OrderStatus, actor_id: &str) -> MarketResult<Order> {
        let (mut order, raw) = self.store.order(order_id)?;
        order.cancel(expected, actor_id)?;
        self.store.swap_order(raw, &order)?;
        info!("order cancelled");
        Ok(order)
    }

    /// Refunds a delivered or cancelled order and marks its payment refunded.
    #[tracing::instrument(skip(self))]
    pub fn refund_order(&self, order_id: &str, expected: OrderStatus, actor_id: &str) -> MarketResult<Order> {
        let order = self
            .store
            .commit_refund(order_id, |order| order.refund(expected, actor_id))?;
        info!("order refunded");
        Ok(order)
    }

    // supplier trust

    pub fn supplier(&self, supplier_id: &str) -> MarketResult<Supplier> {
        self.store.supplier(supplier_id).map(|(supplier, _)| supplier)
    }

    pub fn kyc_documents(&self, supplier_id: &str) -> MarketResult<Vec<KycDocument>> {
        self.store.kyc_file(supplier_id).map(|(file, _)| file.documents)
    }

    /// Operator decision on a supplier. Approval and rejection notify the
    /// supplier's owner after the change is stored.
    #[tracing::instrument(skip(self))]
    pub fn set_supplier_kyc_status(
        &self,
        supplier_id: &str,
        target: KycStatus,
        reason: Option<&str>,
        actor_id: &str,
    ) -> MarketResult<Supplier> {
        let (mut supplier, raw) = self.store.supplier(supplier_id)?;
        let (file, _) = self.store.kyc_file(supplier_id)?;
        let from = supplier.kyc_status;

        supplier.set_status(target, reason, &file.documents)?;
        self.store.swap_supplier(raw, &supplier)?;
        info!(%from, to = %target, "supplier kyc status changed");

        match target {
            KycStatus::Approved => self.send(
                &supplier.user_id,
                "Supplier account approved",
                &format!("{} can now sell on the marketplace.", supplier.business_name),
                NotificationKind::KycApproved,
            ),
            KycStatus::Rejected => self.send(
                &supplier.user_id,
                "Supplier application rejected",
                supplier.rejection_reason.as_deref().unwrap_or_default(),
                NotificationKind::KycRejected,
            ),
            KycStatus::Pending | KycStatus::UnderReview => {}
        }

        Ok(supplier)
    }

    /// Adds a document. A rejected supplier goes back to pending once every
    /// required document type has been submitted.
    #[tracing::instrument(skip(self))]
    pub fn submit_kyc_document(
        &self,
        supplier_id: &str,
        document_type: DocumentType,
        file_reference: &str,
    ) -> MarketResult<KycDocument> {
        let document = KycDocument {
            id: new_id("kycdoc_")?,
            supplier_id: supplier_id.to_string(),
            document_type,
            file_reference: file_reference.to_string(),
            status: DocumentStatus::Pending,
            rejection_reason: None,
            submitted_at: TimeStamp::new(),
        };

        let supplier = self.store.commit_document(&document, |supplier, documents| {
            supplier.on_document_submitted(documents);
        })?;
        info!(document_id = %document.id, kyc_status = %supplier.kyc_status, "kyc document submitted");
        Ok(document)
    }

    /// Operator verdict on one document. Never changes the supplier's status.
    #[tracing::instrument(skip(self))]
    pub fn review_kyc_document(
        &self,
        supplier_id: &str,
        document_id: &str,
        review: DocumentReview,
        actor_id: &str,
    ) -> MarketResult<KycDocument> {
        let (mut file, raw) = self.store.kyc_file(supplier_id)?;
        let document = file
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| MarketError::not_found("kyc document", document_id))?;
        document.review(review)?;
        let reviewed = document.clone();

        self.store.swap_kyc_file(supplier_id, raw, &file)?;
        info!(status = ?reviewed.status, "kyc document reviewed");
        Ok(reviewed)
    }

    /// Applies to future settlements only; existing line items keep the rate
    /// they were settled at.
    #[tracing::instrument(skip(self))]
    pub fn set_commission_rate(&self, supplier_id: &str, percent: f64) -> MarketResult<Supplier> {
        let rate = CommissionRate::from_percent(percent)?;
        let (mut supplier, raw) = self.store.supplier(supplier_id)?;
        supplier.set_commission_rate(rate);
        self.store.swap_supplier(raw, &supplier)?;
        info!(commission_percent = rate.percent(), "commission rate changed");
        Ok(supplier)
    }

    // reporting

    /// Revenue over `range`, or the configured trailing window when `None`.
    pub fn aggregate_revenue(&self, range: Option<DateRange>, top_n: usize) -> MarketResult<RevenueReport> {
        let range = range.unwrap_or_else(|| DateRange::trailing_days(self.config.report_window_days));
        let orders: Vec<Order> = self
            .store
            .orders()?
            .into_iter()
            .filter(|o| range.contains(&o.created_at))
            .collect();

        let mut line_items = Vec::new();
        for order in &orders {
            line_items.extend(self.store.line_items(&order.id)?);
        }

        Ok(revenue::aggregate(&range, &orders, &line_items, top_n))
    }
}
