//! sled-backed persistence: one tree per entity, CBOR rows
//!
//! Rows are decoded into their entity type right here; nothing past this
//! module sees raw bytes. Multi-row writes go through sled transactions and
//! single-row state changes through compare-and-swap on the stored bytes.
use std::collections::BTreeMap;
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional, TransactionalTree};
use sled::{IVec, Tree};

use crate::catalog::{Cart, Product};
use crate::error::{MarketError, MarketResult};
use crate::order::{Order, OrderLineItem, Payment, PaymentStatus};
use crate::settlement::{SettlementRecords, SettlementRequest, build_records, price_cart};
use crate::supplier::{KycDocument, Supplier};
use crate::types::TimeStamp;

/// All documents a supplier has submitted, kept under the supplier's id so a
/// submission and the resulting status change commit together.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct KycFile {
    #[n(0)]
    pub documents: Vec<KycDocument>,
}

/// Why a settlement transaction gave up.
#[derive(Debug)]
pub(crate) enum SettleAbort {
    Market(MarketError),
    /// The generated order number is already indexed; retry with a new one.
    OrderNumberTaken,
}

impl From<MarketError> for SettleAbort {
    fn from(err: MarketError) -> Self {
        SettleAbort::Market(err)
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failpoint {
    AfterLineItems,
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> MarketResult<Vec<u8>> {
    minicbor::to_vec(value).map_err(|e| MarketError::Persistence(format!("encode failed: {e}")))
}

pub(crate) fn decode<T: for<'b> minicbor::Decode<'b, ()>>(entity: &str, bytes: &[u8]) -> MarketResult<T> {
    minicbor::decode(bytes)
        .map_err(|e| MarketError::Persistence(format!("stored {entity} row is malformed: {e}")))
}

fn fail<E: From<MarketError>>(err: MarketError) -> ConflictableTransactionError<E> {
    ConflictableTransactionError::Abort(E::from(err))
}

fn tx_get<T, E>(tree: &TransactionalTree, entity: &'static str, id: &str) -> Result<T, ConflictableTransactionError<E>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
    E: From<MarketError>,
{
    match tree.get(id.as_bytes())? {
        Some(bytes) => decode(entity, &bytes).map_err(fail::<E>),
        None => Err(fail::<E>(MarketError::not_found(entity, id))),
    }
}

fn tx_put<T, E>(tree: &TransactionalTree, key: &str, value: &T) -> Result<(), ConflictableTransactionError<E>>
where
    T: minicbor::Encode<()>,
    E: From<MarketError>,
{
    let bytes = encode(value).map_err(fail::<E>)?;
    tree.insert(key.as_bytes(), bytes)?;
    Ok(())
}

fn line_item_key(order_id: &str, line_no: u32) -> String {
    // wide enough for any u32 so keys sort in line order
    format!("{order_id}/{line_no:010}")
}

pub struct MarketStore {
    instance: Arc<sled::Db>,
    products: Tree,
    carts: Tree,
    orders: Tree,
    line_items: Tree,
    payments: Tree,
    suppliers: Tree,
    kyc_documents: Tree,
    order_numbers: Tree,
    #[cfg(test)]
    failpoint: Option<Failpoint>,
}

impl MarketStore {
    pub fn new(instance: Arc<sled::Db>) -> MarketResult<Self> {
        Ok(Self {
            products: instance.open_tree("products")?,
            carts: instance.open_tree("carts")?,
            orders: instance.open_tree("orders")?,
            line_items: instance.open_tree("order_line_items")?,
            payments: instance.open_tree("payments")?,
            suppliers: instance.open_tree("suppliers")?,
            kyc_documents: instance.open_tree("kyc_documents")?,
            order_numbers: instance.open_tree("order_numbers")?,
            instance,
            #[cfg(test)]
            failpoint: None,
        })
    }

    pub fn flush(&self) -> MarketResult<()> {
        self.instance.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_failpoint(&mut self, failpoint: Option<Failpoint>) {
        self.failpoint = failpoint;
    }

    #[cfg(test)]
    fn check_failpoint(&self, at: Failpoint) -> MarketResult<()> {
        if self.failpoint == Some(at) {
            return Err(MarketError::Persistence(format!("injected failure at {at:?}")));
        }
        Ok(())
    }

    fn load<T>(&self, tree: &Tree, entity: &'static str, id: &str) -> MarketResult<(T, IVec)>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let bytes = tree
            .get(id.as_bytes())?
            .ok_or_else(|| MarketError::not_found(entity, id))?;
        Ok((decode(entity, &bytes)?, bytes))
    }

    fn put<T: minicbor::Encode<()>>(&self, tree: &Tree, id: &str, value: &T) -> MarketResult<()> {
        tree.insert(id.as_bytes(), encode(value)?)?;
        Ok(())
    }

    /// Replaces `id` only if it still holds `expected`.
    fn swap<T: minicbor::Encode<()>>(
        &self,
        tree: &Tree,
        entity: &'static str,
        id: &str,
        expected: Option<IVec>,
        value: &T,
    ) -> MarketResult<()> {
        tree.compare_and_swap(id.as_bytes(), expected, Some(encode(value)?))?
            .map_err(|_| MarketError::Conflict(format!("{entity} {id} was modified concurrently")))
    }

    // products

    pub fn product(&self, id: &str) -> MarketResult<Product> {
        self.load(&self.products, "product", id).map(|(p, _)| p)
    }

    pub fn put_product(&self, product: &Product) -> MarketResult<()> {
        self.put(&self.products, &product.id, product)
    }

    // carts

    pub fn cart(&self, buyer_id: &str) -> MarketResult<(Cart, Option<IVec>)> {
        match self.carts.get(buyer_id.as_bytes())? {
            Some(bytes) => Ok((decode("cart", &bytes)?, Some(bytes))),
            None => Ok((Cart::default(), None)),
        }
    }

    pub fn swap_cart(&self, buyer_id: &str, expected: Option<IVec>, cart: &Cart) -> MarketResult<()> {
        self.swap(&self.carts, "cart", buyer_id, expected, cart)
    }

    // suppliers and their documents

    pub fn supplier(&self, id: &str) -> MarketResult<(Supplier, IVec)> {
        self.load(&self.suppliers, "supplier", id)
    }

    pub fn insert_supplier(&self, supplier: &Supplier) -> MarketResult<()> {
        self.swap(&self.suppliers, "supplier", &supplier.id, None, supplier)
    }

    pub fn swap_supplier(&self, expected: IVec, supplier: &Supplier) -> MarketResult<()> {
        self.swap(&self.suppliers, "supplier", &supplier.id, Some(expected), supplier)
    }

    pub fn kyc_file(&self, supplier_id: &str) -> MarketResult<(KycFile, Option<IVec>)> {
        match self.kyc_documents.get(supplier_id.as_bytes())? {
            Some(bytes) => Ok((decode("kyc file", &bytes)?, Some(bytes))),
            None => Ok((KycFile::default(), None)),
        }
    }

    pub fn swap_kyc_file(&self, supplier_id: &str, expected: Option<IVec>, file: &KycFile) -> MarketResult<()> {
        self.swap(&self.kyc_documents, "kyc file", supplier_id, expected, file)
    }

    /// Appends a document and lets `on_submitted` update the supplier, both in
    /// one transaction. Returns the supplier as written.
    pub fn commit_document<F>(&self, document: &KycDocument, on_submitted: F) -> MarketResult<Supplier>
    where
        F: Fn(&mut Supplier, &[KycDocument]),
    {
        let supplier_id = document.supplier_id.as_str();
        let result: Result<Supplier, TransactionError<MarketError>> =
            (&self.suppliers, &self.kyc_documents).transaction(|(suppliers, kyc)| {
                let mut supplier = tx_get::<Supplier, MarketError>(suppliers, "supplier", supplier_id)?;
                let mut file = match kyc.get(supplier_id.as_bytes())? {
                    Some(bytes) => decode::<KycFile>("kyc file", &bytes).map_err(fail::<MarketError>)?,
                    None => KycFile::default(),
                };
                file.documents.push(document.clone());
                on_submitted(&mut supplier, &file.documents);

                tx_put::<_, MarketError>(kyc, supplier_id, &file)?;
                tx_put::<_, MarketError>(suppliers, supplier_id, &supplier)?;
                Ok(supplier)
            });
        result.map_err(MarketError::from)
    }

    // orders

    pub fn order(&self, id: &str) -> MarketResult<(Order, IVec)> {
        self.load(&self.orders, "order", id)
    }

    pub fn swap_order(&self, expected: IVec, order: &Order) -> MarketResult<()> {
        self.swap(&self.orders, "order", &order.id, Some(expected), order)
    }

    pub fn order_id_for_number(&self, order_number: &str) -> MarketResult<Option<String>> {
        Ok(self
            .order_numbers
            .get(order_number.as_bytes())?
            .map(|id| String::from_utf8_lossy(&id).into_owned()))
    }

    pub fn orders(&self) -> MarketResult<Vec<Order>> {
        self.orders
            .iter()
            .values()
            .map(|bytes| decode("order", &bytes?))
            .collect()
    }

    pub fn line_items(&self, order_id: &str) -> MarketResult<Vec<OrderLineItem>> {
        self.line_items
            .scan_prefix(format!("{order_id}/").as_bytes())
            .values()
            .map(|bytes| decode("order line item", &bytes?))
            .collect()
    }

    pub fn payment(&self, order_id: &str) -> MarketResult<Payment> {
        self.load(&self.payments, "payment", order_id).map(|(p, _)| p)
    }

    /// Marks the order refunded and its payment refunded together.
    pub fn commit_refund<F>(&self, order_id: &str, apply: F) -> MarketResult<Order>
    where
        F: Fn(&mut Order) -> MarketResult<()>,
    {
        let result: Result<Order, TransactionError<MarketError>> =
            (&self.orders, &self.payments).transaction(|(orders, payments)| {
                let mut order = tx_get::<Order, MarketError>(orders, "order", order_id)?;
                apply(&mut order).map_err(fail::<MarketError>)?;

                let mut payment = tx_get::<Payment, MarketError>(payments, "payment", order_id)?;
                payment.status = PaymentStatus::Refunded;

                tx_put::<_, MarketError>(orders, order_id, &order)?;
                tx_put::<_, MarketError>(payments, order_id, &payment)?;
                Ok(order)
            });
        result.map_err(MarketError::from)
    }

    /// Writes the whole settlement, or nothing.
    ///
    /// Inside one transaction: the stored cart must still equal the request's
    /// snapshot, the order number must be unused, every product must have the
    /// stock for its line. Then the order, its line items, the payment and the
    /// order number index are written, stock is decremented and the cart is
    /// removed.
    pub(crate) fn commit_settlement(
        &self,
        request: &SettlementRequest,
        order_id: &str,
        order_number: &str,
        gateway: &str,
        now: TimeStamp,
    ) -> Result<SettlementRecords, SettleAbort> {
        let buyer = request.buyer();
        let trees = (
            &self.carts,
            &self.order_numbers,
            &self.products,
            &self.suppliers,
            &self.orders,
            &self.line_items,
            &self.payments,
        );

        let result: Result<SettlementRecords, TransactionError<SettleAbort>> = trees.transaction(
            |(carts, numbers, products, suppliers, orders, line_items, payments)| {
                let stored = match carts.get(buyer.id.as_bytes())? {
                    Some(bytes) => decode::<Cart>("cart", &bytes).map_err(fail::<SettleAbort>)?,
                    None => Cart::default(),
                };
                if stored.lines != request.lines() {
                    return Err(fail::<SettleAbort>(MarketError::Conflict(format!(
                        "cart for buyer {} changed since it was read",
                        buyer.id
                    ))));
                }
                if numbers.get(order_number.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(SettleAbort::OrderNumberTaken));
                }

                // stock left per product after the lines seen so far
                let mut remaining: BTreeMap<String, Product> = BTreeMap::new();
                let mut rows = Vec::with_capacity(stored.lines.len());
                for line in &stored.lines {
                    let product = match remaining.get(&line.product_id) {
                        Some(product) => product.clone(),
                        None => tx_get::<Product, SettleAbort>(products, "product", &line.product_id)?,
                    };
                    if product.stock < line.quantity {
                        return Err(fail::<SettleAbort>(MarketError::Conflict(format!(
                            "product {} has {} in stock, {} requested",
                            product.id, product.stock, line.quantity
                        ))));
                    }
                    let supplier = tx_get::<Supplier, SettleAbort>(suppliers, "supplier", &product.supplier_id)?;

                    let mut left = product.clone();
                    left.stock -= line.quantity;
                    remaining.insert(left.id.clone(), left);
                    rows.push((line.clone(), product, supplier));
                }

                let priced = price_cart(buyer.class, &rows)
                    .map_err(|e| fail::<SettleAbort>(MarketError::from(e)))?;
                let records = build_records(request, &priced, order_id, order_number, gateway, now);

                tx_put::<_, SettleAbort>(orders, order_id, &records.order)?;
                for item in &records.line_items {
                    tx_put::<_, SettleAbort>(line_items, &line_item_key(order_id, item.line_no), item)?;
                }
                #[cfg(test)]
                self.check_failpoint(Failpoint::AfterLineItems)
                    .map_err(fail::<SettleAbort>)?;
                tx_put::<_, SettleAbort>(payments, order_id, &records.payment)?;
                numbers.insert(order_number.as_bytes(), order_id.as_bytes())?;

                for product in remaining.values() {
                    tx_put::<_, SettleAbort>(products, &product.id, product)?;
                }
                carts.remove(buyer.id.as_bytes())?;

                Ok(records)
            },
        );

        result.map_err(|err| match err {
            TransactionError::Abort(reason) => reason,
            TransactionError::Storage(storage) => SettleAbort::Market(storage.into()),
        })
    }
}
