//! Property-based tests for the order and supplier state machines
//!
//! Random operation sequences are replayed against the in-memory entities.
//! Whatever the sequence, the entities must only ever take the documented
//! edges and the history must record exactly the steps that succeeded.

use proptest::prelude::*;
use marketplace_settlement::{
    order::{Address, Order, OrderStatus},
    pricing::CommissionRate,
    supplier::{DocumentStatus, DocumentType, KycDocument, KycStatus, Supplier},
    types::{Currency, TimeStamp},
};

#[derive(Debug, Clone, Copy)]
enum OrderOp {
    Advance,
    Cancel,
    Refund,
}

fn order_op_strategy() -> impl Strategy<Value = OrderOp> {
    prop_oneof![
        3 => Just(OrderOp::Advance),
        1 => Just(OrderOp::Cancel),
        1 => Just(OrderOp::Refund),
    ]
}

fn pending_order() -> Order {
    let now = TimeStamp::new();
    Order {
        id: "order_1".into(),
        order_number: "ORD-20250101-000000000000".into(),
        buyer_id: "buyer_1".into(),
        status: OrderStatus::Pending,
        subtotal: 1_000,
        commission: 100,
        total: 1_000,
        currency: Currency::USD,
        shipping_address: Address::default(),
        billing_address: Address::default(),
        cart_digest: String::new(),
        created_at: now,
        updated_at: now,
        history: vec![],
    }
}

fn allowed_order_edge(from: OrderStatus, to: OrderStatus) -> bool {
    from.next() == Some(to)
        || (to == OrderStatus::Cancelled && from.can_cancel())
        || (to == OrderStatus::Refunded && from.can_refund())
}

proptest! {
    #[test]
    fn orders_only_take_documented_edges(ops in prop::collection::vec(order_op_strategy(), 0..20)) {
        let mut order = pending_order();
        let mut successes = 0;

        for op in ops {
            let before = order.status;
            let result = match op {
                OrderOp::Advance => order.advance(before, "ops_1").map(|_| ()),
                OrderOp::Cancel => order.cancel(before, "ops_1"),
                OrderOp::Refund => order.refund(before, "ops_1"),
            };
            match result {
                Ok(()) => {
                    successes += 1;
                    prop_assert!(allowed_order_edge(before, order.status));
                }
                Err(_) => prop_assert_eq!(order.status, before),
            }
        }

        prop_assert_eq!(order.history.len(), successes);
        for change in &order.history {
            prop_assert!(allowed_order_edge(change.from, change.to));
        }
    }

    /// Refunded is a dead end
    #[test]
    fn refunded_orders_reject_everything(ops in prop::collection::vec(order_op_strategy(), 1..10)) {
        let mut order = pending_order();
        order.cancel(OrderStatus::Pending, "ops_1").unwrap();
        order.refund(OrderStatus::Cancelled, "ops_1").unwrap();

        for op in ops {
            let result = match op {
                OrderOp::Advance => order.advance(OrderStatus::Refunded, "ops_1").map(|_| ()),
                OrderOp::Cancel => order.cancel(OrderStatus::Refunded, "ops_1"),
                OrderOp::Refund => order.refund(OrderStatus::Refunded, "ops_1"),
            };
            prop_assert!(result.is_err());
        }
        prop_assert_eq!(order.status, OrderStatus::Refunded);
    }

    /// A caller holding a stale status never moves the order
    #[test]
    fn stale_expected_status_never_applies(steps in 0usize..4, stale in 0usize..7) {
        let mut order = pending_order();
        for _ in 0..steps {
            let current = order.status;
            order.advance(current, "ops_1").unwrap();
        }
        let expected = OrderStatus::ALL[stale];
        prop_assume!(expected != order.status);

        let before = order.clone();
        prop_assert!(order.advance(expected, "ops_2").is_err());
        prop_assert!(order.cancel(expected, "ops_2").is_err());
        prop_assert_eq!(order, before);
    }
}

// SUPPLIER PROPERTIES

#[derive(Debug, Clone)]
enum SupplierOp {
    SetStatus(KycStatus, Option<String>),
    Submit(DocumentType),
}

fn kyc_status_strategy() -> impl Strategy<Value = KycStatus> {
    prop_oneof![
        Just(KycStatus::Pending),
        Just(KycStatus::UnderReview),
        Just(KycStatus::Approved),
        Just(KycStatus::Rejected),
    ]
}

fn supplier_op_strategy() -> impl Strategy<Value = SupplierOp> {
    let reason = prop_oneof![Just(None), Just(Some(String::new())), Just(Some("blurred scan".to_string()))];
    prop_oneof![
        (kyc_status_strategy(), reason).prop_map(|(s, r)| SupplierOp::SetStatus(s, r)),
        prop::sample::select(DocumentType::REQUIRED.to_vec()).prop_map(SupplierOp::Submit),
    ]
}

fn new_supplier() -> Supplier {
    let now = TimeStamp::new();
    Supplier {
        id: "supplier_1".into(),
        user_id: "user_1".into(),
        business_name: "Indigo Mill".into(),
        registration_number: None,
        kyc_status: KycStatus::Pending,
        commission_rate: CommissionRate::TEN_PERCENT,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn document(document_type: DocumentType) -> KycDocument {
    KycDocument {
        id: "kycdoc_1".into(),
        supplier_id: "supplier_1".into(),
        document_type,
        file_reference: "files/scan.pdf".into(),
        status: DocumentStatus::Pending,
        rejection_reason: None,
        submitted_at: TimeStamp::new(),
    }
}

proptest! {
    #[test]
    fn suppliers_only_take_documented_edges(ops in prop::collection::vec(supplier_op_strategy(), 0..25)) {
        let mut supplier = new_supplier();
        let mut documents: Vec<KycDocument> = vec![];

        for op in ops {
            let before = supplier.kyc_status;
            match op {
                SupplierOp::Submit(document_type) => {
                    documents.push(document(document_type));
                    let changed = supplier.on_document_submitted(&documents);
                    prop_assert_eq!(changed, before != supplier.kyc_status);
                    if changed {
                        prop_assert_eq!(before, KycStatus::Rejected);
                        prop_assert_eq!(supplier.kyc_status, KycStatus::Pending);
                    }
                }
                SupplierOp::SetStatus(target, reason) => {
                    match supplier.set_status(target, reason.as_deref(), &documents) {
                        Ok(()) => {
                            let allowed = matches!(
                                (before, target),
                                (KycStatus::Pending, KycStatus::UnderReview)
                                    | (KycStatus::Pending | KycStatus::UnderReview, KycStatus::Rejected)
                                    | (KycStatus::UnderReview | KycStatus::Rejected, KycStatus::Approved)
                            );
                            prop_assert!(allowed, "{before} -> {target} should not be allowed");
                        }
                        Err(_) => prop_assert_eq!(supplier.kyc_status, before),
                    }
                }
            }

            // a rejected supplier always carries a non-empty reason
            match supplier.kyc_status {
                KycStatus::Rejected => {
                    prop_assert!(supplier.rejection_reason.as_deref().is_some_and(|r| !r.trim().is_empty()));
                }
                _ => prop_assert!(supplier.rejection_reason.is_none()),
            }
        }
    }

    /// Once approved, nothing an operator or the supplier does moves it again
    #[test]
    fn approved_is_final(ops in prop::collection::vec(supplier_op_strategy(), 1..15)) {
        let mut supplier = new_supplier();
        let mut documents: Vec<KycDocument> = DocumentType::REQUIRED.iter().map(|t| document(*t)).collect();
        supplier.set_status(KycStatus::UnderReview, None, &documents).unwrap();
        supplier.set_status(KycStatus::Approved, None, &documents).unwrap();

        for op in ops {
            match op {
                SupplierOp::Submit(document_type) => {
                    documents.push(document(document_type));
                    supplier.on_document_submitted(&documents);
                }
                SupplierOp::SetStatus(target, reason) => {
                    let _ = supplier.set_status(target, reason.as_deref(), &documents);
                }
            }
            prop_assert_eq!(supplier.kyc_status, KycStatus::Approved);
        }
    }
}
