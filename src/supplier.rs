//! Supplier KYC lifecycle
//!
//! ```text
//! pending -> under_review -> approved
//!    |            |             ^
//!    +--> rejected <+           | (operator override)
//!            |------------------+
//!            +--> pending   (once every required document type is resubmitted)
//! ```
//!
//! Approval is always an explicit operator action. Document reviews and
//! resubmissions never approve a supplier on their own.
use std::collections::HashSet;
use std::fmt;

use crate::error::{MarketError, ValidationError};
use crate::pricing::CommissionRate;
use crate::types::TimeStamp;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KycStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    UnderReview,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::UnderReview => "under_review",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    #[n(0)]
    BusinessLicense,
    #[n(1)]
    TaxCertificate,
    #[n(2)]
    OwnerIdentity,
}

impl DocumentType {
    pub const REQUIRED: [DocumentType; 3] = [
        DocumentType::BusinessLicense,
        DocumentType::TaxCertificate,
        DocumentType::OwnerIdentity,
    ];
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct KycDocument {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub supplier_id: String,
    #[n(2)]
    pub document_type: DocumentType,
    #[n(3)]
    pub file_reference: String,
    #[n(4)]
    pub status: DocumentStatus,
    #[n(5)]
    pub rejection_reason: Option<String>,
    #[n(6)]
    pub submitted_at: TimeStamp,
}

/// Operator verdict on a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentReview {
    Approve,
    Reject { reason: String },
}

impl KycDocument {
    pub fn review(&mut self, review: DocumentReview) -> Result<(), ValidationError> {
        match review {
            DocumentReview::Approve => {
                self.status = DocumentStatus::Approved;
                self.rejection_reason = None;
            }
            DocumentReview::Reject { reason } => {
                self.rejection_reason = Some(non_empty_reason(Some(reason.as_str()))?);
                self.status = DocumentStatus::Rejected;
            }
        }
        Ok(())
    }
}

/// Every required document type has at least one submission, whatever its
/// review status.
pub fn has_required_documents(documents: &[KycDocument]) -> bool {
    let submitted: HashSet<DocumentType> = documents.iter().map(|d| d.document_type).collect();
    DocumentType::REQUIRED.iter().all(|t| submitted.contains(t))
}

fn non_empty_reason(reason: Option<&str>) -> Result<String, ValidationError> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(ValidationError::EmptyRejectionReason),
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub business_name: String,
    #[n(3)]
    pub registration_number: Option<String>,
    #[n(4)]
    pub kyc_status: KycStatus,
    #[n(5)]
    pub commission_rate: CommissionRate,
    #[n(6)]
    pub rejection_reason: Option<String>,
    #[n(7)]
    pub created_at: TimeStamp,
    #[n(8)]
    pub updated_at: TimeStamp,
}

impl Supplier {
    pub fn is_approved(&self) -> bool {
        self.kyc_status == KycStatus::Approved
    }

    fn invalid(&self, to: KycStatus) -> MarketError {
        MarketError::InvalidTransition {
            entity: "supplier",
            from: self.kyc_status.to_string(),
            to: to.to_string(),
        }
    }

    /// Operator-driven status change. `documents` are the supplier's current
    /// submissions; they gate approval out of `under_review`.
    pub fn set_status(
        &mut self,
        target: KycStatus,
        reason: Option<&str>,
        documents: &[KycDocument],
    ) -> Result<(), MarketError> {
        use KycStatus::*;

        match (self.kyc_status, target) {
            (Pending, UnderReview) => {}
            (Pending | UnderReview, Rejected) => {
                self.rejection_reason = Some(non_empty_reason(reason)?);
            }
            (UnderReview, Approved) => {
                if !has_required_documents(documents) {
                    return Err(MarketError::Conflict(format!(
                        "supplier {} is missing required documents",
                        self.id
                    )));
                }
                self.rejection_reason = None;
            }
            // operator override
            (Rejected, Approved) => self.rejection_reason = None,
            _ => return Err(self.invalid(target)),
        }

        self.kyc_status = target;
        self.updated_at = TimeStamp::new();
        Ok(())
    }

    /// Applied after a document submission. A rejected supplier returns to
    /// `pending` only once every required type has a submission. Returns
    /// whether the status changed.
    pub fn on_document_submitted(&mut self, documents: &[KycDocument]) -> bool {
        if self.kyc_status == KycStatus::Rejected && has_required_documents(documents) {
            self.kyc_status = KycStatus::Pending;
            self.rejection_reason = None;
            self.updated_at = TimeStamp::new();
            return true;
        }
        false
    }

    pub fn set_commission_rate(&mut self, rate: CommissionRate) {
        self.commission_rate = rate;
        self.updated_at = TimeStamp::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(status: KycStatus) -> Supplier {
        let now = TimeStamp::new();
        Supplier {
            id: "supplier_1".into(),
            user_id: "user_1".into(),
            business_name: "Adire Works".into(),
            registration_number: None,
            kyc_status: status,
            commission_rate: CommissionRate::TEN_PERCENT,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn doc(document_type: DocumentType) -> KycDocument {
        KycDocument {
            id: "doc".into(),
            supplier_id: "supplier_1".into(),
            document_type,
            file_reference: "files/doc.pdf".into(),
            status: DocumentStatus::Pending,
            rejection_reason: None,
            submitted_at: TimeStamp::new(),
        }
    }

    fn all_docs() -> Vec<KycDocument> {
        DocumentType::REQUIRED.iter().map(|t| doc(*t)).collect()
    }

    #[test]
    fn rejection_needs_a_reason() {
        let mut s = supplier(KycStatus::UnderReview);
        let err = s.set_status(KycStatus::Rejected, Some("   "), &[]).unwrap_err();
        assert_eq!(err, MarketError::Validation(ValidationError::EmptyRejectionReason));
        assert_eq!(s.kyc_status, KycStatus::UnderReview);

        s.set_status(KycStatus::Rejected, Some("blurry licence"), &[]).unwrap();
        assert_eq!(s.rejection_reason.as_deref(), Some("blurry licence"));
    }

    #[test]
    fn approval_from_review_needs_every_document_type() {
        let mut s = supplier(KycStatus::UnderReview);
        let partial = vec![doc(DocumentType::BusinessLicense), doc(DocumentType::TaxCertificate)];
        assert!(s.set_status(KycStatus::Approved, None, &partial).is_err());
        assert!(s.set_status(KycStatus::Approved, None, &all_docs()).is_ok());
        assert!(s.is_approved());
    }

    #[test]
    fn force_approve_clears_the_reason() {
        let mut s = supplier(KycStatus::Pending);
        s.set_status(KycStatus::Rejected, Some("expired id"), &[]).unwrap();
        s.set_status(KycStatus::Approved, None, &[]).unwrap();
        assert_eq!(s.kyc_status, KycStatus::Approved);
        assert_eq!(s.rejection_reason, None);
    }

    #[test]
    fn approved_is_terminal() {
        let mut s = supplier(KycStatus::Approved);
        for target in [KycStatus::Pending, KycStatus::UnderReview, KycStatus::Rejected, KycStatus::Approved] {
            assert!(matches!(
                s.set_status(target, Some("reason"), &all_docs()),
                Err(MarketError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn pending_cannot_skip_review() {
        let mut s = supplier(KycStatus::Pending);
        assert!(s.set_status(KycStatus::Approved, None, &all_docs()).is_err());
    }

    #[test]
    fn resubmission_returns_to_pending_only_when_complete() {
        let mut s = supplier(KycStatus::Rejected);
        s.rejection_reason = Some("missing tax certificate".into());

        let partial = vec![doc(DocumentType::BusinessLicense), doc(DocumentType::OwnerIdentity)];
        assert!(!s.on_document_submitted(&partial));
        assert_eq!(s.kyc_status, KycStatus::Rejected);

        assert!(s.on_document_submitted(&all_docs()));
        assert_eq!(s.kyc_status, KycStatus::Pending);
        assert_eq!(s.rejection_reason, None);
    }

    #[test]
    fn document_review_requires_reason_for_rejection() {
        let mut d = doc(DocumentType::TaxCertificate);
        assert!(d.review(DocumentReview::Reject { reason: "".into() }).is_err());
        assert_eq!(d.status, DocumentStatus::Pending);
        d.review(DocumentReview::Reject { reason: "illegible".into() }).unwrap();
        assert_eq!(d.status, DocumentStatus::Rejected);
        d.review(DocumentReview::Approve).unwrap();
        assert_eq!(d.rejection_reason, None);
    }
}
