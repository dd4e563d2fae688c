//! Two-stage loan approval queue.
//!
//! Raw backend records are projected into read-only view-models on every
//! fetch; approval actions go straight to the backend and the queue is
//! refreshed on success, so the local list never mutates optimistically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{LoanError, Result};
use crate::services::{BackOffice, BankDetail, LoanDetail, LoanRecord};
use crate::types::{
    ApprovalAction, FirstApprovalStatus, LoanId, LoanStatus, OverallApprovalStatus,
    SecondApprovalStatus,
};

/// read-only approval-queue view of a loan, regenerated on every fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApprovalItem {
    pub id: LoanId,
    pub serial_no: String,
    pub contract_no: String,
    pub customer_name: String,
    pub customer_nic: String,
    pub staff_name: String,
    pub submitted_at: DateTime<Utc>,
    pub first_status: FirstApprovalStatus,
    pub first_approved_by: Option<String>,
    pub first_approved_at: Option<DateTime<Utc>>,
    pub second_status: Option<SecondApprovalStatus>,
    pub second_approved_by: Option<String>,
    pub second_approved_at: Option<DateTime<Utc>>,
    pub overall_status: OverallApprovalStatus,
    pub rejection_reason: Option<String>,
    pub loan_detail: LoanDetail,
    pub bank_detail: BankDetail,
}

impl LoanApprovalItem {
    /// derive the stage and overall statuses from the approval level and the
    /// raw status; `sent_back` overrides the first-stage display
    pub fn from_record(record: &LoanRecord) -> Self {
        let sent_back = record.status == LoanStatus::SentBack;

        let first_status = if sent_back {
            FirstApprovalStatus::SentBack
        } else if record.approval_level >= 1 {
            FirstApprovalStatus::Approved
        } else {
            FirstApprovalStatus::Pending
        };

        let second_status = match record.approval_level {
            0 => None,
            1 => Some(SecondApprovalStatus::Pending),
            _ => Some(SecondApprovalStatus::Approved),
        };

        let overall_status = if sent_back {
            OverallApprovalStatus::SentBack
        } else if record.approval_level >= 2 {
            OverallApprovalStatus::Approved
        } else if record.approval_level == 1 {
            OverallApprovalStatus::Pending2nd
        } else {
            OverallApprovalStatus::Pending1st
        };

        Self {
            id: record.id,
            serial_no: record.serial_no.clone(),
            contract_no: record.contract_no.clone(),
            customer_name: record.customer_name.clone(),
            customer_nic: record.customer_nic.clone(),
            staff_name: record.staff_name.clone(),
            submitted_at: record.submitted_at,
            first_status,
            first_approved_by: record.first_approved_by.clone(),
            first_approved_at: record.first_approved_at,
            second_status,
            second_approved_by: record.second_approved_by.clone(),
            second_approved_at: record.second_approved_at,
            overall_status,
            rejection_reason: record.rejection_reason.clone(),
            loan_detail: record.loan_detail.clone(),
            bank_detail: record.bank_detail.clone(),
        }
    }

    /// case-insensitive substring match across contract number, customer
    /// name and NIC
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        self.contract_no.to_lowercase().contains(&needle)
            || self.customer_name.to_lowercase().contains(&needle)
            || self.customer_nic.to_lowercase().contains(&needle)
    }
}

pub struct LoanApprovalController<B: BackOffice> {
    backend: B,
    items: Vec<LoanApprovalItem>,
    processing: bool,
    open_detail: Option<LoanId>,
}

impl<B: BackOffice> LoanApprovalController<B> {
    pub fn new(backend: B) -> Self {
        let mut controller = Self {
            backend,
            items: Vec::new(),
            processing: false,
            open_detail: None,
        };
        controller.refresh();
        controller
    }

    /// reload the queue; only loans awaiting a stage are kept, and a load
    /// failure leaves the queue empty rather than stale
    pub fn refresh(&mut self) {
        let records = self.backend.pending_loans().unwrap_or_else(|e| {
            warn!(error = %e, "approval queue load failed");
            Vec::new()
        });
        self.items = records
            .iter()
            .filter(|r| matches!(r.status, LoanStatus::Pending1st | LoanStatus::Pending2nd))
            .map(LoanApprovalItem::from_record)
            .collect();
    }

    /// drive the first approval stage
    pub fn handle_first_approval(
        &mut self,
        loan_id: LoanId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<()> {
        self.handle_stage(loan_id, action, reason)
    }

    /// drive the second approval stage
    pub fn handle_second_approval(
        &mut self,
        loan_id: LoanId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<()> {
        self.handle_stage(loan_id, action, reason)
    }

    fn handle_stage(
        &mut self,
        loan_id: LoanId,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> Result<()> {
        if !self.items.iter().any(|i| i.id == loan_id) {
            return Err(LoanError::LoanNotInQueue { id: loan_id });
        }

        self.processing = true;
        let outcome = self.backend.approve_loan(loan_id, action.as_token(), reason);
        // processing must clear on both arms before anything else happens
        self.processing = false;

        match outcome {
            Ok(()) => {
                self.refresh();
                self.close_detail();
                Ok(())
            }
            Err(e) => {
                warn!(loan = %loan_id, error = %e, "approval action failed");
                Err(LoanError::ApprovalFailed {
                    id: loan_id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// queue narrowed by search text and an optional exact status filter
    pub fn filtered(
        &self,
        search: &str,
        status: Option<OverallApprovalStatus>,
    ) -> Vec<&LoanApprovalItem> {
        self.items
            .iter()
            .filter(|i| i.matches_search(search))
            .filter(|i| status.map_or(true, |s| i.overall_status == s))
            .collect()
    }

    pub fn items(&self) -> &[LoanApprovalItem] {
        &self.items
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn open_detail(&mut self, loan_id: LoanId) {
        if self.items.iter().any(|i| i.id == loan_id) {
            self.open_detail = Some(loan_id);
        }
    }

    pub fn close_detail(&mut self) {
        self.open_detail = None;
    }

    pub fn detail(&self) -> Option<&LoanApprovalItem> {
        let id = self.open_detail?;
        self.items.iter().find(|i| i.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::services::{
        CenterRecord, CustomerProfile, CustomerRecord, GroupRecord, JointBorrowerDetails,
        LoanProduct, StaffRecord,
    };
    use crate::types::RentalType;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use uuid::Uuid;

    struct FakeLoanService {
        records: RefCell<Vec<LoanRecord>>,
        fail_approvals: bool,
        approvals: RefCell<Vec<(LoanId, String, Option<String>)>>,
    }

    impl FakeLoanService {
        fn new(records: Vec<LoanRecord>) -> Self {
            Self {
                records: RefCell::new(records),
                fail_approvals: false,
                approvals: RefCell::new(Vec::new()),
            }
        }
    }

    impl BackOffice for FakeLoanService {
        fn centers(&self) -> Result<Vec<CenterRecord>> {
            Ok(Vec::new())
        }
        fn groups(&self, _center_id: &str) -> Result<Vec<GroupRecord>> {
            Ok(Vec::new())
        }
        fn customers(
            &self,
            _center_id: &str,
            _group_id: Option<&str>,
        ) -> Result<Vec<CustomerRecord>> {
            Ok(Vec::new())
        }
        fn customers_by_nic(&self, _nic: &str) -> Result<Vec<CustomerRecord>> {
            Ok(Vec::new())
        }
        fn customer_profile(&self, customer_id: &str) -> Result<CustomerProfile> {
            Err(LoanError::CustomerNotFound {
                id: customer_id.to_string(),
            })
        }
        fn loan_products(&self) -> Result<Vec<LoanProduct>> {
            Ok(Vec::new())
        }
        fn staff(&self) -> Result<Vec<StaffRecord>> {
            Ok(Vec::new())
        }
        fn joint_borrower_by_nic(&self, _nic: &str) -> Result<Option<JointBorrowerDetails>> {
            Ok(None)
        }
        fn pending_loans(&self) -> Result<Vec<LoanRecord>> {
            Ok(self.records.borrow().clone())
        }
        fn approve_loan(
            &self,
            loan_id: LoanId,
            action: &str,
            reason: Option<&str>,
        ) -> Result<()> {
            if self.fail_approvals {
                return Err(LoanError::Service {
                    message: "500".to_string(),
                });
            }
            self.approvals.borrow_mut().push((
                loan_id,
                action.to_string(),
                reason.map(str::to_string),
            ));
            // first-stage approval moves the loan to the second stage
            let mut records = self.records.borrow_mut();
            if let Some(record) = records.iter_mut().find(|r| r.id == loan_id) {
                match action {
                    "approve" if record.approval_level == 0 => {
                        record.approval_level = 1;
                        record.status = LoanStatus::Pending2nd;
                    }
                    "approve" => {
                        record.approval_level = 2;
                        record.status = LoanStatus::Approved;
                    }
                    _ => {
                        record.status = LoanStatus::SentBack;
                    }
                }
            }
            Ok(())
        }
    }

    fn record(contract: &str, name: &str, nic: &str, status: LoanStatus, level: u8) -> LoanRecord {
        LoanRecord {
            id: Uuid::new_v4(),
            serial_no: format!("S-{contract}"),
            contract_no: contract.to_string(),
            customer_name: name.to_string(),
            customer_nic: nic.to_string(),
            staff_name: "Nadeesha".to_string(),
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap(),
            status,
            approval_level: level,
            first_approved_by: (level >= 1).then(|| "Manager A".to_string()),
            first_approved_at: None,
            second_approved_by: None,
            second_approved_at: None,
            rejection_reason: None,
            loan_detail: LoanDetail {
                amount: Money::from_major(50_000),
                interest_rate: dec!(22),
                tenure: 48,
                rental_type: RentalType::Weekly,
            },
            bank_detail: BankDetail::default(),
        }
    }

    #[test]
    fn test_queue_keeps_only_pending_stages() {
        let records = vec![
            record("CT-001", "K. Silva", "881234567V", LoanStatus::Pending1st, 0),
            record("CT-002", "A. Fernando", "882234567V", LoanStatus::Pending2nd, 1),
            record("CT-003", "B. Dias", "883234567V", LoanStatus::Active, 2),
            record("CT-004", "C. Peris", "884234567V", LoanStatus::SentBack, 0),
        ];
        let controller = LoanApprovalController::new(FakeLoanService::new(records));

        let contracts: Vec<&str> = controller
            .items()
            .iter()
            .map(|i| i.contract_no.as_str())
            .collect();
        assert_eq!(contracts, vec!["CT-001", "CT-002"]);
    }

    #[test]
    fn test_status_derivation() {
        let fresh = LoanApprovalItem::from_record(&record(
            "CT-001",
            "K. Silva",
            "881234567V",
            LoanStatus::Pending1st,
            0,
        ));
        assert_eq!(fresh.first_status, FirstApprovalStatus::Pending);
        assert_eq!(fresh.second_status, None);
        assert_eq!(fresh.overall_status, OverallApprovalStatus::Pending1st);
        assert_eq!(fresh.overall_status.label(), "Pending 1st");

        let half = LoanApprovalItem::from_record(&record(
            "CT-002",
            "A. Fernando",
            "882234567V",
            LoanStatus::Pending2nd,
            1,
        ));
        assert_eq!(half.first_status, FirstApprovalStatus::Approved);
        assert_eq!(half.second_status, Some(SecondApprovalStatus::Pending));
        assert_eq!(half.overall_status, OverallApprovalStatus::Pending2nd);

        let done = LoanApprovalItem::from_record(&record(
            "CT-003",
            "B. Dias",
            "883234567V",
            LoanStatus::Approved,
            2,
        ));
        assert_eq!(done.second_status, Some(SecondApprovalStatus::Approved));
        assert_eq!(done.overall_status, OverallApprovalStatus::Approved);

        // sent_back overrides the first-stage display regardless of level
        let returned = LoanApprovalItem::from_record(&record(
            "CT-004",
            "C. Peris",
            "884234567V",
            LoanStatus::SentBack,
            1,
        ));
        assert_eq!(returned.first_status, FirstApprovalStatus::SentBack);
        assert_eq!(returned.overall_status, OverallApprovalStatus::SentBack);
    }

    #[test]
    fn test_first_approval_refreshes_and_closes_detail() {
        let target = record("CT-001", "K. Silva", "881234567V", LoanStatus::Pending1st, 0);
        let id = target.id;
        let mut controller = LoanApprovalController::new(FakeLoanService::new(vec![target]));

        controller.open_detail(id);
        assert!(controller.detail().is_some());

        controller
            .handle_first_approval(id, ApprovalAction::Approve, None)
            .unwrap();

        assert!(!controller.is_processing());
        assert!(controller.detail().is_none());
        // the refreshed queue shows the loan at the second stage
        assert_eq!(
            controller.items()[0].overall_status,
            OverallApprovalStatus::Pending2nd
        );
        assert_eq!(
            controller.backend.approvals.borrow()[0].1,
            "approve".to_string()
        );
    }

    #[test]
    fn test_send_back_token_and_reason() {
        let target = record("CT-001", "K. Silva", "881234567V", LoanStatus::Pending1st, 0);
        let id = target.id;
        let mut controller = LoanApprovalController::new(FakeLoanService::new(vec![target]));

        controller
            .handle_first_approval(id, ApprovalAction::SendBack, Some("photo unreadable"))
            .unwrap();

        let calls = controller.backend.approvals.borrow();
        assert_eq!(calls[0].1, "send_back");
        assert_eq!(calls[0].2.as_deref(), Some("photo unreadable"));
        // a sent-back loan leaves the queue on refresh
        drop(calls);
        assert!(controller.items().is_empty());
    }

    #[test]
    fn test_failed_approval_leaves_queue_unchanged() {
        let target = record("CT-001", "K. Silva", "881234567V", LoanStatus::Pending1st, 0);
        let id = target.id;
        let mut service = FakeLoanService::new(vec![target]);
        service.fail_approvals = true;
        let mut controller = LoanApprovalController::new(service);

        let result = controller.handle_second_approval(id, ApprovalAction::Approve, None);
        assert!(matches!(result, Err(LoanError::ApprovalFailed { .. })));
        assert!(!controller.is_processing());
        assert_eq!(controller.items().len(), 1);
        assert_eq!(
            controller.items()[0].overall_status,
            OverallApprovalStatus::Pending1st
        );
    }

    #[test]
    fn test_unknown_loan_is_rejected_without_backend_call() {
        let mut controller = LoanApprovalController::new(FakeLoanService::new(Vec::new()));
        let result =
            controller.handle_first_approval(Uuid::new_v4(), ApprovalAction::Approve, None);
        assert!(matches!(result, Err(LoanError::LoanNotInQueue { .. })));
        assert!(controller.backend.approvals.borrow().is_empty());
    }

    #[test]
    fn test_search_and_status_filter_combine() {
        let records = vec![
            record("CT-001", "K. Silva", "881234567V", LoanStatus::Pending1st, 0),
            record("CT-002", "A. Fernando", "882234567V", LoanStatus::Pending2nd, 1),
            record("CT-003", "S. Silva", "883234567V", LoanStatus::Pending2nd, 1),
        ];
        let controller = LoanApprovalController::new(FakeLoanService::new(records));

        let by_name = controller.filtered("silva", None);
        assert_eq!(by_name.len(), 2);

        let combined = controller.filtered("silva", Some(OverallApprovalStatus::Pending2nd));
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].contract_no, "CT-003");

        let by_nic = controller.filtered("8822", None);
        assert_eq!(by_nic.len(), 1);

        let everything = controller.filtered("", None);
        assert_eq!(everything.len(), 3);
    }
}
