//! Collaborator contracts.
//!
//! The form and approval controllers only ever talk to the backend through
//! the [`BackOffice`] trait and to durable local storage through
//! [`KeyValueStore`], so the orchestration logic is testable against
//! in-memory fakes. Field names on the record structs are the stable REST
//! contract the core relies on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{LoanId, LoanStatus, RentalType};

/// center (collection point) directory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterRecord {
    pub id: String,
    pub name: String,
}

/// borrower group within a center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub center_id: String,
}

/// reloan eligibility as the backend reports it; `progress` is a percentage
/// in 0..=100 and `is_eligible` holds iff progress >= 70
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloanEligibility {
    pub is_eligible: bool,
    pub progress: Decimal,
    pub balance: Money,
    pub paid_weeks: u32,
    pub total_weeks: u32,
}

/// customer projection used for selection lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub full_name: String,
    pub nic: String,
    pub center_id: String,
    pub center_name: String,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub reloan_eligibility: Option<ReloanEligibility>,
}

/// a loan hanging off a customer profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLoan {
    pub id: LoanId,
    pub status: LoanStatus,
    pub approved_amount: Money,
    pub interest_rate: Decimal,
    pub outstanding_amount: Money,
    pub fuil_amount: Money,
    pub terms: u32,
    pub product_id: String,
    pub reloan_eligibility: Option<ReloanEligibility>,
}

impl CustomerLoan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// full customer profile fetched on selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    pub full_name: String,
    pub nic: String,
    pub branch_name: Option<String>,
    pub center_name: Option<String>,
    pub group_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub loans: Vec<CustomerLoan>,
    pub nic_photo_url: Option<String>,
    pub profile_photo_url: Option<String>,
}

impl CustomerProfile {
    /// total number of loans ever taken
    pub fn loan_count(&self) -> usize {
        self.loans.len()
    }

    /// sum of outstanding balances across active loans
    pub fn active_outstanding(&self) -> Money {
        self.loans
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.outstanding_amount)
            .fold(Money::ZERO, |acc, x| acc + x)
    }

    /// product ids of currently active loans
    pub fn active_product_ids(&self) -> Vec<String> {
        self.loans
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.product_id.clone())
            .collect()
    }
}

/// loan product directory record with origination defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: String,
    pub name: String,
    pub default_amount: Money,
    pub interest_rate: Decimal,
    pub tenure: u32,
    pub rental_type: RentalType,
}

/// staff directory record (witness selection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: String,
    pub name: String,
}

/// joint-borrower details returned by the NIC lookup endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointBorrowerDetails {
    pub guardian_name: String,
    pub guardian_relationship: String,
    pub guardian_address: String,
    pub guardian_phone: String,
    pub guardian_secondary_phone: String,
}

/// embedded loan terms on an approval-queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDetail {
    pub amount: Money,
    pub interest_rate: Decimal,
    pub tenure: u32,
    pub rental_type: RentalType,
}

/// embedded bank details on an approval-queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BankDetail {
    pub bank_name: String,
    pub branch: String,
    pub account_number: String,
}

/// raw loan record as the backend returns it to the approval queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub serial_no: String,
    pub contract_no: String,
    pub customer_name: String,
    pub customer_nic: String,
    pub staff_name: String,
    pub submitted_at: DateTime<Utc>,
    pub status: LoanStatus,
    /// 0 = neither stage done, 1 = first done, >=2 = both done
    pub approval_level: u8,
    pub first_approved_by: Option<String>,
    pub first_approved_at: Option<DateTime<Utc>>,
    pub second_approved_by: Option<String>,
    pub second_approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub loan_detail: LoanDetail,
    pub bank_detail: BankDetail,
}

/// backend REST surface the core consumes; implementations are out of scope
pub trait BackOffice {
    fn centers(&self) -> Result<Vec<CenterRecord>>;
    fn groups(&self, center_id: &str) -> Result<Vec<GroupRecord>>;
    /// customers for a center, optionally narrowed to a group
    fn customers(&self, center_id: &str, group_id: Option<&str>) -> Result<Vec<CustomerRecord>>;
    /// exact-NIC customer search
    fn customers_by_nic(&self, nic: &str) -> Result<Vec<CustomerRecord>>;
    fn customer_profile(&self, customer_id: &str) -> Result<CustomerProfile>;
    fn loan_products(&self) -> Result<Vec<LoanProduct>>;
    fn staff(&self) -> Result<Vec<StaffRecord>>;
    /// joint-borrower lookup by normalized NIC; Ok(None) means not found
    fn joint_borrower_by_nic(&self, nic: &str) -> Result<Option<JointBorrowerDetails>>;
    /// loans awaiting first or second stage approval
    fn pending_loans(&self) -> Result<Vec<LoanRecord>>;
    /// drive an approval stage; `action` is the backend token
    /// (`approve` / `send_back`)
    fn approve_loan(&self, loan_id: LoanId, action: &str, reason: Option<&str>) -> Result<()>;
}

/// durable local key-value storage capability (draft persistence)
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// in-memory store; clones share the same map so a fresh manager over a
/// cloned store sees previously persisted drafts
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn loan(status: LoanStatus, outstanding: i64, product: &str) -> CustomerLoan {
        CustomerLoan {
            id: Uuid::new_v4(),
            status,
            approved_amount: Money::from_major(10_000),
            interest_rate: dec!(20),
            outstanding_amount: Money::from_major(outstanding),
            fuil_amount: Money::from_major(12_000),
            terms: 48,
            product_id: product.to_string(),
            reloan_eligibility: None,
        }
    }

    #[test]
    fn test_profile_aggregates_cover_active_loans_only() {
        let profile = CustomerProfile {
            id: "k1".to_string(),
            full_name: "K. Silva".to_string(),
            nic: "881234567V".to_string(),
            branch_name: None,
            center_name: None,
            group_name: None,
            address: None,
            phone: None,
            date_of_birth: None,
            loans: vec![
                loan(LoanStatus::Active, 3_000, "p48"),
                loan(LoanStatus::Active, 1_500, "p72"),
                loan(LoanStatus::Completed, 0, "p48"),
            ],
            nic_photo_url: None,
            profile_photo_url: None,
        };

        assert_eq!(profile.loan_count(), 3);
        assert_eq!(profile.active_outstanding(), Money::from_major(4_500));
        assert_eq!(
            profile.active_product_ids(),
            vec!["p48".to_string(), "p72".to_string()]
        );
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));

        // clones share the underlying map
        let clone = store.clone();
        store.remove("k").unwrap();
        assert_eq!(clone.get("k"), None);
    }
}
