use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::services::JointBorrowerDetails;
use crate::types::{GuardianSource, LoanStatus, RentalType};

/// document slot content: a fresh upload or a descriptor of a document that
/// already exists on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSource {
    Upload { file_name: String },
    Existing { url: String },
}

/// one entry in the application's document set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub source: DocumentSource,
    /// copied from the customer's profile rather than attached by the user
    pub from_profile: bool,
}

/// mutable draft of a loan application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoanFormData {
    // selection identifiers (string ids, empty until chosen)
    pub center: String,
    pub group: String,
    pub customer: String,
    pub loan_product: String,

    // applicant identity
    pub nic: String,

    // monetary fields kept as the decimal strings the form carries
    pub loan_amount: String,
    pub requested_amount: String,
    pub interest_rate: String,
    pub processing_fee: String,
    pub documentation_fee: String,
    pub insurance_fee: String,

    // schedule
    pub rental_type: RentalType,
    pub tenure: String,

    // guardian / joint borrower
    pub guardian_nic: String,
    pub guardian_name: String,
    pub guardian_relationship: String,
    pub guardian_address: String,
    pub guardian_phone: String,
    pub guardian_secondary_phone: String,
    pub guardian_date_of_birth: String,
    pub guardian_source: GuardianSource,

    // guarantors
    pub guarantor1_name: String,
    pub guarantor1_nic: String,
    pub guarantor2_name: String,
    pub guarantor2_nic: String,

    // witness staff references
    pub witness1_staff_id: String,
    pub witness2_staff_id: String,

    // bank details
    pub bank_name: String,
    pub bank_branch: String,
    pub bank_account_number: String,

    // income / expenses
    pub monthly_income: String,
    pub monthly_expenses: String,

    /// derived from the reloan assessment, never user-entered
    pub reloan_deduction_amount: Money,

    /// slot name -> attached or profile-sourced document
    pub documents: BTreeMap<String, DocumentEntry>,

    /// always Draft while the form owns the record
    pub status: LoanStatus,
}

impl LoanFormData {
    /// true when a monetary field is empty or holds the "0" placeholder
    pub fn amount_is_blank(value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty() || trimmed == "0"
    }

    /// reset every guardian field, date of birth included
    pub fn clear_guardian(&mut self) {
        self.guardian_nic.clear();
        self.guardian_date_of_birth.clear();
        self.clear_guardian_contact();
    }

    /// reset the fields a joint-borrower lookup fills (NIC and date of
    /// birth stay)
    pub fn clear_guardian_contact(&mut self) {
        self.guardian_name.clear();
        self.guardian_relationship.clear();
        self.guardian_address.clear();
        self.guardian_phone.clear();
        self.guardian_secondary_phone.clear();
        self.guardian_source = GuardianSource::Manual;
    }

    /// apply a successful joint-borrower lookup
    pub fn apply_joint_borrower(&mut self, details: &JointBorrowerDetails) {
        self.guardian_name = details.guardian_name.clone();
        self.guardian_relationship = details.guardian_relationship.clone();
        self.guardian_address = details.guardian_address.clone();
        self.guardian_phone = details.guardian_phone.clone();
        self.guardian_secondary_phone = details.guardian_secondary_phone.clone();
        self.guardian_source = GuardianSource::Auto;
    }

    /// clear both guarantor blocks
    pub fn clear_guarantors(&mut self) {
        self.guarantor1_name.clear();
        self.guarantor1_nic.clear();
        self.guarantor2_name.clear();
        self.guarantor2_nic.clear();
    }

    /// blank every product-derived field
    pub fn clear_product_fields(&mut self) {
        self.loan_product.clear();
        self.loan_amount.clear();
        self.requested_amount.clear();
        self.interest_rate.clear();
        self.tenure.clear();
        self.rental_type = RentalType::default();
        self.processing_fee.clear();
    }

    /// copy a profile-held document URL into a slot. Prior profile-tagged
    /// content is replaced so re-selection never duplicates; a document the
    /// user attached by hand is left alone.
    pub fn import_profile_document(&mut self, slot: &str, url: &str) {
        match self.documents.get(slot) {
            Some(entry) if !entry.from_profile => {}
            _ => {
                self.documents.insert(
                    slot.to_string(),
                    DocumentEntry {
                        source: DocumentSource::Existing {
                            url: url.to_string(),
                        },
                        from_profile: true,
                    },
                );
            }
        }
    }
}
