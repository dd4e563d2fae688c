//! Loan application form orchestration.
//!
//! One controller instance owns the mutable [`LoanFormData`] plus the
//! directory caches it selects from. Every dependent-field rule runs inside
//! a single synchronous [`apply`](LoanFormController::apply) reducer, so
//! cascades (center -> group -> customer -> product) never race each other.
//! The two NIC-driven lookups are debounced and carry a stale-response
//! guard; see [`super::lookup`].

use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::decimal::Money;
use crate::errors::Result;
use crate::finance::{self, processing_fee_for_tenure, reloan_assessment, ReloanAssessment};
use crate::form::data::LoanFormData;
use crate::form::lookup::{DebouncedLookup, LookupKind, LookupTicket};
use crate::nic::{extract_birthday_from_nic, is_valid_nic};
use crate::services::{
    BackOffice, CenterRecord, CustomerProfile, CustomerRecord, GroupRecord, JointBorrowerDetails,
    LoanProduct, StaffRecord,
};
use crate::types::{GuardianSource, RentalType};

/// document slot the customer's NIC photo is imported into
pub const NIC_PHOTO_SLOT: &str = "nic_photo";
/// document slot the customer's profile photo is imported into
pub const PROFILE_PHOTO_SLOT: &str = "profile_photo";

/// the signed-in staff member driving the form; witness 1 defaults to them
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub staff_id: String,
    pub username: String,
}

/// guardian fields a user can hand-edit (NIC has its own change variant)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardianField {
    Name,
    Relationship,
    Address,
    Phone,
    SecondaryPhone,
    DateOfBirth,
}

/// a user edit routed through the reducer
#[derive(Debug, Clone)]
pub enum FieldChange {
    Center(String),
    Group(String),
    Customer(String),
    /// None clears the product and blanks product-derived fields
    Product(Option<String>),
    Nic(String),
    GuardianNic(String),
    Guardian(GuardianField, String),
    LoanAmount(String),
    RequestedAmount(String),
    InterestRate(String),
    Tenure(String),
    RentalType(RentalType),
}

/// inline validation state of the applicant NIC field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicError {
    NotFound,
    InvalidFormat,
}

impl NicError {
    pub fn message(&self) -> &'static str {
        match self {
            NicError::NotFound => "No customer found for this NIC",
            NicError::InvalidFormat => "Invalid NIC format",
        }
    }
}

/// strip everything but digits and V/X, uppercase, cap at 12 characters
pub fn normalize_nic(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'v' | 'x' | 'V' | 'X'))
        .map(|c| c.to_ascii_uppercase())
        .take(12)
        .collect()
}

pub struct LoanFormController<B: BackOffice> {
    backend: B,
    actor: ActorContext,
    form: LoanFormData,

    // directory caches, fail-soft to empty on load errors
    centers: Vec<CenterRecord>,
    groups: Vec<GroupRecord>,
    customers: Vec<CustomerRecord>,
    products: Vec<LoanProduct>,
    staff: Vec<StaffRecord>,

    selected_customer: Option<CustomerRecord>,
    profile: Option<CustomerProfile>,
    active_product_ids: Vec<String>,
    reloan: Option<ReloanAssessment>,
    nic_error: Option<NicError>,
    rental_estimate: Option<Money>,

    nic_lookup: DebouncedLookup,
    guardian_lookup: DebouncedLookup,
    /// the form was populated from a NIC match rather than manual selection
    auto_filled: bool,
}

impl<B: BackOffice> LoanFormController<B> {
    pub fn new(backend: B, actor: ActorContext) -> Self {
        let mut controller = Self {
            backend,
            form: LoanFormData::default(),
            centers: Vec::new(),
            groups: Vec::new(),
            customers: Vec::new(),
            products: Vec::new(),
            staff: Vec::new(),
            selected_customer: None,
            profile: None,
            active_product_ids: Vec::new(),
            reloan: None,
            nic_error: None,
            rental_estimate: None,
            nic_lookup: DebouncedLookup::new(LookupKind::Customer),
            guardian_lookup: DebouncedLookup::new(LookupKind::Guardian),
            auto_filled: false,
            actor,
        };

        controller.centers = controller
            .backend
            .centers()
            .unwrap_or_else(|e| {
                warn!(error = %e, "center directory load failed");
                Vec::new()
            });
        controller.products = controller
            .backend
            .loan_products()
            .unwrap_or_else(|e| {
                warn!(error = %e, "loan product load failed");
                Vec::new()
            });
        controller.staff = controller
            .backend
            .staff()
            .unwrap_or_else(|e| {
                warn!(error = %e, "staff directory load failed");
                Vec::new()
            });

        controller.form.witness1_staff_id = controller.actor.staff_id.clone();
        controller
    }

    /// run one user edit and every dependent reset/derivation it implies
    pub fn apply(&mut self, change: FieldChange, time: &SafeTimeProvider) {
        match change {
            FieldChange::Center(id) => {
                self.form.center = id;
                self.clear_customer_selection();
                self.form.group.clear();
                self.load_groups();
                self.customers.clear();
            }
            FieldChange::Group(id) => {
                self.form.group = id;
                self.clear_customer_selection();
                self.load_customers();
            }
            FieldChange::Customer(id) => {
                let record = self.customers.iter().find(|c| c.id == id).cloned();
                match record {
                    Some(record) => self.select_customer_record(record),
                    None => warn!(customer = %id, "selected customer missing from cache"),
                }
            }
            FieldChange::Product(selection) => {
                self.rental_estimate = None;
                match selection {
                    Some(id) => self.select_product(&id),
                    None => self.form.clear_product_fields(),
                }
            }
            FieldChange::Nic(value) => self.applicant_nic_changed(&value, time),
            FieldChange::GuardianNic(value) => self.guardian_nic_changed(&value, time),
            FieldChange::Guardian(field, value) => {
                match field {
                    GuardianField::Name => self.form.guardian_name = value,
                    GuardianField::Relationship => self.form.guardian_relationship = value,
                    GuardianField::Address => self.form.guardian_address = value,
                    GuardianField::Phone => self.form.guardian_phone = value,
                    GuardianField::SecondaryPhone => self.form.guardian_secondary_phone = value,
                    GuardianField::DateOfBirth => self.form.guardian_date_of_birth = value,
                }
                self.form.guardian_source = GuardianSource::Manual;
            }
            FieldChange::LoanAmount(value) => {
                self.form.loan_amount = value;
                self.rental_estimate = None;
                self.apply_fee_tier();
            }
            FieldChange::RequestedAmount(value) => {
                self.form.requested_amount = value;
            }
            FieldChange::InterestRate(value) => {
                self.form.interest_rate = value;
                self.rental_estimate = None;
            }
            FieldChange::Tenure(value) => {
                self.form.tenure = value;
                self.rental_estimate = None;
                self.apply_fee_tier();
            }
            FieldChange::RentalType(rental_type) => {
                self.form.rental_type = rental_type;
            }
        }
    }

    // ---- debounced lookups ----------------------------------------------

    /// tickets whose debounce window has elapsed; the caller performs the
    /// backend call and feeds the outcome back through `complete_*_lookup`
    pub fn poll_due_lookups(&mut self, time: &SafeTimeProvider) -> Vec<LookupTicket> {
        let now = time.now();
        [
            self.nic_lookup.take_due(now),
            self.guardian_lookup.take_due(now),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// drive any due lookups synchronously through the injected backend
    pub fn run_due_lookups(&mut self, time: &SafeTimeProvider) {
        let now = time.now();
        if let Some(ticket) = self.nic_lookup.take_due(now) {
            let outcome = self.backend.customers_by_nic(&ticket.value);
            self.complete_customer_lookup(&ticket, outcome);
        }
        if let Some(ticket) = self.guardian_lookup.take_due(now) {
            let outcome = self.backend.joint_borrower_by_nic(&ticket.value);
            self.complete_guardian_lookup(&ticket, outcome);
        }
    }

    /// apply a customer-by-NIC response; stale responses are dropped and the
    /// busy flag is cleared on every path
    pub fn complete_customer_lookup(
        &mut self,
        ticket: &LookupTicket,
        outcome: Result<Vec<CustomerRecord>>,
    ) {
        self.nic_lookup.finish(ticket);
        if !self.nic_lookup.is_current(ticket) {
            debug!(nic = %ticket.value, "discarding stale customer lookup");
            return;
        }

        let mut matches = match outcome {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "customer lookup failed");
                return;
            }
        };

        let chosen = match matches.len() {
            0 => None,
            1 => matches.pop(),
            _ => matches
                .iter()
                .position(|c| c.nic == ticket.value)
                .map(|i| matches.swap_remove(i)),
        };

        match chosen {
            Some(record) => {
                self.adopt_lookup_match(record);
                self.nic_error = None;
            }
            None => {
                // only a syntactically complete NIC with zero candidates
                // earns an inline error
                let complete = ticket.value.len() == 10 || ticket.value.len() == 12;
                if matches.is_empty() && complete {
                    self.nic_error = Some(if is_valid_nic(&ticket.value) {
                        NicError::NotFound
                    } else {
                        NicError::InvalidFormat
                    });
                }
            }
        }
    }

    /// apply a joint-borrower response; a response for an outdated guardian
    /// NIC leaves the guardian block untouched
    pub fn complete_guardian_lookup(
        &mut self,
        ticket: &LookupTicket,
        outcome: Result<Option<JointBorrowerDetails>>,
    ) {
        self.guardian_lookup.finish(ticket);
        if !self.guardian_lookup.is_current(ticket) {
            debug!(nic = %ticket.value, "discarding stale joint-borrower lookup");
            return;
        }

        match outcome {
            Ok(Some(details)) => self.form.apply_joint_borrower(&details),
            Ok(None) => self.form.clear_guardian_contact(),
            Err(e) => warn!(error = %e, "joint-borrower lookup failed"),
        }
    }

    pub fn customer_lookup_busy(&self) -> bool {
        self.nic_lookup.busy()
    }

    pub fn guardian_lookup_busy(&self) -> bool {
        self.guardian_lookup.busy()
    }

    // ---- rental estimate ------------------------------------------------

    /// compute and cache the flat-interest rental from the current amount,
    /// rate and tenure; any later edit to those fields clears the cache
    pub fn estimate_rental(&mut self) -> Money {
        let principal = Money::parse_form_field(&self.form.loan_amount);
        let rate =
            Decimal::from_str(self.form.interest_rate.trim()).unwrap_or(Decimal::ZERO);
        let terms: i64 = self.form.tenure.trim().parse().unwrap_or(0);
        let estimate = finance::rental(principal, rate, terms);
        self.rental_estimate = Some(estimate);
        estimate
    }

    pub fn rental_estimate(&self) -> Option<Money> {
        self.rental_estimate
    }

    // ---- accessors ------------------------------------------------------

    pub fn form(&self) -> &LoanFormData {
        &self.form
    }

    /// direct access for fields with no dependent rules (bank details,
    /// income, witnesses, guarantor touch-ups); guardian and cascading
    /// fields must go through [`apply`](Self::apply)
    pub fn form_mut(&mut self) -> &mut LoanFormData {
        &mut self.form
    }

    pub fn centers(&self) -> &[CenterRecord] {
        &self.centers
    }

    pub fn groups(&self) -> &[GroupRecord] {
        &self.groups
    }

    pub fn customers(&self) -> &[CustomerRecord] {
        &self.customers
    }

    pub fn products(&self) -> &[LoanProduct] {
        &self.products
    }

    pub fn staff(&self) -> &[StaffRecord] {
        &self.staff
    }

    pub fn selected_customer(&self) -> Option<&CustomerRecord> {
        self.selected_customer.as_ref()
    }

    pub fn customer_profile(&self) -> Option<&CustomerProfile> {
        self.profile.as_ref()
    }

    /// product ids of the selected customer's active loans
    pub fn active_product_ids(&self) -> &[String] {
        &self.active_product_ids
    }

    pub fn reloan(&self) -> Option<&ReloanAssessment> {
        self.reloan.as_ref()
    }

    pub fn nic_error(&self) -> Option<NicError> {
        self.nic_error
    }

    pub fn actor(&self) -> &ActorContext {
        &self.actor
    }

    // ---- internals ------------------------------------------------------

    fn clear_customer_selection(&mut self) {
        self.form.customer.clear();
        self.form.nic.clear();
        self.form.reloan_deduction_amount = Money::ZERO;
        self.selected_customer = None;
        self.profile = None;
        self.active_product_ids.clear();
        self.reloan = None;
        self.nic_error = None;
        self.nic_lookup.cancel();
        self.auto_filled = false;
    }

    fn load_groups(&mut self) {
        self.groups = self.backend.groups(&self.form.center).unwrap_or_else(|e| {
            warn!(center = %self.form.center, error = %e, "group load failed");
            Vec::new()
        });
    }

    fn load_customers(&mut self) {
        let group = (!self.form.group.is_empty()).then_some(self.form.group.as_str());
        self.customers = self
            .backend
            .customers(&self.form.center, group)
            .unwrap_or_else(|e| {
                warn!(center = %self.form.center, error = %e, "customer load failed");
                Vec::new()
            });
    }

    fn select_product(&mut self, id: &str) {
        let Some(product) = self.products.iter().find(|p| p.id == id).cloned() else {
            warn!(product = %id, "selected product missing from cache");
            self.form.loan_product = id.to_string();
            return;
        };

        self.form.loan_product = product.id.clone();
        let default_amount = product.default_amount.to_field_string();
        // never overwrite a user-entered nonzero amount
        if LoanFormData::amount_is_blank(&self.form.loan_amount) {
            self.form.loan_amount = default_amount.clone();
        }
        if LoanFormData::amount_is_blank(&self.form.requested_amount) {
            self.form.requested_amount = default_amount;
        }
        self.form.interest_rate = product.interest_rate.to_string();
        self.form.tenure = product.tenure.to_string();
        self.form.rental_type = product.rental_type;
        self.apply_fee_tier();
    }

    fn apply_fee_tier(&mut self) {
        let tenure: u32 = self.form.tenure.trim().parse().unwrap_or(0);
        let amount = Money::parse_form_field(&self.form.loan_amount);
        if let Some(fee) = processing_fee_for_tenure(tenure, amount) {
            self.form.processing_fee = fee.to_field_string();
        }
    }

    fn select_customer_record(&mut self, record: CustomerRecord) {
        self.form.customer = record.id.clone();
        self.form.nic = record.nic.clone();

        match self.backend.customer_profile(&record.id) {
            Ok(profile) => {
                self.active_product_ids = profile.active_product_ids();
                match profile.loans.iter().find(|l| l.is_active()) {
                    Some(active) => {
                        let assessment = reloan_assessment(active);
                        self.form.reloan_deduction_amount = assessment.deduction;
                        self.reloan = Some(assessment);
                    }
                    None => {
                        self.form.reloan_deduction_amount = Money::ZERO;
                        self.reloan = None;
                    }
                }
                if let Some(url) = &profile.nic_photo_url {
                    self.form.import_profile_document(NIC_PHOTO_SLOT, url);
                }
                if let Some(url) = &profile.profile_photo_url {
                    self.form.import_profile_document(PROFILE_PHOTO_SLOT, url);
                }
                self.profile = Some(profile);
            }
            Err(e) => {
                warn!(customer = %record.id, error = %e, "customer profile load failed");
                self.profile = None;
                self.active_product_ids.clear();
                self.reloan = None;
                self.form.reloan_deduction_amount = Money::ZERO;
            }
        }

        self.selected_customer = Some(record);
        self.autofill_guarantors();
    }

    /// assign the first two other members of the customer's group as
    /// guarantors; one peer fills only the first block, none clears both
    fn autofill_guarantors(&mut self) {
        let Some(selected) = &self.selected_customer else {
            return;
        };
        let peers: Vec<&CustomerRecord> = self
            .customers
            .iter()
            .filter(|c| {
                c.id != selected.id && c.group_id.is_some() && c.group_id == selected.group_id
            })
            .collect();

        match peers.as_slice() {
            [] => self.form.clear_guarantors(),
            [only] => {
                self.form.guarantor1_name = only.full_name.clone();
                self.form.guarantor1_nic = only.nic.clone();
                self.form.guarantor2_name.clear();
                self.form.guarantor2_nic.clear();
            }
            [first, second, ..] => {
                self.form.guarantor1_name = first.full_name.clone();
                self.form.guarantor1_nic = first.nic.clone();
                self.form.guarantor2_name = second.full_name.clone();
                self.form.guarantor2_nic = second.nic.clone();
            }
        }
    }

    fn applicant_nic_changed(&mut self, value: &str, time: &SafeTimeProvider) {
        let normalized = normalize_nic(value);
        // errors never block typing; they clear on the next edit
        self.nic_error = None;
        self.form.nic = normalized.clone();

        if normalized.is_empty() {
            self.nic_lookup.cancel();
            if self.auto_filled || self.selected_customer.is_some() {
                self.form.center.clear();
                self.form.group.clear();
                self.form.customer.clear();
                self.form.clear_guardian();
                self.form.clear_guarantors();
                self.form.reloan_deduction_amount = Money::ZERO;
                self.selected_customer = None;
                self.profile = None;
                self.active_product_ids.clear();
                self.reloan = None;
                self.groups.clear();
                self.customers.clear();
                self.auto_filled = false;
            }
            return;
        }

        if normalized.len() < 9 {
            // still typing
            self.nic_lookup.cancel();
            return;
        }

        self.nic_lookup.schedule(&normalized, time.now());
    }

    fn guardian_nic_changed(&mut self, value: &str, time: &SafeTimeProvider) {
        let normalized = normalize_nic(value);

        if normalized.is_empty() {
            self.form.clear_guardian();
            self.guardian_lookup.cancel();
            return;
        }

        self.form.guardian_nic = normalized.clone();
        // date of birth derives from the NIC itself, independent of the
        // joint-borrower lookup
        if let Some(birthday) = extract_birthday_from_nic(&normalized) {
            self.form.guardian_date_of_birth = birthday;
        }

        if normalized.len() >= 9 {
            self.guardian_lookup.schedule(&normalized, time.now());
        } else {
            self.guardian_lookup.cancel();
        }
    }

    /// populate center/group/customer from a unique NIC match
    fn adopt_lookup_match(&mut self, record: CustomerRecord) {
        self.form.center = record.center_id.clone();
        self.load_groups();
        self.form.group = record.group_id.clone().unwrap_or_default();
        self.load_customers();
        self.auto_filled = true;
        self.select_customer_record(record);
    }
}
