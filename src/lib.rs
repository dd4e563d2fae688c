pub mod approval;
pub mod decimal;
pub mod drafts;
pub mod errors;
pub mod finance;
pub mod form;
pub mod nic;
pub mod services;
pub mod types;

// re-export key types
pub use approval::{LoanApprovalController, LoanApprovalItem};
pub use decimal::Money;
pub use drafts::{DraftItem, DraftManager};
pub use errors::{LoanError, Result};
pub use finance::{FirstDueDate, ReloanAssessment};
pub use form::{
    ActorContext, FieldChange, GuardianField, LoanFormController, LoanFormData, NicError,
};
pub use nic::{extract_birthday_from_nic, extract_gender_from_nic, is_valid_nic};
pub use services::{
    BackOffice, CustomerProfile, CustomerRecord, JointBorrowerDetails, KeyValueStore, LoanProduct,
    LoanRecord, MemoryStore,
};
pub use types::{
    ApprovalAction, FirstApprovalStatus, Gender, GuardianSource, LoanId, LoanStatus,
    OverallApprovalStatus, RentalType, SecondApprovalStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
