pub mod controller;
pub mod data;
pub mod lookup;

pub use controller::{
    ActorContext, FieldChange, GuardianField, LoanFormController, NicError, NIC_PHOTO_SLOT,
    PROFILE_PHOTO_SLOT,
};
pub use data::{DocumentEntry, DocumentSource, LoanFormData};
pub use lookup::{DebouncedLookup, LookupKind, LookupTicket};
