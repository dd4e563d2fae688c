use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("backend service failure: {message}")]
    Service {
        message: String,
    },

    #[error("local storage failure: {message}")]
    Storage {
        message: String,
    },

    #[error("draft not found: {id}")]
    DraftNotFound {
        id: i64,
    },

    #[error("customer not found: {id}")]
    CustomerNotFound {
        id: String,
    },

    #[error("loan not found in approval queue: {id}")]
    LoanNotInQueue {
        id: Uuid,
    },

    #[error("invalid form field value for {field}: {value}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
    },

    #[error("approval action failed for loan {id}: {message}")]
    ApprovalFailed {
        id: Uuid,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LoanError>;
