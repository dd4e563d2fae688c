use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan record
pub type LoanId = Uuid;

/// rental (installment) frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RentalType {
    #[default]
    Weekly,
    BiWeekly,
    Monthly,
}

/// loan lifecycle status as the backend reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// locally drafted, not yet submitted
    #[default]
    Draft,
    /// submitted, waiting for first-stage approval
    #[serde(rename = "pending_1st")]
    Pending1st,
    /// first stage done, waiting for second-stage approval
    #[serde(rename = "pending_2nd")]
    Pending2nd,
    /// both approval stages done
    Approved,
    /// returned to the originator with a correction request
    SentBack,
    /// disbursed and repaying
    Active,
    /// fully repaid
    Completed,
    /// terminally declined
    Rejected,
}

/// provenance of the guardian / joint-borrower block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GuardianSource {
    /// last lookup for the current guardian NIC succeeded and nothing was
    /// hand-edited since
    Auto,
    #[default]
    Manual,
}

/// gender as encoded in the NIC day-of-year field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// reviewer decision on an approval stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    SendBack,
}

impl ApprovalAction {
    /// backend action token
    pub fn as_token(&self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::SendBack => "send_back",
        }
    }
}

/// first-stage display status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirstApprovalStatus {
    Pending,
    Approved,
    SentBack,
}

/// second-stage display status; None until the first stage completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondApprovalStatus {
    Pending,
    Approved,
}

/// overall display status for the approval queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallApprovalStatus {
    Pending1st,
    Pending2nd,
    Approved,
    SentBack,
}

impl OverallApprovalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OverallApprovalStatus::Pending1st => "Pending 1st",
            OverallApprovalStatus::Pending2nd => "Pending 2nd",
            OverallApprovalStatus::Approved => "Approved",
            OverallApprovalStatus::SentBack => "Sent Back",
        }
    }
}
