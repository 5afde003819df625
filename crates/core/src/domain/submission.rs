use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const IC_NAME_FIELD: &str = "icName";
pub const START_DATE_FIELD: &str = "startDate";
pub const RETURN_DATE_FIELD: &str = "returnDate";
pub const REASON_FIELD: &str = "reason";

pub const PENDING_COLOR: u32 = 0x00AE86;
pub const APPROVED_COLOR: u32 = 0x00FF00;
pub const DENIED_COLOR: u32 = 0xFF0000;

const PENDING_TITLE: &str = "📝 LOA Submission";
const APPROVED_TITLE: &str = "✅ LOA Approved";
const DENIED_TITLE: &str = "❌ LOA Denied";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaStatus {
    Pending,
    Approved,
    Denied,
}

impl LoaStatus {
    pub fn can_transition_to(&self, next: LoaStatus) -> bool {
        matches!(
            (self, next),
            (LoaStatus::Pending, LoaStatus::Approved) | (LoaStatus::Pending, LoaStatus::Denied)
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Pending => PENDING_TITLE,
            Self::Approved => APPROVED_TITLE,
            Self::Denied => DENIED_TITLE,
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            Self::Pending => PENDING_COLOR,
            Self::Approved => APPROVED_COLOR,
            Self::Denied => DENIED_COLOR,
        }
    }

    /// Applies a review decision. Request more info leaves the status as it is.
    pub fn apply(self, decision: ReviewDecision) -> Result<LoaStatus, DomainError> {
        let Some(next) = decision.target_status() else {
            return Ok(self);
        };

        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition { from: self, to: next });
        }

        Ok(next)
    }

    /// Recovers the status a rendered submission is in from its embed title.
    pub fn from_title(title: &str) -> Option<Self> {
        match title.trim() {
            PENDING_TITLE => Some(Self::Pending),
            APPROVED_TITLE => Some(Self::Approved),
            DENIED_TITLE => Some(Self::Denied),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approve,
    Deny,
    RequestMoreInfo,
}

impl ReviewDecision {
    /// Status the decision moves a submission to; `None` leaves it untouched.
    pub fn target_status(&self) -> Option<LoaStatus> {
        match self {
            Self::Approve => Some(LoaStatus::Approved),
            Self::Deny => Some(LoaStatus::Denied),
            Self::RequestMoreInfo => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::RequestMoreInfo => "request_more_info",
        }
    }
}

/// The four free-text values collected by the modal. Dates are opaque strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaForm {
    pub ic_name: String,
    pub start_date: String,
    pub return_date: String,
    pub reason: String,
}

impl LoaForm {
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self, DomainError> {
        let field = |key: &str| {
            fields.get(key).cloned().ok_or_else(|| {
                DomainError::InvariantViolation(format!("modal submission is missing `{key}`"))
            })
        };

        Ok(Self {
            ic_name: field(IC_NAME_FIELD)?,
            start_date: field(START_DATE_FIELD)?,
            return_date: field(RETURN_DATE_FIELD)?,
            reason: field(REASON_FIELD)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaSubmission {
    pub applicant_id: UserId,
    pub form: LoaForm,
    pub status: LoaStatus,
    pub submitted_at: DateTime<Utc>,
}

impl LoaSubmission {
    pub fn new(applicant_id: UserId, form: LoaForm, submitted_at: DateTime<Utc>) -> Self {
        Self { applicant_id, form, status: LoaStatus::Pending, submitted_at }
    }
}
