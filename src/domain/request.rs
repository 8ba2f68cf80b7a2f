use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, TransitionError, generate_id};

pub type RequestId = String;

/// Lifecycle of a loan request. Both `Fulfilled` and `Cancelled` are terminal,
/// and cancelled requests stay in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Fulfilled => "Fulfilled",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    /// Transition table for requests.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!((self, next), (Pending, Fulfilled) | (Pending, Cancelled))
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "fulfilled" => Ok(RequestStatus::Fulfilled),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A borrower-initiated ask for funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub id: RequestId,
    pub borrower: AccountId,
    #[serde(rename = "amount")]
    pub principal: Amount,
    pub purpose: String,
    pub status: RequestStatus,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl LoanRequest {
    pub fn new(
        borrower: AccountId,
        principal: Amount,
        purpose: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id("req", now),
            borrower,
            principal,
            purpose: purpose.into(),
            status: RequestStatus::Pending,
            created_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn is_borrower(&self, account: &str) -> bool {
        self.borrower == account
    }

    /// Check a stored record: a borrower, a positive principal and a purpose.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.borrower.trim().is_empty() {
            return Err("borrower is blank".to_string());
        }
        validate_request_terms(self.principal, &self.purpose)
    }

    pub fn fulfill(&mut self) -> Result<(), TransitionError> {
        self.transition(RequestStatus::Fulfilled)
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(RequestStatus::Cancelled)
    }

    fn transition(&mut self, next: RequestStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::new(self.status.as_str(), next.as_str()));
        }
        self.status = next;
        Ok(())
    }
}

/// Check a new request: positive principal and a non-blank purpose.
pub fn validate_request_terms(principal: Amount, purpose: &str) -> Result<(), String> {
    if principal <= Decimal::ZERO {
        return Err("Amount must be positive".to_string());
    }
    if purpose.trim().is_empty() {
        return Err("Purpose must not be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sample_request() -> LoanRequest {
        LoanRequest::new("0xD".into(), dec!(1.0), "rent", Utc::now())
    }

    #[test]
    fn test_new_request_is_pending() {
        let request = sample_request();
        assert!(request.is_pending());
        assert!(request.id.starts_with("req-"));
        assert!(request.is_borrower("0xD"));
        assert!(!request.is_borrower("0xE"));
    }

    #[test]
    fn test_transition_table() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Fulfilled));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Fulfilled.can_transition_to(Pending));
        assert!(!Fulfilled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Fulfilled));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_fulfilled_request_cannot_be_cancelled() {
        let mut request = sample_request();
        request.fulfill().unwrap();

        let err = request.cancel().unwrap_err();
        assert_eq!(err, TransitionError::new("Fulfilled", "Cancelled"));
        assert_eq!(request.status, RequestStatus::Fulfilled);
    }

    #[test]
    fn test_cancelled_request_cannot_be_fulfilled() {
        let mut request = sample_request();
        request.cancel().unwrap();

        assert!(request.fulfill().is_err());
        assert_eq!(request.status, RequestStatus::Cancelled);
        assert!(request.status.is_terminal());
    }

    #[test]
    fn test_validate_request_terms() {
        assert!(validate_request_terms(dec!(1.0), "rent").is_ok());
        assert!(validate_request_terms(dec!(0), "rent").is_err());
        assert!(validate_request_terms(dec!(1.0), "").is_err());
        assert!(validate_request_terms(dec!(1.0), "   ").is_err());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{
            "id": "req-001",
            "borrower": "0xD",
            "amount": "0.5",
            "purpose": "Business expansion",
            "status": "Pending",
            "timestamp": 1700000000000,
            "collateral": "none"
        }"#;
        let request: LoanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.principal, dec!(0.5));
        assert_eq!(request.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_decode_rejects_missing_purpose() {
        let json = r#"{
            "id": "req-001",
            "borrower": "0xD",
            "amount": "0.5",
            "status": "Pending",
            "timestamp": 1700000000000
        }"#;
        assert!(serde_json::from_str::<LoanRequest>(json).is_err());
    }
}
