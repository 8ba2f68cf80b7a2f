use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, Rate, TransitionError, generate_id};

pub type LoanId = String;

/// Lifecycle of a loan offer.
///
/// `Open -> Active -> Completed` is the normal path. `Defaulted` is only
/// reachable from `Active` through an explicit [`DefaultRule`].
/// A cancelled offer has no status: it is removed from the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Listed by a lender, waiting for a borrower
    Open,
    /// Accepted or funded; the borrower owes the principal
    Active,
    /// Repaid by the borrower
    Completed,
    /// Declared in default by the lender
    Defaulted,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Open => "Open",
            OfferStatus::Active => "Active",
            OfferStatus::Completed => "Completed",
            OfferStatus::Defaulted => "Defaulted",
        }
    }

    /// Transition table for offers.
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!(
            (self, next),
            (Open, Active) | (Active, Completed) | (Active, Defaulted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OfferStatus::Completed | OfferStatus::Defaulted)
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(OfferStatus::Open),
            "active" => Ok(OfferStatus::Active),
            "completed" => Ok(OfferStatus::Completed),
            "defaulted" => Ok(OfferStatus::Defaulted),
            other => Err(format!("unknown offer status: {}", other)),
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lender-initiated loan with fixed terms.
///
/// Serialized with the field names the persisted collections use:
/// `amount`, `interestRate`, `duration` and `timestamp` (Unix millis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanOffer {
    pub id: LoanId,
    pub lender: AccountId,
    /// Set once, when the offer becomes active
    pub borrower: Option<AccountId>,
    #[serde(rename = "amount")]
    pub principal: Amount,
    pub interest_rate: Rate,
    #[serde(rename = "duration")]
    pub duration_days: u32,
    pub status: OfferStatus,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl LoanOffer {
    /// Create a new open offer. Terms must already be validated with [`validate_offer_terms`].
    pub fn new(
        lender: AccountId,
        principal: Amount,
        interest_rate: Rate,
        duration_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id("loan", now),
            lender,
            borrower: None,
            principal,
            interest_rate,
            duration_days,
            status: OfferStatus::Open,
            created_at: now,
        }
    }

    /// Create a loan that starts out active, as produced by funding a request.
    pub fn funded(
        lender: AccountId,
        borrower: AccountId,
        principal: Amount,
        interest_rate: Rate,
        duration_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            borrower: Some(borrower),
            status: OfferStatus::Active,
            ..Self::new(lender, principal, interest_rate, duration_days, now)
        }
    }

    pub fn with_id(mut self, id: impl Into<LoanId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Open
    }

    pub fn is_lender(&self, account: &str) -> bool {
        self.lender == account
    }

    pub fn is_borrower(&self, account: &str) -> bool {
        self.borrower.as_deref() == Some(account)
    }

    /// True when the account is either side of the loan
    pub fn involves(&self, account: &str) -> bool {
        self.is_lender(account) || self.is_borrower(account)
    }

    /// Only open offers can be withdrawn by their lender.
    pub fn check_withdrawable(&self) -> Result<(), TransitionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransitionError::new(self.status.as_str(), "Withdrawn"))
        }
    }

    /// Check a stored record against the rules every offer obeys: valid terms,
    /// a lender, and a borrower exactly when the offer has left `Open`.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.lender.trim().is_empty() {
            return Err("lender is blank".to_string());
        }
        validate_offer_terms(self.principal, self.interest_rate, self.duration_days)?;
        match (self.status, &self.borrower) {
            (OfferStatus::Open, Some(_)) => Err("open offer already has a borrower".to_string()),
            (OfferStatus::Open, None) | (_, Some(_)) => Ok(()),
            (status, None) => Err(format!("{} loan has no borrower", status)),
        }
    }

    /// Open -> Active, binding the borrower.
    pub fn accept(&mut self, borrower: AccountId) -> Result<(), TransitionError> {
        if self.borrower.is_some() {
            return Err(TransitionError::new(
                self.status.as_str(),
                OfferStatus::Active.as_str(),
            ));
        }
        self.transition(OfferStatus::Active)?;
        self.borrower = Some(borrower);
        Ok(())
    }

    /// Active -> Completed.
    pub fn repay(&mut self) -> Result<(), TransitionError> {
        self.transition(OfferStatus::Completed)
    }

    /// Active -> Defaulted.
    pub fn mark_defaulted(&mut self) -> Result<(), TransitionError> {
        self.transition(OfferStatus::Defaulted)
    }

    fn transition(&mut self, next: OfferStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::new(self.status.as_str(), next.as_str()));
        }
        self.status = next;
        Ok(())
    }
}

/// Decides whether an active loan is in default.
///
/// The ledger ships no rule of its own; callers that want defaults plug one in.
pub trait DefaultRule: Send + Sync {
    fn is_in_default(&self, loan: &LoanOffer, now: DateTime<Utc>) -> bool;
}

/// Check the terms of a new offer: positive principal, rate in 0..=100, at least one day.
pub fn validate_offer_terms(
    principal: Amount,
    interest_rate: Rate,
    duration_days: u32,
) -> Result<(), String> {
    if principal <= Decimal::ZERO {
        return Err("Amount must be positive".to_string());
    }
    if interest_rate < Decimal::ZERO || interest_rate > Decimal::ONE_HUNDRED {
        return Err(format!(
            "Interest rate must be between 0 and 100, got {}",
            interest_rate
        ));
    }
    if duration_days < 1 {
        return Err("Duration must be at least one day".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sample_offer() -> LoanOffer {
        LoanOffer::new("0xA".into(), dec!(2.0), dec!(5), 30, Utc::now())
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OfferStatus::Open,
            OfferStatus::Active,
            OfferStatus::Completed,
            OfferStatus::Defaulted,
        ] {
            let parsed: OfferStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("Cancelled".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_transition_table() {
        use OfferStatus::*;
        let all = [Open, Active, Completed, Defaulted];
        let allowed = [(Open, Active), (Active, Completed), (Active, Defaulted)];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OfferStatus::Open.is_terminal());
        assert!(!OfferStatus::Active.is_terminal());
        assert!(OfferStatus::Completed.is_terminal());
        assert!(OfferStatus::Defaulted.is_terminal());
    }

    #[test]
    fn test_accept_binds_borrower() {
        let mut offer = sample_offer();
        offer.accept("0xB".into()).unwrap();

        assert_eq!(offer.status, OfferStatus::Active);
        assert_eq!(offer.borrower.as_deref(), Some("0xB"));
        assert!(offer.involves("0xA"));
        assert!(offer.involves("0xB"));
    }

    #[test]
    fn test_accept_twice_fails_and_keeps_borrower() {
        let mut offer = sample_offer();
        offer.accept("0xB".into()).unwrap();

        let err = offer.accept("0xC".into()).unwrap_err();
        assert_eq!(err.from, "Active");
        assert_eq!(offer.borrower.as_deref(), Some("0xB"));
    }

    #[test]
    fn test_repay_requires_active() {
        let mut offer = sample_offer();
        assert!(offer.repay().is_err());
        assert_eq!(offer.status, OfferStatus::Open);

        offer.accept("0xB".into()).unwrap();
        offer.repay().unwrap();
        assert_eq!(offer.status, OfferStatus::Completed);
        assert!(offer.repay().is_err());
        assert!(offer.mark_defaulted().is_err());
    }

    #[test]
    fn test_only_open_offers_are_withdrawable() {
        let mut offer = sample_offer();
        assert!(offer.check_withdrawable().is_ok());

        offer.accept("0xB".into()).unwrap();
        let err = offer.check_withdrawable().unwrap_err();
        assert_eq!(err.from, "Active");
    }

    #[test]
    fn test_funded_loan_is_active() {
        let loan = LoanOffer::funded(
            "0xE".into(),
            "0xD".into(),
            dec!(1.0),
            dec!(5),
            30,
            Utc::now(),
        );
        assert_eq!(loan.status, OfferStatus::Active);
        assert_eq!(loan.borrower.as_deref(), Some("0xD"));
        assert!(loan.id.starts_with("loan-"));
    }

    #[test]
    fn test_validate_offer_terms() {
        assert!(validate_offer_terms(dec!(2.0), dec!(5), 30).is_ok());
        assert!(validate_offer_terms(dec!(0.01), dec!(0), 1).is_ok());
        assert!(validate_offer_terms(dec!(1), dec!(100), 1).is_ok());

        assert!(validate_offer_terms(dec!(0), dec!(5), 30).is_err());
        assert!(validate_offer_terms(dec!(-1), dec!(5), 30).is_err());
        assert!(validate_offer_terms(dec!(1), dec!(-0.1), 30).is_err());
        assert!(validate_offer_terms(dec!(1), dec!(100.1), 30).is_err());
        assert!(validate_offer_terms(dec!(1), dec!(5), 0).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let offer = sample_offer().with_id("loan-001");
        let value = serde_json::to_value(&offer).unwrap();

        assert_eq!(value["id"], "loan-001");
        assert_eq!(value["amount"], "2.0");
        assert_eq!(value["duration"], 30);
        assert_eq!(value["status"], "Open");
        assert!(value["borrower"].is_null());
        assert!(value["timestamp"].is_i64());
    }
}
