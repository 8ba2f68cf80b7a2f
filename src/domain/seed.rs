use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::{LoanOffer, LoanRequest};

// Well-known development accounts
const ACCOUNT_1: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const ACCOUNT_2: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const ACCOUNT_3: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
const ACCOUNT_4: &str = "0x90F79bf6EB2c4f870365E785982E1f101E93b906";

/// Demonstration requests written to an empty store: two pending asks.
pub fn demo_requests(now: DateTime<Utc>) -> Vec<LoanRequest> {
    vec![
        LoanRequest::new(
            ACCOUNT_1.into(),
            Decimal::new(5, 1),
            "Business expansion",
            now - Duration::hours(1),
        )
        .with_id("req-001"),
        LoanRequest::new(
            ACCOUNT_2.into(),
            Decimal::new(12, 1),
            "Home renovation",
            now - Duration::hours(2),
        )
        .with_id("req-002"),
    ]
}

/// Demonstration offers: one open listing and one loan already running.
pub fn demo_offers(now: DateTime<Utc>) -> Vec<LoanOffer> {
    vec![
        LoanOffer::new(
            ACCOUNT_3.into(),
            Decimal::new(20, 1),
            Decimal::from(5),
            30,
            now - Duration::days(1),
        )
        .with_id("loan-001"),
        LoanOffer::funded(
            ACCOUNT_4.into(),
            ACCOUNT_2.into(),
            Decimal::new(15, 1),
            Decimal::from(7),
            60,
            now - Duration::days(2),
        )
        .with_id("loan-002"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OfferStatus, RequestStatus};

    #[test]
    fn test_demo_data_shape() {
        let now = Utc::now();
        let offers = demo_offers(now);
        let requests = demo_requests(now);

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].status, OfferStatus::Open);
        assert!(offers[0].borrower.is_none());
        assert_eq!(offers[1].status, OfferStatus::Active);
        assert_eq!(offers[1].borrower.as_deref(), Some(ACCOUNT_2));

        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.status == RequestStatus::Pending));
        assert_eq!(requests[1].principal.to_string(), "1.2");
    }
}
