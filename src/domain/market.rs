use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LoanOffer, LoanRequest, OfferStatus, Rate, RequestStatus};

/// Market-wide counters shown next to the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    pub open_offers: usize,
    pub pending_requests: usize,
    /// Mean interest rate over open offers, `None` when there are none
    pub average_open_rate: Option<Rate>,
}

/// Per-account counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    /// Active loans where the account is lender or borrower
    pub active_loans: usize,
    /// Open offers the account is party to
    pub open_offers: usize,
    pub pending_requests: usize,
}

/// All offers still waiting for a borrower.
pub fn open_offers(offers: &[LoanOffer]) -> Vec<LoanOffer> {
    offers
        .iter()
        .filter(|o| o.status == OfferStatus::Open)
        .cloned()
        .collect()
}

/// All requests still waiting for a lender.
pub fn pending_requests(requests: &[LoanRequest]) -> Vec<LoanRequest> {
    requests
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .cloned()
        .collect()
}

/// Offers where the account is lender or borrower.
pub fn offers_for_account(offers: &[LoanOffer], account: &str) -> Vec<LoanOffer> {
    offers
        .iter()
        .filter(|o| o.involves(account))
        .cloned()
        .collect()
}

/// Requests created by the account.
pub fn requests_for_account(requests: &[LoanRequest], account: &str) -> Vec<LoanRequest> {
    requests
        .iter()
        .filter(|r| r.is_borrower(account))
        .cloned()
        .collect()
}

/// Arithmetic mean of the interest rate. Returns `None` for an empty set.
pub fn average_interest_rate(offers: &[LoanOffer]) -> Option<Rate> {
    if offers.is_empty() {
        return None;
    }
    let total: Decimal = offers.iter().map(|o| o.interest_rate).sum();
    Some(total / Decimal::from(offers.len()))
}

pub fn market_stats(offers: &[LoanOffer], requests: &[LoanRequest]) -> MarketStats {
    let open = open_offers(offers);
    MarketStats {
        open_offers: open.len(),
        pending_requests: requests.iter().filter(|r| r.is_pending()).count(),
        average_open_rate: average_interest_rate(&open),
    }
}

pub fn account_stats(
    offers: &[LoanOffer],
    requests: &[LoanRequest],
    account: &str,
) -> AccountStats {
    let (active_loans, open_offers) = offers
        .iter()
        .filter(|o| o.involves(account))
        .fold((0, 0), |(active, open), offer| match offer.status {
            OfferStatus::Active => (active + 1, open),
            OfferStatus::Open => (active, open + 1),
            _ => (active, open),
        });

    AccountStats {
        active_loans,
        open_offers,
        pending_requests: requests
            .iter()
            .filter(|r| r.is_borrower(account) && r.is_pending())
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    fn offer(lender: &str, rate: Decimal) -> LoanOffer {
        LoanOffer::new(lender.into(), dec!(1), rate, 30, Utc::now())
    }

    fn request(borrower: &str) -> LoanRequest {
        LoanRequest::new(borrower.into(), dec!(1), "rent", Utc::now())
    }

    #[test]
    fn test_average_interest_rate_empty() {
        assert_eq!(average_interest_rate(&[]), None);
    }

    #[test]
    fn test_average_interest_rate() {
        let offers = vec![offer("0xA", dec!(5)), offer("0xB", dec!(7))];
        assert_eq!(average_interest_rate(&offers), Some(dec!(6)));

        let offers = vec![
            offer("0xA", dec!(4.5)),
            offer("0xB", dec!(5.5)),
            offer("0xC", dec!(8)),
        ];
        assert_eq!(average_interest_rate(&offers), Some(dec!(6)));
    }

    #[test]
    fn test_open_offers_excludes_active() {
        let mut active = offer("0xA", dec!(7));
        active.accept("0xB".into()).unwrap();
        let offers = vec![offer("0xA", dec!(5)), active];

        let open = open_offers(&offers);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].interest_rate, dec!(5));
    }

    #[test]
    fn test_offers_for_account_matches_both_sides() {
        let mut lent = offer("0xA", dec!(5));
        lent.accept("0xB".into()).unwrap();
        let offers = vec![lent, offer("0xB", dec!(6)), offer("0xC", dec!(7))];

        assert_eq!(offers_for_account(&offers, "0xA").len(), 1);
        assert_eq!(offers_for_account(&offers, "0xB").len(), 2);
        assert_eq!(offers_for_account(&offers, "0xD").len(), 0);
    }

    #[test]
    fn test_requests_views() {
        let mut cancelled = request("0xD");
        cancelled.cancel().unwrap();
        let requests = vec![request("0xD"), cancelled, request("0xE")];

        assert_eq!(pending_requests(&requests).len(), 2);
        assert_eq!(requests_for_account(&requests, "0xD").len(), 2);
    }

    #[test]
    fn test_market_and_account_stats() {
        let mut active = offer("0xA", dec!(9));
        active.accept("0xB".into()).unwrap();
        let offers = vec![active, offer("0xA", dec!(4)), offer("0xC", dec!(6))];
        let requests = vec![request("0xB"), request("0xA")];

        let market = market_stats(&offers, &requests);
        assert_eq!(market.open_offers, 2);
        assert_eq!(market.pending_requests, 2);
        assert_eq!(market.average_open_rate, Some(dec!(5)));

        let stats = account_stats(&offers, &requests, "0xA");
        assert_eq!(
            stats,
            AccountStats {
                active_loans: 1,
                open_offers: 1,
                pending_requests: 1,
            }
        );
        assert_eq!(account_stats(&offers, &requests, "0xZ"), AccountStats::default());
    }
}
