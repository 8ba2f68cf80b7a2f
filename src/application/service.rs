use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::LedgerConfig;
use crate::domain::{
    AccountId, AccountStats, Amount, DefaultRule, LoanId, LoanOffer, LoanRequest, MarketStats,
    OfferStatus, Rate, RequestId, account_stats, current_timestamp, demo_offers, demo_requests,
    generate_id, market_stats, normalize_account, offers_for_account, open_offers,
    pending_requests, requests_for_account, validate_offer_terms, validate_request_terms,
};
use crate::identity::IdentityProvider;
use crate::notify::{NoticeKind, Notifier};
use crate::storage::{Repository, SqliteStore, Store};

use super::LedgerError;

/// The loan book: offers and requests, their lifecycle, and who may move them.
///
/// Handles are cheap to clone and share one book. Every mutation runs under the
/// book's write lock from precondition check to persisted write, so two callers
/// racing on the same id are serialized and only one of them can win.
#[derive(Clone)]
pub struct LoanLedger {
    core: Arc<LedgerCore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
}

struct LedgerCore {
    book: RwLock<Book>,
    repo: Repository,
    config: LedgerConfig,
}

#[derive(Debug, Clone, Default)]
struct Book {
    offers: Vec<LoanOffer>,
    requests: Vec<LoanRequest>,
}

/// Which collections a mutation writes back.
#[derive(Debug, Clone, Copy)]
enum Touches {
    Offers,
    Requests,
    Both,
}

/// Result of funding a request
#[derive(Debug, Clone)]
pub struct Fulfillment {
    pub request: LoanRequest,
    pub loan: LoanOffer,
}

impl Book {
    fn offer_index(&self, id: &str) -> Result<usize, LedgerError> {
        self.offers
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| LedgerError::OfferNotFound(id.to_string()))
    }

    fn offer_mut(&mut self, id: &str) -> Result<&mut LoanOffer, LedgerError> {
        let index = self.offer_index(id)?;
        Ok(&mut self.offers[index])
    }

    fn request_mut(&mut self, id: &str) -> Result<&mut LoanRequest, LedgerError> {
        self.requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| LedgerError::RequestNotFound(id.to_string()))
    }

    fn fresh_offer_id(&self, now: DateTime<Utc>) -> LoanId {
        loop {
            let id = generate_id("loan", now);
            if !self.offers.iter().any(|o| o.id == id) {
                return id;
            }
        }
    }

    fn fresh_request_id(&self, now: DateTime<Utc>) -> RequestId {
        loop {
            let id = generate_id("req", now);
            if !self.requests.iter().any(|r| r.id == id) {
                return id;
            }
        }
    }
}

impl LoanLedger {
    /// Load the book from the store, seeding demonstration data if the store is empty.
    pub async fn open(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        config.validate().map_err(LedgerError::InvalidInput)?;

        let repo = Repository::new(
            store,
            config.offers_key.clone(),
            config.requests_key.clone(),
        );
        let offers = repo.load_offers().await?;
        let requests = repo.load_requests().await?;

        let book = match (offers, requests) {
            (None, None) if config.seed_demo_data => {
                let now = current_timestamp();
                let book = Book {
                    offers: demo_offers(now),
                    requests: demo_requests(now),
                };
                repo.save_all(&book.offers, &book.requests).await?;
                tracing::info!("seeded empty store with demonstration data");
                book
            }
            (offers, requests) => Book {
                offers: offers.unwrap_or_default(),
                requests: requests.unwrap_or_default(),
            },
        };

        tracing::debug!(
            offers = book.offers.len(),
            requests = book.requests.len(),
            "loan book loaded"
        );

        Ok(Self {
            core: Arc::new(LedgerCore {
                book: RwLock::new(book),
                repo,
                config,
            }),
            identity,
            notifier,
        })
    }

    /// Open a ledger on a SQLite database file, creating it if needed.
    pub async fn open_sqlite(
        database_path: &str,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let store = SqliteStore::open(database_path).await?;
        Self::open(Arc::new(store), identity, notifier, config).await
    }

    /// A handle on the same book that acts for a different caller.
    pub fn for_identity(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            core: Arc::clone(&self.core),
            identity,
            notifier: Arc::clone(&self.notifier),
        }
    }

    /// A handle on the same book that reports to a different notifier.
    pub fn with_notifier(&self, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            core: Arc::clone(&self.core),
            identity: Arc::clone(&self.identity),
            notifier,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.core.config
    }

    // ========================
    // Offer operations
    // ========================

    /// List a new offer with the caller as lender.
    pub async fn create_offer(
        &self,
        principal: Amount,
        interest_rate: Rate,
        duration_days: u32,
    ) -> Result<LoanOffer, LedgerError> {
        let result = self
            .try_create_offer(principal, interest_rate, duration_days)
            .await;
        self.report("create_offer", None, result, |offer| {
            format!("Loan offer {} created successfully", offer.id)
        })
    }

    async fn try_create_offer(
        &self,
        principal: Amount,
        interest_rate: Rate,
        duration_days: u32,
    ) -> Result<LoanOffer, LedgerError> {
        let caller = self.caller()?;
        validate_offer_terms(principal, interest_rate, duration_days)
            .map_err(LedgerError::InvalidInput)?;

        self.commit(Touches::Offers, |book| {
            let now = current_timestamp();
            let offer = LoanOffer::new(caller, principal, interest_rate, duration_days, now)
                .with_id(book.fresh_offer_id(now));
            book.offers.push(offer.clone());
            Ok(offer)
        })
        .await
    }

    /// Take an open offer; the caller becomes the borrower.
    pub async fn accept_offer(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let result = self.try_accept_offer(id).await;
        self.report("accept_offer", Some(id), result, |offer| {
            format!("Loan {} accepted, funds are on their way", offer.id)
        })
    }

    async fn try_accept_offer(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let caller = self.caller()?;

        self.commit(Touches::Offers, |book| {
            let offer = book.offer_mut(id)?;
            offer
                .accept(caller)
                .map_err(|e| LedgerError::invalid_state("accept", "loan offer", id, e))?;
            Ok(offer.clone())
        })
        .await
    }

    /// Withdraw an open offer. Only its lender may do so; the offer leaves the book.
    pub async fn cancel_offer(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let result = self.try_cancel_offer(id).await;
        self.report("cancel_offer", Some(id), result, |offer| {
            format!("Loan offer {} cancelled successfully", offer.id)
        })
    }

    async fn try_cancel_offer(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let caller = self.caller()?;

        self.commit(Touches::Offers, |book| {
            let index = book.offer_index(id)?;
            let offer = &book.offers[index];
            if !offer.is_lender(&caller) {
                return Err(LedgerError::Forbidden(
                    "You can only cancel your own loan offers".to_string(),
                ));
            }
            offer
                .check_withdrawable()
                .map_err(|e| LedgerError::invalid_state("cancel", "loan offer", id, e))?;
            Ok(book.offers.remove(index))
        })
        .await
    }

    /// Settle an active loan. Only its borrower may do so.
    pub async fn repay_loan(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let result = self.try_repay_loan(id).await;
        self.report("repay_loan", Some(id), result, |loan| {
            format!("Loan {} repaid successfully", loan.id)
        })
    }

    async fn try_repay_loan(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let caller = self.caller()?;

        self.commit(Touches::Offers, |book| {
            let loan = book.offer_mut(id)?;
            if !loan.is_borrower(&caller) {
                return Err(LedgerError::Forbidden(
                    "You can only repay your own loans".to_string(),
                ));
            }
            loan.repay()
                .map_err(|e| LedgerError::invalid_state("repay", "loan", id, e))?;
            Ok(loan.clone())
        })
        .await
    }

    /// Move an active loan to `Defaulted` when `rule` says so. Only the lender may ask.
    pub async fn declare_default(
        &self,
        id: &str,
        rule: &dyn DefaultRule,
    ) -> Result<LoanOffer, LedgerError> {
        let result = self.try_declare_default(id, rule).await;
        self.report("declare_default", Some(id), result, |loan| {
            format!("Loan {} marked as defaulted", loan.id)
        })
    }

    async fn try_declare_default(
        &self,
        id: &str,
        rule: &dyn DefaultRule,
    ) -> Result<LoanOffer, LedgerError> {
        let caller = self.caller()?;

        self.commit(Touches::Offers, |book| {
            let loan = book.offer_mut(id)?;
            if !loan.is_lender(&caller) {
                return Err(LedgerError::Forbidden(
                    "Only the lender can declare a loan in default".to_string(),
                ));
            }
            if loan.status != OfferStatus::Active {
                return Err(LedgerError::InvalidState {
                    operation: "declare default on",
                    entity: "loan",
                    id: id.to_string(),
                    status: loan.status.as_str(),
                });
            }
            if !rule.is_in_default(loan, current_timestamp()) {
                return Err(LedgerError::NotInDefault(id.to_string()));
            }
            loan.mark_defaulted()
                .map_err(|e| LedgerError::invalid_state("declare default on", "loan", id, e))?;
            Ok(loan.clone())
        })
        .await
    }

    // ========================
    // Request operations
    // ========================

    /// Ask for funds with the caller as borrower.
    pub async fn create_request(
        &self,
        principal: Amount,
        purpose: &str,
    ) -> Result<LoanRequest, LedgerError> {
        let result = self.try_create_request(principal, purpose).await;
        self.report("create_request", None, result, |request| {
            format!("Loan request {} created successfully", request.id)
        })
    }

    async fn try_create_request(
        &self,
        principal: Amount,
        purpose: &str,
    ) -> Result<LoanRequest, LedgerError> {
        let caller = self.caller()?;
        validate_request_terms(principal, purpose).map_err(LedgerError::InvalidInput)?;

        self.commit(Touches::Requests, |book| {
            let now = current_timestamp();
            let request = LoanRequest::new(caller, principal, purpose.trim(), now)
                .with_id(book.fresh_request_id(now));
            book.requests.push(request.clone());
            Ok(request)
        })
        .await
    }

    /// Fund a pending request. The request becomes `Fulfilled` and a new active
    /// loan appears with the caller as lender, written together.
    pub async fn fulfill_request(&self, id: &str) -> Result<Fulfillment, LedgerError> {
        let result = self.try_fulfill_request(id).await;
        self.report("fulfill_request", Some(id), result, |f| {
            format!(
                "Loan request {} fulfilled successfully as loan {}",
                f.request.id, f.loan.id
            )
        })
    }

    async fn try_fulfill_request(&self, id: &str) -> Result<Fulfillment, LedgerError> {
        let caller = self.caller()?;
        let interest_rate = self.core.config.fulfillment_interest_rate;
        let duration_days = self.core.config.fulfillment_duration_days;

        self.commit(Touches::Both, |book| {
            let now = current_timestamp();
            let request = book.request_mut(id)?;
            request
                .fulfill()
                .map_err(|e| LedgerError::invalid_state("fulfill", "loan request", id, e))?;
            let request = request.clone();

            let loan = LoanOffer::funded(
                caller,
                request.borrower.clone(),
                request.principal,
                interest_rate,
                duration_days,
                now,
            )
            .with_id(book.fresh_offer_id(now));
            book.offers.push(loan.clone());

            Ok(Fulfillment { request, loan })
        })
        .await
    }

    /// Withdraw a pending request. Only its borrower may do so; the request
    /// stays in the book as `Cancelled`.
    pub async fn cancel_request(&self, id: &str) -> Result<LoanRequest, LedgerError> {
        let result = self.try_cancel_request(id).await;
        self.report("cancel_request", Some(id), result, |request| {
            format!("Loan request {} cancelled successfully", request.id)
        })
    }

    async fn try_cancel_request(&self, id: &str) -> Result<LoanRequest, LedgerError> {
        let caller = self.caller()?;

        self.commit(Touches::Requests, |book| {
            let request = book.request_mut(id)?;
            if !request.is_borrower(&caller) {
                return Err(LedgerError::Forbidden(
                    "You can only cancel your own loan requests".to_string(),
                ));
            }
            request
                .cancel()
                .map_err(|e| LedgerError::invalid_state("cancel", "loan request", id, e))?;
            Ok(request.clone())
        })
        .await
    }

    // ========================
    // Read views
    // ========================

    /// Every offer in the book, in insertion order.
    pub async fn offers(&self) -> Vec<LoanOffer> {
        self.core.book.read().await.offers.clone()
    }

    /// Every request in the book, in insertion order.
    pub async fn requests(&self) -> Vec<LoanRequest> {
        self.core.book.read().await.requests.clone()
    }

    /// Both collections as one consistent view, read under a single lock.
    pub async fn snapshot(&self) -> (Vec<LoanOffer>, Vec<LoanRequest>) {
        let book = self.core.book.read().await;
        (book.offers.clone(), book.requests.clone())
    }

    pub async fn offer(&self, id: &str) -> Result<LoanOffer, LedgerError> {
        let book = self.core.book.read().await;
        book.offers
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::OfferNotFound(id.to_string()))
    }

    pub async fn request(&self, id: &str) -> Result<LoanRequest, LedgerError> {
        let book = self.core.book.read().await;
        book.requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::RequestNotFound(id.to_string()))
    }

    pub async fn open_offers(&self) -> Vec<LoanOffer> {
        open_offers(&self.core.book.read().await.offers)
    }

    pub async fn pending_requests(&self) -> Vec<LoanRequest> {
        pending_requests(&self.core.book.read().await.requests)
    }

    pub async fn offers_for_account(&self, account: &str) -> Vec<LoanOffer> {
        offers_for_account(&self.core.book.read().await.offers, account)
    }

    pub async fn requests_for_account(&self, account: &str) -> Vec<LoanRequest> {
        requests_for_account(&self.core.book.read().await.requests, account)
    }

    /// Offers the current caller lends or borrows.
    pub async fn my_offers(&self) -> Result<Vec<LoanOffer>, LedgerError> {
        let caller = self.caller()?;
        Ok(self.offers_for_account(&caller).await)
    }

    /// Requests the current caller created.
    pub async fn my_requests(&self) -> Result<Vec<LoanRequest>, LedgerError> {
        let caller = self.caller()?;
        Ok(self.requests_for_account(&caller).await)
    }

    pub async fn market_stats(&self) -> MarketStats {
        let book = self.core.book.read().await;
        market_stats(&book.offers, &book.requests)
    }

    pub async fn account_stats(&self, account: &str) -> AccountStats {
        let book = self.core.book.read().await;
        account_stats(&book.offers, &book.requests, account)
    }

    pub async fn my_stats(&self) -> Result<AccountStats, LedgerError> {
        let caller = self.caller()?;
        Ok(self.account_stats(&caller).await)
    }

    // ========================
    // Internals
    // ========================

    fn caller(&self) -> Result<AccountId, LedgerError> {
        let account = self
            .identity
            .current_account()
            .map_err(LedgerError::IdentityUnavailable)?;
        account
            .as_deref()
            .and_then(normalize_account)
            .ok_or(LedgerError::Unauthenticated)
    }

    /// Run `mutate` on a copy of the book, persist the touched collections and
    /// only then publish the copy. The write lock is held throughout.
    async fn commit<T>(
        &self,
        touches: Touches,
        mutate: impl FnOnce(&mut Book) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut book = self.core.book.write().await;
        let mut next = book.clone();
        let value = mutate(&mut next)?;

        let repo = &self.core.repo;
        match touches {
            Touches::Offers => repo.save_offers(&next.offers).await?,
            Touches::Requests => repo.save_requests(&next.requests).await?,
            Touches::Both => repo.save_all(&next.offers, &next.requests).await?,
        }

        *book = next;
        Ok(value)
    }

    /// Log the outcome and emit exactly one notice for it.
    fn report<T>(
        &self,
        operation: &'static str,
        target: Option<&str>,
        result: Result<T, LedgerError>,
        message: impl FnOnce(&T) -> String,
    ) -> Result<T, LedgerError> {
        let caller = self.caller_label();
        let id = target.unwrap_or("-");
        match &result {
            Ok(value) => {
                let message = message(value);
                tracing::info!(operation, id, caller = %caller, "{}", message);
                self.notifier.notify(NoticeKind::Success, &message);
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(operation, id, caller = %caller, error = ?err, "operation failed");
                self.notifier.notify(NoticeKind::Error, &err.to_string());
            }
            Err(err) => {
                tracing::warn!(operation, id, caller = %caller, error = %err, "operation rejected");
                self.notifier.notify(NoticeKind::Error, &err.to_string());
            }
        }
        result
    }

    /// The caller as it should appear in logs; never fails.
    fn caller_label(&self) -> String {
        match self.identity.current_account() {
            Ok(Some(account)) => normalize_account(&account).unwrap_or_else(|| "-".to_string()),
            Ok(None) => "-".to_string(),
            Err(_) => "<unavailable>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use anyhow::Result;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::notify::NullNotifier;
    use crate::storage::MemoryStore;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_outcomes_are_logged_with_id_and_caller() -> Result<()> {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ledger = LoanLedger::open(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticIdentity::new("0xA")),
            Arc::new(NullNotifier),
            LedgerConfig::default().without_seed(),
        )
        .await?;
        let offer = ledger.create_offer(dec!(2), dec!(5), 30).await?;
        let borrower = ledger.for_identity(Arc::new(StaticIdentity::new("0xB")));
        borrower.accept_offer(&offer.id).await?;
        let _ = borrower.cancel_offer(&offer.id).await;

        let output = logs.contents();
        let accepted = output
            .lines()
            .find(|line| line.contains("accept_offer"))
            .unwrap_or_default();
        assert!(accepted.contains(&offer.id), "{}", output);
        assert!(accepted.contains("caller=0xB"), "{}", output);

        let rejected = output
            .lines()
            .find(|line| line.contains("cancel_offer"))
            .unwrap_or_default();
        assert!(rejected.contains("WARN"), "{}", output);
        assert!(rejected.contains("caller=0xB"), "{}", output);

        let created = output
            .lines()
            .find(|line| line.contains("create_offer"))
            .unwrap_or_default();
        assert!(created.contains("caller=0xA"), "{}", output);
        Ok(())
    }
}
