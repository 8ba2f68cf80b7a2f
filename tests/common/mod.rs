// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use loanbook::identity::StaticIdentity;
use loanbook::notify::{Notice, RecordingNotifier};
use loanbook::{LedgerConfig, LoanLedger, MemoryStore, Store};
use tempfile::TempDir;

/// An empty in-memory book plus handles on its store and notifier.
pub struct TestBook {
    pub ledger: LoanLedger,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestBook {
    /// A handle acting as `account` on the shared book.
    pub fn as_account(&self, account: &str) -> LoanLedger {
        self.ledger
            .for_identity(Arc::new(StaticIdentity::new(account)))
    }

    /// A handle with no connected account.
    pub fn anonymous(&self) -> LoanLedger {
        self.ledger.for_identity(Arc::new(StaticIdentity::anonymous()))
    }

    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notifier.drain()
    }
}

/// Helper to create an empty, unseeded book on a memory store
pub async fn test_book() -> Result<TestBook> {
    let store = Arc::new(MemoryStore::new());
    test_book_on(store).await
}

/// Helper to open an unseeded book on a prepared memory store
pub async fn test_book_on(store: Arc<MemoryStore>) -> Result<TestBook> {
    let notifier = Arc::new(RecordingNotifier::new());
    let ledger = LoanLedger::open(
        store.clone() as Arc<dyn Store>,
        Arc::new(StaticIdentity::anonymous()),
        notifier.clone(),
        LedgerConfig::default().without_seed(),
    )
    .await?;
    Ok(TestBook {
        ledger,
        store,
        notifier,
    })
}

/// Helper to open a ledger on a SQLite file in a temporary directory
pub async fn sqlite_ledger(
    temp_dir: &TempDir,
    account: &str,
    config: LedgerConfig,
) -> Result<LoanLedger> {
    let db_path = temp_dir.path().join("loanbook.db");
    let ledger = LoanLedger::open_sqlite(
        db_path.to_str().unwrap(),
        Arc::new(StaticIdentity::new(account)),
        Arc::new(RecordingNotifier::new()),
        config,
    )
    .await?;
    Ok(ledger)
}
