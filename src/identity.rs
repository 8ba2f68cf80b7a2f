//! Sources of the caller's account.
//!
//! The ledger asks its [`IdentityProvider`] for the current account at the
//! start of every operation. A provider that cannot answer returns an error,
//! which the ledger reports as `IdentityUnavailable`.

use std::sync::RwLock;

use anyhow::{Result, anyhow};

use crate::domain::{AccountId, normalize_account};

pub trait IdentityProvider: Send + Sync {
    /// The connected account, or `None` if nobody is signed in.
    fn current_account(&self) -> Result<Option<AccountId>>;
}

/// A fixed identity, set at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    account: Option<AccountId>,
}

impl StaticIdentity {
    pub fn new(account: impl AsRef<str>) -> Self {
        Self {
            account: normalize_account(account.as_ref()),
        }
    }

    /// No account connected.
    pub fn anonymous() -> Self {
        Self { account: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_account(&self) -> Result<Option<AccountId>> {
        Ok(self.account.clone())
    }
}

/// A connect/disconnect session, like a browser wallet.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    account: RwLock<Option<AccountId>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an account, replacing any previous one.
    pub fn connect(&self, account: impl AsRef<str>) -> Result<()> {
        let mut current = self
            .account
            .write()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        *current = normalize_account(account.as_ref());
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        let mut current = self
            .account
            .write()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        *current = None;
        Ok(())
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_account(&self) -> Result<Option<AccountId>> {
        let current = self
            .account
            .read()
            .map_err(|_| anyhow!("session lock poisoned"))?;
        Ok(current.clone())
    }
}
