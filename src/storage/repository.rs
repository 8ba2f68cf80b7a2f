use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{LoanOffer, LoanRequest};

use super::Store;

/// Default key for the offers collection.
pub const OFFERS_KEY: &str = "loan_offers";

/// Default key for the requests collection.
pub const REQUESTS_KEY: &str = "loan_requests";

/// Typed access to the two persisted collections.
///
/// Each collection is a JSON array of records stored under its own key.
/// Decoding is strict about required fields and lenient about unknown ones;
/// a collection that fails to decode is reported as corrupt instead of being
/// replaced.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
    offers_key: String,
    requests_key: String,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>, offers_key: String, requests_key: String) -> Self {
        Self {
            store,
            offers_key,
            requests_key,
        }
    }

    /// Repository using the default keys.
    pub fn with_default_keys(store: Arc<dyn Store>) -> Self {
        Self::new(store, OFFERS_KEY.to_string(), REQUESTS_KEY.to_string())
    }

    pub async fn load_offers(&self) -> Result<Option<Vec<LoanOffer>>> {
        let offers: Option<Vec<LoanOffer>> = self.load_collection(&self.offers_key).await?;
        if let Some(offers) = &offers {
            ensure_unique(&self.offers_key, offers.iter().map(|o| o.id.as_str()))?;
            ensure_consistent(
                &self.offers_key,
                offers.iter().map(|o| (o.id.as_str(), o.check_consistency())),
            )?;
        }
        Ok(offers)
    }

    pub async fn load_requests(&self) -> Result<Option<Vec<LoanRequest>>> {
        let requests: Option<Vec<LoanRequest>> = self.load_collection(&self.requests_key).await?;
        if let Some(requests) = &requests {
            ensure_unique(&self.requests_key, requests.iter().map(|r| r.id.as_str()))?;
            ensure_consistent(
                &self.requests_key,
                requests.iter().map(|r| (r.id.as_str(), r.check_consistency())),
            )?;
        }
        Ok(requests)
    }

    pub async fn save_offers(&self, offers: &[LoanOffer]) -> Result<()> {
        let encoded = encode(offers).context("Failed to encode offers")?;
        self.store
            .save(&self.offers_key, &encoded)
            .await
            .context("Failed to save offers")
    }

    pub async fn save_requests(&self, requests: &[LoanRequest]) -> Result<()> {
        let encoded = encode(requests).context("Failed to encode requests")?;
        self.store
            .save(&self.requests_key, &encoded)
            .await
            .context("Failed to save requests")
    }

    /// Save both collections as one unit.
    pub async fn save_all(&self, offers: &[LoanOffer], requests: &[LoanRequest]) -> Result<()> {
        let entries = vec![
            (
                self.offers_key.clone(),
                encode(offers).context("Failed to encode offers")?,
            ),
            (
                self.requests_key.clone(),
                encode(requests).context("Failed to encode requests")?,
            ),
        ];
        self.store
            .save_all(&entries)
            .await
            .context("Failed to save offers and requests")
    }

    async fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Vec<T>>> {
        let raw = self
            .store
            .load(key)
            .await
            .with_context(|| format!("Failed to load '{}'", key))?;

        match raw {
            Some(raw) => {
                let records = serde_json::from_str(&raw)
                    .with_context(|| format!("Stored collection '{}' is corrupt", key))?;
                Ok(Some(records))
            }
            None => Ok(None),
        }
    }
}

fn encode<T: Serialize>(records: &[T]) -> Result<String> {
    Ok(serde_json::to_string(records)?)
}

fn ensure_unique<'a>(key: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!("Stored collection '{}' is corrupt: duplicate id {}", key, id);
        }
    }
    Ok(())
}

fn ensure_consistent<'a>(
    key: &str,
    checks: impl Iterator<Item = (&'a str, Result<(), String>)>,
) -> Result<()> {
    for (id, check) in checks {
        if let Err(reason) = check {
            bail!("Stored collection '{}' is corrupt: record {}: {}", key, id, reason);
        }
    }
    Ok(())
}
