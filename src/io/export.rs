use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LoanLedger;
use crate::domain::{LoanOffer, LoanRequest, current_timestamp, format_amount};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub version: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exported_at: DateTime<Utc>,
    pub offers: Vec<LoanOffer>,
    pub requests: Vec<LoanRequest>,
}

/// Exporter for converting the loan book to CSV or JSON
pub struct Exporter<'a> {
    ledger: &'a LoanLedger,
}

impl<'a> Exporter<'a> {
    pub fn new(ledger: &'a LoanLedger) -> Self {
        Self { ledger }
    }

    /// Export all offers to CSV format
    pub async fn export_offers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let offers = self.ledger.offers().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "status",
            "lender",
            "borrower",
            "amount",
            "interest_rate",
            "duration_days",
            "created_at",
        ])?;

        for offer in &offers {
            csv_writer.write_record([
                offer.id.clone(),
                offer.status.to_string(),
                offer.lender.clone(),
                offer.borrower.clone().unwrap_or_default(),
                format_amount(offer.principal),
                offer.interest_rate.normalize().to_string(),
                offer.duration_days.to_string(),
                offer.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(offers.len())
    }

    /// Export all requests to CSV format
    pub async fn export_requests_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let requests = self.ledger.requests().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "status", "borrower", "amount", "purpose", "created_at"])?;

        for request in &requests {
            csv_writer.write_record([
                request.id.clone(),
                request.status.to_string(),
                request.borrower.clone(),
                format_amount(request.principal),
                request.purpose.clone(),
                request.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(requests.len())
    }

    /// Export the whole book as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, writer: W) -> Result<LedgerSnapshot> {
        let (offers, requests) = self.ledger.snapshot().await;
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: current_timestamp(),
            offers,
            requests,
        };

        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(snapshot)
    }
}
