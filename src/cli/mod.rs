use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::LoanLedger;
use crate::config::LedgerConfig;
use crate::domain::{
    AccountStats, LoanOffer, LoanRequest, format_amount, format_rate, parse_amount,
};
use crate::identity::StaticIdentity;
use crate::notify::TracingNotifier;

/// Loanbook - peer-to-peer loan ledger
#[derive(Parser)]
#[command(name = "loanbook")]
#[command(about = "A peer-to-peer loan book: list offers, request funds, track repayments")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "loanbook.db")]
    pub database: String,

    /// Account acting on the ledger (e.g. a wallet address)
    #[arg(short, long, global = true, env = "LOANBOOK_ACCOUNT")]
    pub account: Option<String>,

    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Loan offer commands
    #[command(subcommand)]
    Offer(OfferCommands),

    /// Loan request commands
    #[command(subcommand)]
    Request(RequestCommands),

    /// Show market and account statistics
    Stats,

    /// Export data to CSV or JSON
    Export {
        /// What to export: offers, requests, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum OfferCommands {
    /// List a new loan offer
    Create {
        /// Amount to lend (e.g., "2.0")
        amount: String,

        /// Interest rate in percent (0-100)
        #[arg(short, long)]
        rate: String,

        /// Duration in days
        #[arg(short, long)]
        days: u32,
    },

    /// Accept an open offer as borrower
    Accept {
        /// Offer ID
        id: String,
    },

    /// Cancel one of your open offers
    Cancel {
        /// Offer ID
        id: String,
    },

    /// Repay an active loan you borrowed
    Repay {
        /// Loan ID
        id: String,
    },

    /// List offers (open ones by default)
    List {
        /// Only offers where you are lender or borrower
        #[arg(long)]
        mine: bool,

        /// Include active, completed and defaulted loans
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// Ask for a loan
    Create {
        /// Amount to borrow (e.g., "1.0")
        amount: String,

        /// What the funds are for
        #[arg(short, long)]
        purpose: String,
    },

    /// Fund a pending request as lender
    Fulfill {
        /// Request ID
        id: String,
    },

    /// Cancel one of your pending requests
    Cancel {
        /// Request ID
        id: String,
    },

    /// List requests (pending ones by default)
    List {
        /// Only your own requests
        #[arg(long)]
        mine: bool,

        /// Include fulfilled and cancelled requests
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    fn init_tracing(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("loanbook={}", default_level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    async fn open_ledger(&self) -> Result<LoanLedger> {
        let config = match &self.config {
            Some(path) => LedgerConfig::from_json_file(path)?,
            None => LedgerConfig::default(),
        };
        let identity = match &self.account {
            Some(account) => StaticIdentity::new(account),
            None => StaticIdentity::anonymous(),
        };

        let ledger = LoanLedger::open_sqlite(
            &self.database,
            Arc::new(identity),
            Arc::new(TracingNotifier),
            config,
        )
        .await
        .with_context(|| format!("Failed to open ledger at {}", self.database))?;
        Ok(ledger)
    }

    pub async fn run(self) -> Result<()> {
        self.init_tracing();
        let ledger = self.open_ledger().await?;

        match self.command {
            Commands::Offer(offer_cmd) => run_offer_command(&ledger, offer_cmd).await?,
            Commands::Request(request_cmd) => run_request_command(&ledger, request_cmd).await?,
            Commands::Stats => run_stats_command(&ledger).await?,
            Commands::Export {
                export_type,
                output,
            } => run_export_command(&ledger, &export_type, output.as_deref()).await?,
        }

        Ok(())
    }
}

async fn run_offer_command(ledger: &LoanLedger, cmd: OfferCommands) -> Result<()> {
    match cmd {
        OfferCommands::Create { amount, rate, days } => {
            let principal =
                parse_amount(&amount).context("Invalid amount format. Use '2.0' or '2'")?;
            let rate = parse_amount(&rate).context("Invalid interest rate. Use '5' or '5.5'")?;

            let offer = ledger.create_offer(principal, rate, days).await?;
            println!(
                "Created loan offer: {} ({} at {}% for {} days)",
                offer.id,
                format_amount(offer.principal),
                offer.interest_rate.normalize(),
                offer.duration_days
            );
        }

        OfferCommands::Accept { id } => {
            let loan = ledger.accept_offer(&id).await?;
            println!(
                "Accepted loan {}: borrowed {} from {}",
                loan.id,
                format_amount(loan.principal),
                loan.lender
            );
        }

        OfferCommands::Cancel { id } => {
            let offer = ledger.cancel_offer(&id).await?;
            println!("Cancelled loan offer: {}", offer.id);
        }

        OfferCommands::Repay { id } => {
            let loan = ledger.repay_loan(&id).await?;
            println!(
                "Repaid loan {}: {} to {}",
                loan.id,
                format_amount(loan.principal),
                loan.lender
            );
        }

        OfferCommands::List { mine, all } => {
            let offers = if mine {
                ledger.my_offers().await?
            } else if all {
                ledger.offers().await
            } else {
                ledger.open_offers().await
            };
            print_offers(&offers);
        }
    }
    Ok(())
}

async fn run_request_command(ledger: &LoanLedger, cmd: RequestCommands) -> Result<()> {
    match cmd {
        RequestCommands::Create { amount, purpose } => {
            let principal =
                parse_amount(&amount).context("Invalid amount format. Use '1.0' or '1'")?;

            let request = ledger.create_request(principal, &purpose).await?;
            println!(
                "Created loan request: {} ({} for \"{}\")",
                request.id,
                format_amount(request.principal),
                request.purpose
            );
        }

        RequestCommands::Fulfill { id } => {
            let fulfillment = ledger.fulfill_request(&id).await?;
            let loan = &fulfillment.loan;
            println!(
                "Fulfilled request {} as loan {}: {} to {} at {}% for {} days",
                fulfillment.request.id,
                loan.id,
                format_amount(loan.principal),
                fulfillment.request.borrower,
                loan.interest_rate.normalize(),
                loan.duration_days
            );
        }

        RequestCommands::Cancel { id } => {
            let request = ledger.cancel_request(&id).await?;
            println!("Cancelled loan request: {}", request.id);
        }

        RequestCommands::List { mine, all } => {
            let requests = if mine {
                ledger.my_requests().await?
            } else if all {
                ledger.requests().await
            } else {
                ledger.pending_requests().await
            };
            print_requests(&requests);
        }
    }
    Ok(())
}

async fn run_stats_command(ledger: &LoanLedger) -> Result<()> {
    let market = ledger.market_stats().await;

    println!("Market");
    println!("  Available loans:    {}", market.open_offers);
    println!("  Open requests:      {}", market.pending_requests);
    println!(
        "  Avg. interest rate: {}",
        format_rate(market.average_open_rate)
    );

    // Account stats need a connected account; skip them otherwise.
    if let Ok(AccountStats {
        active_loans,
        open_offers,
        pending_requests,
    }) = ledger.my_stats().await
    {
        println!();
        println!("Your activity");
        println!("  Active loans:       {}", active_loans);
        println!("  Open offers:        {}", open_offers);
        println!("  Pending requests:   {}", pending_requests);
    }
    Ok(())
}

async fn run_export_command(
    ledger: &LoanLedger,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(ledger);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "offers" => {
            let count = exporter.export_offers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} offers", count);
            }
        }
        "requests" => {
            let count = exporter.export_requests_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} requests", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} offers, {} requests",
                    snapshot.offers.len(),
                    snapshot.requests.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: offers, requests, full",
                export_type
            );
        }
    }

    Ok(())
}

fn print_offers(offers: &[LoanOffer]) {
    if offers.is_empty() {
        println!("No loan offers found.");
        return;
    }

    println!(
        "{:<30} {:<10} {:>10} {:>7} {:>6}  {:<14} {:<14}",
        "ID", "STATUS", "AMOUNT", "RATE", "DAYS", "LENDER", "BORROWER"
    );
    println!("{}", "-".repeat(103));
    for offer in offers {
        println!(
            "{:<30} {:<10} {:>10} {:>6}% {:>6}  {:<14} {:<14}",
            offer.id,
            offer.status,
            format_amount(offer.principal),
            offer.interest_rate.normalize(),
            offer.duration_days,
            short_address(&offer.lender),
            offer.borrower.as_deref().map(short_address).unwrap_or_default()
        );
    }
}

fn print_requests(requests: &[LoanRequest]) {
    if requests.is_empty() {
        println!("No loan requests found.");
        return;
    }

    println!(
        "{:<30} {:<10} {:>10}  {:<14} {:<30}",
        "ID", "STATUS", "AMOUNT", "BORROWER", "PURPOSE"
    );
    println!("{}", "-".repeat(98));
    for request in requests {
        println!(
            "{:<30} {:<10} {:>10}  {:<14} {:<30}",
            request.id,
            request.status,
            format_amount(request.principal),
            short_address(&request.borrower),
            request.purpose
        );
    }
}

/// `0x1234...abcd` for long addresses, unchanged otherwise.
fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
