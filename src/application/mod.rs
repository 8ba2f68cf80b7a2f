// Application layer: the loan ledger service and its error type.
// Clients (the CLI, a UI, tests) go through `LoanLedger` only.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
