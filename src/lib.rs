pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod identity;
pub mod io;
pub mod notify;
pub mod storage;

pub use application::{LedgerError, LoanLedger};
pub use config::LedgerConfig;
pub use domain::*;
pub use storage::{MemoryStore, SqliteStore, Store};
