use thiserror::Error;

use crate::domain::TransitionError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No account connected")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Loan offer not found: {0}")]
    OfferNotFound(String),

    #[error("Loan request not found: {0}")]
    RequestNotFound(String),

    #[error("Cannot {operation} {entity} {id}: status is {status}")]
    InvalidState {
        operation: &'static str,
        entity: &'static str,
        id: String,
        status: &'static str,
    },

    #[error("Loan {0} is not in default")]
    NotInDefault(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Identity provider unavailable: {0}")]
    IdentityUnavailable(#[source] anyhow::Error),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl LedgerError {
    pub(crate) fn invalid_state(
        operation: &'static str,
        entity: &'static str,
        id: &str,
        err: TransitionError,
    ) -> Self {
        LedgerError::InvalidState {
            operation,
            entity,
            id: id.to_string(),
            status: err.from,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::OfferNotFound(_) | LedgerError::RequestNotFound(_)
        )
    }

    /// True for failures of a collaborator rather than of the request itself;
    /// the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence(_) | LedgerError::IdentityUnavailable(_)
        )
    }
}
