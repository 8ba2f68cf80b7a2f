use std::fmt;

/// A status change that the entity's transition table does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl TransitionError {
    pub fn new(from: &'static str, to: &'static str) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}
