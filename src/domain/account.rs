use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Opaque account identifier supplied by the identity provider (e.g. a wallet address).
/// Identifiers are compared exactly.
pub type AccountId = String;

/// Returns the trimmed account, or `None` when it is blank.
pub fn normalize_account(account: &str) -> Option<AccountId> {
    let trimmed = account.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Current time truncated to the millisecond precision entities are persisted with.
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Generate an entity id of the form `<prefix>-<unix millis>-<8 hex chars>`.
pub fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, now.timestamp_millis(), &suffix[..8])
}
