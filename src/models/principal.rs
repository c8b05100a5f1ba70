use chrono::{DateTime, Utc};
use serde::Serialize;

/// The caller resolved from a valid access token.
///
/// Inserted into the request extensions by the auth gate.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    /// The token subject (the account email).
    pub subject: String,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}
