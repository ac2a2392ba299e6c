use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. `email_address` is the login identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    /// Argon2 PHC string, never the plaintext.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
