use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User profile as returned by the server.
///
/// The client does not interpret the profile beyond display; the known
/// fields are optional and anything else the server sends is kept in
/// `extra` so nothing is dropped on a round trip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl User {
    /// Best-effort display name: name, else email, else "unknown"
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("unknown")
    }
}

/// The access/refresh token pair issued on login and rotated on refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login: the user profile and the issued tokens
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_parses_with_unknown_fields() {
        let json = r#"{"id": 7, "name": "Alice", "email": "alice@example.com", "role": "user", "daily_goal_kcal": 2200}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, Some(7));
        assert_eq!(user.display_name(), "Alice");
        assert_eq!(
            user.extra.get("daily_goal_kcal").and_then(|v| v.as_i64()),
            Some(2200)
        );
    }

    #[test]
    fn test_user_tolerates_sparse_profiles() {
        let user: User = serde_json::from_str(r#"{"email": "bob@example.com"}"#).unwrap();
        assert_eq!(user.id, None);
        assert_eq!(user.display_name(), "bob@example.com");

        let empty: User = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.display_name(), "unknown");
    }
}
