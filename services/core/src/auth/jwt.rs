use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Claims carried by the access tokens the demo accepts.
///
/// Tokens are minted by the database (`jwt_token` composite type) so the claim names follow its
/// snake_case columns rather than the usual camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// A user identifier as found in a token. Depending on who issued the token it is either a
/// number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl Claims {
    /// The user identifier, when it is present and non-empty.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref().filter(|id| !id.is_blank())
    }
}

impl UserId {
    fn is_blank(&self) -> bool {
        match self {
            Self::Int(_) => false,
            Self::Str(s) => s.is_empty(),
        }
    }

    /// Numeric form of the identifier, used when writing it back into integer columns.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(id) => Some(*id),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{}", id),
            Self::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"{"user_id": 7, "role": "demo_user"}"#, Some(UserId::Int(7)))]
    #[case(r#"{"user_id": "7"}"#, Some(UserId::Str("7".to_string())))]
    #[case(r#"{"user_id": ""}"#, None)]
    #[case(r#"{"user_id": null}"#, None)]
    #[case(r#"{"role": "anonymous"}"#, None)]
    fn user_id_presence(#[case] raw: &str, #[case] expected: Option<UserId>) {
        let claims: Claims = serde_json::from_str(raw).expect("claims should deserialize");
        assert_eq!(claims.user_id().cloned(), expected);
    }

    #[test]
    fn numeric_user_id_from_string() {
        assert_eq!(UserId::Str("12".to_string()).as_i64(), Some(12));
        assert_eq!(UserId::Str("twelve".to_string()).as_i64(), None);
        assert_eq!(UserId::Int(3).to_string(), "3");
    }
}
