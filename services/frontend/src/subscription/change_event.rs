use serde::Deserialize;

use crate::schema::message::MessageNullable;

/// A row change published by the `apollo_demo.messages` trigger.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,

    #[serde(default)]
    pub newrec: Option<MessageNullable>,

    #[serde(default)]
    pub oldrec: Option<MessageNullable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_trigger_payload() {
        let raw = r#"{
            "type": "UPDATE",
            "newrec": {"id": 3, "channel_id": "42", "user_id": 7, "body": "edited", "created_at": "2024-05-01T10:00:00+00:00"},
            "oldrec": {"id": 3, "channel_id": "42", "user_id": 7, "body": "draft", "created_at": "2024-05-01T10:00:00+00:00"}
        }"#;
        let event: ChangeEvent = serde_json::from_str(raw).expect("payload should decode");

        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.newrec.and_then(|r| r.id), Some(3));
        assert_eq!(event.oldrec.and_then(|r| r.body).as_deref(), Some("draft"));
    }

    #[test]
    fn delete_payload_has_no_new_row() {
        let raw = r#"{"type": "DELETE", "newrec": null, "oldrec": {"id": 3}}"#;
        let event: ChangeEvent = serde_json::from_str(raw).expect("payload should decode");

        assert_eq!(event.kind.as_str(), "DELETE");
        assert!(event.newrec.is_none());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<ChangeEvent>(r#"{"type": "TRUNCATE"}"#).is_err());
    }
}
