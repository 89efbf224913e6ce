// Envelopes passed between the peer bots over the exchange channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Receiver name every bot accepts in addition to its own.
pub const EMERGENCY_RECEIVER: &str = "EMERGENCY";

/// A file travelling with an envelope (used by backups).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// A single message on the exchange channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMessage {
    pub from: String,
    pub to: Vec<String>,
    pub action: String,
    pub action_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(skip)]
    pub attachment: Option<ExchangeAttachment>,
}

impl ExchangeMessage {
    pub fn new(
        from: impl Into<String>,
        to: &[&str],
        action: &str,
        action_type: &str,
        data: Value,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.iter().map(|r| r.to_string()).collect(),
            action: action.to_string(),
            action_type: action_type.to_string(),
            data,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachment = Some(ExchangeAttachment {
            filename: filename.into(),
            bytes,
        });
        self
    }

    /// Whether `project` should act on this envelope.
    pub fn is_addressed_to(&self, project: &str) -> bool {
        self.to
            .iter()
            .any(|r| r.eq_ignore_ascii_case(project) || r == EMERGENCY_RECEIVER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn addressing_is_case_insensitive_and_honours_emergency() {
        let msg = ExchangeMessage::new("NOSPAM", &["long"], "add", "bad", json!({}));
        assert!(msg.is_addressed_to("LONG"));
        assert!(!msg.is_addressed_to("CLEAN"));

        let msg = ExchangeMessage::new("MANAGE", &[EMERGENCY_RECEIVER], "add", "bad", json!({}));
        assert!(msg.is_addressed_to("LONG"));
    }

    #[test]
    fn attachment_is_not_serialized() {
        let msg = ExchangeMessage::new("LONG", &["BACKUP"], "backup", "data", json!("bad_ids"))
            .with_attachment("bad_ids.json", b"{}".to_vec());
        let text = serde_json::to_string(&msg).unwrap();
        assert!(!text.contains("attachment"));

        let parsed: ExchangeMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.action, "backup");
        assert!(parsed.attachment.is_none());
    }
}
