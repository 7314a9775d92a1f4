//! Commands accepted over the page-to-worker message channel.

use serde_json::Value;

/// Recognized message commands. Any other message value is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Activate a waiting version without waiting for open pages to close.
    SkipWaiting,
}

impl ClientCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientCommand::SkipWaiting => "skipWaiting",
        }
    }

    pub fn parse(data: &Value) -> Option<Self> {
        match data.as_str() {
            Some("skipWaiting") => Some(ClientCommand::SkipWaiting),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skip_waiting_literal() {
        assert_eq!(ClientCommand::parse(&json!("skipWaiting")), Some(ClientCommand::SkipWaiting));
        assert_eq!(ClientCommand::SkipWaiting.as_str(), "skipWaiting");
    }

    #[test]
    fn test_other_values_ignored() {
        assert_eq!(ClientCommand::parse(&json!("SKIPWAITING")), None);
        assert_eq!(ClientCommand::parse(&json!({"type": "skipWaiting"})), None);
        assert_eq!(ClientCommand::parse(&json!(null)), None);
        assert_eq!(ClientCommand::parse(&json!(1)), None);
    }
}
