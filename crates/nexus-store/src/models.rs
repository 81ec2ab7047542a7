//! Records persisted in the durable collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One direct or file delivery attempt, appended to the sender's log.
///
/// Written once and never modified. File deliveries carry a placeholder
/// naming the file instead of the file contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
