use crate::models::OrderId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub order_id: OrderId,
    pub kind: String,
    pub action: String,
    pub client: String,
    pub user_agent: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit trail of document generation and verification.
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: ActivityEntry) {
        info!(
            order_id = entry.order_id,
            kind = %entry.kind,
            action = %entry.action,
            client = %entry.client,
            "document activity"
        );
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest first, optionally for one order.
    pub fn recent(&self, order_id: Option<OrderId>, limit: usize) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| order_id.map_or(true, |id| e.order_id == id))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(order_id: OrderId, action: &str) -> ActivityEntry {
        ActivityEntry {
            order_id,
            kind: "warranty".into(),
            action: action.into(),
            client: "127.0.0.1".into(),
            user_agent: None,
            details: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recent_filters_and_orders() {
        let log = ActivityLog::new(10);
        log.record(entry(1, "generate_new"));
        log.record(entry(2, "generate_new"));
        log.record(entry(1, "generate_cached"));

        let recent = log.recent(Some(1), 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "generate_cached");
        assert_eq!(log.recent(None, 1)[0].order_id, 1);
    }
}
