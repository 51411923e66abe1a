use crate::models::{InteractionRecord, InteractionType};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Append-only interaction log, bounded by dropping the oldest rows.
pub struct InteractionHistory {
    records: RwLock<VecDeque<InteractionRecord>>,
    capacity: usize,
}

impl InteractionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, record: InteractionRecord) {
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn for_session(&self, session_id: &str) -> Vec<InteractionRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn counts_by_type(&self) -> HashMap<InteractionType, u64> {
        let mut counts = HashMap::new();
        for record in self.records.read().iter() {
            *counts.entry(record.event.interaction_type).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionEvent;

    fn record(session: &str, kind: InteractionType) -> InteractionRecord {
        InteractionRecord {
            session_id: session.to_string(),
            fingerprint: None,
            event: InteractionEvent::new(kind).with_product(1),
        }
    }

    #[test]
    fn test_bounded_append() {
        let history = InteractionHistory::new(2);
        history.append(record("a", InteractionType::ProductView));
        history.append(record("b", InteractionType::ProductClick));
        history.append(record("a", InteractionType::AddToCart));

        assert_eq!(history.len(), 2);
        let a = history.for_session("a");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].event.interaction_type, InteractionType::AddToCart);
        assert_eq!(history.counts_by_type().get(&InteractionType::ProductView), None);
    }
}
