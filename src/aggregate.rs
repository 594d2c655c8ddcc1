//! Read-through aggregation: every display state is derived from a full read
//! of the store, never from counters kept in memory.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::error;
use serde::{Deserialize, Serialize};

use crate::db::{Database, ScanRecord};
use crate::error::{ScanError, ScanResult};
use crate::events::{EventBus, ScanEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub unique: usize,
    pub total: usize,
}

impl Aggregate {
    pub fn of(records: &[ScanRecord]) -> Self {
        let unique = records
            .iter()
            .map(|record| &record.identifier)
            .collect::<HashSet<_>>()
            .len();
        Self {
            unique,
            total: records.len(),
        }
    }

    pub fn summary_line(&self) -> String {
        format!("registered {} (total {})", self.unique, self.total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub aggregate: Aggregate,
    pub listing: Vec<String>,
}

/// One line per identifier, ascending by numeric identifier, each showing the
/// earliest capture of that identifier.
pub fn dedup_listing(records: &[ScanRecord]) -> Vec<String> {
    let mut sorted: Vec<&ScanRecord> = records.iter().collect();
    sorted.sort_by(|a, b| by_identifier_then_time(a, b));

    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .filter(|record| seen.insert(record.identifier.clone()))
        .map(|record| format!("{}: {}", record.identifier, record.captured_at_text()))
        .collect()
}

/// Every record, newest first, without deduplication.
pub fn recent_activity(records: &[ScanRecord]) -> Vec<String> {
    let mut sorted: Vec<&ScanRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    sorted
        .into_iter()
        .map(|record| {
            format!(
                "ID: {} (timestamp {})",
                record.identifier,
                record.captured_at_text()
            )
        })
        .collect()
}

fn by_identifier_then_time(a: &ScanRecord, b: &ScanRecord) -> Ordering {
    a.identifier
        .value()
        .cmp(&b.identifier.value())
        .then_with(|| a.captured_at.cmp(&b.captured_at))
}

#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    events: EventBus,
}

impl Aggregator {
    pub fn new(db: Database, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Re-read the store and publish the aggregate and dedup listing. An
    /// unreadable store publishes the empty state and reports the failure.
    pub async fn recompute_display(&self) -> ScanResult<DisplayState> {
        match self.db.get_all_scans().await {
            Ok(records) => {
                let state = DisplayState {
                    aggregate: Aggregate::of(&records),
                    listing: dedup_listing(&records),
                };
                self.publish(&state);
                Ok(state)
            }
            Err(err) => {
                error!("Failed to recompute display from store: {err:#}");
                self.publish(&DisplayState::default());
                self.events.emit(ScanEvent::StoreError {
                    message: format!("{err:#}"),
                });
                Err(ScanError::store(err))
            }
        }
    }

    /// Aggregate only; the listing is left untouched (scan view).
    pub async fn recompute_aggregate(&self) -> ScanResult<Aggregate> {
        match self.db.get_all_scans().await {
            Ok(records) => {
                let aggregate = Aggregate::of(&records);
                self.publish_aggregate(aggregate);
                Ok(aggregate)
            }
            Err(err) => {
                error!("Failed to recompute aggregate from store: {err:#}");
                self.publish_aggregate(Aggregate::default());
                self.events.emit(ScanEvent::StoreError {
                    message: format!("{err:#}"),
                });
                Err(ScanError::store(err))
            }
        }
    }

    pub async fn recent_activity(&self) -> ScanResult<Vec<String>> {
        let records = self.db.get_all_scans().await.map_err(ScanError::store)?;
        Ok(recent_activity(&records))
    }

    fn publish(&self, state: &DisplayState) {
        self.publish_aggregate(state.aggregate);
        self.events.emit(ScanEvent::ListChanged(state.listing.clone()));
    }

    fn publish_aggregate(&self, aggregate: Aggregate) {
        self.events.emit(ScanEvent::AggregateChanged(aggregate));
        self.events
            .emit(ScanEvent::SummaryChanged(aggregate.summary_line()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::parse_captured_at;

    fn record(id: &str, at: &str) -> ScanRecord {
        ScanRecord::new(id.parse().unwrap(), parse_captured_at(at).unwrap())
    }

    #[test]
    fn aggregate_counts_distinct_identifiers() {
        let mut records = vec![
            record("000001", "2024-05-01T09:00:00"),
            record("000002", "2024-05-01T09:01:00"),
        ];
        assert_eq!(Aggregate::of(&records), Aggregate { unique: 2, total: 2 });

        records.push(record("000001", "2024-05-01T09:02:00"));
        assert_eq!(Aggregate::of(&records), Aggregate { unique: 2, total: 3 });
        assert_eq!(Aggregate::of(&records).summary_line(), "registered 2 (total 3)");
    }

    #[test]
    fn dedup_listing_keeps_earliest_per_identifier_in_numeric_order() {
        let records = vec![
            record("000002", "2024-05-01T09:00:00"),
            record("000001", "2024-05-01T10:00:00"),
            record("000001", "2024-05-01T09:30:00"),
        ];
        assert_eq!(
            dedup_listing(&records),
            vec![
                "000001: 2024-05-01T09:30:00".to_string(),
                "000002: 2024-05-01T09:00:00".to_string(),
            ]
        );
    }

    #[test]
    fn dedup_listing_orders_numerically() {
        let records = vec![
            record("100000", "2024-05-01T09:00:00"),
            record("020000", "2024-05-01T09:00:00"),
            record("003000", "2024-05-01T09:00:00"),
        ];
        let ids: Vec<String> = dedup_listing(&records)
            .into_iter()
            .map(|line| line[..6].to_string())
            .collect();
        assert_eq!(ids, ["003000", "020000", "100000"]);
    }

    #[test]
    fn recent_activity_is_newest_first_without_dedup() {
        let records = vec![
            record("000001", "2024-05-01T09:00:00"),
            record("000002", "2024-05-01T11:00:00"),
            record("000001", "2024-05-01T10:00:00"),
        ];
        assert_eq!(
            recent_activity(&records),
            vec![
                "ID: 000002 (timestamp 2024-05-01T11:00:00)".to_string(),
                "ID: 000001 (timestamp 2024-05-01T10:00:00)".to_string(),
                "ID: 000001 (timestamp 2024-05-01T09:00:00)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn recompute_reads_from_store() {
        let db = Database::open_in_memory().unwrap();
        db.put_scan(&record("000005", "2024-05-01T09:00:00")).await.unwrap();
        db.put_scan(&record("000005", "2024-05-01T09:05:00")).await.unwrap();

        let aggregator = Aggregator::new(db, EventBus::new());
        let state = aggregator.recompute_display().await.unwrap();
        assert_eq!(state.aggregate, Aggregate { unique: 1, total: 2 });
        assert_eq!(state.listing, vec!["000005: 2024-05-01T09:00:00".to_string()]);
    }

    #[tokio::test]
    async fn unreadable_store_fails_closed() {
        let db = Database::open_in_memory().unwrap();
        db.put_scan(&record("000005", "2024-05-01T09:00:00")).await.unwrap();
        db.execute(|conn| Ok(conn.execute_batch("DROP TABLE scans")?))
            .await
            .unwrap();

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let aggregator = Aggregator::new(db, events);

        let err = aggregator.recompute_display().await.unwrap_err();
        assert!(matches!(err, ScanError::StoreIo(_)));

        assert_eq!(rx.recv().await.unwrap(), ScanEvent::AggregateChanged(Aggregate::default()));
        assert_eq!(
            rx.recv().await.unwrap(),
            ScanEvent::SummaryChanged("registered 0 (total 0)".into())
        );
        assert_eq!(rx.recv().await.unwrap(), ScanEvent::ListChanged(Vec::new()));
        assert!(matches!(rx.recv().await.unwrap(), ScanEvent::StoreError { .. }));
    }
}
