use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{helpers::row_to_scan, models::ScanRecord, Database};

impl Database {
    /// Every stored scan in insertion order.
    pub async fn get_all_scans(&self) -> Result<Vec<ScanRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, identifier, captured_at
                 FROM scans
                 ORDER BY key ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut scans = Vec::new();
            while let Some(row) = rows.next()? {
                scans.push(row_to_scan(row)?);
            }

            Ok(scans)
        })
        .await
        .context("failed to read scan records")
    }

    /// Insert a scan and return it with its assigned key. The future resolves
    /// only after SQLite has committed the row.
    pub async fn put_scan(&self, record: &ScanRecord) -> Result<ScanRecord> {
        let mut record = record.clone();
        self.execute(move |conn| {
            match record.key {
                Some(key) => {
                    conn.execute(
                        "INSERT OR REPLACE INTO scans (key, identifier, captured_at)
                         VALUES (?1, ?2, ?3)",
                        params![key, record.identifier.as_str(), record.captured_at_text()],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO scans (identifier, captured_at) VALUES (?1, ?2)",
                        params![record.identifier.as_str(), record.captured_at_text()],
                    )?;
                    record.key = Some(conn.last_insert_rowid());
                }
            }
            Ok(record)
        })
        .await
        .context("failed to insert scan record")
    }

    /// Erase all scans in one transaction. Returns how many were removed.
    pub async fn clear_scans(&self) -> Result<usize> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM scans", [])?;
            tx.commit()?;
            Ok(removed)
        })
        .await
        .context("failed to clear scan records")
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{models::parse_captured_at, Database, ScanRecord};

    fn record(id: &str, at: &str) -> ScanRecord {
        ScanRecord::new(id.parse().unwrap(), parse_captured_at(at).unwrap())
    }

    #[tokio::test]
    async fn put_assigns_increasing_keys_and_get_all_keeps_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let first = db.put_scan(&record("000002", "2024-05-01T09:00:00")).await.unwrap();
        let second = db.put_scan(&record("000001", "2024-05-01T08:00:00")).await.unwrap();
        assert!(first.key.unwrap() < second.key.unwrap());

        let all = db.get_all_scans().await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, ["000002", "000001"]);
        assert_eq!(all[0], first);
    }

    #[tokio::test]
    async fn same_identifier_is_stored_as_separate_records() {
        let db = Database::open_in_memory().unwrap();
        db.put_scan(&record("123456", "2024-05-01T09:00:00")).await.unwrap();
        db.put_scan(&record("123456", "2024-05-01T09:00:05")).await.unwrap();
        assert_eq!(db.get_all_scans().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let db = Database::open_in_memory().unwrap();
        db.put_scan(&record("123456", "2024-05-01T09:00:00")).await.unwrap();
        db.put_scan(&record("654321", "2024-05-01T09:01:00")).await.unwrap();

        assert_eq!(db.clear_scans().await.unwrap(), 2);
        assert!(db.get_all_scans().await.unwrap().is_empty());
        assert_eq!(db.clear_scans().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!(
            "rollscan_db_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ));
        let path = dir.join("scans.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.put_scan(&record("111111", "2024-05-01T09:00:00")).await.unwrap();
        }
        let db = Database::new(path).unwrap();
        let all = db.get_all_scans().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].identifier.as_str(), "111111");
        drop(db);
        let _ = std::fs::remove_dir_all(dir);
    }
}
