use anyhow::{Context, Result};
use rusqlite::Row;

use crate::db::models::{parse_captured_at, Identifier, ScanRecord};

pub fn row_to_scan(row: &Row) -> Result<ScanRecord> {
    let key: i64 = row.get("key")?;
    let identifier: String = row.get("identifier")?;
    let captured_at: String = row.get("captured_at")?;

    Ok(ScanRecord {
        key: Some(key),
        identifier: identifier
            .parse::<Identifier>()
            .with_context(|| format!("scan {key} has a malformed identifier"))?,
        captured_at: parse_captured_at(&captured_at)
            .with_context(|| format!("failed to parse captured_at of scan {key}"))?,
    })
}
