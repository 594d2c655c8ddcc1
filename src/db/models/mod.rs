pub mod scan_record;

pub use scan_record::{
    format_captured_at, local_now, parse_captured_at, Identifier, ScanRecord, CAPTURED_AT_FORMAT, IDENTIFIER_LEN,
};
