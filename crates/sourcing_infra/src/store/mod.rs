//! Durable storage: JSONL allocation journal.

pub mod journal;

pub use journal::{JournalMetrics, JournalReplay, JsonlAllocationJournal};
