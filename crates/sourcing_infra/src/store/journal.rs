//! JSONL allocation journal.
//!
//! One line per committed batch:
//! `{"kind":"batch_committed","rfq_id":1,"records":[...]}`
//!
//! A batch is a single `write_all` followed by `sync_all`, so it lands on disk
//! whole or not at all; a torn tail line is truncated away on write failure
//! and rejected as `InvalidData` on replay.
//!
//! Replay checks what the file alone can prove: batches are non-empty, every
//! record belongs to the batch's RFQ, and `seq` is contiguous per RFQ from 1.
//! Capacity invariants need the quotes and are re-checked by
//! `RfqLedger::replay` when the desk restores an RFQ.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sourcing_core::RfqId;
use sourcing_core::allocation::{AllocationJournal, AllocationRecord, JournalError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalEvent {
    BatchCommitted {
        rfq_id: RfqId,
        records: Vec<AllocationRecord>,
    },
}

/// What a journal held when it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalReplay {
    pub batches_replayed: usize,
    pub records_replayed: usize,
    /// RFQs with history, in first-seen order.
    pub rfq_ids: Vec<RfqId>,
}

// --- Metrics ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct JournalMetrics {
    batches_total: AtomicU64,
    records_total: AtomicU64,
    write_errors_total: AtomicU64,
}

impl JournalMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_batch(&self, records: usize) {
        self.batches_total.fetch_add(1, Ordering::Relaxed);
        self.records_total
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    fn record_write_error(&self) {
        self.write_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batches_total(&self) -> u64 {
        self.batches_total.load(Ordering::Relaxed)
    }

    pub fn records_total(&self) -> u64 {
        self.records_total.load(Ordering::Relaxed)
    }

    pub fn write_errors_total(&self) -> u64 {
        self.write_errors_total.load(Ordering::Relaxed)
    }
}

// --- Journal --------------------------------------------------------------

#[derive(Debug)]
struct JournalState {
    by_rfq: HashMap<RfqId, Vec<AllocationRecord>>,
    file: File,
}

#[derive(Debug)]
pub struct JsonlAllocationJournal {
    state: Mutex<JournalState>,
    path: PathBuf,
    replay: JournalReplay,
    metrics: JournalMetrics,
}

impl JsonlAllocationJournal {
    /// Create or load a journal at `path`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let events = read_events(&path)?;
        let (by_rfq, replay) = reduce_events(events)
            .map_err(|reason| io::Error::new(io::ErrorKind::InvalidData, reason))?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!(
            "JournalOpened path={} batches={} records={}",
            path.display(),
            replay.batches_replayed,
            replay.records_replayed
        );
        Ok(Self {
            state: Mutex::new(JournalState { by_rfq, file }),
            path,
            replay,
            metrics: JournalMetrics::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Summary of the history loaded at open time.
    pub fn replay_summary(&self) -> &JournalReplay {
        &self.replay
    }

    pub fn metrics(&self) -> &JournalMetrics {
        &self.metrics
    }

    /// RFQs that currently have history.
    pub fn rfq_ids(&self) -> Vec<RfqId> {
        let state = self.state.lock().expect("allocation journal mutex poisoned");
        let mut ids: Vec<RfqId> = state.by_rfq.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl AllocationJournal for JsonlAllocationJournal {
    fn record_batch(&self, records: &[AllocationRecord]) -> Result<(), JournalError> {
        let Some(first) = records.first() else {
            return Err(JournalError::WriteFailed {
                reason: "empty batch".to_string(),
            });
        };
        let rfq_id = first.rfq_id;
        if records.iter().any(|r| r.rfq_id != rfq_id) {
            return Err(JournalError::WriteFailed {
                reason: format!("batch mixes records of several RFQs (first is {rfq_id})"),
            });
        }

        let event = JournalEvent::BatchCommitted {
            rfq_id,
            records: records.to_vec(),
        };
        let mut state = self.state.lock().expect("allocation journal mutex poisoned");
        if let Err(e) = persist_event(&mut state.file, &event) {
            self.metrics.record_write_error();
            tracing::warn!(
                "JournalWriteFailed path={} rfq={} error={}",
                self.path.display(),
                rfq_id,
                e
            );
            return Err(JournalError::WriteFailed {
                reason: format!("{}: {e}", self.path.display()),
            });
        }

        state
            .by_rfq
            .entry(rfq_id)
            .or_default()
            .extend_from_slice(records);
        self.metrics.record_batch(records.len());
        Ok(())
    }

    fn history(&self, rfq_id: RfqId) -> Result<Vec<AllocationRecord>, JournalError> {
        Ok(self
            .state
            .lock()
            .expect("allocation journal mutex poisoned")
            .by_rfq
            .get(&rfq_id)
            .cloned()
            .unwrap_or_default())
    }
}

fn reduce_events(
    events: Vec<JournalEvent>,
) -> Result<(HashMap<RfqId, Vec<AllocationRecord>>, JournalReplay), String> {
    let mut by_rfq: HashMap<RfqId, Vec<AllocationRecord>> = HashMap::new();
    let mut replay = JournalReplay {
        batches_replayed: 0,
        records_replayed: 0,
        rfq_ids: Vec::new(),
    };

    for event in events {
        let JournalEvent::BatchCommitted { rfq_id, records } = event;
        if records.is_empty() {
            return Err(format!("empty batch for {rfq_id}"));
        }
        let history = by_rfq.entry(rfq_id).or_default();
        if history.is_empty() {
            replay.rfq_ids.push(rfq_id);
        }
        for record in records {
            if record.rfq_id != rfq_id {
                return Err(format!(
                    "batch for {rfq_id} contains record for {}",
                    record.rfq_id
                ));
            }
            let expected = history.len() as u64 + 1;
            if record.seq != expected {
                return Err(format!(
                    "{rfq_id} record seq {} where {expected} was expected",
                    record.seq
                ));
            }
            history.push(record);
            replay.records_replayed += 1;
        }
        replay.batches_replayed += 1;
    }
    Ok((by_rfq, replay))
}

fn persist_event(file: &mut File, event: &JournalEvent) -> io::Result<()> {
    let mut line = serde_json::to_string(event).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to encode journal event: {e}"),
        )
    })?;
    line.push('\n');

    let len_before = file.metadata()?.len();
    let written = file
        .write_all(line.as_bytes())
        .and_then(|()| file.sync_all());
    if written.is_err() {
        // Drop a torn tail so the file still replays.
        let _ = file.set_len(len_before);
    }
    written
}

fn read_events(path: &Path) -> io::Result<Vec<JournalEvent>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: JournalEvent = serde_json::from_str(trimmed).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "invalid journal event at line {} in {}: {e}",
                    index + 1,
                    path.display()
                ),
            )
        })?;
        events.push(event);
    }
    Ok(events)
}
