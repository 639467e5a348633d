//! RFQ lifecycle state machine.
//!
//! **States:** `Initial -> Evaluation -> Closed`
//!
//! - `Initial -> Evaluation` on the first accepted quote.
//! - `Evaluation -> Closed` only when a finalization brings the cumulative
//!   allocation up to the required count.
//! - `Closed` is terminal. Mutations against a closed RFQ fail with
//!   `SourcingError::AlreadyFinalized`; events are ignored.

use serde::{Deserialize, Serialize};

use crate::error::SourcingError;
use crate::ids::RfqId;

// ─── States ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    /// No quote accepted yet.
    Initial,
    /// At least one quote exists; allocation incomplete.
    Evaluation,
    /// Cumulative allocation equals the required count.
    Closed,
}

impl RfqStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RfqStatus::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RfqStatus::Initial => "initial",
            RfqStatus::Evaluation => "evaluation",
            RfqStatus::Closed => "closed",
        }
    }
}

// ─── Events ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfqEvent {
    /// A vendor quote was accepted for this RFQ.
    QuoteAccepted,
    /// The ledger total reached the required count.
    FullyAllocated,
}

// ─── Transition result ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Transitioned { from: RfqStatus, to: RfqStatus },
    /// No state change.
    Ignored {
        current: RfqStatus,
        event: RfqEvent,
        reason: &'static str,
    },
}

// ─── Lifecycle instance ─────────────────────────────────────────────────

/// Status tracker for one RFQ. Never panics on unexpected events.
#[derive(Debug, Clone)]
pub struct RfqLifecycle {
    status: RfqStatus,
    transitions: Vec<(RfqEvent, RfqStatus, RfqStatus)>,
}

impl RfqLifecycle {
    pub fn new() -> Self {
        Self {
            status: RfqStatus::Initial,
            transitions: Vec::new(),
        }
    }

    pub fn status(&self) -> RfqStatus {
        self.status
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Fail with `AlreadyFinalized` once the RFQ is closed.
    pub fn ensure_open(&self, rfq_id: RfqId) -> Result<(), SourcingError> {
        if self.status.is_terminal() {
            return Err(SourcingError::AlreadyFinalized { rfq_id });
        }
        Ok(())
    }

    pub fn apply(&mut self, event: RfqEvent) -> TransitionResult {
        let from = self.status;

        if from.is_terminal() {
            return TransitionResult::Ignored {
                current: from,
                event,
                reason: "already closed",
            };
        }

        match (from, event) {
            (RfqStatus::Initial, RfqEvent::QuoteAccepted) => {
                self.transition(from, RfqStatus::Evaluation, event)
            }
            (RfqStatus::Evaluation, RfqEvent::QuoteAccepted) => TransitionResult::Ignored {
                current: from,
                event,
                reason: "already in evaluation",
            },
            (RfqStatus::Evaluation, RfqEvent::FullyAllocated) => {
                self.transition(from, RfqStatus::Closed, event)
            }
            // Allocation needs quotes; an Initial RFQ cannot be fully allocated.
            _ => TransitionResult::Ignored {
                current: from,
                event,
                reason: "no valid transition",
            },
        }
    }

    fn transition(&mut self, from: RfqStatus, to: RfqStatus, event: RfqEvent) -> TransitionResult {
        self.status = to;
        self.transitions.push((event, from, to));
        TransitionResult::Transitioned { from, to }
    }
}

impl Default for RfqLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
