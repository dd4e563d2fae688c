//! Debounced lookup bookkeeping with a stale-response guard.
//!
//! Each keystroke reschedules the lookup; once the debounce window elapses a
//! ticket can be taken and carried through the backend call. A response is
//! applied only while its ticket is still current: every reschedule or
//! cancellation bumps the generation counter, so a response for an outdated
//! input compares unequal and is silently dropped.

use chrono::{DateTime, Duration, Utc};

/// keystroke-to-query settle time
pub fn debounce_window() -> Duration {
    Duration::milliseconds(300)
}

/// which field a lookup belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// applicant NIC -> customer search
    Customer,
    /// guardian NIC -> joint-borrower endpoint
    Guardian,
}

/// token tying a backend response back to the input that triggered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub kind: LookupKind,
    pub value: String,
    generation: u64,
}

#[derive(Debug)]
struct PendingLookup {
    value: String,
    generation: u64,
    due_at: DateTime<Utc>,
}

/// debounce + staleness state for one lookup kind
#[derive(Debug)]
pub struct DebouncedLookup {
    kind: LookupKind,
    generation: u64,
    pending: Option<PendingLookup>,
    in_flight: Option<u64>,
}

impl DebouncedLookup {
    pub fn new(kind: LookupKind) -> Self {
        Self {
            kind,
            generation: 0,
            pending: None,
            in_flight: None,
        }
    }

    /// record fresh input; supersedes any pending or in-flight lookup
    pub fn schedule(&mut self, value: &str, now: DateTime<Utc>) {
        self.generation += 1;
        self.pending = Some(PendingLookup {
            value: value.to_string(),
            generation: self.generation,
            due_at: now + debounce_window(),
        });
    }

    /// drop the pending lookup and invalidate in-flight responses
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    /// take the ticket once the debounce window has elapsed; marks the
    /// lookup busy until [`finish`](Self::finish) is called
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<LookupTicket> {
        let due = matches!(&self.pending, Some(p) if now >= p.due_at);
        if !due {
            return None;
        }
        let pending = self.pending.take()?;
        self.in_flight = Some(pending.generation);
        Some(LookupTicket {
            kind: self.kind,
            value: pending.value,
            generation: pending.generation,
        })
    }

    /// true while the ticket's input is still the live value
    pub fn is_current(&self, ticket: &LookupTicket) -> bool {
        ticket.generation == self.generation
    }

    /// clear the busy flag for this ticket; a completion for a superseded
    /// ticket leaves a newer in-flight lookup busy
    pub fn finish(&mut self, ticket: &LookupTicket) {
        if self.in_flight == Some(ticket.generation) {
            self.in_flight = None;
        }
    }

    pub fn busy(&self) -> bool {
        self.in_flight.is_some()
    }
}
