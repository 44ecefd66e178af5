//! Per-slot request tickets giving last-request-wins semantics.
//!
//! Every fetch or mutation takes a ticket for the slot its response will
//! overwrite. A response is applied only while its ticket is the latest one
//! issued for that slot. Clearing the session advances the epoch, which retires
//! every outstanding ticket at once.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Job,
    Issues,
    Validation,
    Rows,
    /// Job creation. Kept apart from `Job` so a refresh of the outgoing job
    /// never supersedes the upload that replaces it.
    Upload,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::Job => 0,
            Slot::Issues => 1,
            Slot::Validation => 2,
            Slot::Rows => 3,
            Slot::Upload => 4,
        }
    }
}

const SLOTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    slot: Slot,
    epoch: u64,
    seq: u64,
}

impl Ticket {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
pub struct SequenceTracker {
    epoch: u64,
    next: u64,
    latest: [u64; SLOTS],
}

impl SequenceTracker {
    pub fn issue(&mut self, slot: Slot) -> Ticket {
        self.next += 1;
        self.latest[slot.index()] = self.next;
        Ticket { slot, epoch: self.epoch, seq: self.next }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch && self.latest[ticket.slot.index()] == ticket.seq
    }

    /// True while no `invalidate_all` happened since the ticket was issued.
    pub fn same_epoch(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        self.latest = [0; SLOTS];
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
