use std::collections::HashSet;

use kilodm_protocol::{AgentId, CommitmentState, PeerState};

use crate::draws::Draws;

/// Controller clock, in ticks since start.
pub type Tick = u64;

/// Upper bound on buffered peer messages.
/// Oldest records are evicted first once reached.
pub const MAX_RECORDS: usize = 256;

/// Identity of a buffered message. Relayed copies of one broadcast share it
/// because the signature ignores the hop count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub sender: AgentId,
    pub signature: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    pub message: PeerState,
    pub received_at: Tick,
    /// Whether this record was already offered for relaying.
    pub rebroadcast: bool,
    key: RecordKey,
}

impl PeerRecord {
    pub fn new(message: PeerState, received_at: Tick) -> Self {
        let key = RecordKey { sender: message.sender, signature: message.signature() };
        Self { message, received_at, rebroadcast: false, key }
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    pub fn sender(&self) -> AgentId {
        self.message.sender
    }

    pub fn commitment(&self) -> CommitmentState {
        self.message.commitment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateIgnored,
}

/// Ordered buffer of peer messages, deduplicated by [`RecordKey`].
#[derive(Debug, Clone)]
pub struct MessageStore {
    /// Insertion order, oldest first.
    records: Vec<PeerRecord>,
    keys: HashSet<RecordKey>,
    capacity: usize,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RECORDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { records: Vec::new(), keys: HashSet::new(), capacity: capacity.max(1) }
    }

    pub fn insert(&mut self, record: PeerRecord) -> InsertOutcome {
        if !self.keys.insert(record.key) {
            return InsertOutcome::DuplicateIgnored;
        }
        if self.records.len() >= self.capacity {
            let evicted = self.records.remove(0);
            self.keys.remove(&evicted.key);
        }
        self.records.push(record);
        InsertOutcome::Inserted
    }

    /// Drop every record at least `valid_until` ticks old. Returns the
    /// number of records kept.
    pub fn prune(&mut self, now: Tick, valid_until: Tick) -> usize {
        let keys = &mut self.keys;
        self.records.retain(|rec| {
            let fresh = now.saturating_sub(rec.received_at) < valid_until;
            if !fresh {
                keys.remove(&rec.key);
            }
            fresh
        });
        self.records.len()
    }

    /// A uniformly chosen record, or `None` when empty.
    pub fn pick_random<D: Draws + ?Sized>(&self, draws: &mut D) -> Option<&PeerRecord> {
        if self.records.is_empty() {
            return None;
        }
        self.records.get(draws.index(self.records.len()))
    }

    /// Oldest record not yet offered for relaying.
    pub fn first_not_rebroadcast(&self) -> Option<&PeerRecord> {
        self.records.iter().find(|rec| !rec.rebroadcast)
    }

    /// Returns false if no record has `key`.
    pub fn mark_rebroadcast(&mut self, key: RecordKey) -> bool {
        match self.records.iter_mut().find(|rec| rec.key == key) {
            Some(rec) => {
                rec.rebroadcast = true;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    /// Records in insertion order, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PeerRecord> {
        self.records.iter()
    }

    pub fn distinct_senders(&self) -> usize {
        self.records.iter().map(|rec| rec.sender()).collect::<HashSet<_>>().len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
    }
}
