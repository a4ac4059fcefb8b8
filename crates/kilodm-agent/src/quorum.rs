use std::collections::HashSet;

use kilodm_protocol::CommitmentState;

use crate::store::MessageStore;

/// Fraction of distinct senders in `store` whose most recent report commits
/// them to the same resource as `commitment`. Seeking and quorum-confirmed
/// peers count alike. An empty store yields 0.
pub fn fraction_agreeing(commitment: CommitmentState, store: &MessageStore) -> f64 {
    let mut seen = HashSet::new();
    let mut friends = 0usize;
    for rec in store.iter().rev() {
        if !seen.insert(rec.sender()) {
            continue;
        }
        if rec.commitment().resource() == commitment.resource() {
            friends += 1;
        }
    }
    if seen.is_empty() {
        0.0
    } else {
        friends as f64 / seen.len() as f64
    }
}

/// Promotes a seeking agent once enough neighbours agree with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuorumMonitor {
    threshold: f64,
}

impl QuorumMonitor {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Quorum sensing is off at threshold 0.
    pub fn enabled(&self) -> bool {
        self.threshold > 0.0
    }

    /// `QuorumConfirmed(c)` when `state` is `Seeking(c)` and the agreeing
    /// fraction reaches the threshold; otherwise `state` unchanged.
    pub fn check(&self, state: CommitmentState, store: &MessageStore) -> CommitmentState {
        match state {
            CommitmentState::Seeking(c) if self.enabled() => {
                if fraction_agreeing(state, store) >= self.threshold {
                    CommitmentState::QuorumConfirmed(c)
                } else {
                    state
                }
            }
            _ => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::PeerRecord,
        testkit::{peer, r},
    };

    fn store_of(reports: &[(u16, CommitmentState)]) -> MessageStore {
        let mut store = MessageStore::new();
        for (t, (sender, c)) in reports.iter().enumerate() {
            store.insert(PeerRecord::new(peer(*sender, *c), t as u64));
        }
        store
    }

    #[test]
    fn empty_store_is_zero() {
        assert_eq!(fraction_agreeing(CommitmentState::Seeking(r(0)), &MessageStore::new()), 0.0);
    }

    #[test]
    fn counts_distinct_senders() {
        let store = store_of(&[
            (1, CommitmentState::Seeking(r(2))),
            (2, CommitmentState::QuorumConfirmed(r(2))),
            (3, CommitmentState::Seeking(r(2))),
            (4, CommitmentState::Seeking(r(0))),
        ]);
        assert_eq!(fraction_agreeing(CommitmentState::Seeking(r(2)), &store), 0.75);
    }

    #[test]
    fn newest_report_per_sender_wins() {
        let store = store_of(&[
            (1, CommitmentState::Seeking(r(1))),
            (2, CommitmentState::Seeking(r(1))),
            (1, CommitmentState::NotCommitted),
        ]);
        assert_eq!(store.len(), 3);
        assert_eq!(fraction_agreeing(CommitmentState::Seeking(r(1)), &store), 0.5);
    }

    #[test]
    fn promotes_only_seeking_at_threshold() {
        let store = store_of(&[
            (1, CommitmentState::Seeking(r(2))),
            (2, CommitmentState::Seeking(r(2))),
            (3, CommitmentState::Seeking(r(2))),
            (4, CommitmentState::NotCommitted),
        ]);
        let monitor = QuorumMonitor::new(0.5);
        assert_eq!(
            monitor.check(CommitmentState::Seeking(r(2)), &store),
            CommitmentState::QuorumConfirmed(r(2))
        );
        assert_eq!(monitor.check(CommitmentState::Seeking(r(0)), &store), CommitmentState::Seeking(r(0)));
        assert_eq!(monitor.check(CommitmentState::NotCommitted, &store), CommitmentState::NotCommitted);
        assert_eq!(
            QuorumMonitor::new(0.8).check(CommitmentState::Seeking(r(2)), &store),
            CommitmentState::Seeking(r(2))
        );
    }

    #[test]
    fn disabled_never_promotes() {
        let store = store_of(&[(1, CommitmentState::Seeking(r(0)))]);
        let monitor = QuorumMonitor::new(0.0);
        assert!(!monitor.enabled());
        assert_eq!(monitor.check(CommitmentState::Seeking(r(0)), &store), CommitmentState::Seeking(r(0)));
    }
}
