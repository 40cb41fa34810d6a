//! HARQ process state machine, §3/§4.B.
//!
//! Eight processes per direction per UE-carrier. Invariants enforced
//! here: at most one in-flight transmission per (PID, TB); NDI toggles on
//! every *new* transmission only; RV follows the fixed sequence
//! `{0,2,3,1}` over retransmissions; a retransmission keeps the original
//! TBS.

use crate::types::{HarqPid, SlotIndex};

/// Fixed redundancy-version cycle used for every retransmission.
pub const RV_SEQUENCE: [u8; 4] = [0, 2, 3, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HarqState {
    /// No in-flight transmission; eligible for `new_tx_*`.
    Empty,
    /// Transmitted, ACK/NACK not yet received.
    AwaitingFeedback,
    /// NACKed; eligible for `retx_*` once the ACK window has elapsed.
    Nacked,
}

/// One HARQ process (DL or UL), tracked per UE per cell.
#[derive(Debug, Clone)]
pub struct HarqProcess {
    pid: HarqPid,
    state: HarqState,
    ndi: bool,
    rv: u8,
    tbs: u32,
    retx_count: u32,
    last_tx_slot: Option<SlotIndex>,
}

impl HarqProcess {
    fn new(pid: HarqPid) -> Self {
        HarqProcess {
            pid,
            state: HarqState::Empty,
            ndi: false,
            rv: 0,
            tbs: 0,
            retx_count: 0,
            last_tx_slot: None,
        }
    }

    pub fn pid(&self) -> HarqPid {
        self.pid
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, HarqState::Empty)
    }

    pub fn ndi(&self) -> bool {
        self.ndi
    }

    pub fn rv(&self) -> u8 {
        self.rv
    }

    pub fn tbs(&self) -> u32 {
        self.tbs
    }

    pub fn retx_count(&self) -> u32 {
        self.retx_count
    }

    pub fn last_tx_slot(&self) -> Option<SlotIndex> {
        self.last_tx_slot
    }

    /// Whether this NACKed process's ACK window (`k1` slots) has elapsed
    /// as of `now`, making it eligible for retransmission.
    fn retx_eligible(&self, now: SlotIndex, k1: u32) -> bool {
        match (self.state, self.last_tx_slot) {
            (HarqState::Nacked, Some(tx)) => tx.distance_to(now) >= k1,
            _ => false,
        }
    }

    /// Commits a new transmission: toggles NDI, resets RV/retx_count,
    /// records the TBS the caller actually granted. Only called after
    /// the grid has confirmed RBG/PDCCH availability — this method never
    /// fails.
    pub fn commit_new_tx(&mut self, tbs: u32, slot: SlotIndex) {
        self.ndi = !self.ndi;
        self.rv = RV_SEQUENCE[0];
        self.retx_count = 0;
        self.tbs = tbs;
        self.last_tx_slot = Some(slot);
        self.state = HarqState::AwaitingFeedback;
    }

    /// Commits a retransmission: NDI and TBS are unchanged from the
    /// original transmission (invariant 4 in §8); RV advances along the
    /// fixed sequence.
    pub fn commit_retx(&mut self, slot: SlotIndex) {
        self.retx_count += 1;
        self.rv = RV_SEQUENCE[(self.retx_count as usize) % RV_SEQUENCE.len()];
        self.last_tx_slot = Some(slot);
        self.state = HarqState::AwaitingFeedback;
    }

    /// Applies feedback for this process's current transmission. `ack`
    /// frees the process; `ack=false` marks it NACKed so a subsequent
    /// `retx_eligible` call (once the ACK window elapses) allows a
    /// retransmission. Feedback for a process with no in-flight
    /// transmission is ignored (stale/duplicate ACK).
    pub fn apply_ack(&mut self, ack: bool) {
        if self.state != HarqState::AwaitingFeedback {
            return;
        }
        self.state = if ack {
            HarqState::Empty
        } else {
            HarqState::Nacked
        };
    }
}

/// Bank of 8 HARQ processes for one direction (DL or UL) of one UE's
/// carrier.
#[derive(Debug, Clone)]
pub struct HarqPool {
    processes: Vec<HarqProcess>,
}

impl HarqPool {
    pub fn new(size: usize) -> Self {
        HarqPool {
            processes: (0..size).map(|i| HarqProcess::new(HarqPid(i as u8))).collect(),
        }
    }

    pub fn get(&self, pid: HarqPid) -> &HarqProcess {
        &self.processes[pid.0 as usize]
    }

    pub fn get_mut(&mut self, pid: HarqPid) -> &mut HarqProcess {
        &mut self.processes[pid.0 as usize]
    }

    /// First process whose ACK has been received (empty), in PID order —
    /// matches §4.B's `new_tx_dl`/`new_tx_ul`.
    pub fn first_empty(&self) -> Option<HarqPid> {
        self.processes.iter().find(|p| p.is_empty()).map(|p| p.pid)
    }

    /// Oldest NACKed process whose ACK window has elapsed, i.e. the one
    /// with the smallest `last_tx_slot` among those eligible — matches
    /// §4.B's `retx_dl`/`retx_ul`.
    pub fn oldest_retx_eligible(&self, now: SlotIndex, k1: u32) -> Option<HarqPid> {
        self.processes
            .iter()
            .filter(|p| p.retx_eligible(now, k1))
            .min_by_key(|p| p.last_tx_slot.map(|s| s.0).unwrap_or(u32::MAX))
            .map(|p| p.pid)
    }

    pub fn apply_ack(&mut self, pid: HarqPid, ack: bool) {
        self.get_mut(pid).apply_ack(ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn new_tx_toggles_ndi_each_time() {
        let mut p = HarqProcess::new(HarqPid(0));
        assert!(!p.ndi());
        p.commit_new_tx(100, SlotIndex(0));
        assert!(p.ndi());
        p.apply_ack(true);
        p.commit_new_tx(100, SlotIndex(1));
        assert!(!p.ndi());
    }

    #[test_case(1, RV_SEQUENCE[1]; "first retx uses rv index 1")]
    #[test_case(2, RV_SEQUENCE[2]; "second retx uses rv index 2")]
    #[test_case(3, RV_SEQUENCE[3]; "third retx uses rv index 3")]
    #[test_case(4, RV_SEQUENCE[0]; "fourth retx wraps back to rv index 0")]
    fn retx_follows_rv_sequence(nof_retx: u32, expected_rv: u8) {
        let mut p = HarqProcess::new(HarqPid(0));
        p.commit_new_tx(256, SlotIndex(0));
        for i in 0..nof_retx {
            p.apply_ack(false);
            p.commit_retx(SlotIndex(10 * (i + 1)));
        }
        assert_eq!(p.rv(), expected_rv);
        assert_eq!(p.tbs(), 256, "retransmission must preserve original TBS");
    }

    #[test]
    fn retx_preserves_ndi() {
        let mut p = HarqProcess::new(HarqPid(0));
        p.commit_new_tx(64, SlotIndex(0));
        let ndi_before = p.ndi();
        p.apply_ack(false);
        p.commit_retx(SlotIndex(4));
        assert_eq!(p.ndi(), ndi_before);
    }

    #[test]
    fn nacked_process_not_eligible_until_window_elapses() {
        let mut p = HarqProcess::new(HarqPid(0));
        p.commit_new_tx(64, SlotIndex(0));
        p.apply_ack(false);
        assert!(!p.retx_eligible(SlotIndex(2), 4));
        assert!(p.retx_eligible(SlotIndex(4), 4));
    }

    #[test]
    fn pool_first_empty_is_pid_ordered() {
        let mut pool = HarqPool::new(8);
        pool.get_mut(HarqPid(0)).commit_new_tx(10, SlotIndex(0));
        assert_eq!(pool.first_empty(), Some(HarqPid(1)));
    }

    #[test]
    fn pool_oldest_retx_eligible_picks_earliest_tx() {
        let mut pool = HarqPool::new(8);
        pool.get_mut(HarqPid(0)).commit_new_tx(10, SlotIndex(0));
        pool.get_mut(HarqPid(1)).commit_new_tx(10, SlotIndex(5));
        pool.apply_ack(HarqPid(0), false);
        pool.apply_ack(HarqPid(1), false);
        assert_eq!(pool.oldest_retx_eligible(SlotIndex(20), 4), Some(HarqPid(0)));
    }
}
