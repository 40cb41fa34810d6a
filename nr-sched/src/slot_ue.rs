//! Slot-UE view: the short-lived per-{UE, cell, slot} handle from §3/§4.C.
//!
//! Re-architected per §9's design note: rather than an RAII guard typed
//! around a raw reservation, this is a plain value (`SlotUeView`) whose
//! `Drop` impl releases the reservation on every exit path — the
//! standard Rust idiom for "construction via a fallible `try_reserve`;
//! destruction releases" that §9 asks for. `UeRecord::try_reserve`
//! returns `Option<SlotUeView>`; `None` *is* the "empty" view from §4.C.

use std::sync::Arc;

use crate::types::{AggregationLevel, CellIndex, Direction, SlotIndex};
use crate::ue::{carrier::CarrierState, HarqCandidate, UeRecord};

/// Borrow of one UE's carrier state for one {cell, slot}, held by
/// exactly one cell worker at a time. Dropping it releases the
/// underlying {UE, cell} reservation.
#[derive(educe::Educe)]
#[educe(Debug)]
pub struct SlotUeView {
    #[educe(Debug(ignore))]
    ue: Arc<UeRecord>,
    cell: CellIndex,
    slot: SlotIndex,
    /// Selected DL HARQ candidate for this slot, or `None` if no
    /// transmission is possible (§3: "`h_dl`/`h_ul` ... are absent when
    /// no transmission is possible").
    h_dl: Option<HarqCandidate>,
    h_ul: Option<HarqCandidate>,
    aggregation_level: AggregationLevel,
}

impl SlotUeView {
    pub(crate) fn new(
        ue: Arc<UeRecord>,
        cell: CellIndex,
        slot: SlotIndex,
        h_dl: Option<HarqCandidate>,
        h_ul: Option<HarqCandidate>,
        aggregation_level: AggregationLevel,
    ) -> Self {
        SlotUeView {
            ue,
            cell,
            slot,
            h_dl,
            h_ul,
            aggregation_level,
        }
    }

    pub fn rnti(&self) -> crate::types::Rnti {
        self.ue.rnti()
    }

    pub fn cell(&self) -> CellIndex {
        self.cell
    }

    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn h_dl(&self) -> Option<HarqCandidate> {
        self.h_dl
    }

    pub fn h_ul(&self) -> Option<HarqCandidate> {
        self.h_ul
    }

    pub fn aggregation_level(&self) -> AggregationLevel {
        self.aggregation_level
    }

    pub fn pending_ul_bytes(&self) -> u32 {
        self.with_carrier(|c| c.pending_ul_bytes)
    }

    /// HARQ-ACK timing offset (§3's `k1[]`) configured for this slot,
    /// looked up from the UE's own configuration rather than assumed.
    pub fn k1(&self) -> u32 {
        self.ue.k1_for_slot(self.slot)
    }

    pub fn has_pending_sr(&self) -> bool {
        self.with_carrier(|c| c.pending_sr)
    }

    fn with_carrier<T>(&self, f: impl FnOnce(&CarrierState) -> T) -> T {
        f(&self.ue.lock_carrier(self.cell))
    }

    /// Commits the HARQ side-effects of a successful grant: toggles NDI
    /// / advances RV as appropriate and returns the transmission's TBS
    /// and NDI/RV for the caller to build a `Dci`/grant with. Only
    /// called by `SlotGrid::alloc_pdsch`/`alloc_pusch` after RBG and
    /// PDCCH availability have both been confirmed, so it never fails.
    pub(crate) fn commit_harq(
        &self,
        direction: Direction,
        candidate: HarqCandidate,
        new_tx_tbs: u32,
    ) -> (bool, u8, u32) {
        let mut carrier = self.ue.lock_carrier(self.cell);
        let pool = match direction {
            Direction::Dl => &mut carrier.dl_harq,
            Direction::Ul => &mut carrier.ul_harq,
        };
        let proc = pool.get_mut(candidate.pid);
        if candidate.is_retx {
            proc.commit_retx(self.slot);
            crate::metrics::grant_retx(direction);
        } else {
            proc.commit_new_tx(new_tx_tbs, self.slot);
            crate::metrics::grant_new_tx(direction);
        }
        (proc.ndi(), proc.rv(), proc.tbs())
    }
}

impl Drop for SlotUeView {
    fn drop(&mut self) {
        crate::ue::release_reservation(&self.ue, self.cell);
    }
}
