//! Slot grid: the per-cell, per-slot resource map from §4.A.
//!
//! Owns the RBG bitmaps, the list of grants allocated this slot, and the
//! PDCCH candidate bookkeeping. Exclusive to its owning cell worker
//! between `reset` and `generate_dcis` (§5).

use std::sync::Arc;

use bitvec::prelude::*;

use crate::cell::{CellConfig, PdcchCandidate};
use crate::slot_ue::SlotUeView;
use crate::types::{AggregationLevel, Direction, HarqPid, Rnti, SlotIndex};

/// A committed downlink grant.
#[derive(Debug, Clone)]
pub struct DlGrant {
    pub rnti: Rnti,
    pub pid: HarqPid,
    pub ndi: bool,
    pub rv: u8,
    pub tbs: u32,
    pub modulation_order: u8,
    pub prbs: BitVec,
    pub dci: Dci,
    /// Slot offset, relative to this DL grant, at which the UE's
    /// HARQ-ACK is expected (§3's `k1[]`).
    pub k1: u32,
}

/// A committed uplink grant (same shape as `DlGrant` minus `k1`, per
/// §6).
#[derive(Debug, Clone)]
pub struct UlGrant {
    pub rnti: Rnti,
    pub pid: HarqPid,
    pub ndi: bool,
    pub rv: u8,
    pub tbs: u32,
    pub modulation_order: u8,
    pub prbs: BitVec,
    pub dci: Dci,
}

/// Downlink control information: the scheduling decision's bit field, in
/// placeholder form — actual wire encoding is a Non-goal (§1).
#[derive(Debug, Clone, Copy)]
pub struct Dci {
    pub rnti: Rnti,
    pub aggregation_level: AggregationLevel,
    pub candidate_idx: u8,
    pub direction: Direction,
}

/// Why an `alloc_pdsch`/`alloc_pusch` call did not produce a grant.
/// Per §7 this is *not* an error — it is the normal "UE gets no grant
/// this slot" outcome, logged at debug and counted in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocMiss {
    RbgOverlap,
    NoHarqAvailable,
    PdcchFull,
}

pub type AllocResult = Result<(), AllocMiss>;

/// Fixed placeholder transport-block size used by the baseline policy.
/// A real link-adaptation table is PHY-layer machinery, out of scope
/// per §1.
const BASELINE_TBS: u32 = 1024;
const BASELINE_MODULATION_ORDER: u8 = 2;

#[derive(Debug)]
pub struct SlotGrid {
    cell_cfg: Arc<CellConfig>,
    slot: SlotIndex,
    dl_used: BitVec,
    ul_used: BitVec,
    claimed_cces: BitVec,
    dl_grants: Vec<DlGrant>,
    ul_grants: Vec<UlGrant>,
}

impl SlotGrid {
    pub fn new(cell_cfg: Arc<CellConfig>) -> Self {
        let nof_rbg = cell_cfg.nof_rbg;
        let total_cces = cell_cfg.pdcch.total_cces() as usize;
        SlotGrid {
            cell_cfg,
            slot: SlotIndex::default(),
            dl_used: bitvec![0; nof_rbg],
            ul_used: bitvec![0; nof_rbg],
            claimed_cces: bitvec![0; total_cces],
            dl_grants: Vec::new(),
            ul_grants: Vec::new(),
        }
    }

    /// §4.A `reset(slot, cell_cfg)`. Cell configuration is immutable
    /// after bring-up (§3), so only the per-slot state is cleared.
    pub fn reset(&mut self, slot: SlotIndex) {
        self.slot = slot;
        self.dl_used = bitvec![0; self.cell_cfg.nof_rbg];
        self.ul_used = bitvec![0; self.cell_cfg.nof_rbg];
        self.claimed_cces = bitvec![0; self.cell_cfg.pdcch.total_cces() as usize];
        self.dl_grants.clear();
        self.ul_grants.clear();
    }

    pub fn nof_rbg(&self) -> usize {
        self.cell_cfg.nof_rbg
    }

    pub fn dl_grants(&self) -> &[DlGrant] {
        &self.dl_grants
    }

    pub fn ul_grants(&self) -> &[UlGrant] {
        &self.ul_grants
    }

    fn try_claim_pdcch(&mut self, al: AggregationLevel) -> Option<PdcchCandidate> {
        for candidate in self.cell_cfg.pdcch.candidates_for(al) {
            let range = candidate.cce_range();
            let free = (range.start as usize..range.end as usize).all(|i| !self.claimed_cces[i]);
            if free {
                for i in range.start as usize..range.end as usize {
                    self.claimed_cces.set(i, true);
                }
                return Some(*candidate);
            }
        }
        None
    }

    fn rbg_overlaps(used: &BitVec, mask: &BitVec) -> bool {
        used.iter()
            .by_vals()
            .zip(mask.iter().by_vals())
            .any(|(u, m)| u && m)
    }

    fn merge_mask_into(target: &mut BitVec, mask: &BitVec) {
        for i in 0..target.len() {
            if mask[i] {
                target.set(i, true);
            }
        }
    }

    /// §4.A `alloc_pdsch(slot_ue, rbg_mask) -> result`.
    pub fn alloc_pdsch(&mut self, slot_ue: &SlotUeView, rbg_mask: &BitVec) -> AllocResult {
        assert_eq!(rbg_mask.len(), self.dl_used.len(), "rbg mask length must match the grid");

        if Self::rbg_overlaps(&self.dl_used, rbg_mask) {
            crate::metrics::alloc_miss_rbg_overlap();
            return Err(AllocMiss::RbgOverlap);
        }
        let Some(candidate) = slot_ue.h_dl() else {
            crate::metrics::alloc_miss_no_harq();
            return Err(AllocMiss::NoHarqAvailable);
        };
        let Some(pdcch) = self.try_claim_pdcch(slot_ue.aggregation_level()) else {
            crate::metrics::alloc_miss_pdcch_full();
            return Err(AllocMiss::PdcchFull);
        };

        let (ndi, rv, tbs) = slot_ue.commit_harq(Direction::Dl, candidate, BASELINE_TBS);
        Self::merge_mask_into(&mut self.dl_used, rbg_mask);

        self.dl_grants.push(DlGrant {
            rnti: slot_ue.rnti(),
            pid: candidate.pid,
            ndi,
            rv,
            tbs,
            modulation_order: BASELINE_MODULATION_ORDER,
            prbs: rbg_mask.clone(),
            dci: Dci {
                rnti: slot_ue.rnti(),
                aggregation_level: pdcch.al,
                candidate_idx: pdcch.candidate_idx,
                direction: Direction::Dl,
            },
            k1: slot_ue.k1(),
        });
        Ok(())
    }

    /// §4.A `alloc_pusch(slot_ue, rbg_mask) -> result`. Mirrors
    /// `alloc_pdsch` over the UL RBG mask and UL HARQ pool.
    pub fn alloc_pusch(&mut self, slot_ue: &SlotUeView, rbg_mask: &BitVec) -> AllocResult {
        assert_eq!(rbg_mask.len(), self.ul_used.len(), "rbg mask length must match the grid");

        if Self::rbg_overlaps(&self.ul_used, rbg_mask) {
            crate::metrics::alloc_miss_rbg_overlap();
            return Err(AllocMiss::RbgOverlap);
        }
        let Some(candidate) = slot_ue.h_ul() else {
            crate::metrics::alloc_miss_no_harq();
            return Err(AllocMiss::NoHarqAvailable);
        };
        let Some(pdcch) = self.try_claim_pdcch(slot_ue.aggregation_level()) else {
            crate::metrics::alloc_miss_pdcch_full();
            return Err(AllocMiss::PdcchFull);
        };

        let (ndi, rv, tbs) = slot_ue.commit_harq(Direction::Ul, candidate, BASELINE_TBS);
        Self::merge_mask_into(&mut self.ul_used, rbg_mask);

        self.ul_grants.push(UlGrant {
            rnti: slot_ue.rnti(),
            pid: candidate.pid,
            ndi,
            rv,
            tbs,
            modulation_order: BASELINE_MODULATION_ORDER,
            prbs: rbg_mask.clone(),
            dci: Dci {
                rnti: slot_ue.rnti(),
                aggregation_level: pdcch.al,
                candidate_idx: pdcch.candidate_idx,
                direction: Direction::Ul,
            },
        });
        Ok(())
    }

    pub fn full_dl_mask(&self) -> BitVec {
        bitvec![1; self.cell_cfg.nof_rbg]
    }

    pub fn full_ul_mask(&self) -> BitVec {
        bitvec![1; self.cell_cfg.nof_rbg]
    }

    /// §4.A `generate_dcis()`. PDCCH candidates were already claimed
    /// greedily, in ascending (aggregation level, candidate index)
    /// order, at `alloc_*` time (see `try_claim_pdcch`), so finalization
    /// here is pure materialization: every grant already carries a
    /// distinct `(CORESET, aggregation level, candidate index)` triple.
    pub fn generate_dcis(&self) -> Vec<Dci> {
        self.dl_grants
            .iter()
            .map(|g| g.dci)
            .chain(self.ul_grants.iter().map(|g| g.dci))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellIndex;
    use std::sync::Arc;

    fn test_cell_cfg() -> Arc<CellConfig> {
        Arc::new(CellConfig::new(CellIndex(0), 30, 51, 8, 2).unwrap())
    }

    #[test]
    fn pdcch_disjoint_ranges_per_aggregation_level() {
        let cfg = test_cell_cfg();
        for al in AggregationLevel::ALL_ASCENDING {
            let ranges: Vec<_> = cfg.pdcch.candidates_for(al).map(|c| c.cce_range()).collect();
            for i in 0..ranges.len() {
                for j in (i + 1)..ranges.len() {
                    assert!(
                        ranges[i].end <= ranges[j].start || ranges[j].end <= ranges[i].start,
                        "candidates of the same AL must not overlap"
                    );
                }
            }
        }
    }
}
