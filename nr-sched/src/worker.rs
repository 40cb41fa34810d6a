//! Cell worker: runs the allocation algorithm for one {cell, slot}.
//!
//! Mirrors the teacher's `slot_cc_worker` lifecycle (`start`/`run`/
//! `end_slot`) one-for-one; a worker is constructed once per cell and
//! reused across every slot that cell's context handles, the same way
//! the original reuses one worker object per cell index for the whole
//! process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::cell::CellConfig;
use crate::policy::SchedulingPolicy;
use crate::slot_grid::{DlGrant, SlotGrid, UlGrant};
use crate::slot_ue::SlotUeView;
use crate::types::{CellIndex, Rnti, SlotIndex};
use crate::ue::UeTable;

/// DL/UL grants produced for one {cell, slot}.
#[derive(Debug, Clone, Default)]
pub struct SchedResult {
    pub dl_grants: Vec<DlGrant>,
    pub ul_grants: Vec<UlGrant>,
}

/// Runs DL/UL allocation for one cell, one slot at a time. Not `Send`
/// across concurrent `run()` calls for the *same* worker — the
/// orchestrator guarantees only one cell's worker is ever driven
/// concurrently with itself by serializing access through a per-context
/// mutex (see `orchestrator::SlotContext`).
#[derive(educe::Educe)]
#[educe(Debug)]
pub struct CellWorker {
    cell_index: CellIndex,
    cell_cfg: Arc<CellConfig>,
    #[educe(Debug(ignore))]
    policy: Arc<dyn SchedulingPolicy>,
    grid: SlotGrid,
    slot: Option<SlotIndex>,
    slot_ues: HashMap<Rnti, SlotUeView>,
    /// Advances once per `run()`; feeds `SchedulingPolicy`'s rotation
    /// argument so the favored UE changes from slot to slot.
    call_count: usize,
}

impl CellWorker {
    pub fn new(cell_cfg: Arc<CellConfig>, policy: Arc<dyn SchedulingPolicy>) -> Self {
        let cell_index = cell_cfg.cell_index;
        CellWorker {
            cell_index,
            grid: SlotGrid::new(cell_cfg.clone()),
            cell_cfg,
            policy,
            slot: None,
            slot_ues: HashMap::new(),
            call_count: 0,
        }
    }

    pub fn cell_index(&self) -> CellIndex {
        self.cell_index
    }

    fn running(&self) -> bool {
        self.slot.is_some()
    }

    /// Reserves every UE active on this cell for `slot`, in a locked
    /// context (the orchestrator holds the context's per-cell mutex for
    /// the duration of `start`/`run`/`end_slot`). UEs already reserved by
    /// an overlapping slot context are skipped, matching `try_reserve`'s
    /// "empty means discard, do not retry this slot" contract.
    #[instrument(level = "trace", skip_all)]
    pub fn start(&mut self, slot: SlotIndex, ue_table: &UeTable) {
        assert!(!self.running(), "start() called for an active worker");

        self.grid.reset(slot);
        self.slot_ues.clear();

        for rnti in ue_table.iter_rntis() {
            let Some(ue) = ue_table.get(rnti) else {
                continue;
            };
            if !ue.is_active_on(self.cell_index) {
                continue;
            }
            if let Some(view) = ue.try_reserve(slot, self.cell_index) {
                self.slot_ues.insert(rnti, view);
            }
        }

        self.slot = Some(slot);
    }

    /// Candidate selection, DL/UL allocation, and PDCCH finalization for
    /// the reserved UE set. Slot parity decides whether DL or UL runs
    /// first, rotating PDCCH contention across slots so neither direction
    /// is systematically starved.
    #[instrument(level = "trace", skip_all)]
    pub fn run(&mut self) {
        assert!(self.running(), "run() called for a non-active worker");

        let ues: Vec<SlotUeView> = self.slot_ues.drain().map(|(_, v)| v).collect();
        let dl_first = self.slot.expect("checked by running() above").0 % 2 == 0;

        if dl_first {
            self.policy.alloc_dl(&mut self.grid, &ues, self.call_count);
            self.policy.alloc_ul(&mut self.grid, &ues, self.call_count);
        } else {
            self.policy.alloc_ul(&mut self.grid, &ues, self.call_count);
            self.policy.alloc_dl(&mut self.grid, &ues, self.call_count);
        }

        for view in ues {
            self.slot_ues.insert(view.rnti(), view);
        }

        // PDCCH candidates were already claimed greedily at alloc time;
        // this just materializes the (now final) DCI list.
        let _ = self.grid.generate_dcis();
        self.call_count = self.call_count.wrapping_add(1);
    }

    /// Releases every live reservation and returns this slot's result.
    /// Dropping `slot_ues` releases each {UE, cell} reservation via
    /// `SlotUeView`'s `Drop` impl.
    pub fn end_slot(&mut self) -> SchedResult {
        assert!(self.running(), "end_slot() called for a non-active worker");
        let result = SchedResult {
            dl_grants: self.grid.dl_grants().to_vec(),
            ul_grants: self.grid.ul_grants().to_vec(),
        };
        self.slot_ues.clear();
        self.slot = None;
        result
    }

    /// Snapshot of this slot's grants without ending the slot. Used by
    /// the orchestrator to hand `generate_sched_result` a result
    /// immediately after `run()`, independent of when `end_slot` fires
    /// (only the last cell to finish triggers finalization).
    pub fn snapshot_result(&self) -> SchedResult {
        SchedResult {
            dl_grants: self.grid.dl_grants().to_vec(),
            ul_grants: self.grid.ul_grants().to_vec(),
        }
    }

    pub fn cell_cfg(&self) -> &Arc<CellConfig> {
        &self.cell_cfg
    }
}
