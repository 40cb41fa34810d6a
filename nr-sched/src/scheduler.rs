//! `NrScheduler`: the public API surface the PHY and RRC call into.
//!
//! Wires together the UE table, event manager, and slot orchestrator
//! behind the handful of entry points the rest of the stack depends on:
//! `slot_indication`, `generate_sched_result`, the feedback hooks, and
//! `ue_cfg`/`remove_ue`. Cell bring-up (`cell_cfg`) is one-time and
//! immutable afterwards, so it is folded into construction rather than
//! modeled as a separate fallible mutator — there is nothing useful a
//! caller could do between "scheduler exists with no cells" and "cells
//! are configured."

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use delegate::delegate;

use crate::cell::CellConfig;
use crate::error::{ConfigError, SchedulerError};
use crate::events::EventManager;
use crate::orchestrator::SlotOrchestrator;
use crate::policy::{RoundRobinRbgPolicy, SchedulingPolicy};
use crate::types::{CellIndex, HarqPid, Rnti, SlotIndex, TbIndex};
use crate::ue::{UeConfig, UeTable};
use crate::worker::SchedResult;

/// One cell's bring-up parameters, as handed to `NrScheduler::new` in the
/// `cell_cfg(list)` call.
#[derive(Debug, Clone)]
pub struct CellConfigInput {
    pub cell_index: CellIndex,
    pub subcarrier_spacing_khz: u16,
    pub nof_prb: u16,
    pub nof_rbg: usize,
    pub nof_pdcch_candidates_per_al: usize,
}

/// Scheduler-wide configuration knobs (§6's "configuration knobs" plus
/// the HARQ pool size already fixed at 8 per §3/§5).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub nof_concurrent_subframes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            nof_concurrent_subframes: 1,
        }
    }
}

/// The NR MAC scheduler. `Send + Sync`: every public method takes `&self`
/// and is safe to call concurrently from whatever thread pool the
/// embedding PHY/RRC uses, matching the "thread-per-cell caller" model —
/// this crate owns no worker threads of its own.
pub struct NrScheduler {
    cell_cfgs: Vec<Arc<CellConfig>>,
    ue_table: UeTable,
    events: EventManager,
    orchestrator: SlotOrchestrator,
    last_slot: AtomicU32,
}

impl NrScheduler {
    /// One-time bring-up: validates `cells` (rejecting duplicate indices
    /// or out-of-range RBG counts) and `config`, then constructs the
    /// orchestrator's slot contexts. Returns the same `ConfigError`
    /// variants §7 calls for on a configuration rejection; no scheduler
    /// is returned and no state is left half-constructed on `Err`.
    pub fn new(
        config: SchedulerConfig,
        cells: Vec<CellConfigInput>,
        policy: Option<Arc<dyn SchedulingPolicy>>,
    ) -> Result<Self, ConfigError> {
        if !(1..=4).contains(&config.nof_concurrent_subframes) {
            return Err(ConfigError::ConcurrentSubframesOutOfRange(
                config.nof_concurrent_subframes,
            ));
        }

        let mut cell_cfgs = Vec::with_capacity(cells.len());
        for input in &cells {
            if cell_cfgs
                .iter()
                .any(|c: &Arc<CellConfig>| c.cell_index == input.cell_index)
            {
                return Err(ConfigError::DuplicateCell(input.cell_index));
            }
            cell_cfgs.push(Arc::new(CellConfig::new(
                input.cell_index,
                input.subcarrier_spacing_khz,
                input.nof_prb,
                input.nof_rbg,
                input.nof_pdcch_candidates_per_al,
            )?));
        }

        let policy = policy.unwrap_or_else(|| Arc::new(RoundRobinRbgPolicy));
        let orchestrator =
            SlotOrchestrator::new(config.nof_concurrent_subframes, cell_cfgs.clone(), policy);

        tracing::info!(nof_cells = cell_cfgs.len(), "cell bring-up complete");

        Ok(NrScheduler {
            cell_cfgs,
            ue_table: UeTable::new(),
            events: EventManager::new(),
            orchestrator,
            last_slot: AtomicU32::new(0),
        })
    }

    fn known_cells(&self) -> Vec<CellIndex> {
        self.cell_cfgs.iter().map(|c| c.cell_index).collect()
    }

    fn current_slot(&self) -> SlotIndex {
        SlotIndex(self.last_slot.load(Ordering::Acquire))
    }

    /// Registers or reconfigures a UE. A duplicate RNTI is accepted as a
    /// reconfiguration rather than rejected (see DESIGN.md's Open
    /// Question on §6 vs §8 scenario S5); the only rejection path left is
    /// a carrier list referencing a cell that was never brought up.
    pub fn ue_cfg(&self, cfg: UeConfig) -> Result<(), ConfigError> {
        if let Err(e) = crate::ue::ensure_no_unknown_cell(&cfg.carriers, &self.known_cells()) {
            crate::metrics::ue_cfg_rejected();
            tracing::warn!(rnti = %cfg.rnti, error = %e, "rejecting ue_cfg");
            return Err(e);
        }
        self.events.ue_cfg(cfg.rnti, cfg, self.current_slot());
        Ok(())
    }

    /// Enqueues removal of `rnti`. A no-op if the RNTI was never
    /// configured (§6's reading, see DESIGN.md).
    pub fn remove_ue(&self, rnti: Rnti) {
        self.events.remove_ue(rnti, self.current_slot());
    }

    pub fn dl_ack_info(&self, rnti: Rnti, cell: CellIndex, pid: HarqPid, _tb: TbIndex, ack: bool) {
        self.events.dl_ack_info(rnti, cell, pid, ack, self.current_slot());
    }

    pub fn ul_ack_info(&self, rnti: Rnti, cell: CellIndex, pid: HarqPid, _tb: TbIndex, ack: bool) {
        self.events.ul_ack_info(rnti, cell, pid, ack, self.current_slot());
    }

    pub fn ul_sr_info(&self, rnti: Rnti) {
        self.events.ul_sr_info(rnti, self.current_slot());
    }

    pub fn ul_bsr_info(&self, rnti: Rnti, cell: CellIndex, buffer_bytes: u32) {
        self.events
            .ul_bsr_info(rnti, cell, buffer_bytes, self.current_slot());
    }

    pub fn dl_cqi_info(&self, rnti: Rnti, cell: CellIndex, cqi: u8) {
        self.events.dl_cqi_info(rnti, cell, cqi, self.current_slot());
    }

    /// Advances the scheduler's clock and admits `slot`: blocks (on the
    /// appropriate slot context's gate) if a prior use of that context
    /// has not yet finalized, then reserves UEs and starts every cell's
    /// worker.
    pub fn slot_indication(&self, slot: SlotIndex) {
        self.last_slot.store(slot.0, Ordering::Release);
        self.orchestrator.slot_indication(slot, &self.ue_table);
    }

    /// Runs `cell`'s allocation for `slot` and returns its grants. The
    /// last cell to be called for a given slot triggers finalization
    /// (applying pending events and releasing the slot context).
    pub fn generate_sched_result(
        &self,
        slot: SlotIndex,
        cell: CellIndex,
    ) -> Result<SchedResult, SchedulerError> {
        self.orchestrator
            .generate_sched_result(slot, cell, &self.ue_table, &self.events)
    }

    delegate! {
        to self.orchestrator {
            /// Number of cells configured at bring-up.
            pub fn nof_cells(&self) -> usize;
        }
    }

    pub fn ue_count(&self) -> usize {
        self.ue_table.len()
    }
}
