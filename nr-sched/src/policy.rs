//! Pluggable DL/UL allocation policy.
//!
//! The design notes call the baseline "grant all RBGs to first eligible
//! UE" an almost-certain placeholder and fix only the properties any
//! replacement must uphold: deterministic given identical inputs,
//! disjoint allocations, HARQ availability respected. `SchedulingPolicy`
//! is the seam a priority- or QoS-aware policy would plug into;
//! `RoundRobinRbgPolicy` is the baseline shipped here. It partitions the
//! cell's RBGs evenly across the eligible UEs for one direction rather
//! than handing the whole carrier to a single UE every slot, and rotates
//! which UE goes first each call so contention for PDCCH candidates
//! (and, implicitly, RBGs) is shared rather than starving everyone past
//! the first.

use bitvec::prelude::*;

use crate::slot_grid::SlotGrid;
use crate::slot_ue::SlotUeView;

/// A pluggable DL/UL resource-allocation strategy for one cell worker.
///
/// Implementations must be deterministic given identical `ues`/`grid`
/// state, must only ever hand out disjoint RBG masks (`SlotGrid` enforces
/// this on commit, but a well-behaved policy should not rely on that as
/// its only defense), and must check HARQ/PDCCH availability through
/// `grid.alloc_pdsch`/`alloc_pusch` rather than assuming a UE is
/// grantable.
pub trait SchedulingPolicy: Send + Sync {
    /// Allocates PDSCH for as many of `ues` as the cell's RBGs and PDCCH
    /// candidates allow. `rotation` is an opaque, monotonically advancing
    /// value (the cell worker passes its own call count) a policy may use
    /// to vary which UE is favored across calls.
    fn alloc_dl(&self, grid: &mut SlotGrid, ues: &[SlotUeView], rotation: usize);

    /// Mirror of `alloc_dl` over the UL RBG mask and UL HARQ pool.
    fn alloc_ul(&self, grid: &mut SlotGrid, ues: &[SlotUeView], rotation: usize);
}

/// Baseline policy: partitions the cell's RBGs evenly across UEs with an
/// available HARQ candidate for the direction being scheduled, in an
/// order rotated by `rotation` so the same UE does not always go first.
#[derive(Debug, Default)]
pub struct RoundRobinRbgPolicy;

impl RoundRobinRbgPolicy {
    fn run(
        grid: &mut SlotGrid,
        ues: &[SlotUeView],
        rotation: usize,
        dl: bool,
        eligible: impl Fn(&SlotUeView) -> bool,
    ) {
        let nof_rbg = grid.nof_rbg();
        let indices: Vec<usize> = (0..ues.len()).filter(|&i| eligible(&ues[i])).collect();
        if indices.is_empty() || nof_rbg == 0 {
            return;
        }
        let n = indices.len();
        let chunk = (nof_rbg / n).max(1);
        let mut rbg_cursor = 0usize;
        for slot in 0..n {
            if rbg_cursor >= nof_rbg {
                break;
            }
            let ue = &ues[indices[(rotation + slot) % n]];
            let width = if slot == n - 1 {
                nof_rbg - rbg_cursor
            } else {
                chunk.min(nof_rbg - rbg_cursor)
            };
            let mut mask = bitvec![0; nof_rbg];
            for i in rbg_cursor..(rbg_cursor + width) {
                mask.set(i, true);
            }
            rbg_cursor += width;

            let result = if dl {
                grid.alloc_pdsch(ue, &mask)
            } else {
                grid.alloc_pusch(ue, &mask)
            };
            if let Err(crate::slot_grid::AllocMiss::PdcchFull) = result {
                // PDCCH candidates for this aggregation level are
                // exhausted; remaining UEs would fail the same way.
                break;
            }
        }
    }
}

impl SchedulingPolicy for RoundRobinRbgPolicy {
    fn alloc_dl(&self, grid: &mut SlotGrid, ues: &[SlotUeView], rotation: usize) {
        Self::run(grid, ues, rotation, true, |u| u.h_dl().is_some());
    }

    fn alloc_ul(&self, grid: &mut SlotGrid, ues: &[SlotUeView], rotation: usize) {
        Self::run(grid, ues, rotation, false, |u| u.h_ul().is_some());
    }
}
