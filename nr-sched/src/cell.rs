//! Cell configuration: the immutable-after-bring-up state from §3.
//!
//! A `CellConfig` is built once at `cell_cfg` time and never mutated
//! afterwards; every `SlotGrid` and `CellWorker` borrows it for the
//! lifetime of the scheduler.

use crate::types::{AggregationLevel, CellIndex};

/// Maximum RBGs a `SlotGrid` bitmap can represent. Chosen generously
/// above any realistic NR carrier's RBG count so the fixed-capacity
/// bitset in `slot_grid` never needs to reallocate per slot.
pub const MAX_RBG: usize = 64;

/// One PDCCH candidate slot: an (aggregation level, candidate index)
/// pair together with the CCE range it occupies.
///
/// Candidate ranges are disjoint *across* aggregation levels in this
/// simplified model (see DESIGN.md): the full 3GPP CCE-hashing search
/// space formula is wire-format machinery out of scope per §1's
/// Non-goals, but the three invariants in §4.A/§8 (PRB disjointness,
/// PDCCH candidate disjointness, distinct (CORESET, AL, candidate index)
/// per DCI) all hold under this model.
#[derive(Debug, Clone, Copy)]
pub struct PdcchCandidate {
    pub al: AggregationLevel,
    pub candidate_idx: u8,
    pub cce_start: u32,
}

impl PdcchCandidate {
    pub fn cce_range(&self) -> std::ops::Range<u32> {
        self.cce_start..(self.cce_start + self.al.cces())
    }
}

/// The CORESET's search-space table: every candidate the cell can ever
/// hand out, precomputed at bring-up.
#[derive(Debug, Clone)]
pub struct PdcchTable {
    pub candidates: Vec<PdcchCandidate>,
}

impl PdcchTable {
    /// Builds a table with `nof_candidates` candidates for each
    /// aggregation level, each given a disjoint CCE range within a
    /// private sub-region of the CORESET reserved for that level.
    pub fn new(nof_candidates_per_al: usize) -> Self {
        let mut candidates = Vec::new();
        let mut next_cce = 0u32;
        for al in AggregationLevel::ALL_ASCENDING {
            for idx in 0..nof_candidates_per_al {
                candidates.push(PdcchCandidate {
                    al,
                    candidate_idx: idx as u8,
                    cce_start: next_cce,
                });
                next_cce += al.cces();
            }
        }
        PdcchTable { candidates }
    }

    pub fn total_cces(&self) -> u32 {
        self.candidates
            .iter()
            .map(|c| c.cce_range().end)
            .max()
            .unwrap_or(0)
    }

    pub fn candidates_for(&self, al: AggregationLevel) -> impl Iterator<Item = &PdcchCandidate> {
        self.candidates.iter().filter(move |c| c.al == al)
    }
}

/// Immutable per-cell configuration, built once at bring-up.
#[derive(Debug, Clone)]
pub struct CellConfig {
    pub cell_index: CellIndex,
    /// Subcarrier spacing in kHz (15/30/60/120), informational only —
    /// the scheduler does not do PHY timing math with it.
    pub subcarrier_spacing_khz: u16,
    pub nof_prb: u16,
    pub nof_rbg: usize,
    pub pdcch: PdcchTable,
}

impl CellConfig {
    pub fn new(
        cell_index: CellIndex,
        subcarrier_spacing_khz: u16,
        nof_prb: u16,
        nof_rbg: usize,
        nof_pdcch_candidates_per_al: usize,
    ) -> Result<Self, crate::error::ConfigError> {
        if nof_rbg == 0 || nof_rbg > MAX_RBG {
            return Err(crate::error::ConfigError::RbgCountOutOfRange(
                nof_rbg, MAX_RBG,
            ));
        }
        Ok(CellConfig {
            cell_index,
            subcarrier_spacing_khz,
            nof_prb,
            nof_rbg,
            pdcch: PdcchTable::new(nof_pdcch_candidates_per_al),
        })
    }
}

/// Picks a PDCCH aggregation level from a CQI report. A coarse,
/// monotonic link-adaptation stand-in: full MCS/CQI table lookups are
/// PHY-layer machinery out of scope per §1.
pub fn required_aggregation_level(cqi: u8) -> AggregationLevel {
    match cqi {
        0..=3 => AggregationLevel::Al16,
        4..=6 => AggregationLevel::Al8,
        7..=9 => AggregationLevel::Al4,
        10..=12 => AggregationLevel::Al2,
        _ => AggregationLevel::Al1,
    }
}
