//! Error types.
//!
//! §7 of the design splits failures into four kinds. Only configuration
//! rejection is ever surfaced as `Result::Err`. Invariant violations are
//! fatal and asserted rather than returned; allocation misses and
//! feedback-for-unknown-UE are not errors at all — they are logged and
//! otherwise silently absorbed, matching §7's propagation policy.

use thiserror::Error;

use crate::types::CellIndex;

/// Configuration rejected by the RRC-facing API. No state is mutated when
/// this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `cell_cfg` was called with two cells sharing the same index.
    #[error("duplicate cell index {0}")]
    DuplicateCell(CellIndex),

    /// A UE's carrier list referenced a cell index that was never
    /// registered via `cell_cfg`.
    #[error("unknown cell {0}")]
    UnknownCell(CellIndex),

    /// `nof_rbg` derived from the cell's PRB count was zero or exceeded
    /// the scheduler's fixed-capacity RBG bitmap.
    #[error("rbg count {0} out of range (1..={1})")]
    RbgCountOutOfRange(usize, usize),

    /// `nof_concurrent_subframes` was outside `1..=4`.
    #[error("nof_concurrent_subframes {0} out of range (1..=4)")]
    ConcurrentSubframesOutOfRange(usize),
}

/// Errors surfaced from the slot-level entry points.
///
/// The out-of-order-delivery case §5's identity check guards against is
/// deliberately *not* a variant here: §7 classes a slot-identity mismatch
/// as an invariant violation, which is fatal and never observed under
/// correct use, so it is asserted (`SlotContext::check_identity`) rather
/// than returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// `generate_sched_result` was called for a cell index that was
    /// never registered.
    #[error("unknown cell {0}")]
    UnknownCell(CellIndex),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
