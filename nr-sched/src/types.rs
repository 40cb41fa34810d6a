//! Small typed identifiers shared across the scheduler.
//!
//! Mirrors the teacher's habit of wrapping every wire-ish identifier
//! (`SessionId`, `Version`) in a newtype rather than passing bare integers
//! around.

use std::fmt;

/// 16-bit radio network temporary identifier, scoped to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rnti(pub u16);

impl Rnti {
    /// RNTI value reserved by 3GPP and never assigned to a UE.
    pub const EMPTY: Rnti = Rnti(0);
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl From<u16> for Rnti {
    fn from(v: u16) -> Self {
        Rnti(v)
    }
}

/// Index of a cell within a scheduler instance, stable for the cell's
/// lifetime and assigned at `cell_cfg` bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellIndex(pub u16);

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cc{}", self.0)
    }
}

impl From<u16> for CellIndex {
    fn from(v: u16) -> Self {
        CellIndex(v)
    }
}

/// A monotonically increasing slot (TTI) counter.
///
/// Arithmetic wraps, matching the radio frame's own periodic numbering;
/// only differences within a small window (HARQ round-trip, slot-context
/// count) are ever meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SlotIndex(pub u32);

impl SlotIndex {
    /// Number of slots elapsed going from `self` to `later`, assuming
    /// `later` did not wrap around past `self`.
    pub fn distance_to(&self, later: SlotIndex) -> u32 {
        later.0.wrapping_sub(self.0)
    }

    pub fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

impl std::ops::Add<u32> for SlotIndex {
    type Output = SlotIndex;
    fn add(self, rhs: u32) -> SlotIndex {
        SlotIndex(self.0.wrapping_add(rhs))
    }
}

/// HARQ process identifier, `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HarqPid(pub u8);

/// Transport block index within a HARQ process. The scheduler only ever
/// deals with single-TB transmissions, but the field exists because PHY
/// feedback (`dl_ack_info`) is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TbIndex(pub u8);

/// PDCCH aggregation level. Variants are the values 3GPP defines; the
/// scheduler only ever uses a handful of them in its link-adaptation
/// heuristic (see `cell::required_aggregation_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum AggregationLevel {
    Al1 = 1,
    Al2 = 2,
    Al4 = 4,
    Al8 = 8,
    Al16 = 16,
}

impl AggregationLevel {
    pub const ALL_ASCENDING: [AggregationLevel; 5] = [
        AggregationLevel::Al1,
        AggregationLevel::Al2,
        AggregationLevel::Al4,
        AggregationLevel::Al8,
        AggregationLevel::Al16,
    ];

    pub fn cces(self) -> u32 {
        self as u8 as u32
    }
}

/// Direction of a grant, used for metrics labels and DCI formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Dl,
    Ul,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Dl => "dl",
            Direction::Ul => "ul",
        }
    }
}
