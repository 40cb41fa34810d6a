//! UE record: long-lived per-UE state (§3, §4.B).
//!
//! A `UeRecord` owns one [`carrier::CarrierState`] per cell it is
//! configured on, each independently lockable and independently
//! reservable. The per-UE reservation described in §3/§4.C is, in this
//! implementation, a reservation *per (UE, cell)*: two cell workers in
//! the same slot scheduling the same UE on two different cells touch
//! disjoint carrier state and must both succeed (§8 scenario S2), while
//! two overlapping slot contexts scheduling the same UE on the *same*
//! cell must not (§8 scenario S3). See DESIGN.md for the Open Question
//! this resolves.

pub mod carrier;
pub mod harq;

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::cell::required_aggregation_level;
use crate::error::ConfigError;
use crate::slot_ue::SlotUeView;
use crate::types::{CellIndex, HarqPid, Rnti, SlotIndex};
use carrier::{CarrierState, DEFAULT_HARQ_POOL_SIZE};

/// Configuration handed to the scheduler via `ue_cfg`. Replacing this on
/// an existing UE is a reconfiguration, applied atomically at the next
/// slot boundary (§4.B `cfg_update`).
#[derive(Debug, Clone)]
pub struct UeConfig {
    pub rnti: Rnti,
    /// Cells this UE is configured to use. Each entry activates that
    /// cell's carrier state; cells not listed are left inactive.
    pub carriers: Vec<CellIndex>,
    /// HARQ-ACK timing table, indexed by `slot.0 as usize % k1.len()`.
    pub k1: Vec<u32>,
}

impl UeConfig {
    pub fn k1_for_slot(&self, slot: SlotIndex) -> u32 {
        if self.k1.is_empty() {
            return 4;
        }
        self.k1[slot.to_usize() % self.k1.len()]
    }
}

/// A single per-{UE, cell} carrier slot: its state plus the reservation
/// flag described in §3 ("a weak per-UE reservation realized by a
/// try-lock on a per-UE flag").
struct CarrierSlot {
    state: Mutex<CarrierState>,
    reserved: AtomicBool,
}

/// The HARQ candidate a `SlotUeView` selected for this slot, before the
/// grid has committed it via `alloc_pdsch`/`alloc_pusch`.
#[derive(Debug, Clone, Copy)]
pub struct HarqCandidate {
    pub pid: HarqPid,
    pub is_retx: bool,
}

pub struct UeRecord {
    rnti: Rnti,
    cfg: Mutex<UeConfig>,
    /// Indexed by `CellIndex.0 as usize`; `None` for cells this UE is not
    /// configured on. Length is fixed at construction to the number of
    /// cells known at the time (bounded by `cell_cfg` bring-up).
    carriers: Vec<Option<CarrierSlot>>,
}

impl UeRecord {
    pub fn new(cfg: UeConfig, nof_cells: usize, active_cells: &[CellIndex]) -> Self {
        let mut carriers: Vec<Option<CarrierSlot>> = (0..nof_cells).map(|_| None).collect();
        for &cell in active_cells {
            let idx = cell.0 as usize;
            if idx < carriers.len() {
                carriers[idx] = Some(CarrierSlot {
                    state: Mutex::new(CarrierState::new(true, DEFAULT_HARQ_POOL_SIZE)),
                    reserved: AtomicBool::new(false),
                });
            }
        }
        UeRecord {
            rnti: cfg.rnti,
            cfg: Mutex::new(cfg),
            carriers,
        }
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn is_active_on(&self, cell: CellIndex) -> bool {
        self.carriers
            .get(cell.0 as usize)
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    /// Atomically replaces the UE's configuration. Called only from the
    /// event manager during slot finalization (§4.B, §4.F).
    pub(crate) fn apply_cfg_update(&self, new_cfg: UeConfig) {
        *self.cfg.lock() = new_cfg;
    }

    pub fn k1_for_slot(&self, slot: SlotIndex) -> u32 {
        self.cfg.lock().k1_for_slot(slot)
    }

    /// Sets the pending-SR flag (§4.B `sr`). Applied via the event
    /// manager, like every other mutation.
    pub(crate) fn set_pending_sr(&self, cell: CellIndex) {
        if let Some(Some(slot)) = self.carriers.get(cell.0 as usize) {
            slot.state.lock().pending_sr = true;
        }
    }

    /// Sets the pending-SR flag on every cell this UE is active on. The
    /// external `ul_sr_info(slot, rnti)` call carries no cell index, so a
    /// scheduling request is broadcast across the UE's active carriers.
    pub(crate) fn set_pending_sr_all(&self) {
        for carrier in self.carriers.iter().flatten() {
            carrier.state.lock().pending_sr = true;
        }
    }

    pub(crate) fn set_ul_bsr(&self, cell: CellIndex, bytes: u32) {
        if let Some(Some(slot)) = self.carriers.get(cell.0 as usize) {
            slot.state.lock().pending_ul_bytes = bytes;
        }
    }

    pub(crate) fn set_dl_cqi(&self, cell: CellIndex, cqi: u8) {
        if let Some(Some(slot)) = self.carriers.get(cell.0 as usize) {
            slot.state.lock().last_cqi = cqi;
        }
    }

    /// Applies DL or UL HARQ feedback (§4.B `ack`).
    pub(crate) fn apply_harq_ack(&self, cell: CellIndex, dl: bool, pid: HarqPid, ack: bool) {
        if let Some(Some(slot)) = self.carriers.get(cell.0 as usize) {
            let mut state = slot.state.lock();
            if dl {
                state.dl_harq.apply_ack(pid, ack);
            } else {
                state.ul_harq.apply_ack(pid, ack);
            }
        }
    }

    /// §4.C `try_reserve`: attempts to acquire the exclusive {UE, cell}
    /// reservation for this slot. Returns `None` (an *empty* view, per
    /// §4.C) if another worker already holds it — the caller must not
    /// retry within the same slot.
    pub fn try_reserve(
        self: &std::sync::Arc<Self>,
        slot: SlotIndex,
        cell: CellIndex,
    ) -> Option<SlotUeView> {
        let carrier_slot = self.carriers.get(cell.0 as usize)?.as_ref()?;
        if carrier_slot
            .reserved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            crate::metrics::ue_reservation_contended();
            return None;
        }

        let dl_candidate = select_candidate(carrier_slot, slot, true);
        let ul_candidate = select_candidate(carrier_slot, slot, false);
        let cqi = carrier_slot.state.lock().last_cqi;

        Some(SlotUeView::new(
            self.clone(),
            cell,
            slot,
            dl_candidate,
            ul_candidate,
            required_aggregation_level(cqi),
        ))
    }

    fn release_reservation(&self, cell: CellIndex) {
        if let Some(Some(slot)) = self.carriers.get(cell.0 as usize) {
            slot.reserved.store(false, Ordering::Release);
        }
    }

    pub(crate) fn lock_carrier(&self, cell: CellIndex) -> parking_lot::MutexGuard<'_, CarrierState> {
        self.carriers[cell.0 as usize]
            .as_ref()
            .expect("carrier must be active for a reserved cell")
            .state
            .lock()
    }
}

/// Pending retransmissions take priority over new transmissions: a
/// process sitting `Nacked` past its `k1` window has already cost one
/// round trip, so it is granted before any `Empty` process starts a
/// fresh one.
fn select_candidate(slot: &CarrierSlot, now: SlotIndex, dl: bool) -> Option<HarqCandidate> {
    let state = slot.state.lock();
    let (pool, k1) = if dl {
        (&state.dl_harq, 4)
    } else {
        (&state.ul_harq, 4)
    };
    if let Some(pid) = pool.oldest_retx_eligible(now, k1) {
        return Some(HarqCandidate { pid, is_retx: true });
    }
    pool.first_empty()
        .map(|pid| HarqCandidate { pid, is_retx: false })
}

impl Drop for UeRecord {
    fn drop(&mut self) {
        tracing::trace!(rnti = %self.rnti, "UE record dropped");
    }
}

/// Friend accessor used by `SlotUeView::drop` to release the
/// reservation without exposing `release_reservation` on the public API.
pub(crate) fn release_reservation(ue: &UeRecord, cell: CellIndex) {
    ue.release_reservation(cell);
}

/// Shared, concurrently-readable table of UE records keyed by RNTI.
///
/// §5: "UE table: shared; guarded by a readers-writer lock on
/// insert/remove." Lookups take the read lock, which parking_lot
/// allows many readers to hold concurrently — this is the crate's
/// reading of "lock-free lookup through indices stable for the UE's
/// lifetime" (see DESIGN.md).
#[derive(Default)]
pub struct UeTable {
    inner: parking_lot::RwLock<std::collections::HashMap<Rnti, std::sync::Arc<UeRecord>>>,
}

impl UeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rnti: Rnti) -> Option<std::sync::Arc<UeRecord>> {
        self.inner.read().get(&rnti).cloned()
    }

    pub fn contains(&self, rnti: Rnti) -> bool {
        self.inner.read().contains_key(&rnti)
    }

    /// Inserts a brand-new UE record. Fails with
    /// [`ConfigError::DuplicateCell`]-shaped semantics are not used here;
    /// duplicate-RNTI insertion returns `Err` with the already-present
    /// record so the caller can fall back to treating the call as a
    /// reconfiguration (see `Scheduler::ue_cfg` and DESIGN.md's Open
    /// Question on duplicate `ue_cfg`).
    pub fn insert_new(&self, record: std::sync::Arc<UeRecord>) -> Result<(), std::sync::Arc<UeRecord>> {
        use std::collections::hash_map::Entry;
        let mut guard = self.inner.write();
        match guard.entry(record.rnti()) {
            Entry::Occupied(e) => Err(e.get().clone()),
            Entry::Vacant(e) => {
                e.insert(record);
                Ok(())
            }
        }
    }

    pub fn remove(&self, rnti: Rnti) -> Option<std::sync::Arc<UeRecord>> {
        self.inner.write().remove(&rnti)
    }

    pub fn iter_rntis(&self) -> Vec<Rnti> {
        self.inner.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn ensure_no_unknown_cell(
    active_cells: &[CellIndex],
    known_cells: &[CellIndex],
) -> Result<(), ConfigError> {
    for c in active_cells {
        if !known_cells.contains(c) {
            return Err(ConfigError::UnknownCell(*c));
        }
    }
    Ok(())
}
