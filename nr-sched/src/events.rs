//! Event manager: serializes asynchronous UE feedback into safe apply
//! points.
//!
//! PHY and RRC threads enqueue events without ever touching a UE's
//! carrier state directly; the orchestrator is the single consumer,
//! draining the queue in FIFO order during `end_slot` so a slot-UE view
//! never observes its UE mutating underneath it. Implemented as a
//! `parking_lot::Mutex`-guarded queue rather than a channel: every
//! producer call is a short, non-blocking critical section, which is
//! all "multi-producer single-consumer" requires here and avoids pulling
//! in an async runtime this crate otherwise has no use for.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::{CellIndex, HarqPid, Rnti, SlotIndex};
use crate::ue::UeConfig;

/// One pending mutation, tagged with the slot at which it was observed.
/// The manager tolerates reordering *within* a slot (see
/// `EventManager::drain`'s ACK-collapsing) but preserves ordering across
/// slots because the queue is FIFO end to end.
#[derive(Debug, Clone)]
pub enum Event {
    DlAck {
        observed_slot: SlotIndex,
        rnti: Rnti,
        cell: CellIndex,
        pid: HarqPid,
        ack: bool,
    },
    UlAck {
        observed_slot: SlotIndex,
        rnti: Rnti,
        cell: CellIndex,
        pid: HarqPid,
        ack: bool,
    },
    /// The MAC-level scheduling request carries no cell index in the
    /// external interface (`ul_sr_info(slot, rnti)`); it is applied to
    /// every cell the UE is active on.
    UlSr {
        observed_slot: SlotIndex,
        rnti: Rnti,
    },
    UlBsr {
        observed_slot: SlotIndex,
        rnti: Rnti,
        cell: CellIndex,
        buffer_bytes: u32,
    },
    DlCqi {
        observed_slot: SlotIndex,
        rnti: Rnti,
        cell: CellIndex,
        cqi: u8,
    },
    UeCfg {
        observed_slot: SlotIndex,
        rnti: Rnti,
        cfg: UeConfig,
    },
    RemoveUe {
        observed_slot: SlotIndex,
        rnti: Rnti,
    },
}

impl Event {
    pub(crate) fn rnti(&self) -> Rnti {
        match self {
            Event::DlAck { rnti, .. }
            | Event::UlAck { rnti, .. }
            | Event::UlSr { rnti, .. }
            | Event::UlBsr { rnti, .. }
            | Event::DlCqi { rnti, .. }
            | Event::UeCfg { rnti, .. }
            | Event::RemoveUe { rnti, .. } => *rnti,
        }
    }
}

/// Multi-producer single-consumer queue of pending UE mutations.
#[derive(Default)]
pub struct EventManager {
    queue: Mutex<VecDeque<Event>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.queue.lock().push_back(event);
    }

    pub fn dl_ack_info(&self, rnti: Rnti, cell: CellIndex, pid: HarqPid, ack: bool, observed_slot: SlotIndex) {
        self.push(Event::DlAck { observed_slot, rnti, cell, pid, ack });
    }

    pub fn ul_ack_info(&self, rnti: Rnti, cell: CellIndex, pid: HarqPid, ack: bool, observed_slot: SlotIndex) {
        self.push(Event::UlAck { observed_slot, rnti, cell, pid, ack });
    }

    pub fn ul_sr_info(&self, rnti: Rnti, observed_slot: SlotIndex) {
        self.push(Event::UlSr { observed_slot, rnti });
    }

    pub fn ul_bsr_info(&self, rnti: Rnti, cell: CellIndex, buffer_bytes: u32, observed_slot: SlotIndex) {
        self.push(Event::UlBsr { observed_slot, rnti, cell, buffer_bytes });
    }

    pub fn dl_cqi_info(&self, rnti: Rnti, cell: CellIndex, cqi: u8, observed_slot: SlotIndex) {
        self.push(Event::DlCqi { observed_slot, rnti, cell, cqi });
    }

    pub fn ue_cfg(&self, rnti: Rnti, cfg: UeConfig, observed_slot: SlotIndex) {
        self.push(Event::UeCfg { observed_slot, rnti, cfg });
    }

    pub fn remove_ue(&self, rnti: Rnti, observed_slot: SlotIndex) {
        self.push(Event::RemoveUe { observed_slot, rnti });
    }

    /// Drains the queue in FIFO order, collapsing same-PID ACK/NACK
    /// events for the same UE down to the latest one observed (the
    /// reordering-within-a-slot tolerance) while preserving the relative
    /// order of every other event. Idempotent when the queue is already
    /// empty.
    pub fn drain(&self) -> Vec<Event> {
        let raw: Vec<Event> = self.queue.lock().drain(..).collect();

        // Same-{UE, PID} ACK/NACK events collapse to the latest one
        // enqueued; everything else keeps its FIFO position.
        let mut latest_ack_idx: std::collections::HashMap<(Rnti, bool, HarqPid), usize> =
            std::collections::HashMap::new();
        for (i, event) in raw.iter().enumerate() {
            if let Some(key) = ack_key(event) {
                latest_ack_idx.insert(key, i);
            }
        }

        raw.into_iter()
            .enumerate()
            .filter(|(i, event)| match ack_key(event) {
                Some(key) => latest_ack_idx[&key] == *i,
                None => true,
            })
            .map(|(_, event)| event)
            .collect()
    }
}

/// Identifies an ACK/NACK event by the (UE, direction, PID) tuple whose
/// feedback it carries, for same-PID collapsing in `EventManager::drain`.
fn ack_key(event: &Event) -> Option<(Rnti, bool, HarqPid)> {
    match event {
        Event::DlAck { rnti, pid, .. } => Some((*rnti, true, *pid)),
        Event::UlAck { rnti, pid, .. } => Some((*rnti, false, *pid)),
        _ => None,
    }
}
