//! NR MAC-layer downlink/uplink scheduler.
//!
//! A per-cell, per-slot resource allocator that coordinates pools of UEs,
//! maintains HARQ state, and runs concurrently across cells — and,
//! optionally, across overlapping slots — while preserving per-UE
//! consistency. The scheduler owns no threads of its own: the embedding
//! PHY calls `slot_indication`/`generate_sched_result` from whatever
//! thread pool it already runs, one call per {slot, cell}.
//!
//! ```text
//! external slot clock
//!   -> slot_indication(t)            admits slot t, reserves UEs per cell
//!   -> generate_sched_result(t, c)   runs cell c's allocation, returns grants
//!   -> ...                           repeat for every cell
//!   -> (last cell) event queue drains, reservations release, context reusable
//! ```

pub mod cell;
pub mod error;
pub mod events;
mod metrics;
pub mod orchestrator;
pub mod policy;
mod scheduler;
pub mod slot_grid;
pub mod slot_ue;
pub mod types;
pub mod ue;
pub mod worker;

pub use error::{ConfigError, SchedulerError};
pub use events::{Event, EventManager};
pub use policy::{RoundRobinRbgPolicy, SchedulingPolicy};
pub use scheduler::{CellConfigInput, NrScheduler, SchedulerConfig};
pub use slot_grid::{AllocMiss, Dci, DlGrant, UlGrant};
pub use types::{AggregationLevel, CellIndex, Direction, HarqPid, Rnti, SlotIndex, TbIndex};
pub use ue::UeConfig;
pub use worker::SchedResult;
