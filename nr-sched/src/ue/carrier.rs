//! Per-{UE, cell} carrier state: the DL/UL HARQ pools plus the scalar
//! feedback fields from §3 (CQI, buffer-status report, pending SR).

use crate::ue::harq::HarqPool;

/// Default HARQ pool size, per §6's configuration knobs.
pub const DEFAULT_HARQ_POOL_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct CarrierState {
    pub active: bool,
    pub dl_harq: HarqPool,
    pub ul_harq: HarqPool,
    /// Pending RLC/logical-channel bytes, as last reported by `ul_bsr_info`.
    pub pending_ul_bytes: u32,
    /// Last CQI reported by `dl_cqi_info`.
    pub last_cqi: u8,
    pub pending_sr: bool,
}

impl CarrierState {
    pub fn new(active: bool, harq_pool_size: usize) -> Self {
        CarrierState {
            active,
            dl_harq: HarqPool::new(harq_pool_size),
            ul_harq: HarqPool::new(harq_pool_size),
            pending_ul_bytes: 0,
            last_cqi: 7,
            pending_sr: false,
        }
    }
}
