//! Scheduler metrics.
//!
//! Follows the teacher's pattern: module-private `LazyLock<Counter>` /
//! `Histogram` statics, one free function per event, called from the
//! allocation and event-apply code paths. No recorder is installed by
//! this crate — whichever binary embeds the scheduler is responsible for
//! that, exactly as `lightway-core`'s own `metrics.rs` assumes a recorder
//! is installed elsewhere.

use std::sync::LazyLock;

use metrics::{counter, histogram, Counter, Histogram};

use crate::types::Direction;

static METRIC_GRANTS_NEW_TX: LazyLock<[Counter; 2]> = LazyLock::new(|| {
    [
        counter!("sched_nr_grants_new_tx", "direction" => "dl"),
        counter!("sched_nr_grants_new_tx", "direction" => "ul"),
    ]
});
static METRIC_GRANTS_RETX: LazyLock<[Counter; 2]> = LazyLock::new(|| {
    [
        counter!("sched_nr_grants_retx", "direction" => "dl"),
        counter!("sched_nr_grants_retx", "direction" => "ul"),
    ]
});
static METRIC_ALLOC_MISS_NO_HARQ: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_alloc_miss_no_harq"));
static METRIC_ALLOC_MISS_PDCCH_FULL: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_alloc_miss_pdcch_full"));
static METRIC_ALLOC_MISS_RBG_OVERLAP: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_alloc_miss_rbg_overlap"));
static METRIC_UE_RESERVATION_CONTENDED: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_ue_reservation_contended"));
static METRIC_EVENTS_APPLIED: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_events_applied"));
static METRIC_EVENTS_DROPPED_UNKNOWN_UE: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_events_dropped_unknown_ue"));
static METRIC_UE_CFG_ACCEPTED: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_ue_cfg_accepted"));
static METRIC_UE_CFG_REJECTED: LazyLock<Counter> =
    LazyLock::new(|| counter!("sched_nr_ue_cfg_rejected"));
static METRIC_SLOT_FINALIZE_DURATION: LazyLock<Histogram> =
    LazyLock::new(|| histogram!("sched_nr_slot_finalize_duration_seconds"));

fn direction_index(dir: Direction) -> usize {
    match dir {
        Direction::Dl => 0,
        Direction::Ul => 1,
    }
}

pub(crate) fn grant_new_tx(dir: Direction) {
    METRIC_GRANTS_NEW_TX[direction_index(dir)].increment(1);
}

pub(crate) fn grant_retx(dir: Direction) {
    METRIC_GRANTS_RETX[direction_index(dir)].increment(1);
}

pub(crate) fn alloc_miss_no_harq() {
    METRIC_ALLOC_MISS_NO_HARQ.increment(1);
}

pub(crate) fn alloc_miss_pdcch_full() {
    METRIC_ALLOC_MISS_PDCCH_FULL.increment(1);
}

pub(crate) fn alloc_miss_rbg_overlap() {
    METRIC_ALLOC_MISS_RBG_OVERLAP.increment(1);
}

pub(crate) fn ue_reservation_contended() {
    METRIC_UE_RESERVATION_CONTENDED.increment(1);
}

pub(crate) fn events_applied(n: u64) {
    METRIC_EVENTS_APPLIED.increment(n);
}

pub(crate) fn event_dropped_unknown_ue() {
    METRIC_EVENTS_DROPPED_UNKNOWN_UE.increment(1);
}

pub(crate) fn ue_cfg_accepted() {
    METRIC_UE_CFG_ACCEPTED.increment(1);
}

pub(crate) fn ue_cfg_rejected() {
    METRIC_UE_CFG_REJECTED.increment(1);
}

pub(crate) fn slot_finalize_duration(seconds: f64) {
    METRIC_SLOT_FINALIZE_DURATION.record(seconds);
}
