//! Demonstration harness for `nr-sched`.
//!
//! Plays the role `lightway-client`/`lightway-server` play for
//! `lightway-core`: a thin binary that drives the library end to end and
//! installs the `tracing-subscriber` backend the library itself
//! deliberately does not. Not part of the scheduler; just the "does it
//! actually run" exercise every library crate in this style ships
//! alongside itself.

use clap::{Parser, ValueEnum};
use nr_sched::{
    CellConfigInput, CellIndex, NrScheduler, Rnti, SchedulerConfig, SlotIndex, TbIndex, UeConfig,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Scenario {
    /// One UE, two cells, `nof_concurrent_subframes = 1`.
    Serial,
    /// One UE, four cells scheduled concurrently.
    ParallelCells,
    /// Two cells, `nof_concurrent_subframes = 2`, adjacent slots overlap.
    ParallelSlots,
    /// Sixteen UEs contending for four PDCCH candidates.
    PdcchPressure,
}

/// Drives a synthetic slot clock against `nr-sched` and prints a summary.
#[derive(Parser, Debug)]
#[command(
    about = "nr-sched demonstration harness",
    version,
    author = "srsRAN developers"
)]
struct Args {
    /// Which scenario from the testable-properties scenario list to run.
    #[clap(value_enum, default_value_t = Scenario::Serial)]
    scenario: Scenario,

    /// Number of slots to drive.
    #[clap(long, default_value_t = 200)]
    slots: u32,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match args.scenario {
        Scenario::Serial => run_serial(args.slots),
        Scenario::ParallelCells => run_parallel_cells(args.slots),
        Scenario::ParallelSlots => run_parallel_slots(args.slots),
        Scenario::PdcchPressure => run_pdcch_pressure(args.slots.max(8)),
    }
}

fn cell(index: u16) -> CellConfigInput {
    CellConfigInput {
        cell_index: CellIndex(index),
        subcarrier_spacing_khz: 30,
        nof_prb: 51,
        nof_rbg: 8,
        nof_pdcch_candidates_per_al: 2,
    }
}

fn run_serial(slots: u32) {
    let sched = NrScheduler::new(
        SchedulerConfig { nof_concurrent_subframes: 1 },
        vec![cell(0), cell(1)],
        None,
    )
    .expect("valid bring-up config");

    sched
        .ue_cfg(UeConfig {
            rnti: Rnti(0x46),
            carriers: vec![CellIndex(0), CellIndex(1)],
            k1: vec![4],
        })
        .expect("valid ue cfg");

    let mut total_dl = 0usize;
    for t in 0..slots {
        let slot = SlotIndex(t);
        sched.slot_indication(slot);
        for cc in 0..2u16 {
            let r = sched
                .generate_sched_result(slot, CellIndex(cc))
                .expect("known cell");
            total_dl += r.dl_grants.len();
            // ACK every grant immediately so the 8-entry HARQ pool keeps
            // recycling instead of running dry after 8 transmissions.
            for g in &r.dl_grants {
                sched.dl_ack_info(Rnti(0x46), CellIndex(cc), g.pid, TbIndex(0), true);
            }
        }
    }
    println!("serial: {slots} slots x 2 cells, {total_dl} DL grants");
}

fn run_parallel_cells(slots: u32) {
    let cells: Vec<_> = (0..4).map(cell).collect();
    let sched = NrScheduler::new(
        SchedulerConfig { nof_concurrent_subframes: 1 },
        cells,
        None,
    )
    .expect("valid bring-up config");

    sched
        .ue_cfg(UeConfig {
            rnti: Rnti(0x46),
            carriers: (0..4).map(CellIndex).collect(),
            k1: vec![4],
        })
        .expect("valid ue cfg");

    let total_dl = std::sync::atomic::AtomicUsize::new(0);
    for t in 0..slots {
        let slot = SlotIndex(t);
        sched.slot_indication(slot);
        std::thread::scope(|scope| {
            for cc in 0..4u16 {
                let sched = &sched;
                let total_dl = &total_dl;
                scope.spawn(move || {
                    let r = sched
                        .generate_sched_result(slot, CellIndex(cc))
                        .expect("known cell");
                    total_dl.fetch_add(r.dl_grants.len(), std::sync::atomic::Ordering::Relaxed);
                    for g in &r.dl_grants {
                        sched.dl_ack_info(Rnti(0x46), CellIndex(cc), g.pid, TbIndex(0), true);
                    }
                });
            }
        });
    }
    println!(
        "parallel-cells: {slots} slots x 4 cells, {} DL grants",
        total_dl.load(std::sync::atomic::Ordering::Relaxed)
    );
}

fn run_parallel_slots(slots: u32) {
    let sched = NrScheduler::new(
        SchedulerConfig { nof_concurrent_subframes: 2 },
        vec![cell(0), cell(1)],
        None,
    )
    .expect("valid bring-up config");

    sched
        .ue_cfg(UeConfig {
            rnti: Rnti(0x46),
            carriers: vec![CellIndex(0), CellIndex(1)],
            k1: vec![4],
        })
        .expect("valid ue cfg");

    let total_dl = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for t in 0..slots {
            let slot = SlotIndex(t);
            sched.slot_indication(slot);
            let sched_ref = &sched;
            let total_dl = &total_dl;
            scope.spawn(move || {
                for cc in 0..2u16 {
                    if let Ok(r) = sched_ref.generate_sched_result(slot, CellIndex(cc)) {
                        total_dl.fetch_add(r.dl_grants.len(), std::sync::atomic::Ordering::Relaxed);
                        for g in &r.dl_grants {
                            sched_ref.dl_ack_info(Rnti(0x46), CellIndex(cc), g.pid, TbIndex(0), true);
                        }
                    }
                }
            });
        }
    });
    println!(
        "parallel-slots: {slots} overlapping slots x 2 cells, {} DL grants",
        total_dl.load(std::sync::atomic::Ordering::Relaxed)
    );
}

fn run_pdcch_pressure(slots: u32) {
    let sched = NrScheduler::new(
        SchedulerConfig { nof_concurrent_subframes: 1 },
        vec![CellConfigInput {
            cell_index: CellIndex(0),
            subcarrier_spacing_khz: 30,
            nof_prb: 51,
            nof_rbg: 32,
            nof_pdcch_candidates_per_al: 4,
        }],
        None,
    )
    .expect("valid bring-up config");

    for i in 0..16u16 {
        sched
            .ue_cfg(UeConfig {
                rnti: Rnti(0x4600 + i),
                carriers: vec![CellIndex(0)],
                k1: vec![4],
            })
            .expect("valid ue cfg");
    }

    let mut granted_ever: std::collections::HashSet<u16> = std::collections::HashSet::new();
    for t in 0..slots {
        let slot = SlotIndex(t);
        sched.slot_indication(slot);
        let r = sched
            .generate_sched_result(slot, CellIndex(0))
            .expect("known cell");
        for g in &r.dl_grants {
            granted_ever.insert(g.rnti.0);
        }
        println!("slot {t}: {} DL grants this slot", r.dl_grants.len());
    }
    println!(
        "pdcch-pressure: {}/16 UEs granted at least once over {slots} slots",
        granted_ever.len()
    );
}
