//! Runs a handful of processes against a small physical memory and checks
//! that every page reads back what was written to it.
//!
//! ```text
//! vmsim [frames] [processes] [pages] [rounds] [--eager] [-v|-vv]
//! ```

mod logger;

use kernel_memory_addresses::{PAGE_SIZE, VirtualPageNumber};
use kernel_vm::{MemoryImage, MemorySwap, PagingMode, Process, VmConfig, VmError, VmKernel};
use log::LevelFilter;
use logger::StderrLogger;
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, thread};

struct Options {
    frames: usize,
    processes: usize,
    pages: usize,
    rounds: usize,
    mode: PagingMode,
    level: LevelFilter,
}

impl Options {
    fn parse() -> Result<Self, String> {
        let mut numbers = Vec::new();
        let mut mode = PagingMode::Demand;
        let mut level = LevelFilter::Warn;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--eager" => mode = PagingMode::Eager,
                "-v" => level = LevelFilter::Debug,
                "-vv" => level = LevelFilter::Trace,
                n => numbers.push(n.parse::<usize>().map_err(|e| format!("{n}: {e}"))?),
            }
        }
        if numbers.len() > 4 {
            return Err(format!("expected at most 4 numbers, got {}", numbers.len()));
        }
        let get = |i: usize, default: usize| numbers.get(i).copied().unwrap_or(default);
        Ok(Self {
            frames: get(0, 8),
            processes: get(1, 3),
            pages: get(2, 6),
            rounds: get(3, 4),
            mode,
            level,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn pattern(pid: u32, vpn: u32, round: usize) -> u8 {
    (pid.wrapping_mul(31).wrapping_add(vpn.wrapping_mul(7)) as usize + round) as u8
}

/// Fill every data page, then read all of them back, `rounds` times.
fn exercise(kernel: &VmKernel, process: &Process, pages: u32, rounds: usize) -> Result<usize, VmError> {
    let pid = process.id().as_u32();
    let mut mismatches = 0;
    let mut page = vec![0; PAGE_SIZE];
    for round in 0..rounds {
        for vpn in 0..pages {
            let va = VirtualPageNumber::new(vpn).base();
            page.fill(pattern(pid, vpn, round));
            kernel.write_virtual_memory(process, va, &page)?;
        }
        for vpn in 0..pages {
            let va = VirtualPageNumber::new(vpn).base();
            kernel.read_virtual_memory(process, va, &mut page)?;
            let expected = pattern(pid, vpn, round);
            if page.iter().any(|&b| b != expected) {
                log::error!("{} vpn {vpn}: expected {expected:#04x} in round {round}", process.id());
                mismatches += 1;
            }
        }
    }
    Ok(mismatches)
}

fn run(options: &Options) -> Result<usize, VmError> {
    let swap = Arc::new(MemorySwap::new());
    let config = VmConfig::default().with_frame_count(options.frames);
    let kernel = VmKernel::new(config, Arc::<MemorySwap>::clone(&swap));

    let processes = (0..options.processes)
        .map(|i| {
            let image = MemoryImage::new().with_section(".data", vec![0; options.pages * PAGE_SIZE], false);
            let name = i.to_string();
            kernel.spawn(Arc::new(image), &["vmsim", name.as_str()], options.mode)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pages = u32::try_from(options.pages).unwrap_or(u32::MAX);
    let kernel_ref = &kernel;
    let mismatches = thread::scope(|s| {
        let workers: Vec<_> = processes
            .iter()
            .map(|p| s.spawn(move || exercise(kernel_ref, p, pages, options.rounds)))
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .sum::<Result<usize, VmError>>()
    })?;

    if let Err(e) = kernel.check_invariants() {
        log::error!("{e}");
        return Ok(mismatches + 1);
    }

    let stats = kernel.stats();
    eprintln!(
        "{} frames, {} processes x {} pages: {} faults, {} evictions, {} swap writes, {} swap reads, {} blocks, {} pages in swap",
        options.frames,
        options.processes,
        options.pages,
        stats.faults,
        stats.evictions,
        stats.swap_writes,
        stats.swap_reads,
        stats.blocks,
        swap.len()
    );

    for p in &processes {
        kernel.release_all_frames(p);
    }
    debug_assert_eq!(kernel.free_frames(), options.frames);
    Ok(mismatches)
}

fn main() -> ExitCode {
    let options = match Options::parse() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("vmsim: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = StderrLogger::new(options.level).init() {
        eprintln!("vmsim: {e}");
    }
    if options.frames == 0 {
        eprintln!("vmsim: need at least one frame");
        return ExitCode::from(2);
    }

    match run(&options) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(n) => {
            eprintln!("vmsim: {n} mismatches");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("vmsim: {e}");
            ExitCode::FAILURE
        }
    }
}
